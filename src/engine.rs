use std::collections::HashSet;

use log::{debug, info, warn};

use crate::access::{FitPersistence, ObservationProvider, Prompt};
use crate::config::AnalysisConfig;
use crate::filter::filter_series;
use crate::humidity::humidity_series;
use crate::observation::ObservationSeries;
use crate::properties::{compute_properties, local_state, nondimensional_groups};
use crate::record::FitRecord;
use crate::selector::select_best_fit;
use crate::targets::{fit_windows, FitWindow};
use crate::{Error, Result};

/// Shown before any fit is persisted.
pub const CONFIRMATION: &str = "Proceed ([y]/n)? ";

/// How a call to [`AnalysisEngine::process_fits`] ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The operator confirmed; holds the number of new records stored.
    Persisted(usize),
    Canceled,
    Unrecognized,
}

/// The operator's reply to [`CONFIRMATION`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    Unrecognized,
}

impl Answer {
    /// No answer, an empty answer or anything containing `y` is a yes. Otherwise anything
    /// containing `n` is a no. Case is ignored.
    pub fn parse(answer: Option<&str>) -> Self {
        let answer = answer.map(|a| a.trim().to_lowercase()).unwrap_or_default();
        if answer.is_empty() || answer.contains('y') {
            Self::Yes
        } else if answer.contains('n') {
            Self::No
        } else {
            Self::Unrecognized
        }
    }
}

/// Runs the analysis of an experiment and hands the accepted fits to a store.
pub struct AnalysisEngine<S, Q> {
    config: AnalysisConfig,
    store: S,
    prompt: Q,
}

impl<S: FitPersistence, Q: Prompt> AnalysisEngine<S, Q> {
    /// # Errors
    /// `Error::Configuration` if `config` fails validation.
    pub fn new(config: AnalysisConfig, store: S, prompt: Q) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            store,
            prompt,
        })
    }

    pub const fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Load an experiment through `provider` and process it.
    ///
    /// # Errors
    /// Propagates provider failures and the errors of [`Self::process_fits`].
    pub fn run(&mut self, provider: &impl ObservationProvider, experiment_id: u64) -> Result<Outcome> {
        let series = provider.get_observations(experiment_id)?;
        self.process_fits(series, experiment_id)
    }

    /// Fit every relative-humidity target of `series` and, once the operator confirms, persist
    /// the accepted fits.
    ///
    /// Targets that end in insufficient data or a numeric failure are logged and skipped. At
    /// most one record is kept per window centre.
    ///
    /// # Errors
    /// Configuration errors, prompt failures and store failures.
    pub fn process_fits(&mut self, series: ObservationSeries, experiment_id: u64) -> Result<Outcome> {
        let records = self.fit_records(series, experiment_id)?;

        let reply = self.prompt.ask(CONFIRMATION)?;
        match Answer::parse(reply.as_deref()) {
            Answer::Yes => {
                let count = self.store.persist_fits(experiment_id, &records)?;
                info!("experiment {experiment_id}: persisted {count} fits");
                Ok(Outcome::Persisted(count))
            }
            Answer::No => {
                info!("Analysis canceled.");
                Ok(Outcome::Canceled)
            }
            Answer::Unrecognized => {
                info!("Unrecognized response.");
                Ok(Outcome::Unrecognized)
            }
        }
    }

    /// The accepted fits of `series`, one per distinct window centre, without touching the store
    /// or the prompt.
    ///
    /// # Errors
    /// Configuration errors and non-recoverable failures of the pipeline.
    pub fn fit_records(&self, series: ObservationSeries, experiment_id: u64) -> Result<Vec<FitRecord>> {
        info!(
            "experiment {experiment_id}: {} observations from index {}",
            series.len(),
            series.first_idx()
        );
        let filtered = filter_series(series, &self.config.filter)?;
        let humidity = humidity_series(&filtered, &self.config.instrument)?;
        let windows = fit_windows(&humidity, &self.config.targets);
        info!(
            "experiment {experiment_id}: {} relative humidity targets located",
            windows.len()
        );

        let mut centres = HashSet::new();
        let mut records = Vec::new();
        for window in &windows {
            if centres.contains(&window.idx) {
                debug!(
                    "target {:.2}: index {} already has a fit",
                    window.target_rh, window.idx
                );
                continue;
            }
            match self.fit_target(&filtered, window, experiment_id) {
                Ok(Some(record)) => {
                    centres.insert(record.idx);
                    records.push(record);
                }
                Ok(None) => debug!(
                    "target {:.2}: no window up to {} met the threshold",
                    window.target_rh, window.max_half_len
                ),
                Err(e) if e.is_recoverable() => {
                    warn!("target {:.2} at index {} skipped: {e}", window.target_rh, window.idx);
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            "experiment {experiment_id}: {} of {} targets fitted",
            records.len(),
            windows.len()
        );
        Ok(records)
    }

    fn fit_target(
        &self,
        series: &ObservationSeries,
        window: &FitWindow,
        experiment_id: u64,
    ) -> Result<Option<FitRecord>> {
        let config = &self.config;
        let Some(best) = select_best_fit(
            series,
            window,
            &config.instrument,
            &config.selector,
            None,
        )?
        else {
            return Ok(None);
        };

        let observations = series.window(window.idx, best.half_len).ok_or_else(|| {
            Error::configuration(format!("accepted window around {} left the series", window.idx))
        })?;
        let state = local_state(observations, &config.instrument, &config.chamber)?;
        let properties = compute_properties(&state, &best.evaluated.fit, &config.chamber)?;
        let groups = nondimensional_groups(&properties, &config.chamber)?;

        Ok(Some(FitRecord {
            experiment_id,
            idx: window.idx,
            target_rh: window.target_rh,
            evaluated: best.evaluated,
            state,
            properties,
            groups,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::{AnalysisEngine, Answer, Outcome};
    use crate::access::{InMemoryFitStore, Prompt};
    use crate::config::{AnalysisConfig, SavgolSettings};
    use crate::observation::tests::observation;
    use crate::observation::ObservationSeries;
    use crate::Result;

    struct AlwaysYes;

    impl Prompt for AlwaysYes {
        fn ask(&mut self, _message: &str) -> Result<Option<String>> {
            Ok(Some("y".to_owned()))
        }
    }

    /// Three dew-point plateaus, so several targets share the first index of a plateau.
    fn staircase() -> ObservationSeries {
        let observations = (0..=600u32)
            .map(|k| {
                let mut obs = observation(u64::from(k), (-2e-8f64).mul_add(f64::from(k), 0.0988));
                obs.dew_point = match k {
                    0..=149 => 272.0,
                    150..=449 => 282.0,
                    _ => 288.0,
                };
                obs.surface_temp = 290.0;
                for reading in &mut obs.thermocouples {
                    reading.value = 295.0;
                }
                obs
            })
            .collect();
        ObservationSeries::new(observations).unwrap()
    }

    fn unfiltered() -> AnalysisConfig {
        let mut config = AnalysisConfig::default();
        let identity = SavgolSettings {
            window: 1,
            order: 0,
        };
        config.filter.dew_point = identity;
        config.filter.mass = identity;
        config.filter.pressure = identity;
        config
    }

    #[test]
    fn targets_sharing_an_index_produce_one_record() {
        let mut engine = AnalysisEngine::new(unfiltered(), InMemoryFitStore::new(), AlwaysYes).unwrap();

        // 0.25 and 0.30 land on index 0, 0.35 to 0.50 on 150 and 0.55, 0.60 on 450
        let outcome = engine.process_fits(staircase(), 9).unwrap();
        assert_eq!(outcome, Outcome::Persisted(2));

        let records = engine.store().records();
        assert_eq!(
            records.iter().map(|record| record.idx).collect::<Vec<_>>(),
            vec![150, 450]
        );
        approx::assert_relative_eq!(records[0].target_rh, 0.35);
        approx::assert_relative_eq!(records[1].target_rh, 0.55);
        assert!(records.iter().all(|record| record.evaluated.nu_chi == 143));
    }

    #[test]
    fn a_window_without_ambient_temperature_skips_only_its_target() {
        let mut series = staircase().observations().to_vec();
        for reading in &mut series[420].thermocouples {
            reading.value = 1000.0;
        }
        let series = ObservationSeries::new(series).unwrap();
        let engine = AnalysisEngine::new(unfiltered(), InMemoryFitStore::new(), AlwaysYes).unwrap();

        let records = engine.fit_records(series, 9).unwrap();
        assert_eq!(
            records.iter().map(|record| record.idx).collect::<Vec<_>>(),
            vec![150]
        );
    }

    #[test]
    fn empty_and_yes_answers_proceed() {
        for answer in [None, Some(""), Some("  "), Some("y"), Some("Yes"), Some("yeah no")] {
            assert_eq!(Answer::parse(answer), Answer::Yes, "{answer:?}");
        }
    }

    #[test]
    fn no_answers_cancel() {
        for answer in [Some("n"), Some("No"), Some("nope")] {
            assert_eq!(Answer::parse(answer), Answer::No, "{answer:?}");
        }
    }

    #[test]
    fn other_answers_are_unrecognized() {
        for answer in [Some("ok"), Some("q"), Some("42")] {
            assert_eq!(Answer::parse(answer), Answer::Unrecognized, "{answer:?}");
        }
    }
}
