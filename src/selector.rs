use log::debug;

use crate::config::{InstrumentConfig, SelectorConfig};
use crate::observation::ObservationSeries;
use crate::record::EvaluatedFit;
use crate::regression::{evaluate_fit, fit_line};
use crate::targets::FitWindow;
use crate::uncertain::Uncertain;
use crate::{Error, Result};

/// The accepted regression of one target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BestFit {
    /// Half-length of the accepted window `[idx - half_len, idx + half_len]`.
    pub half_len: usize,
    pub evaluated: EvaluatedFit,
}

#[derive(Debug)]
enum Search {
    Searching(usize),
    Accepted(BestFit),
    Exhausted,
}

/// Grow a window around `window.idx` until the slope is resolved to `threshold`.
///
/// The half-length starts at `config.step` and grows by the same amount after every rejected
/// fit. A window is accepted as soon as `sig_b / |b| <= threshold`; a fit with an exactly zero
/// slope is never accepted. The search gives up once the half-length would exceed
/// `window.max_half_len`. `threshold` defaults to `config.threshold`.
///
/// # Errors
/// `Error::Configuration` when the window does not lie inside `series`, otherwise the numeric
/// errors of the regression.
pub fn select_best_fit(
    series: &ObservationSeries,
    window: &FitWindow,
    instrument: &InstrumentConfig,
    config: &SelectorConfig,
    threshold: Option<f64>,
) -> Result<Option<BestFit>> {
    let threshold = threshold.unwrap_or(config.threshold);
    if config.step == 0 {
        return Err(Error::configuration("selector step must be positive"));
    }

    let mut state = Search::Searching(config.step);
    loop {
        state = match state {
            Search::Searching(half_len) if half_len > window.max_half_len => Search::Exhausted,
            Search::Searching(half_len) => {
                let observations = series.window(window.idx, half_len).ok_or_else(|| {
                    Error::configuration(format!(
                        "half-window {half_len} around index {} leaves the series",
                        window.idx
                    ))
                })?;
                let points = observations
                    .iter()
                    .zip(0u32..)
                    .map(|(obs, offset)| (f64::from(offset), instrument.mass(obs.mass)))
                    .collect::<Vec<(f64, Uncertain)>>();

                let fit = fit_line(&points)?;
                let relative_error = fit.relative_slope_error();
                debug!(
                    "index {}: half-window {half_len} gives sig_b/|b| = {relative_error:.3e}",
                    window.idx
                );

                if fit.b != 0.0 && relative_error <= threshold {
                    Search::Accepted(BestFit {
                        half_len,
                        evaluated: evaluate_fit(&points, fit)?,
                    })
                } else {
                    Search::Searching(half_len + config.step)
                }
            }
            Search::Accepted(best) => return Ok(Some(best)),
            Search::Exhausted => return Ok(None),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::select_best_fit;
    use crate::config::{InstrumentConfig, SelectorConfig};
    use crate::observation::tests::observation;
    use crate::observation::ObservationSeries;
    use crate::targets::FitWindow;

    /// A slowly evaporating sample with a ±1e-7 kg ripple.
    fn series() -> ObservationSeries {
        let observations = (0..60_001u32)
            .map(|idx| {
                let i = f64::from(idx);
                let mass = 5.82e-9f64.mul_add(-i, 0.0988) + 1e-7 * (0.7 * i).sin();
                let mut obs = observation(u64::from(idx), mass);
                obs.thermocouples.clear();
                obs
            })
            .collect();
        ObservationSeries::new(observations).unwrap()
    }

    fn window(max_half_len: usize) -> FitWindow {
        FitWindow {
            target_rh: 0.5,
            idx: 30_000,
            max_half_len,
        }
    }

    #[test]
    fn a_wide_enough_window_is_accepted() {
        let series = series();
        let best = select_best_fit(
            &series,
            &window(250),
            &InstrumentConfig::default(),
            &SelectorConfig::default(),
            None,
        )
        .unwrap()
        .unwrap();

        assert_eq!(best.half_len, 164);
        assert!(best.evaluated.fit.relative_slope_error() <= 0.01);
        assert_eq!(best.evaluated.nu_chi, 327);
        approx::assert_relative_eq!(best.evaluated.fit.b, -5.820_181_942e-9, max_relative = 1e-6);
        approx::assert_relative_eq!(best.evaluated.fit.a, 0.098_626_355_295, max_relative = 1e-9);
        approx::assert_relative_eq!(best.evaluated.fit.sig_b, 5.804_953_995e-11, max_relative = 1e-6);
    }

    #[test]
    fn a_narrow_window_is_exhausted() {
        let best = select_best_fit(
            &series(),
            &window(2),
            &InstrumentConfig::default(),
            &SelectorConfig::default(),
            None,
        )
        .unwrap();
        assert!(best.is_none());
    }

    #[test]
    fn looser_thresholds_accept_smaller_windows() {
        let best = select_best_fit(
            &series(),
            &window(250),
            &InstrumentConfig::default(),
            &SelectorConfig::default(),
            Some(0.1),
        )
        .unwrap()
        .unwrap();

        assert_eq!(best.half_len, 35);
        assert!(best.evaluated.fit.relative_slope_error() <= 0.1);
        approx::assert_relative_eq!(best.evaluated.fit.b, -5.811_940_896e-9, max_relative = 1e-6);
    }

    #[test]
    fn unreachable_thresholds_are_not_met() {
        let best = select_best_fit(
            &series(),
            &window(250),
            &InstrumentConfig::default(),
            &SelectorConfig::default(),
            Some(0.001),
        )
        .unwrap();
        assert!(best.is_none());
    }

    #[test]
    fn coarser_steps_skip_half_lengths() {
        let config = SelectorConfig {
            step: 10,
            ..SelectorConfig::default()
        };
        let best = select_best_fit(
            &series(),
            &window(250),
            &InstrumentConfig::default(),
            &config,
            None,
        )
        .unwrap()
        .unwrap();
        assert_eq!(best.half_len, 170);
        assert!(best.evaluated.fit.relative_slope_error() <= 0.01);
    }

    #[test]
    fn windows_leaving_the_series_are_configuration_errors() {
        let series = series();
        let window = FitWindow {
            target_rh: 0.5,
            idx: 10,
            max_half_len: 20,
        };
        assert!(select_best_fit(
            &series,
            &window,
            &InstrumentConfig::default(),
            &SelectorConfig::default(),
            Some(1e-6),
        )
        .is_err());
    }
}
