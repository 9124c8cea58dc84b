use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::uncertain::Uncertain;
use crate::{Error, Result};

/// Thermocouple values at or above this are reported by disconnected channels.
pub const DISCONNECTED_SENTINEL: f64 = 1000.0;

/// One raw reading of a single chamber thermocouple.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct ThermocoupleReading {
    pub idx: u64,
    pub channel: u8,
    /// Temperature [K].
    pub value: f64,
}

impl ThermocoupleReading {
    pub fn is_connected(&self) -> bool {
        self.value < DISCONNECTED_SENTINEL
    }
}

/// A single sample of the chamber instrumentation.
///
/// Temperatures are in kelvin, mass in kilograms, pressure in pascal and powers in watts.
#[derive(Clone, Debug, PartialEq)]
pub struct Observation {
    pub idx: u64,
    pub dew_point: f64,
    pub mass: f64,
    /// Absent while the reference heater duty cycle is zero.
    pub pow_ref: Option<f64>,
    pub pow_out: Option<f64>,
    pub pressure: f64,
    pub surface_temp: f64,
    pub ic_temp: f64,
    pub cap_man_ok: bool,
    pub optidew_ok: bool,
    pub thermocouples: Vec<ThermocoupleReading>,
}

impl Observation {
    /// Ambient temperature, the mean of the connected thermocouples each carrying `std_dev`.
    ///
    /// # Errors
    /// `Error::Numeric` when no thermocouple is connected at this index.
    pub fn average_temperature(&self, std_dev: f64) -> Result<Uncertain> {
        let connected = self
            .thermocouples
            .iter()
            .filter(|reading| reading.is_connected())
            .map(|reading| Uncertain::new(reading.value, std_dev));

        Uncertain::mean(connected).map_err(|_| {
            Error::numeric(format!("no connected thermocouple at index {}", self.idx))
        })
    }
}

/// The observations of one experiment, ordered by a contiguous index.
#[derive(Clone, Debug, PartialEq)]
pub struct ObservationSeries {
    observations: Vec<Observation>,
}

impl ObservationSeries {
    /// # Errors
    /// `Error::Configuration` for an empty series or when the indexes are not contiguous and
    /// strictly increasing.
    pub fn new(observations: Vec<Observation>) -> Result<Self> {
        if observations.is_empty() {
            return Err(Error::configuration("observation series is empty"));
        }
        if let Some(pair) = observations
            .windows(2)
            .find(|pair| pair[1].idx != pair[0].idx + 1)
        {
            return Err(Error::configuration(format!(
                "observation index {} follows {}, indexes must be contiguous",
                pair[1].idx, pair[0].idx
            )));
        }
        Ok(Self { observations })
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn first_idx(&self) -> u64 {
        self.observations.first().map_or(0, |obs| obs.idx)
    }

    pub fn last_idx(&self) -> u64 {
        self.observations.last().map_or(0, |obs| obs.idx)
    }

    /// Position of `idx` in the series, if present.
    pub fn position(&self, idx: u64) -> Option<usize> {
        let offset = usize::try_from(idx.checked_sub(self.first_idx())?).ok()?;
        (offset < self.len()).then_some(offset)
    }

    /// The observations `[idx - half_len, idx + half_len]`, if the series covers all of them.
    pub fn window(&self, idx: u64, half_len: usize) -> Option<&[Observation]> {
        let center = self.position(idx)?;
        let start = center.checked_sub(half_len)?;
        let end = center.checked_add(half_len)?;
        self.observations.get(start..=end)
    }

    pub fn column(&self, field: impl Fn(&Observation) -> f64) -> Array1<f64> {
        self.observations.iter().map(field).collect()
    }

    /// Replace one field of every observation with the matching entry of `values`.
    pub(crate) fn with_column(
        mut self,
        values: &Array1<f64>,
        field: impl Fn(&mut Observation) -> &mut f64,
    ) -> Self {
        for (obs, value) in self.observations.iter_mut().zip(values.iter()) {
            *field(obs) = *value;
        }
        self
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::{Observation, ObservationSeries, ThermocoupleReading};
    use crate::Error;

    pub(crate) fn observation(idx: u64, mass: f64) -> Observation {
        Observation {
            idx,
            dew_point: 280.0,
            mass,
            pow_ref: None,
            pow_out: None,
            pressure: 1e5,
            surface_temp: 288.0,
            ic_temp: 290.0,
            cap_man_ok: true,
            optidew_ok: true,
            thermocouples: (0..4)
                .map(|channel| ThermocoupleReading {
                    idx,
                    channel,
                    value: 290.0,
                })
                .collect(),
        }
    }

    #[test]
    fn disconnected_thermocouples_are_ignored() {
        let mut obs = observation(7, 0.1);
        obs.thermocouples[0].value = 289.0;
        obs.thermocouples[1].value = 291.0;
        obs.thermocouples[2].value = 1000.0;
        obs.thermocouples[3].value = 1280.5;

        let temperature = obs.average_temperature(0.2).unwrap();
        approx::assert_relative_eq!(temperature.value(), 290.0);
        approx::assert_relative_eq!(temperature.std_dev(), 0.2 / 2f64.sqrt(), max_relative = 1e-12);
    }

    #[test]
    fn an_index_without_connected_thermocouples_is_a_numeric_error() {
        let mut obs = observation(7, 0.1);
        for reading in &mut obs.thermocouples {
            reading.value = 1000.0;
        }
        assert!(matches!(obs.average_temperature(0.2), Err(Error::Numeric(_))));
    }

    #[test]
    fn series_must_be_contiguous() {
        let gap = vec![observation(1, 0.1), observation(3, 0.1)];
        assert!(matches!(ObservationSeries::new(gap), Err(Error::Configuration(_))));

        let reversed = vec![observation(2, 0.1), observation(1, 0.1)];
        assert!(ObservationSeries::new(reversed).is_err());

        assert!(ObservationSeries::new(vec![]).is_err());
    }

    #[test]
    fn windows_stay_inside_the_series() {
        let series =
            ObservationSeries::new((10..20).map(|idx| observation(idx, 0.1)).collect()).unwrap();

        let window = series.window(12, 2).unwrap();
        assert_eq!(window.len(), 5);
        assert_eq!(window[0].idx, 10);
        assert_eq!(window[4].idx, 14);

        assert!(series.window(12, 3).is_none());
        assert!(series.window(17, 3).is_none());
        assert!(series.window(25, 0).is_none());
        assert_eq!(series.position(9), None);
    }
}
