//! Relative humidity from the dew point, after Hyland and Wexler (1983).

use log::warn;

use crate::config::InstrumentConfig;
use crate::observation::ObservationSeries;
use crate::uncertain::Uncertain;
use crate::{Error, Result};

/// Temperatures below this are treated as over ice [K].
const TRIPLE_POINT: f64 = 273.15;

/// `ln p = C[0]/T + C[1] + C[2] T + C[3] T² + C[4] T³ + C[5] T⁴ + C[6] ln T`, over ice.
const ICE: [f64; 7] = [
    -5.674_535_9e3,
    6.392_524_7,
    -9.677_843e-3,
    6.221_570_1e-7,
    2.074_782_5e-9,
    -9.484_024e-13,
    4.163_501_9,
];

/// Same form over liquid water, with no quartic term.
const WATER: [f64; 7] = [
    -5.800_220_6e3,
    1.391_499_3,
    -4.864_023_9e-2,
    4.176_476_8e-5,
    -1.445_209_3e-8,
    0.0,
    6.545_967_3,
];

/// One sample of the quantities relative humidity depends on.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HumidityRow {
    pub dew_point: Uncertain,
    /// Carried so a row can be traced back to its mass reading; plays no part in the result.
    pub mass: Uncertain,
    pub pressure: Uncertain,
    pub temperature: Uncertain,
}

/// Relative humidity at one index of a series.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HumidityPoint {
    pub idx: u64,
    pub rh: Uncertain,
}

/// Saturation vapour pressure [Pa] at `temperature` [K].
///
/// # Errors
/// `Error::Numeric` for a non-positive temperature.
pub fn saturation_pressure(temperature: Uncertain) -> Result<Uncertain> {
    let t = temperature.value();
    if t <= 0.0 {
        return Err(Error::numeric(format!(
            "saturation pressure needs an absolute temperature, got {t}"
        )));
    }
    let c = if t < TRIPLE_POINT { &ICE } else { &WATER };

    let ln_p = c[0] / t + c[1] + t * (c[2] + t * (c[3] + t * (c[4] + t * c[5]))) + c[6] * t.ln();
    let d_ln_p = -c[0] / (t * t)
        + c[2]
        + t * (2.0 * c[3] + t * (3.0 * c[4] + t * 4.0 * c[5]))
        + c[6] / t;

    let pressure = ln_p.exp();
    Ok(Uncertain::propagate(
        pressure,
        &[(pressure * d_ln_p, temperature)],
    ))
}

/// `RH = p_sat(T_dp) / p_sat(T)`.
///
/// The total pressure cancels in the ratio, so only the two temperatures contribute to the
/// uncertainty.
///
/// # Errors
/// `Error::Numeric` when either temperature is non-positive.
pub fn relative_humidity(row: &HumidityRow) -> Result<Uncertain> {
    let vapour = saturation_pressure(row.dew_point)?;
    let saturated = saturation_pressure(row.temperature)?;
    vapour.try_div(saturated)
}

/// Relative humidity at every index of a (filtered) series.
///
/// Indexes whose ambient temperature cannot be formed, or whose temperatures are non-physical,
/// are logged and left out of the result.
///
/// # Errors
/// Propagates any failure of a row that [`Error::is_recoverable`] does not cover.
pub fn humidity_series(
    series: &ObservationSeries,
    instrument: &InstrumentConfig,
) -> Result<Vec<HumidityPoint>> {
    let mut points = Vec::with_capacity(series.len());
    for obs in series.observations() {
        let temperature = match obs.average_temperature(instrument.thermocouple) {
            Ok(temperature) => temperature,
            Err(e) => {
                warn!("skipping index {} in humidity series: {e}", obs.idx);
                continue;
            }
        };
        let row = HumidityRow {
            dew_point: instrument.dew_point(obs.dew_point),
            mass: instrument.mass(obs.mass),
            pressure: instrument.pressure(obs.pressure),
            temperature,
        };
        match relative_humidity(&row) {
            Ok(rh) => points.push(HumidityPoint { idx: obs.idx, rh }),
            Err(e) if e.is_recoverable() => {
                warn!("skipping index {} in humidity series: {e}", obs.idx);
            }
            Err(e) => return Err(e),
        }
    }
    Ok(points)
}
