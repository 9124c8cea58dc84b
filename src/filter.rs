use ndarray::{s, Array1, ArrayView1};

use crate::config::{FilterConfig, SavgolSettings};
use crate::math::{polyval, pseudo_inverse, vandermonde};
use crate::observation::{Observation, ObservationSeries};
use crate::{Error, Result};

/// Smooth `column` with a Savitzky-Golay filter.
///
/// Each interior sample is replaced by the value at the window centre of the least-squares
/// polynomial of degree `order` through the `window` samples around it. The first and last
/// `window / 2` samples are taken from the single polynomial fitted to the first (last) `window`
/// samples, evaluated at their positions.
///
/// # Errors
/// `Error::Configuration` when `window` is even, zero or longer than the column, or when `order`
/// is not smaller than `window`.
pub fn savgol_filter(column: ArrayView1<f64>, window: usize, order: usize) -> Result<Array1<f64>> {
    if window == 0 || window % 2 == 0 {
        return Err(Error::configuration(format!(
            "savgol window must be a positive odd number, got {window}"
        )));
    }
    if window > column.len() {
        return Err(Error::configuration(format!(
            "savgol window {window} exceeds the series length {}",
            column.len()
        )));
    }
    if order >= window {
        return Err(Error::configuration(format!(
            "savgol order {order} must be smaller than the window {window}"
        )));
    }

    let half = window / 2;
    if half == 0 {
        return Ok(column.to_owned());
    }

    // Offsets scaled onto [-1, 1] keep the normal equations well conditioned for long windows.
    let scale = half as f64;
    let offsets = (0..window)
        .map(|ii| (ii as f64 - scale) / scale)
        .collect::<Vec<_>>();
    let weights = pseudo_inverse(&vandermonde(&offsets, order)?)?;
    let centre = weights.row(0);

    let n = column.len();
    let mut smoothed = Array1::zeros(n);
    for ii in half..n - half {
        smoothed[ii] = centre.dot(&column.slice(s![ii - half..=ii + half]));
    }

    let head = weights.dot(&column.slice(s![..window]));
    let tail = weights.dot(&column.slice(s![n - window..]));
    for ii in 0..half {
        smoothed[ii] = polyval(head.view(), offsets[ii]);
        smoothed[n - half + ii] = polyval(tail.view(), offsets[window - half + ii]);
    }

    Ok(smoothed)
}

fn smooth(
    series: &ObservationSeries,
    settings: SavgolSettings,
    field: fn(&Observation) -> f64,
) -> Result<Array1<f64>> {
    savgol_filter(series.column(field).view(), settings.window, settings.order)
}

/// Smooth the dew point, mass and pressure columns of a series, leaving the other fields as
/// recorded.
///
/// # Errors
/// Propagates the configuration errors of [`savgol_filter`].
pub fn filter_series(series: ObservationSeries, config: &FilterConfig) -> Result<ObservationSeries> {
    let dew_point = smooth(&series, config.dew_point, |obs| obs.dew_point)?;
    let mass = smooth(&series, config.mass, |obs| obs.mass)?;
    let pressure = smooth(&series, config.pressure, |obs| obs.pressure)?;

    Ok(series
        .with_column(&dew_point, |obs| &mut obs.dew_point)
        .with_column(&mass, |obs| &mut obs.mass)
        .with_column(&pressure, |obs| &mut obs.pressure))
}

#[cfg(test)]
mod tests {
    use ndarray::{arr1, Array1};
    use ndarray_rand::rand_distr::Normal;
    use ndarray_rand::rand::SeedableRng;
    use ndarray_rand::RandomExt;
    use rand_isaac::isaac64::Isaac64Rng;

    use super::{filter_series, savgol_filter};
    use crate::config::{FilterConfig, SavgolSettings};
    use crate::observation::tests::observation;
    use crate::observation::ObservationSeries;
    use crate::Error;

    #[test]
    fn constant_columns_are_unchanged_including_the_edges() {
        let column = Array1::from_elem(50, 0.0988);
        let smoothed = savgol_filter(column.view(), 11, 2).unwrap();
        for value in &smoothed {
            approx::assert_relative_eq!(*value, 0.0988, max_relative = 1e-12);
        }
    }

    #[test]
    fn linear_columns_are_preserved_by_any_order_from_one() {
        let column = (0..40).map(|ii| 3.5 - 0.25 * f64::from(ii)).collect::<Array1<f64>>();
        for order in 1..=3 {
            let smoothed = savgol_filter(column.view(), 9, order).unwrap();
            for (expected, actual) in column.iter().zip(smoothed.iter()) {
                approx::assert_abs_diff_eq!(expected, actual, epsilon = 1e-10);
            }
        }
    }

    #[test]
    fn quadratic_columns_are_preserved_by_a_quadratic_filter() {
        let column = (0..30)
            .map(|ii| {
                let x = f64::from(ii);
                0.5f64.mul_add(x * x, -2.0 * x) + 1.0
            })
            .collect::<Array1<f64>>();
        let smoothed = savgol_filter(column.view(), 7, 2).unwrap();
        for (expected, actual) in column.iter().zip(smoothed.iter()) {
            approx::assert_relative_eq!(expected, actual, epsilon = 1e-8, max_relative = 1e-10);
        }
    }

    #[test]
    fn interior_points_match_the_classic_five_point_weights() {
        let column = arr1(&[2.0, 4.0, 3.0, 8.0, 1.0, 6.0, 5.0]);
        let smoothed = savgol_filter(column.view(), 5, 2).unwrap();

        // (-3, 12, 17, 12, -3) / 35
        let expected = (-3.0 * 2.0 + 12.0 * 4.0 + 17.0 * 3.0 + 12.0 * 8.0 - 3.0 * 1.0) / 35.0;
        approx::assert_relative_eq!(smoothed[2], expected, max_relative = 1e-12);
    }

    #[test]
    fn smoothing_reduces_noise() {
        let seed = 40;
        let mut rng = Isaac64Rng::seed_from_u64(seed);
        let noise = Array1::random_using(501, Normal::new(0.0, 1e-3).unwrap(), &mut rng);
        let column = noise.mapv(|n| n + 1.0);

        let smoothed = savgol_filter(column.view(), 51, 2).unwrap();
        let spread = |values: &Array1<f64>| values.iter().map(|v| (v - 1.0).powi(2)).sum::<f64>();
        assert!(spread(&smoothed) < spread(&column));
    }

    #[test]
    fn unusable_parameters_are_configuration_errors() {
        let column = Array1::from_elem(10, 1.0);
        for (window, order) in [(4, 1), (0, 0), (11, 1), (5, 5)] {
            assert!(matches!(
                savgol_filter(column.view(), window, order),
                Err(Error::Configuration(_))
            ));
        }
    }

    #[test]
    fn series_filtering_touches_only_the_smoothed_columns() {
        let observations = (0..20)
            .map(|idx| {
                let mut obs = observation(idx, 0.1 - 1e-6 * idx as f64);
                obs.surface_temp = 288.0 + (idx % 2) as f64;
                obs
            })
            .collect();
        let series = ObservationSeries::new(observations).unwrap();
        let settings = SavgolSettings {
            window: 5,
            order: 1,
        };
        let config = FilterConfig {
            dew_point: settings,
            mass: settings,
            pressure: settings,
        };

        let filtered = filter_series(series.clone(), &config).unwrap();
        for (raw, smooth) in series.observations().iter().zip(filtered.observations()) {
            approx::assert_relative_eq!(raw.mass, smooth.mass, max_relative = 1e-10);
            approx::assert_relative_eq!(raw.surface_temp, smooth.surface_temp);
        }
    }
}
