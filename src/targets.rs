use itertools::Itertools;

use crate::config::TargetConfig;
use crate::humidity::HumidityPoint;

/// The region of a series searched for the fit belonging to one relative-humidity target.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitWindow {
    pub target_rh: f64,
    /// Index whose relative humidity is closest to the target.
    pub idx: u64,
    /// Largest half-window centred on `idx` that stays inside the series.
    pub max_half_len: usize,
}

/// Percentages are rounded to this many decimals before snapping to the ladder, so that
/// `0.1 * 100.0` is not mistaken for a value just above ten percent.
const PERCENT_DECIMALS: f64 = 1e6;

fn as_percent(rh: f64) -> f64 {
    (rh * 100.0 * PERCENT_DECIMALS).round() / PERCENT_DECIMALS
}

/// The rungs of the configured ladder inside the observed relative-humidity range.
///
/// The observed minimum is rounded up and the maximum rounded down onto the ladder grid.
pub fn valid_targets(points: &[HumidityPoint], config: &TargetConfig) -> Vec<f64> {
    let Some((min, max)) = points
        .iter()
        .map(|point| point.rh.value())
        .minmax_by(f64::total_cmp)
        .into_option()
    else {
        return vec![];
    };

    let step = f64::from(config.step);
    let lowest = (as_percent(min) / step).ceil() * step;
    let highest = (as_percent(max) / step).floor() * step;

    config
        .ladder()
        .filter(|rh| (lowest..=highest).contains(&as_percent(*rh)))
        .collect()
}

/// Pair each target with the index whose relative humidity is nearest to it.
///
/// Ties resolve to the earliest index.
pub fn target_indexes(points: &[HumidityPoint], targets: &[f64]) -> Vec<(f64, u64)> {
    targets
        .iter()
        .filter_map(|target| {
            points
                .iter()
                .min_by(|a, b| {
                    (a.rh.value() - target)
                        .abs()
                        .total_cmp(&(b.rh.value() - target).abs())
                })
                .map(|point| (*target, point.idx))
        })
        .collect()
}

/// `min(idx - first, last - idx, cap) - min_separation`, saturating at zero.
pub fn max_half_len(idx: u64, first_idx: u64, last_idx: u64, config: &TargetConfig) -> usize {
    let to_the_left = idx.saturating_sub(first_idx);
    let to_the_right = last_idx.saturating_sub(idx);
    let reach = usize::try_from(to_the_left.min(to_the_right)).unwrap_or(usize::MAX);
    reach
        .min(config.max_half_window)
        .saturating_sub(config.min_separation)
}

/// Locate the search window of every valid target in a relative-humidity series.
pub fn fit_windows(points: &[HumidityPoint], config: &TargetConfig) -> Vec<FitWindow> {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return vec![];
    };
    let targets = valid_targets(points, config);

    target_indexes(points, &targets)
        .into_iter()
        .map(|(target_rh, idx)| FitWindow {
            target_rh,
            idx,
            max_half_len: max_half_len(idx, first.idx, last.idx, config),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{fit_windows, max_half_len, target_indexes, valid_targets};
    use crate::config::TargetConfig;
    use crate::humidity::HumidityPoint;
    use crate::uncertain::Uncertain;

    fn points() -> Vec<HumidityPoint> {
        let rh = [
            0.08, 0.10, 0.15, 0.20, 0.25, 0.32, 0.40, 0.45, 0.50, 0.55, 0.62, 0.71,
        ];
        rh.iter()
            .zip(12..)
            .map(|(rh, idx)| HumidityPoint {
                idx,
                rh: Uncertain::new(*rh, 0.005),
            })
            .collect()
    }

    #[test]
    fn targets_span_the_observed_range() {
        let targets = valid_targets(&points(), &TargetConfig::default());
        let expected = (2..=14).map(|ii| f64::from(ii * 5) / 100.0).collect::<Vec<_>>();
        assert_eq!(targets, expected);
    }

    #[test]
    fn boundary_values_on_the_grid_are_valid_targets() {
        let points = [0.10, 0.30]
            .iter()
            .zip(0..)
            .map(|(rh, idx)| HumidityPoint {
                idx,
                rh: Uncertain::exact(*rh),
            })
            .collect::<Vec<_>>();
        let targets = valid_targets(&points, &TargetConfig::default());
        assert_eq!(targets, vec![0.10, 0.15, 0.20, 0.25, 0.30]);
    }

    #[test]
    fn targets_are_clipped_to_the_configured_ladder() {
        let config = TargetConfig {
            start: 20,
            stop: 50,
            ..TargetConfig::default()
        };
        let targets = valid_targets(&points(), &config);
        assert_eq!(targets, vec![0.20, 0.25, 0.30, 0.35, 0.40, 0.45, 0.50]);
    }

    #[test]
    fn targets_are_located_at_the_nearest_index() {
        let points = points();
        let targets = valid_targets(&points, &TargetConfig::default());
        let located = target_indexes(&points, &targets);
        let indexes = located.iter().map(|(_, idx)| *idx).collect::<Vec<_>>();
        assert_eq!(
            indexes,
            vec![13, 14, 15, 16, 17, 17, 18, 19, 20, 21, 22, 22, 23]
        );
    }

    #[test]
    fn ties_go_to_the_earliest_index() {
        let points = [0.20, 0.30, 0.20, 0.30]
            .iter()
            .zip(0..)
            .map(|(rh, idx)| HumidityPoint {
                idx,
                rh: Uncertain::exact(*rh),
            })
            .collect::<Vec<_>>();
        let located = target_indexes(&points, &[0.20, 0.30]);
        assert_eq!(located, vec![(0.20, 0), (0.30, 1)]);
    }

    #[test]
    fn half_lengths_are_limited_by_both_edges() {
        let windows = fit_windows(&points(), &TargetConfig::default());
        let half_lengths = windows
            .iter()
            .map(|window| window.max_half_len)
            .collect::<Vec<_>>();
        assert_eq!(half_lengths, vec![1, 2, 3, 4, 5, 5, 5, 4, 3, 2, 1, 1, 0]);
    }

    #[test]
    fn half_lengths_respect_the_cap_and_separation() {
        let config = TargetConfig {
            max_half_window: 100,
            min_separation: 10,
            ..TargetConfig::default()
        };
        assert_eq!(max_half_len(5_000, 0, 60_000, &config), 90);
        assert_eq!(max_half_len(5, 0, 60_000, &config), 0);
    }

    #[test]
    fn empty_series_have_no_windows() {
        assert!(fit_windows(&[], &TargetConfig::default()).is_empty());
    }
}
