use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::uncertain::Uncertain;
use crate::{Error, Result};

/// Every tunable constant of the analysis, read from a TOML file.
///
/// Missing sections and missing keys fall back to the values of [`AnalysisConfig::default`], so
/// an empty file is a valid configuration.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub filter: FilterConfig,
    pub instrument: InstrumentConfig,
    pub targets: TargetConfig,
    pub selector: SelectorConfig,
    pub chamber: ChamberConfig,
}

impl AnalysisConfig {
    /// Read and validate a configuration file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, is not valid TOML or holds unusable values.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// `Error::Configuration` naming the first offending value.
    pub fn validate(&self) -> Result<()> {
        for (name, settings) in [
            ("dew_point", &self.filter.dew_point),
            ("mass", &self.filter.mass),
            ("pressure", &self.filter.pressure),
        ] {
            settings.validate().map_err(|e| {
                Error::configuration(format!("[filter.{name}]: {e}"))
            })?;
        }
        self.targets.validate()?;
        self.selector.validate()?;
        self.chamber.validate()
    }
}

/// Savitzky-Golay parameters for the smoothed columns.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FilterConfig {
    pub dew_point: SavgolSettings,
    pub mass: SavgolSettings,
    pub pressure: SavgolSettings,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            dew_point: SavgolSettings {
                window: 1801,
                order: 2,
            },
            mass: SavgolSettings {
                window: 301,
                order: 2,
            },
            pressure: SavgolSettings {
                window: 3601,
                order: 1,
            },
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct SavgolSettings {
    pub window: usize,
    pub order: usize,
}

impl SavgolSettings {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.window == 0 || self.window % 2 == 0 {
            return Err(format!("window must be odd, got {}", self.window));
        }
        if self.order >= self.window {
            return Err(format!(
                "order {} must be smaller than the window {}",
                self.order, self.window
            ));
        }
        Ok(())
    }
}

/// Fixed instrument uncertainties, as standard deviations.
///
/// Fields suffixed `_relative` are fractions of the reading, the others are absolute.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct InstrumentConfig {
    pub dew_point: f64,
    pub mass: f64,
    pub pressure_relative: f64,
    pub surface_temp: f64,
    pub ic_temp: f64,
    pub thermocouple: f64,
    pub pow_ref_relative: f64,
}

impl Default for InstrumentConfig {
    fn default() -> Self {
        Self {
            dew_point: 0.2,
            mass: 1e-7,
            pressure_relative: 0.0015,
            surface_temp: 0.5,
            ic_temp: 0.2,
            thermocouple: 0.2,
            pow_ref_relative: 0.05,
        }
    }
}

impl InstrumentConfig {
    pub fn dew_point(&self, value: f64) -> Uncertain {
        Uncertain::new(value, self.dew_point)
    }

    pub fn mass(&self, value: f64) -> Uncertain {
        Uncertain::new(value, self.mass)
    }

    pub fn pressure(&self, value: f64) -> Uncertain {
        Uncertain::new(value, value * self.pressure_relative)
    }

    pub fn surface_temp(&self, value: f64) -> Uncertain {
        Uncertain::new(value, self.surface_temp)
    }
}

/// The relative-humidity ladder, in percent, and the half-window limits.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct TargetConfig {
    pub start: u32,
    pub stop: u32,
    pub step: u32,
    /// Upper bound on any half-window, whatever the distance to the series edges.
    pub max_half_window: usize,
    /// Samples withheld from each side of the largest admissible half-window.
    pub min_separation: usize,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            start: 10,
            stop: 70,
            step: 5,
            max_half_window: 10_000,
            min_separation: 0,
        }
    }
}

impl TargetConfig {
    fn validate(&self) -> Result<()> {
        if self.step == 0 {
            return Err(Error::configuration("[targets] step must be positive"));
        }
        if self.start > self.stop || self.stop > 100 {
            return Err(Error::configuration(format!(
                "[targets] ladder {}..={} is not within 0..=100",
                self.start, self.stop
            )));
        }
        Ok(())
    }

    /// Every rung of the ladder, as fractions.
    pub fn ladder(&self) -> impl Iterator<Item = f64> + '_ {
        (self.start..=self.stop)
            .step_by(self.step as usize)
            .map(|percent| f64::from(percent) / 100.0)
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Half-window increment between successive fits.
    pub step: usize,
    /// Largest acceptable `sig_b / |b|`.
    pub threshold: f64,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            step: 1,
            threshold: 0.01,
        }
    }
}

impl SelectorConfig {
    fn validate(&self) -> Result<()> {
        if self.step == 0 {
            return Err(Error::configuration("[selector] step must be positive"));
        }
        if !(self.threshold > 0.0) {
            return Err(Error::configuration(format!(
                "[selector] threshold must be positive, got {}",
                self.threshold
            )));
        }
        Ok(())
    }
}

/// Geometry, emissivities and sensor calibration of the chamber.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ChamberConfig {
    /// Stefan tube radius [m].
    pub radius: f64,
    pub radius_std_dev: f64,
    /// Molar mass of water [g/mol].
    pub m1: f64,
    /// Molar mass of dry air [g/mol].
    pub m2: f64,
    pub stefan_boltzmann: f64,
    pub chamber_emissivity: f64,
    pub water_emissivity: f64,
    pub chamber_radius: f64,
    pub chamber_length: f64,
    pub gravity: f64,
    /// Infrared sensor calibration `Ts_C = offset + gain * Ts_C,raw`.
    pub ir_offset: f64,
    pub ir_offset_std_dev: f64,
    pub ir_gain: f64,
    pub ir_gain_std_dev: f64,
}

impl Default for ChamberConfig {
    fn default() -> Self {
        Self {
            radius: 0.0355,
            radius_std_dev: 0.0001,
            m1: 18.015,
            m2: 28.964,
            stefan_boltzmann: 5.670_367_13e-8,
            chamber_emissivity: 0.1,
            water_emissivity: 0.99,
            chamber_radius: 0.3,
            chamber_length: 0.7,
            gravity: 9.81,
            ir_offset: -2.34,
            ir_offset_std_dev: 0.07,
            ir_gain: 1.0445,
            ir_gain_std_dev: 0.0022,
        }
    }
}

impl ChamberConfig {
    fn validate(&self) -> Result<()> {
        let positive = [
            ("radius", self.radius),
            ("m1", self.m1),
            ("m2", self.m2),
            ("chamber_radius", self.chamber_radius),
            ("chamber_length", self.chamber_length),
        ];
        if let Some((name, value)) = positive.iter().find(|(_, value)| !(*value > 0.0)) {
            return Err(Error::configuration(format!(
                "[chamber] {name} must be positive, got {value}"
            )));
        }
        for (name, value) in [
            ("chamber_emissivity", self.chamber_emissivity),
            ("water_emissivity", self.water_emissivity),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(Error::configuration(format!(
                    "[chamber] {name} must lie in (0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }

    pub fn radius(&self) -> Uncertain {
        Uncertain::new(self.radius, self.radius_std_dev)
    }

    pub fn ir_offset(&self) -> Uncertain {
        Uncertain::new(self.ir_offset, self.ir_offset_std_dev)
    }

    pub fn ir_gain(&self) -> Uncertain {
        Uncertain::new(self.ir_gain, self.ir_gain_std_dev)
    }

    /// Inner surface area of the cylindrical chamber [m²].
    pub fn chamber_area(&self) -> f64 {
        let rc = self.chamber_radius;
        2.0 * std::f64::consts::PI * rc.mul_add(rc, rc * self.chamber_length)
    }

    /// Grey-body exchange factor between the water surface and the chamber walls.
    ///
    /// The net radiative flux into the surface is `(Eb_e - Eb_s) / radiation_factor`.
    pub fn radiation_factor(&self) -> f64 {
        let area = std::f64::consts::PI * self.radius.powi(2);
        let eps_c = self.chamber_emissivity;
        let eps_w = self.water_emissivity;
        area * ((1.0 - eps_c) / (eps_c * self.chamber_area())
            + 1.0 / area
            + (1.0 - eps_w) / (eps_w * area))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tempdir::TempDir;

    use super::AnalysisConfig;
    use crate::Error;

    #[test]
    fn empty_files_use_the_defaults() {
        let config: AnalysisConfig = toml::from_str("").unwrap();
        assert_eq!(config, AnalysisConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config: AnalysisConfig = toml::from_str(
            r#"
            [filter.mass]
            window = 5
            order = 1

            [selector]
            threshold = 0.1
            "#,
        )
        .unwrap();

        assert_eq!(config.filter.mass.window, 5);
        assert_eq!(config.filter.dew_point.window, 1801);
        approx::assert_relative_eq!(config.selector.threshold, 0.1);
        assert_eq!(config.selector.step, 1);
    }

    #[test]
    fn default_ladder_runs_from_ten_to_seventy_percent() {
        let ladder = AnalysisConfig::default()
            .targets
            .ladder()
            .collect::<Vec<_>>();
        assert_eq!(ladder.len(), 13);
        approx::assert_relative_eq!(ladder[0], 0.10);
        approx::assert_relative_eq!(ladder[12], 0.70);
    }

    #[test]
    fn radiation_factor_matches_the_enclosure_formula() {
        let chamber = AnalysisConfig::default().chamber;
        let area = std::f64::consts::PI * 0.0355f64.powi(2);
        let chamber_area =
            2.0 * std::f64::consts::PI * 0.3 * 0.3 + 2.0 * std::f64::consts::PI * 0.3 * 0.7;
        let expected = area * (0.9 / (0.1 * chamber_area) + 1.0 / area + 0.01 / (0.99 * area));

        approx::assert_relative_eq!(chamber.chamber_area(), chamber_area, max_relative = 1e-12);
        approx::assert_relative_eq!(chamber.radiation_factor(), expected, max_relative = 1e-12);
    }

    #[test]
    fn files_with_even_windows_are_rejected() {
        let tmp_dir = TempDir::new("even_window").unwrap();
        let path = tmp_dir.path().join("analysis.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "[filter.pressure]\nwindow = 100\norder = 1").unwrap();

        let result = AnalysisConfig::from_file(&path);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }

    #[test]
    fn invalid_ladders_are_rejected() {
        let mut config = AnalysisConfig::default();
        config.targets.step = 0;
        assert!(config.validate().is_err());

        let mut config = AnalysisConfig::default();
        config.targets.start = 80;
        assert!(config.validate().is_err());
    }
}
