use std::collections::{HashMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::Deserialize;

use crate::observation::{Observation, ObservationSeries, ThermocoupleReading};
use crate::record::{FitRecord, FitRow};
use crate::Result;

/// Source of the raw observations of an experiment.
pub trait ObservationProvider {
    /// # Errors
    /// Returns an error if the experiment cannot be read or its series is invalid.
    fn get_observations(&self, experiment_id: u64) -> Result<ObservationSeries>;
}

/// Sink for accepted fits.
pub trait FitPersistence {
    /// Store `records`, skipping any whose `(experiment_id, idx)` is already present.
    ///
    /// Returns the number of records actually added.
    ///
    /// # Errors
    /// Returns an error if the backing store cannot be read or written.
    fn persist_fits(&mut self, experiment_id: u64, records: &[FitRecord]) -> Result<usize>;
}

/// Asks the operator a question.
pub trait Prompt {
    /// `Ok(None)` when no answer could be read, which callers treat like an empty answer.
    ///
    /// # Errors
    /// Returns an error if the prompt cannot be shown.
    fn ask(&mut self, message: &str) -> Result<Option<String>>;
}

impl<P: Prompt + ?Sized> Prompt for &mut P {
    fn ask(&mut self, message: &str) -> Result<Option<String>> {
        (**self).ask(message)
    }
}

impl<S: FitPersistence + ?Sized> FitPersistence for &mut S {
    fn persist_fits(&mut self, experiment_id: u64, records: &[FitRecord]) -> Result<usize> {
        (**self).persist_fits(experiment_id, records)
    }
}

/// Reads experiments laid out as `<root>/<experiment_id>/observation.csv` and
/// `<root>/<experiment_id>/temperature.csv`.
#[derive(Clone, Debug)]
pub struct CsvObservationProvider {
    root: PathBuf,
}

#[derive(Deserialize)]
struct ObservationRow {
    idx: u64,
    dew_point: f64,
    mass: f64,
    pow_ref: Option<f64>,
    pow_out: Option<f64>,
    pressure: f64,
    surface_temp: f64,
    ic_temp: f64,
    cap_man_ok: bool,
    optidew_ok: bool,
}

impl CsvObservationProvider {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn read_rows<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<Vec<T>> {
        info!("reading {path:?}");
        let file = fs::read(path)?;
        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(&file[..]);
        let rows = rdr.deserialize().collect::<std::result::Result<Vec<T>, _>>()?;
        Ok(rows)
    }
}

impl ObservationProvider for CsvObservationProvider {
    fn get_observations(&self, experiment_id: u64) -> Result<ObservationSeries> {
        let dir = self.root.join(experiment_id.to_string());
        let rows: Vec<ObservationRow> = Self::read_rows(&dir.join("observation.csv"))?;
        let readings: Vec<ThermocoupleReading> = Self::read_rows(&dir.join("temperature.csv"))?;

        let mut by_idx: HashMap<u64, Vec<ThermocoupleReading>> = HashMap::new();
        for reading in readings {
            by_idx.entry(reading.idx).or_default().push(reading);
        }

        let observations = rows
            .into_iter()
            .map(|row| Observation {
                idx: row.idx,
                dew_point: row.dew_point,
                mass: row.mass,
                pow_ref: row.pow_ref,
                pow_out: row.pow_out,
                pressure: row.pressure,
                surface_temp: row.surface_temp,
                ic_temp: row.ic_temp,
                cap_man_ok: row.cap_man_ok,
                optidew_ok: row.optidew_ok,
                thermocouples: by_idx.remove(&row.idx).unwrap_or_default(),
            })
            .collect::<Vec<_>>();
        debug!(
            "experiment {experiment_id}: {} observations, {} orphaned thermocouple indexes",
            observations.len(),
            by_idx.len()
        );

        ObservationSeries::new(observations)
    }
}

/// Keeps fits in memory.
#[derive(Clone, Debug, Default)]
pub struct InMemoryFitStore {
    records: Vec<FitRecord>,
}

impl InMemoryFitStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[FitRecord] {
        &self.records
    }
}

impl FitPersistence for InMemoryFitStore {
    fn persist_fits(&mut self, experiment_id: u64, records: &[FitRecord]) -> Result<usize> {
        let mut seen = self
            .records
            .iter()
            .filter(|record| record.experiment_id == experiment_id)
            .map(|record| record.idx)
            .collect::<HashSet<_>>();

        let before = self.records.len();
        for record in records {
            if seen.insert(record.idx) {
                self.records.push(record.clone());
            }
        }
        Ok(self.records.len() - before)
    }
}

/// Appends fits to a single CSV file, one [`FitRow`] per line.
#[derive(Clone, Debug)]
pub struct CsvFitStore {
    path: PathBuf,
}

impl CsvFitStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Every row currently in the file.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be parsed.
    pub fn rows(&self) -> Result<Vec<FitRow>> {
        if !self.path.exists() {
            return Ok(vec![]);
        }
        let mut rdr = csv::Reader::from_path(&self.path)?;
        let rows = rdr.deserialize().collect::<std::result::Result<Vec<FitRow>, _>>()?;
        Ok(rows)
    }
}

impl FitPersistence for CsvFitStore {
    fn persist_fits(&mut self, experiment_id: u64, records: &[FitRecord]) -> Result<usize> {
        let existing = self.rows()?;
        let needs_header = existing.is_empty();
        let mut seen = existing
            .iter()
            .filter(|row| row.experiment_id == experiment_id)
            .map(|row| row.idx)
            .collect::<HashSet<_>>();

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(needs_header)
            .from_writer(file);

        let mut written = 0;
        for record in records.iter().filter(|record| seen.insert(record.idx)) {
            wtr.serialize(FitRow::from(record))?;
            written += 1;
        }
        wtr.flush()?;
        info!("wrote {written} fits for experiment {experiment_id} to {:?}", self.path);
        Ok(written)
    }
}

/// Prompts on stdout and reads one line from stdin.
#[derive(Clone, Copy, Debug, Default)]
pub struct ConsolePrompt;

impl Prompt for ConsolePrompt {
    fn ask(&mut self, message: &str) -> Result<Option<String>> {
        let mut stdout = io::stdout().lock();
        write!(stdout, "{message}")?;
        stdout.flush()?;

        let mut answer = String::new();
        match io::stdin().lock().read_line(&mut answer)? {
            0 => Ok(None),
            _ => Ok(Some(answer.trim().to_owned())),
        }
    }
}
