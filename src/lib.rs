#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
// #![warn(clippy::cargo)]

pub mod access;
pub mod config;
pub mod engine;
mod error;
pub mod filter;
pub mod humidity;
pub mod math;
pub mod observation;
pub mod properties;
pub mod record;
pub mod regression;
pub mod selector;
pub mod targets;
pub mod uncertain;

pub use engine::{AnalysisEngine, Outcome};
pub use error::Error;

pub type Result<T> = ::std::result::Result<T, Error>;
