use thiserror::Error;

/// Failures surfaced by the analysis pipeline and its collaborators.
///
/// `InsufficientData` and `Numeric` are local to a single target: the engine logs them and moves
/// on. Everything else aborts the call that produced it.
#[derive(Debug, Error)]
pub enum Error {
    /// Filter parameters, series layout or configuration values are unusable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A regression window holds too few points for a straight-line fit.
    #[error("insufficient data: need {required} points, have {available}")]
    InsufficientData { required: usize, available: usize },

    /// Arithmetic left its domain (zero divisor, negative root, non-finite result).
    #[error("numeric error: {0}")]
    Numeric(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Toml(#[from] toml::de::Error),
}

impl Error {
    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub(crate) fn numeric(message: impl Into<String>) -> Self {
        Self::Numeric(message.into())
    }

    /// Whether the engine may skip the current target and continue with the next one.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::InsufficientData { .. } | Self::Numeric(_))
    }
}
