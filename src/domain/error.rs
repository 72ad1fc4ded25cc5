//! Domain error types.

/// Top-level error type for quantest.
#[derive(Debug, thiserror::Error)]
pub enum QuantestError {
    #[error("no usable price data for: {}", tickers.join(", "))]
    DataUnavailable { tickers: Vec<String> },

    #[error("configuration error: {reason}")]
    Configuration { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data source error: {reason}")]
    Data { reason: String },

    #[error("result store error: {reason}")]
    Store { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl QuantestError {
    pub fn data_unavailable<S: Into<String>>(ticker: S) -> Self {
        QuantestError::DataUnavailable {
            tickers: vec![ticker.into()],
        }
    }

    /// True for the two kinds that must abort a run rather than fall back.
    pub fn is_fatal_engine_error(&self) -> bool {
        matches!(
            self,
            QuantestError::DataUnavailable { .. } | QuantestError::Configuration { .. }
        )
    }
}

impl From<&QuantestError> for std::process::ExitCode {
    fn from(err: &QuantestError) -> Self {
        let code: u8 = match err {
            QuantestError::Io(_) => 1,
            QuantestError::Configuration { .. }
            | QuantestError::ConfigParse { .. }
            | QuantestError::ConfigMissing { .. }
            | QuantestError::ConfigInvalid { .. } => 2,
            QuantestError::Data { .. } => 3,
            QuantestError::Store { .. } => 4,
            QuantestError::DataUnavailable { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
