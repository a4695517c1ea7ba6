//! Domain error types.

/// Top-level error type for finextract.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FinextractError {
    #[error("insufficient data for {context}: have {observations} observations, need {minimum}")]
    InsufficientData {
        context: String,
        observations: usize,
        minimum: usize,
    },

    #[error("invalid price {price} at row {index}: prices must be positive")]
    InvalidPrice { index: usize, price: f64 },

    #[error("{metric} is undefined: denominator is zero")]
    DivisionByZero { metric: &'static str },

    #[error(
        "portfolio components and weights do not match (no weight for [{}], no asset for [{}])",
        missing_weights.join(", "),
        missing_assets.join(", ")
    )]
    MismatchedComponents {
        missing_weights: Vec<String>,
        missing_assets: Vec<String>,
    },

    #[error("invalid weight {weight} for {ticker}: weights must be finite and non-negative")]
    InvalidWeight { ticker: String, weight: f64 },

    #[error("weights sum to {total}, cannot normalize")]
    DegenerateWeights { total: f64 },

    #[error("only {observations} overlapping dates across portfolio components, need {minimum}")]
    InsufficientOverlap { observations: usize, minimum: usize },

    #[error("invalid parameter {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    #[error("simulation needs {requested} cells, limit is {limit}")]
    ResourceLimit { requested: usize, limit: usize },

    #[error("simulation cancelled after {completed_paths} paths")]
    Cancelled { completed_paths: usize },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error("no data for {ticker}")]
    NoData { ticker: String },

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

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for FinextractError {
    fn from(err: std::io::Error) -> Self {
        FinextractError::Io(err.to_string())
    }
}

impl FinextractError {
    pub(crate) fn invalid_parameter(name: &'static str, reason: impl Into<String>) -> Self {
        FinextractError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// Process exit status for this error kind.
    pub fn exit_status(&self) -> u8 {
        match self {
            FinextractError::Io(_) => 1,
            FinextractError::ConfigParse { .. }
            | FinextractError::ConfigMissing { .. }
            | FinextractError::ConfigInvalid { .. } => 2,
            FinextractError::DataSource { .. } => 3,
            FinextractError::InvalidPrice { .. }
            | FinextractError::DivisionByZero { .. }
            | FinextractError::MismatchedComponents { .. }
            | FinextractError::InvalidWeight { .. }
            | FinextractError::DegenerateWeights { .. }
            | FinextractError::InvalidParameter { .. } => 4,
            FinextractError::NoData { .. }
            | FinextractError::InsufficientData { .. }
            | FinextractError::InsufficientOverlap { .. } => 5,
            FinextractError::ResourceLimit { .. } | FinextractError::Cancelled { .. } => 6,
        }
    }
}

impl From<&FinextractError> for std::process::ExitCode {
    fn from(err: &FinextractError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}
