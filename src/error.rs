use thiserror::Error;

/// Errors raised while loading configuration, topology or predictor artifacts.
///
/// Engine operations themselves never fail; they report recoverable
/// conditions through their result values.
#[derive(Debug, Error)]
pub enum FleetError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid topology at stop {stop_id}: {reason}")]
    InvalidTopology { stop_id: String, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown timezone: {0}")]
    Timezone(String),
}

pub type Result<T> = std::result::Result<T, FleetError>;
