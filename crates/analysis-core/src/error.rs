use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    #[error("Unknown ticker: {0}")]
    UnknownTicker(String),

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Upstream call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}
