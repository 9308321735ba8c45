// Error taxonomy for loading and report generation.
//
// Row-level problems never surface here: the parser and the normalizer drop
// bad rows silently. Only dataset-level and request-level failures do.
use thiserror::Error;

/// A single failed retrieval against one URL.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("HTTP error! status: {status} ({url})")]
    Status { url: String, status: u16 },
    #[error("{0}")]
    Other(String),
}

/// Why one step of the fallback chain did not produce data.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("response parsed to zero rows")]
    Empty,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unknown dataset: {0}")]
    UnknownDataset(String),
    #[error("every load attempt for dataset '{dataset}' failed ({} attempts)", failures.len())]
    Exhausted {
        dataset: String,
        failures: Vec<(String, AttemptError)>,
    },
}

impl LoadError {
    pub fn dataset(&self) -> &str {
        match self {
            LoadError::UnknownDataset(name) => name,
            LoadError::Exhausted { dataset, .. } => dataset,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReportError {
    #[error("start period {start} is later than end period {end}")]
    InvalidRange { start: String, end: String },
    #[error("base year and comparison year cannot both be {0}")]
    SameYear(i32),
}

/// Failure writing an export or summary file.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("CSV write failed: {0}")]
    Csv(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}
