use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalyseError {
    /// Nothing to analyse; results are never made up for an empty input.
    #[error("no log content to analyse")]
    NoContent,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("no known log host matches {0}")]
    NoMatchingSource(String),
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{source_name} answered with HTTP {status}")]
    Status { source_name: &'static str, status: u16 },
    #[error("{0} response did not contain a log")]
    MissingContent(&'static str),
    #[error("failed to read {path}: {err}")]
    Io { path: String, err: std::io::Error },
}
