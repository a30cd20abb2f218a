//! Pipeline error type.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("upstream request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned malformed payload: {0}")]
    Payload(String),
}
