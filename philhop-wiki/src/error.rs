use thiserror::Error;

#[derive(Error, Debug)]
pub enum WikiError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Unexpected status {0} for {1}")]
    Status(u16, String),

    #[error("No article content at {0}")]
    NoContent(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Other error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, WikiError>;
