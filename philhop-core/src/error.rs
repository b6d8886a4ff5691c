use thiserror::Error;

/// Failures while scoring a candidate set.
#[derive(Error, Debug)]
pub enum ScoreError {
    #[error("Similarity backend unavailable after {attempts} attempts: {cause}")]
    BackendUnavailable { attempts: usize, cause: String },

    #[error("Similarity backend found no scorable candidate")]
    NoWinner,

    #[error("Scorer returned {got} scores for {expected} candidates")]
    LengthMismatch { expected: usize, got: usize },

    #[error("Target sense {0} is not in the lexical graph")]
    UnknownTargetSense(String),

    #[error("Strategy {0} needs {1}, which was not provided")]
    MissingAsset(String, &'static str),
}

/// Failures while loading a shared scoring resource from disk.
#[derive(Error, Debug)]
pub enum AssetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error on line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Dimension mismatch on line {line}: expected {expected}, got {got}")]
    DimensionMismatch {
        line: usize,
        expected: usize,
        got: usize,
    },

    #[error("Asset is empty: {0}")]
    Empty(String),
}

/// Failures of the link selector.
#[derive(Error, Debug)]
pub enum SelectError {
    #[error("No candidates to select from")]
    NoCandidates,

    #[error("No candidate could be scored")]
    NoScorableCandidate,

    #[error(transparent)]
    Scorer(#[from] ScoreError),
}

/// Failures of the traversal record.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type RecordResult<T> = std::result::Result<T, RecordError>;
