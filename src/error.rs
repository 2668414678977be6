use thiserror::Error;

/// Everything that can go wrong while building or running a model.
///
/// The string payloads carry the user-facing message, so that callers can
/// match on the kind of failure and still print something readable.
#[derive(Debug, Error)]
pub enum AbsesError {
    /// Invalid, repeated or retreating lifecycle state.
    #[error("{0}")]
    State(String),
    /// Unparsable datetimes, negative durations, wrong time mode.
    #[error("{0}")]
    Time(String),
    /// A setting or argument has the wrong type.
    #[error("{0}")]
    Type(String),
    /// Missing required parameter or bad component name.
    #[error("{0}")]
    Params(String),
    #[error("{0}")]
    Attribute(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Duplicate(String),
    #[error("{0}")]
    Capacity(String),
    /// The actor cannot be (re)located as requested.
    #[error("{0}")]
    Location(String),
    #[error("{0}")]
    Selection(String),
    /// Lengths or raster shapes disagree.
    #[error("{0}")]
    Shape(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("binary encoding error: {0}")]
    Bincode(#[from] bincode::Error),
    #[error("database error: {0}")]
    Sql(#[from] rusqlite::Error),
}

pub type Result<T> = std::result::Result<T, AbsesError>;
