use thiserror::Error;

pub type PaketResult<T> = Result<T, PaketError>;

#[derive(Debug, Error)]
pub enum PaketError {
    /// Missing container file or missing logical name in the index.
    #[error("not found: {0}")]
    NotFound(String),

    #[error("data too short: {len} bytes (minimum {min})")]
    TooShort { len: usize, min: usize },

    #[error("invalid cipher mode tag: {0}")]
    InvalidMode(u8),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("container reader is closed")]
    Closed,

    #[error("index has no entries")]
    EmptyIndex,

    #[error("invalid record '{name}': {reason}")]
    InvalidRecord { name: String, reason: String },

    #[error("config error: {0}")]
    Config(String),
}

impl PaketError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PaketError::NotFound(_))
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, PaketError::Closed)
    }

    pub(crate) fn invalid_record(name: &str, reason: impl Into<String>) -> Self {
        PaketError::InvalidRecord {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
