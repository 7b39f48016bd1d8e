use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot lock a barrier without watched actions")]
    EmptyBarrier,

    #[error("Cannot lock barrier: {added} of {expected} expected actions added")]
    PrematureLock { expected: usize, added: usize },

    #[error("Not a watched action: {0}")]
    MalformedAction(String),

    #[error("Reserved name: {name}")]
    ReservedName { name: String },

    #[error("Logging error: {0}")]
    Logging(String),
}

impl Error {
    /// Stable discriminant for callers that dispatch on the failure kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "ConfigError",
            Error::EmptyBarrier => "EmptyBarrierError",
            Error::PrematureLock { .. } => "PrematureLockError",
            Error::MalformedAction(_) => "MalformedActionError",
            Error::ReservedName { .. } => "ReservedNameError",
            Error::Logging(_) => "LoggingError",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logging_kind_is_distinct_from_config() {
        let err = Error::Logging("subscriber already installed".to_string());
        assert_eq!(err.kind(), "LoggingError");
        assert_ne!(err.kind(), Error::Config(String::new()).kind());
    }
}
