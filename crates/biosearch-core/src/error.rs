use thiserror::Error;

/// Why the generation capability declined to produce an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefusalReason {
    /// Content-safety block reported by the backend.
    Safety,
    /// Output was cut off by the length limit before anything usable came back.
    Length,
    /// Backend-specific reason we pass through verbatim.
    Other(String),
}

impl std::fmt::Display for RefusalReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RefusalReason::Safety => write!(f, "content-safety block"),
            RefusalReason::Length => write!(f, "length limit reached"),
            RefusalReason::Other(r) => write!(f, "{r}"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("index unavailable: {0}")]
    IndexUnavailable(String),

    #[error("generation unavailable: {0}")]
    GenerationUnavailable(String),

    #[error("generation refused: {0}")]
    GenerationRefused(RefusalReason),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Error>;
