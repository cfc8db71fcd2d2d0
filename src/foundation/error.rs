use crate::foundation::core::MediaKind;

pub type FramelabResult<T> = Result<T, FramelabError>;

/// Coarse discriminant of a [`FramelabError`], for callers that branch on the failure kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnknownSource,
    WrongKind,
    UnknownOperation,
    SourceReadFailure,
    EncodeFailure,
    LogWriteFailure,
    LogQueryFailure,
    Validation,
    Job,
    Other,
}

#[derive(thiserror::Error, Debug)]
pub enum FramelabError {
    #[error("unknown source '{0}'")]
    UnknownSource(String),

    #[error("wrong kind: source '{id}' is {actual}, expected {expected}")]
    WrongKind {
        id: String,
        expected: MediaKind,
        actual: MediaKind,
    },

    #[error("unknown {kind} operation '{name}'")]
    UnknownOperation { kind: MediaKind, name: String },

    #[error("source read failure: {0}")]
    SourceReadFailure(String),

    #[error("encode failure: {0}")]
    EncodeFailure(String),

    #[error("log write failure: {0}")]
    LogWriteFailure(String),

    #[error("log query failure: {0}")]
    LogQueryFailure(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("job error: {0}")]
    Job(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl FramelabError {
    pub fn unknown_source(id: impl Into<String>) -> Self {
        Self::UnknownSource(id.into())
    }

    pub fn wrong_kind(id: impl Into<String>, expected: MediaKind, actual: MediaKind) -> Self {
        Self::WrongKind {
            id: id.into(),
            expected,
            actual,
        }
    }

    pub fn unknown_operation(kind: MediaKind, name: impl Into<String>) -> Self {
        Self::UnknownOperation {
            kind,
            name: name.into(),
        }
    }

    pub fn source_read(msg: impl Into<String>) -> Self {
        Self::SourceReadFailure(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::EncodeFailure(msg.into())
    }

    pub fn log_write(msg: impl Into<String>) -> Self {
        Self::LogWriteFailure(msg.into())
    }

    pub fn log_query(msg: impl Into<String>) -> Self {
        Self::LogQueryFailure(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn job(msg: impl Into<String>) -> Self {
        Self::Job(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownSource(_) => ErrorKind::UnknownSource,
            Self::WrongKind { .. } => ErrorKind::WrongKind,
            Self::UnknownOperation { .. } => ErrorKind::UnknownOperation,
            Self::SourceReadFailure(_) => ErrorKind::SourceReadFailure,
            Self::EncodeFailure(_) => ErrorKind::EncodeFailure,
            Self::LogWriteFailure(_) => ErrorKind::LogWriteFailure,
            Self::LogQueryFailure(_) => ErrorKind::LogQueryFailure,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Job(_) => ErrorKind::Job,
            Self::Other(_) => ErrorKind::Other,
        }
    }
}
