use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AppError {
    #[error("invalid_argument - {0}")]
    InvalidArgument(String),
    #[error("out_of_range - {0}")]
    OutOfRange(String),
    #[error("persistence_unavailable - {0}")]
    PersistenceUnavailable(String),
    #[error("invalid_data - {0}")]
    InvalidData(String),
}

impl AppError {
    pub fn invalid_argument<M: Into<String>>(message: M) -> Self {
        Self::InvalidArgument(message.into())
    }

    pub fn out_of_range<M: Into<String>>(message: M) -> Self {
        Self::OutOfRange(message.into())
    }

    pub fn persistence<M: Into<String>>(message: M) -> Self {
        Self::PersistenceUnavailable(message.into())
    }

    pub fn invalid_data<M: Into<String>>(message: M) -> Self {
        Self::InvalidData(message.into())
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidArgument(_) => "invalid_argument",
            Self::OutOfRange(_) => "out_of_range",
            Self::PersistenceUnavailable(_) => "persistence_unavailable",
            Self::InvalidData(_) => "invalid_data",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::InvalidArgument(message)
            | Self::OutOfRange(message)
            | Self::PersistenceUnavailable(message)
            | Self::InvalidData(message) => message,
        }
    }
}
