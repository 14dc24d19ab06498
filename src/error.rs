pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("argument error: {0}")]
    Argument(String),

    #[error("device selection error: {0}")]
    Selection(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("invalid access: {0}")]
    InvalidAccess(String),

    #[error("invalid range: {0}")]
    InvalidRange(String),

    #[error("execution error: {0}")]
    Execution(String),

    #[error("profiling error: {0}")]
    Profiling(String),

    #[error("verification failed: {0}")]
    Verification(String),

    #[error("telemetry error: {0}")]
    Telemetry(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn argument<S: Into<String>>(msg: S) -> Self {
        Error::Argument(msg.into())
    }

    pub fn selection<S: Into<String>>(msg: S) -> Self {
        Error::Selection(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn invalid_access<S: Into<String>>(msg: S) -> Self {
        Error::InvalidAccess(msg.into())
    }

    pub fn invalid_range<S: Into<String>>(msg: S) -> Self {
        Error::InvalidRange(msg.into())
    }

    pub fn execution<S: Into<String>>(msg: S) -> Self {
        Error::Execution(msg.into())
    }

    pub fn profiling<S: Into<String>>(msg: S) -> Self {
        Error::Profiling(msg.into())
    }

    pub fn verification<S: Into<String>>(msg: S) -> Self {
        Error::Verification(msg.into())
    }

    pub fn telemetry<S: Into<String>>(msg: S) -> Self {
        Error::Telemetry(msg.into())
    }
}
