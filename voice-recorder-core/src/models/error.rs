use thiserror::Error;

/// Errors raised by the playback and recording controllers and their
/// collaborators.
///
/// `AlreadyActive` and `NotActive` are invalid-transition errors detected
/// synchronously inside the state machine. `Device` and `Io` are faults of
/// the hardware or codec path; by the time one reaches the caller the
/// session that produced it has already released its resources.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("session is already active")]
    AlreadyActive,

    #[error("session is not active")]
    NotActive,

    #[error("device error: {0}")]
    Device(String),

    #[error("i/o error: {0}")]
    Io(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),
}

impl From<std::io::Error> for SessionError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}
