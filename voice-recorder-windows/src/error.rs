use thiserror::Error;
use windows::Win32::Foundation::E_ACCESSDENIED;
use windows::Win32::Media::Audio::{AUDCLNT_E_DEVICE_INVALIDATED, AUDCLNT_E_DEVICE_IN_USE};

use voice_recorder_core::SessionError;

/// Failures of the WASAPI backend. Reaches callers as [`SessionError::Device`].
#[derive(Debug, Error)]
pub enum WasapiError {
    #[error("COM initialization failed: {0}")]
    Com(windows::core::Error),

    #[error("audio endpoint not found: {0}")]
    DeviceNotFound(String),

    #[error("audio device was removed")]
    DeviceRemoved,

    #[error("audio device is in use by another application")]
    DeviceInUse,

    #[error("microphone access is disabled in privacy settings")]
    AccessDenied,

    #[error("unsupported stream format: {0}")]
    UnsupportedFormat(String),

    #[error("audio thread failed: {0}")]
    Thread(String),

    #[error("{context} failed: {source}")]
    Call {
        context: &'static str,
        #[source]
        source: windows::core::Error,
    },
}

impl WasapiError {
    fn from_call(context: &'static str, source: windows::core::Error) -> Self {
        let code = source.code();
        if code == AUDCLNT_E_DEVICE_INVALIDATED {
            Self::DeviceRemoved
        } else if code == AUDCLNT_E_DEVICE_IN_USE {
            Self::DeviceInUse
        } else if code == E_ACCESSDENIED {
            Self::AccessDenied
        } else {
            Self::Call { context, source }
        }
    }
}

impl From<WasapiError> for SessionError {
    fn from(err: WasapiError) -> Self {
        SessionError::Device(err.to_string())
    }
}

/// Attach the name of the failing call to a `windows` result.
pub(crate) trait Context<T> {
    fn context(self, context: &'static str) -> Result<T, WasapiError>;
}

impl<T> Context<T> for windows::core::Result<T> {
    fn context(self, context: &'static str) -> Result<T, WasapiError> {
        self.map_err(|e| WasapiError::from_call(context, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_known_codes_get_their_own_variant() {
        let removed: windows::core::Result<()> = Err(AUDCLNT_E_DEVICE_INVALIDATED.into());
        assert!(matches!(removed.context("GetBuffer"), Err(WasapiError::DeviceRemoved)));

        let denied: windows::core::Result<()> = Err(E_ACCESSDENIED.into());
        assert!(matches!(denied.context("Activate"), Err(WasapiError::AccessDenied)));
    }

    #[test]
    fn surfaces_as_device_error() {
        let err: SessionError = WasapiError::DeviceInUse.into();
        assert!(matches!(err, SessionError::Device(ref msg) if msg.contains("in use")));
    }
}
