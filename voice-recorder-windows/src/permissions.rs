//! Windows microphone privacy check.
//!
//! On Windows 10 1803+, microphone access is controlled by Settings >
//! Privacy > Microphone. Unpackaged desktop apps get no consent dialog;
//! when the toggle is off, activating a capture client fails with
//! `E_ACCESSDENIED`.

use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use voice_recorder_core::SessionError;

use crate::com::{self, ComScope};
use crate::error::{Context, WasapiError};

/// Whether the default capture endpoint can be activated.
///
/// Returns `Ok(false)` when access is denied or no capture endpoint exists.
/// Any other activation failure is logged and treated as available; opening
/// the stream will report it properly.
pub fn check_microphone_permission() -> Result<bool, SessionError> {
    let _com = ComScope::enter()?;
    let enumerator = com::device_enumerator()?;

    let device = match com::open_endpoint(&enumerator, None, eCapture) {
        Ok(device) => device,
        Err(WasapiError::DeviceNotFound(_)) => return Ok(false),
        Err(e) => return Err(e.into()),
    };

    match unsafe { device.Activate::<IAudioClient>(CLSCTX_ALL, None) }.context("IMMDevice::Activate") {
        Ok(_) => Ok(true),
        Err(WasapiError::AccessDenied) => {
            log::warn!("microphone access is disabled in privacy settings");
            Ok(false)
        }
        Err(e) => {
            log::warn!("unexpected error checking microphone permission: {}", e);
            Ok(true)
        }
    }
}
