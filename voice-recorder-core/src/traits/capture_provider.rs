use std::sync::Arc;

use crate::models::device::{AudioDevice, StreamFormat};
use crate::models::error::SessionError;
use crate::traits::output_provider::StreamStoppedCallback;

/// Callback invoked when a captured buffer is available.
///
/// Fires on the driver thread, one call at a time, in production order. An
/// `Err` is fatal: the stream must end and report that error through its
/// stopped callback.
pub type CaptureDataCallback = Arc<dyn Fn(&[u8]) -> Result<(), SessionError> + Send + Sync + 'static>;

/// An open capture stream bound to one device.
pub trait CaptureStream: Send {
    /// Format of the bytes handed to the data callback.
    fn format(&self) -> StreamFormat;

    /// Start capturing, or resume after `pause`.
    fn start(&mut self) -> Result<(), SessionError>;

    /// Suspend capture without releasing the device.
    fn pause(&mut self) -> Result<(), SessionError>;

    /// Halt capture and release the device. Returns once no data callback
    /// is running or will run, unless called from the driver thread itself.
    fn stop(&mut self) -> Result<(), SessionError>;
}

/// Audio capture subsystem.
pub trait CaptureProvider: Send + Sync {
    /// Open a capture stream on `device`. Capture must not begin before
    /// `start` is called.
    fn open_capture(
        &self,
        device: &AudioDevice,
        on_data: CaptureDataCallback,
        on_stopped: StreamStoppedCallback,
    ) -> Result<Box<dyn CaptureStream>, SessionError>;
}
