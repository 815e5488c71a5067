use std::sync::Arc;

use crate::models::error::SessionError;
use crate::traits::codec::DecoderHandle;

/// Callback fired by a driver thread when a stream ends on its own.
///
/// `None` means natural completion (end of file for output, device gone
/// quiet for capture); `Some(err)` is a driver fault. It is not fired for a
/// stop the controller requested; controllers ignore it if it is. It must
/// come from the driver thread, never synchronously from inside a call the
/// controller makes on the stream.
pub type StreamStoppedCallback = Arc<dyn Fn(Option<SessionError>) + Send + Sync + 'static>;

/// An open render stream.
pub trait OutputStream: Send {
    /// Start rendering, or resume after `pause`.
    fn play(&mut self) -> Result<(), SessionError>;

    /// Suspend rendering without releasing the device.
    fn pause(&mut self) -> Result<(), SessionError>;

    /// Halt rendering and release the device. Must not wait on the
    /// controller that owns the stream.
    fn stop(&mut self) -> Result<(), SessionError>;
}

/// Audio output subsystem.
pub trait OutputProvider: Send + Sync {
    /// Open a render stream that pulls frames from `source`.
    ///
    /// The stream must not start rendering before `play` is called.
    fn open_output(
        &self,
        source: DecoderHandle,
        on_stopped: StreamStoppedCallback,
    ) -> Result<Box<dyn OutputStream>, SessionError>;
}
