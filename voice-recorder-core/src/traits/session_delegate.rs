use std::path::Path;

use crate::models::error::SessionError;
use crate::models::recording_result::RecordingResult;
use crate::models::state::{PlaybackState, RecordingState};

/// Player notifications.
///
/// Methods may be called from a driver thread. They are never called while
/// the player's lock is held, so calling back into the player is allowed.
pub trait PlaybackDelegate: Send + Sync {
    fn on_state_changed(&self, _state: PlaybackState) {}

    /// The file played to its end and every handle has been released.
    /// Fired at most once per activation, never for an explicit stop.
    fn on_playback_finished(&self, _file: &Path) {}

    /// A driver fault stopped the session. Resources are already released.
    fn on_error(&self, _error: &SessionError) {}
}

/// Recorder notifications. Same threading rules as [`PlaybackDelegate`].
pub trait RecordingDelegate: Send + Sync {
    fn on_state_changed(&self, _state: RecordingState) {}

    /// The output file is finalized.
    fn on_recording_finished(&self, _result: &RecordingResult) {}

    /// A driver or encoder fault stopped the session. Resources are already released.
    fn on_error(&self, _error: &SessionError) {}
}
