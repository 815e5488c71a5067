use std::sync::Arc;

use serde::Serialize;

use crate::models::config::SessionConfiguration;
use crate::models::error::SessionError;
use crate::models::recording_result::RecordingResult;
use crate::models::state::{PlaybackState, RecordingState};
use crate::session::player::PlaybackController;
use crate::session::recorder::RecordingController;
use crate::traits::capture_provider::CaptureProvider;
use crate::traits::codec::CodecProvider;
use crate::traits::device_registry::DeviceRegistry;
use crate::traits::output_provider::OutputProvider;
use crate::traits::session_delegate::{PlaybackDelegate, RecordingDelegate};

/// Snapshot of both controllers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub playback: PlaybackState,
    pub recording: RecordingState,
}

/// One player and one recorder behind a single surface.
///
/// Every operation forwards to the owning controller. Playback and recording
/// may run at the same time; callers that want them exclusive must enforce
/// it themselves.
pub struct SessionFacade {
    player: PlaybackController,
    recorder: RecordingController,
}

impl SessionFacade {
    /// Build both controllers. The recording path doubles as the initial
    /// playback file so a finished take can be played back directly.
    pub fn new(
        config: &SessionConfiguration,
        registry: &dyn DeviceRegistry,
        capture: Arc<dyn CaptureProvider>,
        output: Arc<dyn OutputProvider>,
        codecs: Arc<dyn CodecProvider>,
    ) -> Result<Self, SessionError> {
        config.validate()?;

        let player = PlaybackController::new(output, Arc::clone(&codecs), config.recording_path.clone());
        let recorder = RecordingController::new(
            registry,
            capture,
            codecs,
            config.recording_path.clone(),
            config.bitrate_kbps,
        )?;

        log::info!(
            "session ready: {} at {} kbps",
            config.recording_path.display(),
            config.bitrate_kbps
        );
        Ok(Self { player, recorder })
    }

    pub fn play_record(&self) -> Result<(), SessionError> {
        self.player.play()
    }

    pub fn pause_playing(&self) -> Result<(), SessionError> {
        self.player.pause()
    }

    pub fn stop_playing(&self) -> Result<(), SessionError> {
        self.player.stop()
    }

    pub fn start_recording(&self) -> Result<(), SessionError> {
        self.recorder.start_recording()
    }

    pub fn pause_recording(&self) -> Result<(), SessionError> {
        self.recorder.pause_recording()
    }

    pub fn stop_recording(&self) -> Result<RecordingResult, SessionError> {
        self.recorder.stop_recording()
    }

    pub fn status(&self) -> SessionStatus {
        SessionStatus {
            playback: self.player.state(),
            recording: self.recorder.state(),
        }
    }

    /// Subscribe to playback notifications, including "playback finished".
    pub fn add_playback_delegate(&self, delegate: Arc<dyn PlaybackDelegate>) -> bool {
        self.player.add_delegate(delegate)
    }

    pub fn add_recording_delegate(&self, delegate: Arc<dyn RecordingDelegate>) -> bool {
        self.recorder.add_delegate(delegate)
    }

    pub fn player(&self) -> &PlaybackController {
        &self.player
    }

    pub fn recorder(&self) -> &RecordingController {
        &self.recorder
    }
}
