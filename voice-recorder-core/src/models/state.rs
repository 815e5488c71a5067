use serde::{Deserialize, Serialize};

use super::error::SessionError;

/// Player state machine.
///
/// ```text
///            play             pause
/// Stopped ────────→ Playing ────────→ Paused
///    ↑               │  ↑    play       │
///    │   stop / eos  │  └───────────────┘
///    └───────────────┴──────────────────┘ stop
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlaybackCommand {
    Play,
    Pause,
    Stop,
}

/// Recorder state machine. Same shape as [`PlaybackState`], but `stop` on
/// an already stopped recorder is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingState {
    Stopped,
    Recording,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordingCommand {
    Start,
    Pause,
    Stop,
}

/// What a transition does to the session's device and codec handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Effect {
    /// Open codec + device and start streaming.
    Acquire,
    /// Restart a suspended stream; handles are reused.
    Resume,
    /// Suspend streaming; handles are retained.
    Suspend,
    /// Halt streaming and release every handle.
    Release,
    /// Nothing happens.
    Ignore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition<S> {
    pub effect: Effect,
    pub target: S,
}

impl PlaybackState {
    pub const ALL: [PlaybackState; 3] = [Self::Stopped, Self::Playing, Self::Paused];

    pub fn is_active(self) -> bool {
        !matches!(self, Self::Stopped)
    }

    /// Look up the transition for `command` in the player table.
    pub fn apply(self, command: PlaybackCommand) -> Result<Transition<Self>, SessionError> {
        use PlaybackCommand as C;

        let (effect, target) = match (self, command) {
            (Self::Stopped, C::Play) => (Effect::Acquire, Self::Playing),
            (Self::Paused, C::Play) => (Effect::Resume, Self::Playing),
            (Self::Playing, C::Play) => return Err(SessionError::AlreadyActive),
            (Self::Playing, C::Pause) => (Effect::Suspend, Self::Paused),
            (Self::Stopped | Self::Paused, C::Pause) => (Effect::Ignore, self),
            (Self::Playing | Self::Paused, C::Stop) => (Effect::Release, Self::Stopped),
            (Self::Stopped, C::Stop) => (Effect::Ignore, Self::Stopped),
        };
        Ok(Transition { effect, target })
    }
}

impl RecordingState {
    pub const ALL: [RecordingState; 3] = [Self::Stopped, Self::Recording, Self::Paused];

    pub fn is_active(self) -> bool {
        !matches!(self, Self::Stopped)
    }

    /// Look up the transition for `command` in the recorder table.
    pub fn apply(self, command: RecordingCommand) -> Result<Transition<Self>, SessionError> {
        use RecordingCommand as C;

        let (effect, target) = match (self, command) {
            (Self::Stopped, C::Start) => (Effect::Acquire, Self::Recording),
            (Self::Paused, C::Start) => (Effect::Resume, Self::Recording),
            (Self::Recording, C::Start) => return Err(SessionError::AlreadyActive),
            (Self::Recording, C::Pause) => (Effect::Suspend, Self::Paused),
            (Self::Stopped | Self::Paused, C::Pause) => (Effect::Ignore, self),
            (Self::Recording | Self::Paused, C::Stop) => (Effect::Release, Self::Stopped),
            (Self::Stopped, C::Stop) => return Err(SessionError::NotActive),
        };
        Ok(Transition { effect, target })
    }
}
