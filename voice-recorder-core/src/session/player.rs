use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::error::SessionError;
use crate::models::state::{Effect, PlaybackCommand, PlaybackState};
use crate::session::clock::SessionClock;
use crate::session::delegates::DelegateList;
use crate::traits::codec::{CodecProvider, DecoderHandle};
use crate::traits::output_provider::{OutputProvider, OutputStream, StreamStoppedCallback};
use crate::traits::session_delegate::PlaybackDelegate;

/// How the driver ended a stream.
#[derive(Debug, Clone)]
enum StreamEnd {
    Finished,
    Faulted(SessionError),
}

impl StreamEnd {
    fn from_report(error: &Option<SessionError>) -> Self {
        match error {
            None => Self::Finished,
            Some(err) => Self::Faulted(err.clone()),
        }
    }
}

/// Set by the stopped callback before it takes the controller lock.
type EndReport = Arc<Mutex<Option<StreamEnd>>>;

/// Handles owned by one playback activation.
struct ActivePlayback {
    id: Uuid,
    generation: u64,
    file_name: PathBuf,
    decoder: DecoderHandle,
    output: Box<dyn OutputStream>,
    ended: EndReport,
    clock: SessionClock,
}

impl ActivePlayback {
    /// Stop rendering, then close the decoder. Both steps always run; the
    /// first failure is returned.
    fn release(mut self) -> Result<(), SessionError> {
        let stopped = self.output.stop();
        let closed = match self.decoder.take() {
            Some(mut decoder) => decoder.close(),
            None => Ok(()),
        };
        match (stopped, closed) {
            (Err(e), Err(secondary)) => {
                log::warn!("decoder close failed while stopping output failed: {}", secondary);
                Err(e)
            }
            (stopped, closed) => stopped.and(closed),
        }
    }
}

/// Session storage. Handles exist only in the active variants.
enum PlayerSession {
    Stopped,
    Playing(ActivePlayback),
    Paused(ActivePlayback),
}

impl PlayerSession {
    fn state(&self) -> PlaybackState {
        match self {
            Self::Stopped => PlaybackState::Stopped,
            Self::Playing(_) => PlaybackState::Playing,
            Self::Paused(_) => PlaybackState::Paused,
        }
    }

    fn active(&self) -> Option<&ActivePlayback> {
        match self {
            Self::Stopped => None,
            Self::Playing(active) | Self::Paused(active) => Some(active),
        }
    }

    fn active_mut(&mut self) -> Option<&mut ActivePlayback> {
        match self {
            Self::Stopped => None,
            Self::Playing(active) | Self::Paused(active) => Some(active),
        }
    }

    /// Detach the handles and leave the session `Stopped`.
    fn take(&mut self) -> Option<ActivePlayback> {
        match std::mem::replace(self, Self::Stopped) {
            Self::Stopped => None,
            Self::Playing(active) | Self::Paused(active) => Some(active),
        }
    }

    /// Move the handles between `Playing` and `Paused`.
    fn retag(&mut self, target: PlaybackState) {
        *self = match (std::mem::replace(self, Self::Stopped), target) {
            (Self::Playing(a) | Self::Paused(a), PlaybackState::Playing) => Self::Playing(a),
            (Self::Playing(a) | Self::Paused(a), PlaybackState::Paused) => Self::Paused(a),
            (session, _) => session,
        };
    }
}

struct PlayerShared {
    file_name: PathBuf,
    session: PlayerSession,
    generation: u64,
    fault: Option<SessionError>,
}

/// Plays one encoded file at a time through one output stream.
///
/// State machine over `Stopped`, `Playing` and `Paused`; see
/// [`PlaybackState::apply`] for the transition table. Decoder and output are
/// opened on `Stopped → Playing` and released on every return to
/// `Stopped`, including when the output reports end of file on its own, in
/// which case delegates receive `on_playback_finished` once the handles are
/// gone.
pub struct PlaybackController {
    shared: Arc<Mutex<PlayerShared>>,
    output: Arc<dyn OutputProvider>,
    codecs: Arc<dyn CodecProvider>,
    delegates: Arc<DelegateList<dyn PlaybackDelegate>>,
}

impl PlaybackController {
    pub fn new(
        output: Arc<dyn OutputProvider>,
        codecs: Arc<dyn CodecProvider>,
        file_name: impl Into<PathBuf>,
    ) -> Self {
        Self {
            shared: Arc::new(Mutex::new(PlayerShared {
                file_name: file_name.into(),
                session: PlayerSession::Stopped,
                generation: 0,
                fault: None,
            })),
            output,
            codecs,
            delegates: Arc::new(DelegateList::new()),
        }
    }

    pub fn file_name(&self) -> PathBuf {
        self.shared.lock().file_name.clone()
    }

    /// Fails with `AlreadyActive` unless the player is stopped.
    pub fn set_file_name(&self, file_name: impl Into<PathBuf>) -> Result<(), SessionError> {
        let mut shared = self.shared.lock();
        if shared.session.state().is_active() {
            return Err(SessionError::AlreadyActive);
        }
        shared.file_name = file_name.into();
        Ok(())
    }

    pub fn state(&self) -> PlaybackState {
        self.shared.lock().session.state()
    }

    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// Id of the current activation, `None` while stopped.
    pub fn session_id(&self) -> Option<Uuid> {
        self.shared.lock().session.active().map(|a| a.id)
    }

    /// Seconds rendered in the current activation, `None` while stopped.
    pub fn position_secs(&self) -> Option<f64> {
        self.shared.lock().session.active().map(|a| a.clock.elapsed_secs())
    }

    /// Subscribe to notifications. Returns `false` if already subscribed.
    pub fn add_delegate(&self, delegate: Arc<dyn PlaybackDelegate>) -> bool {
        let added = self.delegates.add(delegate);
        if added {
            log::debug!("playback delegate added, {} subscribed", self.delegates.len());
        }
        added
    }

    pub fn remove_delegate(&self, delegate: &Arc<dyn PlaybackDelegate>) -> bool {
        self.delegates.remove(delegate)
    }

    /// The driver fault that last force-stopped playback, if not yet taken.
    pub fn take_fault(&self) -> Option<SessionError> {
        self.shared.lock().fault.take()
    }

    /// Start playing `file_name` from the beginning, or resume after `pause`.
    pub fn play(&self) -> Result<(), SessionError> {
        self.dispatch(PlaybackCommand::Play)
    }

    /// Suspend rendering, keeping the handles. No-op unless playing.
    pub fn pause(&self) -> Result<(), SessionError> {
        self.dispatch(PlaybackCommand::Pause)
    }

    /// Halt rendering and release the handles. No-op when already stopped.
    pub fn stop(&self) -> Result<(), SessionError> {
        self.dispatch(PlaybackCommand::Stop)
    }

    fn dispatch(&self, command: PlaybackCommand) -> Result<(), SessionError> {
        let mut shared = self.shared.lock();
        let transition = shared.session.state().apply(command)?;

        let outcome = match transition.effect {
            Effect::Ignore => return Ok(()),
            Effect::Acquire => {
                let generation = shared.generation + 1;
                let file_name = shared.file_name.clone();
                let active = self.acquire(file_name, generation)?;
                log::info!("playback {} started: {}", active.id, active.file_name.display());
                shared.generation = generation;
                shared.fault = None;
                shared.session = PlayerSession::Playing(active);
                Ok(())
            }
            Effect::Resume => match shared.session.active_mut() {
                Some(active) => active.output.play().map(|()| {
                    active.clock.resume();
                    log::debug!("playback {} resumed", active.id);
                }),
                None => Ok(()),
            },
            Effect::Suspend => match shared.session.active_mut() {
                Some(active) => active.output.pause().map(|()| {
                    active.clock.pause();
                    log::debug!("playback {} paused", active.id);
                }),
                None => Ok(()),
            },
            Effect::Release => {
                let detached = shared.session.take();
                drop(shared);
                let released = match detached {
                    Some(active) => {
                        log::info!("playback {} stopped", active.id);
                        active.release()
                    }
                    None => Ok(()),
                };
                self.delegates.notify(|d| d.on_state_changed(PlaybackState::Stopped));
                return released;
            }
        };

        match outcome {
            Ok(()) => {
                shared.session.retag(transition.target);
                drop(shared);
                self.delegates.notify(|d| d.on_state_changed(transition.target));
                Ok(())
            }
            Err(err) => {
                // A device that fails to pause or resume is not trusted further.
                let detached = shared.session.take();
                let ended = detached.as_ref().and_then(|a| a.ended.lock().clone());
                if let Some(StreamEnd::Faulted(fault)) = &ended {
                    shared.fault = Some(fault.clone());
                }
                drop(shared);

                let Some(active) = detached else {
                    self.delegates.notify(|d| d.on_state_changed(PlaybackState::Stopped));
                    return Err(err);
                };
                match ended {
                    // The stream ended while the command waited on it; its
                    // stopped callback will find the session gone.
                    Some(StreamEnd::Finished) => {
                        log::debug!("playback {} ended before {:?} took effect: {}", active.id, command, err);
                        release_and_report(&self.delegates, active, None);
                        Ok(())
                    }
                    Some(StreamEnd::Faulted(fault)) => {
                        log::debug!("playback {} faulted before {:?} took effect: {}", active.id, command, err);
                        release_and_report(&self.delegates, active, Some(fault.clone()));
                        Err(fault)
                    }
                    None => {
                        log::error!("playback {} failed: {}", active.id, err);
                        if let Err(secondary) = active.release() {
                            log::warn!("release after playback failure also failed: {}", secondary);
                        }
                        self.delegates.notify(|d| d.on_state_changed(PlaybackState::Stopped));
                        Err(err)
                    }
                }
            }
        }
    }

    /// Open decoder and output and start rendering. On failure nothing stays open.
    fn acquire(&self, file_name: PathBuf, generation: u64) -> Result<ActivePlayback, SessionError> {
        let decoder = DecoderHandle::new(self.codecs.open_decoder(&file_name)?);

        let ended = EndReport::default();
        let on_stopped = self.stopped_callback(generation, Arc::clone(&ended));
        let mut output = match self.output.open_output(decoder.clone(), on_stopped) {
            Ok(output) => output,
            Err(err) => {
                close_decoder_quietly(&decoder);
                return Err(err);
            }
        };

        if let Err(err) = output.play() {
            if let Err(secondary) = output.stop() {
                log::warn!("failed to stop output after start failure: {}", secondary);
            }
            close_decoder_quietly(&decoder);
            return Err(err);
        }

        Ok(ActivePlayback {
            id: Uuid::new_v4(),
            generation,
            file_name,
            decoder,
            output,
            ended,
            clock: SessionClock::start(),
        })
    }

    fn stopped_callback(&self, generation: u64, ended: EndReport) -> StreamStoppedCallback {
        let shared = Arc::downgrade(&self.shared);
        let delegates = Arc::clone(&self.delegates);
        Arc::new(move |error: Option<SessionError>| {
            *ended.lock() = Some(StreamEnd::from_report(&error));
            if let Some(shared) = shared.upgrade() {
                finish_from_driver(&shared, &delegates, generation, error);
            }
        })
    }
}

impl Drop for PlaybackController {
    fn drop(&mut self) {
        let detached = self.shared.lock().session.take();
        if let Some(active) = detached {
            let id = active.id;
            if let Err(e) = active.release() {
                log::warn!("failed to release playback {} on drop: {}", id, e);
            }
        }
    }
}

/// Driver-side end of a playback activation: natural end of file or fault.
fn finish_from_driver(
    shared: &Mutex<PlayerShared>,
    delegates: &DelegateList<dyn PlaybackDelegate>,
    generation: u64,
    error: Option<SessionError>,
) {
    let detached = {
        let mut shared = shared.lock();
        if shared.session.active().map(|a| a.generation) != Some(generation) {
            log::debug!("ignoring stop event from finished playback generation {}", generation);
            return;
        }
        if let Some(ref err) = error {
            shared.fault = Some(err.clone());
        }
        shared.session.take()
    };
    if let Some(active) = detached {
        release_and_report(delegates, active, error);
    }
}

/// Release a session the driver ended, then tell delegates how it ended.
fn release_and_report(
    delegates: &DelegateList<dyn PlaybackDelegate>,
    active: ActivePlayback,
    error: Option<SessionError>,
) {
    let id = active.id;
    let file_name = active.file_name.clone();
    if let Err(e) = active.release() {
        log::warn!("release after end of playback {} failed: {}", id, e);
    }
    delegates.notify(|d| d.on_state_changed(PlaybackState::Stopped));

    match error {
        None => {
            log::info!("playback {} reached end of file", id);
            delegates.notify(|d| d.on_playback_finished(&file_name));
        }
        Some(err) => {
            log::error!("playback {} stopped by driver: {}", id, err);
            delegates.notify(|d| d.on_error(&err));
        }
    }
}

fn close_decoder_quietly(decoder: &DecoderHandle) {
    if let Some(mut decoder) = decoder.take() {
        if let Err(e) = decoder.close() {
            log::warn!("failed to close decoder: {}", e);
        }
    }
}
