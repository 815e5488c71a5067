use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use uuid::Uuid;

use crate::models::device::AudioDevice;
use crate::models::error::SessionError;
use crate::models::recording_result::RecordingResult;
use crate::models::state::{Effect, RecordingCommand, RecordingState};
use crate::session::clock::SessionClock;
use crate::session::delegates::DelegateList;
use crate::traits::capture_provider::{CaptureDataCallback, CaptureProvider, CaptureStream};
use crate::traits::codec::{CodecProvider, EncoderHandle};
use crate::traits::device_registry::DeviceRegistry;
use crate::traits::output_provider::StreamStoppedCallback;
use crate::traits::session_delegate::RecordingDelegate;

/// Counters updated by the capture thread.
#[derive(Debug, Default)]
struct WriteCounters {
    buffers: AtomicU64,
    bytes: AtomicU64,
}

impl WriteCounters {
    fn record(&self, len: usize) {
        self.buffers.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(len as u64, Ordering::Relaxed);
    }
}

/// Handles owned by one recording activation.
struct ActiveRecording {
    id: Uuid,
    generation: u64,
    out_file_name: PathBuf,
    input: Box<dyn CaptureStream>,
    encoder: EncoderHandle,
    counters: Arc<WriteCounters>,
    clock: SessionClock,
}

impl ActiveRecording {
    /// Halt capture first so every delivered buffer reaches the encoder,
    /// then close the encoder. Both steps always run.
    fn release(mut self) -> Result<RecordingResult, SessionError> {
        let stopped = self.input.stop();
        let closed = match self.encoder.take() {
            Some(mut encoder) => encoder.close(),
            None => Err(SessionError::Io("encoder already closed".into())),
        };

        let summary = match (stopped, closed) {
            (Ok(()), Ok(summary)) => summary,
            (Err(e), closed) => {
                if let Err(secondary) = closed {
                    log::warn!("encoder close failed while stopping capture failed: {}", secondary);
                }
                return Err(e);
            }
            (Ok(()), Err(e)) => return Err(e),
        };

        Ok(RecordingResult {
            id: self.id,
            file_path: self.out_file_name,
            duration_secs: self.clock.elapsed_secs(),
            buffers_written: self.counters.buffers.load(Ordering::Relaxed),
            bytes_written: self.counters.bytes.load(Ordering::Relaxed),
            file_size: summary.file_size,
            checksum: summary.checksum,
            created_at: self.clock.started_at(),
        })
    }
}

/// Session storage. Handles exist only in the active variants.
enum RecorderSession {
    Stopped,
    Recording(ActiveRecording),
    Paused(ActiveRecording),
}

impl RecorderSession {
    fn state(&self) -> RecordingState {
        match self {
            Self::Stopped => RecordingState::Stopped,
            Self::Recording(_) => RecordingState::Recording,
            Self::Paused(_) => RecordingState::Paused,
        }
    }

    fn active(&self) -> Option<&ActiveRecording> {
        match self {
            Self::Stopped => None,
            Self::Recording(active) | Self::Paused(active) => Some(active),
        }
    }

    fn active_mut(&mut self) -> Option<&mut ActiveRecording> {
        match self {
            Self::Stopped => None,
            Self::Recording(active) | Self::Paused(active) => Some(active),
        }
    }

    fn take(&mut self) -> Option<ActiveRecording> {
        match std::mem::replace(self, Self::Stopped) {
            Self::Stopped => None,
            Self::Recording(active) | Self::Paused(active) => Some(active),
        }
    }

    fn retag(&mut self, target: RecordingState) {
        *self = match (std::mem::replace(self, Self::Stopped), target) {
            (Self::Recording(a) | Self::Paused(a), RecordingState::Recording) => Self::Recording(a),
            (Self::Recording(a) | Self::Paused(a), RecordingState::Paused) => Self::Paused(a),
            (session, _) => session,
        };
    }
}

struct RecorderShared {
    out_file_name: PathBuf,
    active_device: AudioDevice,
    session: RecorderSession,
    generation: u64,
    fault: Option<SessionError>,
}

/// Records one capture device into one output file.
///
/// State machine over `Stopped`, `Recording` and `Paused`; see
/// [`RecordingState::apply`]. Capture stream and encoder are opened on
/// `Stopped → Recording` and released on every return to `Stopped`.
///
/// Captured buffers are written to the encoder on the capture thread, in
/// delivery order, without taking the recorder lock. A fault reported by
/// the driver, or a failed encoder write, force-stops the session; the
/// error is then delivered to delegates and returned by the next
/// [`stop_recording`](Self::stop_recording).
pub struct RecordingController {
    shared: Arc<Mutex<RecorderShared>>,
    capture: Arc<dyn CaptureProvider>,
    codecs: Arc<dyn CodecProvider>,
    devices: Vec<AudioDevice>,
    bitrate_kbps: u32,
    delegates: Arc<DelegateList<dyn RecordingDelegate>>,
}

impl RecordingController {
    /// Enumerate devices once and select the system default.
    pub fn new(
        registry: &dyn DeviceRegistry,
        capture: Arc<dyn CaptureProvider>,
        codecs: Arc<dyn CodecProvider>,
        out_file_name: impl Into<PathBuf>,
        bitrate_kbps: u32,
    ) -> Result<Self, SessionError> {
        let devices = registry.list_devices()?;
        let active_device = registry.default_device()?;
        log::info!(
            "{} capture device(s), default: {}",
            devices.len(),
            active_device.name
        );

        Ok(Self {
            shared: Arc::new(Mutex::new(RecorderShared {
                out_file_name: out_file_name.into(),
                active_device,
                session: RecorderSession::Stopped,
                generation: 0,
                fault: None,
            })),
            capture,
            codecs,
            devices,
            bitrate_kbps,
            delegates: Arc::new(DelegateList::new()),
        })
    }

    /// Capture devices as enumerated at construction.
    pub fn devices(&self) -> &[AudioDevice] {
        &self.devices
    }

    pub fn active_device(&self) -> AudioDevice {
        self.shared.lock().active_device.clone()
    }

    /// Select the device for the next recording.
    ///
    /// Fails with `AlreadyActive` unless stopped, and with `Configuration`
    /// if `device` is not one of [`devices`](Self::devices).
    pub fn set_active_device(&self, device: AudioDevice) -> Result<(), SessionError> {
        let mut shared = self.shared.lock();
        if shared.session.state().is_active() {
            return Err(SessionError::AlreadyActive);
        }
        let Some(known) = self.devices.iter().find(|d| d.same_endpoint(&device)) else {
            return Err(SessionError::Configuration(format!(
                "unknown capture device: {}",
                device.id
            )));
        };
        log::debug!("capture device set to {}", known.name);
        shared.active_device = known.clone();
        Ok(())
    }

    pub fn out_file_name(&self) -> PathBuf {
        self.shared.lock().out_file_name.clone()
    }

    /// Fails with `AlreadyActive` unless stopped.
    pub fn set_out_file_name(&self, out_file_name: impl Into<PathBuf>) -> Result<(), SessionError> {
        let mut shared = self.shared.lock();
        if shared.session.state().is_active() {
            return Err(SessionError::AlreadyActive);
        }
        shared.out_file_name = out_file_name.into();
        Ok(())
    }

    pub fn bitrate_kbps(&self) -> u32 {
        self.bitrate_kbps
    }

    pub fn state(&self) -> RecordingState {
        self.shared.lock().session.state()
    }

    pub fn is_active(&self) -> bool {
        self.state().is_active()
    }

    /// Id of the current activation, `None` while stopped.
    pub fn session_id(&self) -> Option<Uuid> {
        self.shared.lock().session.active().map(|a| a.id)
    }

    /// Active capture time of the current activation, `None` while stopped.
    pub fn duration_secs(&self) -> Option<f64> {
        self.shared.lock().session.active().map(|a| a.clock.elapsed_secs())
    }

    /// Subscribe to notifications. Returns `false` if already subscribed.
    pub fn add_delegate(&self, delegate: Arc<dyn RecordingDelegate>) -> bool {
        let added = self.delegates.add(delegate);
        if added {
            log::debug!("recording delegate added, {} subscribed", self.delegates.len());
        }
        added
    }

    pub fn remove_delegate(&self, delegate: &Arc<dyn RecordingDelegate>) -> bool {
        self.delegates.remove(delegate)
    }

    /// The fault that last force-stopped recording, if not yet taken.
    pub fn take_fault(&self) -> Option<SessionError> {
        self.shared.lock().fault.take()
    }

    /// Start a new recording, or resume after `pause_recording`.
    pub fn start_recording(&self) -> Result<(), SessionError> {
        let mut shared = self.shared.lock();
        let transition = shared.session.state().apply(RecordingCommand::Start)?;

        let outcome = match transition.effect {
            Effect::Acquire => {
                let generation = shared.generation + 1;
                let active = self.acquire(&shared, generation)?;
                log::info!(
                    "recording {} started: {} from {}",
                    active.id,
                    active.out_file_name.display(),
                    shared.active_device.name
                );
                shared.generation = generation;
                shared.fault = None;
                shared.session = RecorderSession::Recording(active);
                Ok(())
            }
            Effect::Resume => match shared.session.active_mut() {
                Some(active) => active.input.start().map(|()| {
                    active.clock.resume();
                    log::debug!("recording {} resumed", active.id);
                }),
                None => Ok(()),
            },
            _ => Ok(()),
        };
        self.settle(shared, transition.target, outcome)
    }

    /// Suspend capture, keeping the handles. No-op unless recording.
    pub fn pause_recording(&self) -> Result<(), SessionError> {
        let mut shared = self.shared.lock();
        let transition = shared.session.state().apply(RecordingCommand::Pause)?;
        if transition.effect == Effect::Ignore {
            return Ok(());
        }

        let outcome = match shared.session.active_mut() {
            Some(active) => active.input.pause().map(|()| {
                active.clock.pause();
                log::debug!("recording {} paused", active.id);
            }),
            None => Ok(()),
        };
        self.settle(shared, transition.target, outcome)
    }

    /// Halt capture, finalize the output file and release every handle.
    ///
    /// Fails with `NotActive` when already stopped, unless the session was
    /// force-stopped by a fault since the last call; that fault is returned
    /// instead, once.
    pub fn stop_recording(&self) -> Result<RecordingResult, SessionError> {
        let detached = {
            let mut shared = self.shared.lock();
            match shared.session.state().apply(RecordingCommand::Stop) {
                Ok(_) => shared.session.take(),
                Err(SessionError::NotActive) => {
                    return Err(shared.fault.take().unwrap_or(SessionError::NotActive));
                }
                Err(e) => return Err(e),
            }
        };
        let Some(active) = detached else {
            return Err(SessionError::NotActive);
        };

        let id = active.id;
        let outcome = active.release();
        self.delegates.notify(|d| d.on_state_changed(RecordingState::Stopped));

        match &outcome {
            Ok(result) => {
                log::info!(
                    "recording {} finished: {} buffers, {:.1}s",
                    id,
                    result.buffers_written,
                    result.duration_secs
                );
                self.delegates.notify(|d| d.on_recording_finished(result));
            }
            Err(err) => {
                log::error!("recording {} failed to finalize: {}", id, err);
                self.delegates.notify(|d| d.on_error(err));
            }
        }
        outcome
    }

    /// Commit a start/pause outcome: retag on success, force-stop on failure.
    fn settle(
        &self,
        mut shared: parking_lot::MutexGuard<'_, RecorderShared>,
        target: RecordingState,
        outcome: Result<(), SessionError>,
    ) -> Result<(), SessionError> {
        match outcome {
            Ok(()) => {
                let changed = shared.session.state() != target;
                shared.session.retag(target);
                drop(shared);
                if changed {
                    self.delegates.notify(|d| d.on_state_changed(target));
                }
                Ok(())
            }
            Err(err) => {
                let detached = shared.session.take();
                drop(shared);
                if let Some(active) = detached {
                    log::error!("recording {} failed: {}", active.id, err);
                    if let Err(secondary) = active.release() {
                        log::warn!("release after recording failure also failed: {}", secondary);
                    }
                }
                self.delegates.notify(|d| d.on_state_changed(RecordingState::Stopped));
                Err(err)
            }
        }
    }

    /// Open the capture stream and the encoder, then start capturing.
    /// On failure nothing stays open.
    fn acquire(&self, shared: &RecorderShared, generation: u64) -> Result<ActiveRecording, SessionError> {
        let encoder = EncoderHandle::empty();
        let counters = Arc::new(WriteCounters::default());

        let mut input = self.capture.open_capture(
            &shared.active_device,
            Self::data_callback(encoder.clone(), Arc::clone(&counters)),
            self.stopped_callback(generation),
        )?;

        let format = input.format();
        match self
            .codecs
            .open_encoder(&shared.out_file_name, &format, self.bitrate_kbps)
        {
            Ok(opened) => encoder.install(opened),
            Err(err) => {
                if let Err(secondary) = input.stop() {
                    log::warn!("failed to release capture after encoder failure: {}", secondary);
                }
                return Err(err);
            }
        }

        if let Err(err) = input.start() {
            if let Err(secondary) = input.stop() {
                log::warn!("failed to release capture after start failure: {}", secondary);
            }
            if let Some(mut opened) = encoder.take() {
                if let Err(secondary) = opened.close() {
                    log::warn!("failed to close encoder after start failure: {}", secondary);
                }
            }
            return Err(err);
        }

        Ok(ActiveRecording {
            id: Uuid::new_v4(),
            generation,
            out_file_name: shared.out_file_name.clone(),
            input,
            encoder,
            counters,
            clock: SessionClock::start(),
        })
    }

    fn data_callback(encoder: EncoderHandle, counters: Arc<WriteCounters>) -> CaptureDataCallback {
        Arc::new(move |data: &[u8]| -> Result<(), SessionError> {
            let written = encoder.with(|e| {
                e.write(data)?;
                counters.record(data.len());
                Ok::<(), SessionError>(())
            });
            match written {
                Some(result) => result,
                None => {
                    log::trace!("dropping {} bytes captured after the encoder closed", data.len());
                    Ok(())
                }
            }
        })
    }

    fn stopped_callback(&self, generation: u64) -> StreamStoppedCallback {
        let shared = Arc::downgrade(&self.shared);
        let delegates = Arc::clone(&self.delegates);
        Arc::new(move |error: Option<SessionError>| {
            if let Some(shared) = shared.upgrade() {
                finish_from_driver(&shared, &delegates, generation, error);
            }
        })
    }
}

impl Drop for RecordingController {
    fn drop(&mut self) {
        let detached = self.shared.lock().session.take();
        if let Some(active) = detached {
            let id = active.id;
            if let Err(e) = active.release() {
                log::warn!("failed to finalize recording {} on drop: {}", id, e);
            }
        }
    }
}

/// Driver-side end of a recording activation: the device stopped on its
/// own, or reported a fault (including a buffer the encoder rejected).
fn finish_from_driver(
    shared: &Mutex<RecorderShared>,
    delegates: &DelegateList<dyn RecordingDelegate>,
    generation: u64,
    error: Option<SessionError>,
) {
    let detached = {
        let mut shared = shared.lock();
        if shared.session.active().map(|a| a.generation) != Some(generation) {
            log::debug!("ignoring stop event from finished recording generation {}", generation);
            return;
        }
        if let Some(err) = &error {
            shared.fault = Some(err.clone());
        }
        shared.session.take()
    };
    let Some(active) = detached else {
        return;
    };

    let id = active.id;
    let outcome = active.release();
    let fault = match (error, outcome) {
        (None, Ok(result)) => {
            log::info!("recording {} ended by device after {:.1}s", id, result.duration_secs);
            delegates.notify(|d| d.on_state_changed(RecordingState::Stopped));
            delegates.notify(|d| d.on_recording_finished(&result));
            return;
        }
        (Some(err), outcome) => {
            if let Err(secondary) = outcome {
                log::warn!("release after recording fault also failed: {}", secondary);
            }
            err
        }
        (None, Err(err)) => {
            let mut shared = shared.lock();
            if shared.generation == generation {
                shared.fault = Some(err.clone());
            }
            err
        }
    };

    log::error!("recording {} stopped by fault: {}", id, fault);
    delegates.notify(|d| d.on_state_changed(RecordingState::Stopped));
    delegates.notify(|d| d.on_error(&fault));
}
