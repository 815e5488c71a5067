//! Scripted collaborators for controller tests. Every call lands in a shared
//! [`Journal`] so tests can assert on cross-component ordering.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::device::{AudioDevice, StreamFormat};
use crate::models::error::SessionError;
use crate::models::recording_result::RecordingResult;
use crate::models::state::{PlaybackState, RecordingState};
use crate::traits::capture_provider::{CaptureDataCallback, CaptureProvider, CaptureStream};
use crate::traits::codec::{CodecProvider, Decoder, DecoderHandle, Encoder, EncoderSummary};
use crate::traits::device_registry::DeviceRegistry;
use crate::traits::output_provider::{OutputProvider, OutputStream, StreamStoppedCallback};
use crate::traits::session_delegate::{PlaybackDelegate, RecordingDelegate};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    DecoderOpened(PathBuf),
    DecoderClosed,
    EncoderOpened { path: PathBuf, bitrate_kbps: u32 },
    EncoderWrite(Vec<u8>),
    EncoderClosed,
    OutputOpened,
    OutputPlay,
    OutputPause,
    OutputStop,
    CaptureOpened(String),
    CaptureStart,
    CapturePause,
    CaptureStop,
}

#[derive(Clone, Default)]
pub struct Journal(Arc<Mutex<Vec<Call>>>);

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&self, call: Call) {
        self.0.lock().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().clone()
    }

    pub fn count(&self, call: &Call) -> usize {
        self.0.lock().iter().filter(|c| *c == call).count()
    }

    pub fn writes(&self) -> Vec<Vec<u8>> {
        self.0
            .lock()
            .iter()
            .filter_map(|c| match c {
                Call::EncoderWrite(data) => Some(data.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn position(&self, call: &Call) -> Option<usize> {
        self.0.lock().iter().position(|c| c == call)
    }
}

type Hook<R> = Box<dyn FnOnce() -> R + Send>;

/// One-shot hook run by the next call to a stream method.
type HookSlot<R> = Arc<Mutex<Option<Hook<R>>>>;

fn fail_if(flag: &AtomicBool, error: SessionError) -> Result<(), SessionError> {
    if flag.load(Ordering::SeqCst) {
        Err(error)
    } else {
        Ok(())
    }
}

// -- codec --

#[derive(Default)]
pub struct CodecFlags {
    pub fail_decoder_open: AtomicBool,
    pub fail_encoder_open: AtomicBool,
    pub fail_writes: AtomicBool,
}

pub struct MockCodec {
    journal: Journal,
    pub flags: Arc<CodecFlags>,
}

impl MockCodec {
    pub fn new(journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            journal: journal.clone(),
            flags: Arc::new(CodecFlags::default()),
        })
    }
}

impl CodecProvider for MockCodec {
    fn open_decoder(&self, path: &Path) -> Result<Box<dyn Decoder>, SessionError> {
        fail_if(&self.flags.fail_decoder_open, SessionError::Io("file not found".into()))?;
        self.journal.push(Call::DecoderOpened(path.to_path_buf()));
        Ok(Box::new(MockDecoder {
            journal: self.journal.clone(),
        }))
    }

    fn open_encoder(
        &self,
        path: &Path,
        _format: &StreamFormat,
        bitrate_kbps: u32,
    ) -> Result<Box<dyn Encoder>, SessionError> {
        fail_if(&self.flags.fail_encoder_open, SessionError::Io("read-only file system".into()))?;
        self.journal.push(Call::EncoderOpened {
            path: path.to_path_buf(),
            bitrate_kbps,
        });
        Ok(Box::new(MockEncoder {
            journal: self.journal.clone(),
            flags: Arc::clone(&self.flags),
            bytes: 0,
        }))
    }
}

struct MockDecoder {
    journal: Journal,
}

impl Decoder for MockDecoder {
    fn format(&self) -> StreamFormat {
        StreamFormat::pcm16(44100, 2)
    }

    fn read(&mut self, _buf: &mut [u8]) -> Result<usize, SessionError> {
        Ok(0)
    }

    fn close(&mut self) -> Result<(), SessionError> {
        self.journal.push(Call::DecoderClosed);
        Ok(())
    }
}

struct MockEncoder {
    journal: Journal,
    flags: Arc<CodecFlags>,
    bytes: u64,
}

impl Encoder for MockEncoder {
    fn write(&mut self, data: &[u8]) -> Result<(), SessionError> {
        fail_if(&self.flags.fail_writes, SessionError::Io("disk full".into()))?;
        self.bytes += data.len() as u64;
        self.journal.push(Call::EncoderWrite(data.to_vec()));
        Ok(())
    }

    fn close(&mut self) -> Result<EncoderSummary, SessionError> {
        self.journal.push(Call::EncoderClosed);
        Ok(EncoderSummary {
            file_size: 44 + self.bytes,
            checksum: "mock".into(),
        })
    }
}

// -- output --

#[derive(Default)]
pub struct OutputFlags {
    pub fail_open: AtomicBool,
    pub fail_play: AtomicBool,
    pub fail_pause: AtomicBool,
}

pub struct MockOutput {
    journal: Journal,
    pub flags: Arc<OutputFlags>,
    last: Mutex<Option<(DecoderHandle, StreamStoppedCallback)>>,
    pause_hook: HookSlot<Result<(), SessionError>>,
}

impl MockOutput {
    pub fn new(journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            journal: journal.clone(),
            flags: Arc::new(OutputFlags::default()),
            last: Mutex::new(None),
            pause_hook: Arc::default(),
        })
    }

    /// Run `hook` at the start of the next `pause()`; an error from it is returned.
    pub fn on_next_pause(&self, hook: impl FnOnce() -> Result<(), SessionError> + Send + 'static) {
        *self.pause_hook.lock() = Some(Box::new(hook));
    }

    pub fn source(&self) -> Option<DecoderHandle> {
        self.last.lock().as_ref().map(|(source, _)| source.clone())
    }

    pub fn stopped_callback(&self) -> Option<StreamStoppedCallback> {
        self.last.lock().as_ref().map(|(_, callback)| Arc::clone(callback))
    }

    /// Simulate the driver reaching end of file.
    pub fn complete(&self) {
        if let Some(callback) = self.stopped_callback() {
            callback(None);
        }
    }

    pub fn fault(&self, error: SessionError) {
        if let Some(callback) = self.stopped_callback() {
            callback(Some(error));
        }
    }
}

impl OutputProvider for MockOutput {
    fn open_output(
        &self,
        source: DecoderHandle,
        on_stopped: StreamStoppedCallback,
    ) -> Result<Box<dyn OutputStream>, SessionError> {
        fail_if(&self.flags.fail_open, SessionError::Device("device busy".into()))?;
        self.journal.push(Call::OutputOpened);
        *self.last.lock() = Some((source, on_stopped));
        Ok(Box::new(MockOutputStream {
            journal: self.journal.clone(),
            flags: Arc::clone(&self.flags),
            pause_hook: Arc::clone(&self.pause_hook),
        }))
    }
}

struct MockOutputStream {
    journal: Journal,
    flags: Arc<OutputFlags>,
    pause_hook: HookSlot<Result<(), SessionError>>,
}

impl OutputStream for MockOutputStream {
    fn play(&mut self) -> Result<(), SessionError> {
        fail_if(&self.flags.fail_play, SessionError::Device("render failed".into()))?;
        self.journal.push(Call::OutputPlay);
        Ok(())
    }

    fn pause(&mut self) -> Result<(), SessionError> {
        let hook = self.pause_hook.lock().take();
        if let Some(hook) = hook {
            hook()?;
        }
        fail_if(&self.flags.fail_pause, SessionError::Device("pause failed".into()))?;
        self.journal.push(Call::OutputPause);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), SessionError> {
        self.journal.push(Call::OutputStop);
        Ok(())
    }
}

// -- capture --

#[derive(Default)]
pub struct CaptureFlags {
    pub fail_open: AtomicBool,
    pub fail_start: AtomicBool,
}

pub struct MockCapture {
    journal: Journal,
    pub flags: Arc<CaptureFlags>,
    last: Mutex<Option<(CaptureDataCallback, StreamStoppedCallback)>>,
    stop_hook: HookSlot<()>,
}

impl MockCapture {
    pub fn new(journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            journal: journal.clone(),
            flags: Arc::new(CaptureFlags::default()),
            last: Mutex::new(None),
            stop_hook: Arc::default(),
        })
    }

    /// Run `hook` at the start of the next `stop()` on any stream.
    pub fn on_next_stop(&self, hook: impl FnOnce() + Send + 'static) {
        *self.stop_hook.lock() = Some(Box::new(hook));
    }

    pub fn data_callback(&self) -> Option<CaptureDataCallback> {
        self.last.lock().as_ref().map(|(data, _)| Arc::clone(data))
    }

    pub fn stopped_callback(&self) -> Option<StreamStoppedCallback> {
        self.last.lock().as_ref().map(|(_, stopped)| Arc::clone(stopped))
    }

    /// Simulate the driver delivering one buffer. A rejected buffer ends
    /// the stream the way a real driver thread would.
    pub fn deliver(&self, data: &[u8]) {
        if let Some(callback) = self.data_callback() {
            if let Err(err) = callback(data) {
                self.device_stopped(Some(err));
            }
        }
    }

    /// Simulate the driver ending the stream on its own.
    pub fn device_stopped(&self, error: Option<SessionError>) {
        if let Some(callback) = self.stopped_callback() {
            callback(error);
        }
    }
}

impl CaptureProvider for MockCapture {
    fn open_capture(
        &self,
        device: &AudioDevice,
        on_data: CaptureDataCallback,
        on_stopped: StreamStoppedCallback,
    ) -> Result<Box<dyn CaptureStream>, SessionError> {
        fail_if(&self.flags.fail_open, SessionError::Device("device in use".into()))?;
        self.journal.push(Call::CaptureOpened(device.id.clone()));
        *self.last.lock() = Some((on_data, on_stopped));
        Ok(Box::new(MockCaptureStream {
            journal: self.journal.clone(),
            flags: Arc::clone(&self.flags),
            stop_hook: Arc::clone(&self.stop_hook),
        }))
    }
}

struct MockCaptureStream {
    journal: Journal,
    flags: Arc<CaptureFlags>,
    stop_hook: HookSlot<()>,
}

impl CaptureStream for MockCaptureStream {
    fn format(&self) -> StreamFormat {
        StreamFormat::float32(48000, 2)
    }

    fn start(&mut self) -> Result<(), SessionError> {
        fail_if(&self.flags.fail_start, SessionError::Device("start failed".into()))?;
        self.journal.push(Call::CaptureStart);
        Ok(())
    }

    fn pause(&mut self) -> Result<(), SessionError> {
        self.journal.push(Call::CapturePause);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), SessionError> {
        let hook = self.stop_hook.lock().take();
        if let Some(hook) = hook {
            hook();
        }
        self.journal.push(Call::CaptureStop);
        Ok(())
    }
}

// -- devices --

pub fn mic(id: &str, name: &str) -> AudioDevice {
    AudioDevice::new(id, name)
}

pub struct MockRegistry {
    pub devices: Vec<AudioDevice>,
    pub default: AudioDevice,
}

impl MockRegistry {
    pub fn two_mics() -> Self {
        let mut builtin = mic("mic-builtin", "Built-in Microphone");
        builtin.is_default = true;
        Self {
            devices: vec![builtin.clone(), mic("mic-usb", "USB Microphone")],
            default: builtin,
        }
    }
}

impl DeviceRegistry for MockRegistry {
    fn list_devices(&self) -> Result<Vec<AudioDevice>, SessionError> {
        Ok(self.devices.clone())
    }

    fn default_device(&self) -> Result<AudioDevice, SessionError> {
        Ok(self.default.clone())
    }
}

// -- notifications --

#[derive(Debug, Clone, PartialEq)]
pub enum Notified {
    PlaybackState(PlaybackState),
    PlaybackFinished(PathBuf),
    RecordingState(RecordingState),
    RecordingFinished(RecordingResult),
    Error(SessionError),
}

/// Delegate that keeps every notification, plus a copy of the journal taken
/// the moment a "finished" notification arrives.
pub struct EventRecorder {
    journal: Journal,
    events: Mutex<Vec<Notified>>,
    journal_at_finish: Mutex<Option<Vec<Call>>>,
}

impl EventRecorder {
    pub fn new(journal: &Journal) -> Arc<Self> {
        Arc::new(Self {
            journal: journal.clone(),
            events: Mutex::new(Vec::new()),
            journal_at_finish: Mutex::new(None),
        })
    }

    pub fn events(&self) -> Vec<Notified> {
        self.events.lock().clone()
    }

    pub fn playback_finished_count(&self) -> usize {
        self.events()
            .iter()
            .filter(|e| matches!(e, Notified::PlaybackFinished(_)))
            .count()
    }

    pub fn recording_results(&self) -> Vec<RecordingResult> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Notified::RecordingFinished(result) => Some(result),
                _ => None,
            })
            .collect()
    }

    pub fn errors(&self) -> Vec<SessionError> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Notified::Error(err) => Some(err),
                _ => None,
            })
            .collect()
    }

    pub fn journal_at_finish(&self) -> Option<Vec<Call>> {
        self.journal_at_finish.lock().clone()
    }

    fn record(&self, event: Notified) {
        self.events.lock().push(event);
    }
}

impl PlaybackDelegate for EventRecorder {
    fn on_state_changed(&self, state: PlaybackState) {
        self.record(Notified::PlaybackState(state));
    }

    fn on_playback_finished(&self, file: &Path) {
        *self.journal_at_finish.lock() = Some(self.journal.calls());
        self.record(Notified::PlaybackFinished(file.to_path_buf()));
    }

    fn on_error(&self, error: &SessionError) {
        self.record(Notified::Error(error.clone()));
    }
}

impl RecordingDelegate for EventRecorder {
    fn on_state_changed(&self, state: RecordingState) {
        self.record(Notified::RecordingState(state));
    }

    fn on_recording_finished(&self, result: &RecordingResult) {
        *self.journal_at_finish.lock() = Some(self.journal.calls());
        self.record(Notified::RecordingFinished(result.clone()));
    }

    fn on_error(&self, error: &SessionError) {
        self.record(Notified::Error(error.clone()));
    }
}
