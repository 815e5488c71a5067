//! # voice-recorder-core
//!
//! Platform-agnostic playback and recording controllers.
//!
//! Each controller is a small state machine (`Stopped`, active, `Paused`)
//! that owns its hardware and codec handles exclusively and releases them on
//! every return to `Stopped`. Platform backends (Windows WASAPI) implement
//! the device traits. `Mp3Codec` (LAME encoder, symphonia decoder) is the
//! bundled default codec and `WavCodec` the uncompressed alternative.
//!
//! ## Architecture
//!
//! ```text
//! voice-recorder-core (this crate)
//! ├── traits/       ← CodecProvider, OutputProvider, CaptureProvider, DeviceRegistry, delegates
//! ├── models/       ← SessionError, PlaybackState, RecordingState, SessionConfiguration, AudioDevice
//! ├── processing/   ← WAV header generation, capture sample conversion
//! ├── session/      ← PlaybackController, RecordingController, SessionFacade
//! └── storage/      ← Mp3Codec, WavCodec, AudioFileDecoder
//! ```

pub mod models;
pub mod processing;
pub mod session;
pub mod storage;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types at crate root for convenience.
pub use models::config::{OutputCodec, SessionConfiguration};
pub use models::device::{AudioDevice, AudioTransportType, SampleEncoding, StreamFormat};
pub use models::error::SessionError;
pub use models::recording_result::RecordingResult;
pub use models::state::{PlaybackState, RecordingState};
pub use session::facade::{SessionFacade, SessionStatus};
pub use session::player::PlaybackController;
pub use session::recorder::RecordingController;
pub use storage::audio_decoder::AudioFileDecoder;
pub use storage::codec_for;
pub use storage::mp3_codec::Mp3Codec;
pub use storage::wav_codec::WavCodec;
pub use traits::capture_provider::{CaptureDataCallback, CaptureProvider, CaptureStream};
pub use traits::codec::{CodecHandle, CodecProvider, Decoder, DecoderHandle, Encoder, EncoderHandle, EncoderSummary};
pub use traits::device_registry::DeviceRegistry;
pub use traits::output_provider::{OutputProvider, OutputStream, StreamStoppedCallback};
pub use traits::session_delegate::{PlaybackDelegate, RecordingDelegate};
