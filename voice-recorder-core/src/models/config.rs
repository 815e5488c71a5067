use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::error::SessionError;

/// Lowest and highest encoder bitrates accepted, in kbit/s.
pub const MIN_BITRATE_KBPS: u32 = 8;
pub const MAX_BITRATE_KBPS: u32 = 320;

/// Container written by the bundled codecs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputCodec {
    /// Constant-bitrate MP3 at `bitrate_kbps`.
    #[default]
    Mp3,
    /// Uncompressed WAV; `bitrate_kbps` is validated but unused.
    Wav,
}

/// Configuration shared by the player and the recorder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfiguration {
    /// Where recordings are written; also the initial playback file.
    pub recording_path: PathBuf,

    /// Target encoder bitrate in kbit/s (default: 128).
    pub bitrate_kbps: u32,

    /// Codec used by [`codec_for`](crate::storage::codec_for) (default: MP3).
    pub codec: OutputCodec,

    /// Create the parent directory of the output file if missing (default: true).
    pub create_missing_dirs: bool,
}

impl SessionConfiguration {
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.recording_path.as_os_str().is_empty() {
            return Err(SessionError::Configuration("recording path is empty".into()));
        }
        if !(MIN_BITRATE_KBPS..=MAX_BITRATE_KBPS).contains(&self.bitrate_kbps) {
            return Err(SessionError::Configuration(format!(
                "unsupported bitrate: {} kbps",
                self.bitrate_kbps
            )));
        }
        Ok(())
    }

    /// Parse a JSON document. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, SessionError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| SessionError::Configuration(format!("failed to parse configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for SessionConfiguration {
    fn default() -> Self {
        Self {
            recording_path: PathBuf::from("tmp_audio.mp3"),
            bitrate_kbps: 128,
            codec: OutputCodec::Mp3,
            create_missing_dirs: true,
        }
    }
}
