use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Returned by `stop_recording` once the output file has been finalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingResult {
    pub id: Uuid,
    pub file_path: PathBuf,
    /// Active capture time; paused intervals are excluded.
    pub duration_secs: f64,
    /// Captured buffers handed to the encoder.
    pub buffers_written: u64,
    /// Captured payload bytes handed to the encoder.
    pub bytes_written: u64,
    /// Size of the finished file as reported by the encoder.
    pub file_size: u64,
    /// SHA-256 hex digest of the finished file, empty if the encoder did not compute one.
    pub checksum: String,
    /// RFC 3339 timestamp of when capture started.
    pub created_at: String,
}
