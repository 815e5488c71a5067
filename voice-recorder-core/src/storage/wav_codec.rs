use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::models::config::{SessionConfiguration, MAX_BITRATE_KBPS, MIN_BITRATE_KBPS};
use crate::models::device::StreamFormat;
use crate::models::error::SessionError;
use crate::processing::wav_format::{self, DATA_SIZE_OFFSET, RIFF_SIZE_OFFSET, WAV_HEADER_SIZE};
use crate::storage::audio_decoder::AudioFileDecoder;
use crate::storage::output_file;
use crate::traits::codec::{CodecProvider, Decoder, Encoder, EncoderSummary};

/// Uncompressed WAV codec, the lossless alternative to [`Mp3Codec`].
///
/// Frames are stored as delivered by the device, so the encoder bitrate is
/// validated but has no effect on the output.
///
/// [`Mp3Codec`]: crate::storage::mp3_codec::Mp3Codec
#[derive(Debug, Clone)]
pub struct WavCodec {
    create_missing_dirs: bool,
}

impl WavCodec {
    pub fn new(create_missing_dirs: bool) -> Self {
        Self { create_missing_dirs }
    }

    pub fn from_config(config: &SessionConfiguration) -> Self {
        Self::new(config.create_missing_dirs)
    }
}

impl Default for WavCodec {
    fn default() -> Self {
        Self::new(true)
    }
}

impl CodecProvider for WavCodec {
    fn open_decoder(&self, path: &Path) -> Result<Box<dyn Decoder>, SessionError> {
        Ok(Box::new(AudioFileDecoder::open(path)?))
    }

    fn open_encoder(
        &self,
        path: &Path,
        format: &StreamFormat,
        bitrate_kbps: u32,
    ) -> Result<Box<dyn Encoder>, SessionError> {
        if !(MIN_BITRATE_KBPS..=MAX_BITRATE_KBPS).contains(&bitrate_kbps) {
            return Err(SessionError::Configuration(format!(
                "unsupported bitrate: {} kbps",
                bitrate_kbps
            )));
        }
        Ok(Box::new(WavFileEncoder::create(path, format, self.create_missing_dirs)?))
    }
}

/// Streaming WAV writer.
///
/// ## File Format
///
/// ```text
/// [44-byte WAV header, sizes zero until close]
/// [interleaved frames as delivered...]
/// ```
pub struct WavFileEncoder {
    file_path: PathBuf,
    file: Option<BufWriter<File>>,
    data_bytes: u64,
}

impl WavFileEncoder {
    /// Create the file and write a placeholder header.
    pub fn create(path: &Path, format: &StreamFormat, create_missing_dirs: bool) -> Result<Self, SessionError> {
        let mut file = BufWriter::new(output_file::create(path, create_missing_dirs)?);
        file.write_all(&wav_format::generate_wav_header(format, 0))?;

        log::debug!(
            "writing {} ({} Hz, {} ch, {} bit {:?})",
            path.display(),
            format.sample_rate,
            format.channels,
            format.bits_per_sample,
            format.encoding
        );
        Ok(Self {
            file_path: path.to_path_buf(),
            file: Some(file),
            data_bytes: 0,
        })
    }
}

impl Encoder for WavFileEncoder {
    fn write(&mut self, data: &[u8]) -> Result<(), SessionError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| SessionError::Io("file is not open for writing".into()))?;
        if self.data_bytes + data.len() as u64 > (u32::MAX as u64 - 36) {
            return Err(SessionError::Io("WAV data chunk would exceed 4 GiB".into()));
        }
        file.write_all(data)
            .map_err(|e| SessionError::Io(format!("write failed: {}", e)))?;
        self.data_bytes += data.len() as u64;
        Ok(())
    }

    /// Patch header sizes, flush, and compute the SHA-256 of the finished file.
    fn close(&mut self) -> Result<EncoderSummary, SessionError> {
        let mut writer = self
            .file
            .take()
            .ok_or_else(|| SessionError::Io("file is not open".into()))?;
        writer.flush()?;
        let mut file = writer
            .into_inner()
            .map_err(|e| SessionError::Io(format!("flush failed: {}", e.error())))?;

        let data_size = self.data_bytes as u32;
        file.seek(SeekFrom::Start(RIFF_SIZE_OFFSET))?;
        file.write_all(&(36 + data_size).to_le_bytes())?;
        file.seek(SeekFrom::Start(DATA_SIZE_OFFSET))?;
        file.write_all(&data_size.to_le_bytes())?;
        file.sync_all()?;
        drop(file);

        let file_size = WAV_HEADER_SIZE as u64 + self.data_bytes;
        let checksum = output_file::sha256_file(&self.file_path)?;
        log::debug!("finalized {} ({} bytes)", self.file_path.display(), file_size);
        Ok(EncoderSummary { file_size, checksum })
    }
}
