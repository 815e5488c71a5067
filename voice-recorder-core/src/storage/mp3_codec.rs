use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use mp3lame_encoder::{Bitrate, Builder, FlushNoGap, InterleavedPcm, MonoPcm, Quality};

use crate::models::config::{SessionConfiguration, MAX_BITRATE_KBPS, MIN_BITRATE_KBPS};
use crate::models::device::StreamFormat;
use crate::models::error::SessionError;
use crate::processing::pcm;
use crate::storage::audio_decoder::AudioFileDecoder;
use crate::storage::output_file;
use crate::traits::codec::{CodecProvider, Decoder, Encoder, EncoderSummary};

/// MP3 codec: LAME for recording, symphonia for playback.
#[derive(Debug, Clone)]
pub struct Mp3Codec {
    create_missing_dirs: bool,
}

impl Mp3Codec {
    pub fn new(create_missing_dirs: bool) -> Self {
        Self { create_missing_dirs }
    }

    pub fn from_config(config: &SessionConfiguration) -> Self {
        Self::new(config.create_missing_dirs)
    }
}

impl Default for Mp3Codec {
    fn default() -> Self {
        Self::new(true)
    }
}

impl CodecProvider for Mp3Codec {
    fn open_decoder(&self, path: &Path) -> Result<Box<dyn Decoder>, SessionError> {
        Ok(Box::new(AudioFileDecoder::open(path)?))
    }

    fn open_encoder(
        &self,
        path: &Path,
        format: &StreamFormat,
        bitrate_kbps: u32,
    ) -> Result<Box<dyn Encoder>, SessionError> {
        Ok(Box::new(Mp3FileEncoder::create(
            path,
            format,
            bitrate_kbps,
            self.create_missing_dirs,
        )?))
    }
}

/// Constant-bitrate MP3 writer fed with interleaved capture frames.
///
/// LAME takes one or two channels; wider captures keep their first two.
pub struct Mp3FileEncoder {
    file_path: PathBuf,
    file: Option<BufWriter<File>>,
    lame: mp3lame_encoder::Encoder,
    input: StreamFormat,
    channels: u16,
    pcm: Vec<i16>,
    mp3: Vec<u8>,
    bytes_written: u64,
}

// SAFETY: the LAME context is owned exclusively by this encoder and has no
// thread affinity; it is only ever used through `&mut self`.
unsafe impl Send for Mp3FileEncoder {}

impl Mp3FileEncoder {
    pub fn create(
        path: &Path,
        format: &StreamFormat,
        bitrate_kbps: u32,
        create_missing_dirs: bool,
    ) -> Result<Self, SessionError> {
        let bitrate = lame_bitrate(bitrate_kbps)?;
        let channels = format.channels.clamp(1, 2);

        let lame_error = |what: &str, e: mp3lame_encoder::BuildError| {
            SessionError::Configuration(format!("LAME rejected {}: {:?}", what, e))
        };
        let mut builder = Builder::new().ok_or_else(|| SessionError::Io("failed to allocate LAME encoder".into()))?;
        builder
            .set_num_channels(channels as u8)
            .map_err(|e| lame_error("channel count", e))?;
        builder
            .set_sample_rate(format.sample_rate)
            .map_err(|e| lame_error("sample rate", e))?;
        builder.set_brate(bitrate).map_err(|e| lame_error("bitrate", e))?;
        builder.set_quality(Quality::Good).map_err(|e| lame_error("quality", e))?;
        let lame = builder.build().map_err(|e| lame_error("parameters", e))?;

        let file = output_file::create(path, create_missing_dirs)?;

        log::debug!(
            "writing {} ({} Hz, {} ch, {} kbps MP3)",
            path.display(),
            format.sample_rate,
            channels,
            bitrate_kbps
        );
        Ok(Self {
            file_path: path.to_path_buf(),
            file: Some(BufWriter::new(file)),
            lame,
            input: *format,
            channels,
            pcm: Vec::new(),
            mp3: Vec::new(),
            bytes_written: 0,
        })
    }

    fn write_out(&mut self) -> Result<(), SessionError> {
        let file = self
            .file
            .as_mut()
            .ok_or_else(|| SessionError::Io("file is not open for writing".into()))?;
        file.write_all(&self.mp3)
            .map_err(|e| SessionError::Io(format!("write failed: {}", e)))?;
        self.bytes_written += self.mp3.len() as u64;
        self.mp3.clear();
        Ok(())
    }
}

impl Encoder for Mp3FileEncoder {
    fn write(&mut self, data: &[u8]) -> Result<(), SessionError> {
        if self.file.is_none() {
            return Err(SessionError::Io("file is not open for writing".into()));
        }
        self.pcm.clear();
        pcm::append_i16(data, &self.input, self.channels, &mut self.pcm)?;
        let frames = self.pcm.len() / self.channels as usize;
        if frames == 0 {
            return Ok(());
        }

        self.mp3.clear();
        self.mp3.reserve(mp3lame_encoder::max_required_buffer_size(frames));
        let encoded = if self.channels == 1 {
            self.lame.encode_to_vec(MonoPcm(&self.pcm), &mut self.mp3)
        } else {
            self.lame.encode_to_vec(InterleavedPcm(&self.pcm), &mut self.mp3)
        };
        encoded.map_err(|e| SessionError::Io(format!("MP3 encoding failed: {:?}", e)))?;
        self.write_out()
    }

    /// Flush LAME, sync the file and compute its SHA-256.
    fn close(&mut self) -> Result<EncoderSummary, SessionError> {
        if self.file.is_none() {
            return Err(SessionError::Io("file is not open".into()));
        }

        self.mp3.clear();
        self.mp3.reserve(mp3lame_encoder::max_required_buffer_size(0));
        self.lame
            .flush_to_vec::<FlushNoGap>(&mut self.mp3)
            .map_err(|e| SessionError::Io(format!("MP3 flush failed: {:?}", e)))?;
        self.write_out()?;

        let Some(writer) = self.file.take() else {
            return Err(SessionError::Io("file is not open".into()));
        };
        let file = writer
            .into_inner()
            .map_err(|e| SessionError::Io(format!("flush failed: {}", e.error())))?;
        file.sync_all()?;
        drop(file);

        let checksum = output_file::sha256_file(&self.file_path)?;
        log::debug!("finalized {} ({} bytes)", self.file_path.display(), self.bytes_written);
        Ok(EncoderSummary {
            file_size: self.bytes_written,
            checksum,
        })
    }
}

/// Map a validated bitrate to the nearest LAME rate not above it.
fn lame_bitrate(kbps: u32) -> Result<Bitrate, SessionError> {
    if !(MIN_BITRATE_KBPS..=MAX_BITRATE_KBPS).contains(&kbps) {
        return Err(SessionError::Configuration(format!("unsupported bitrate: {} kbps", kbps)));
    }
    Ok(match kbps {
        320.. => Bitrate::Kbps320,
        256.. => Bitrate::Kbps256,
        224.. => Bitrate::Kbps224,
        192.. => Bitrate::Kbps192,
        160.. => Bitrate::Kbps160,
        128.. => Bitrate::Kbps128,
        112.. => Bitrate::Kbps112,
        96.. => Bitrate::Kbps96,
        80.. => Bitrate::Kbps80,
        64.. => Bitrate::Kbps64,
        48.. => Bitrate::Kbps48,
        40.. => Bitrate::Kbps40,
        32.. => Bitrate::Kbps32,
        24.. => Bitrate::Kbps24,
        16.. => Bitrate::Kbps16,
        _ => Bitrate::Kbps8,
    })
}
