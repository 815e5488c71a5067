//! Audio file decoding using symphonia.
//!
//! Opens MP3 and WAV files and yields interleaved little-endian `f32`
//! frames at the file's own rate and channel count. The render backend
//! converts to the device mix format.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::models::device::StreamFormat;
use crate::models::error::SessionError;
use crate::traits::codec::Decoder;

const SAMPLE_BYTES: usize = std::mem::size_of::<f32>();

/// Streams decoded frames from one audio file.
pub struct AudioFileDecoder {
    /// `None` once the file is exhausted or closed.
    reader: Option<Box<dyn FormatReader>>,
    decoder: Box<dyn symphonia::core::codecs::Decoder>,
    track_id: u32,
    format: StreamFormat,
    samples: Option<SampleBuffer<f32>>,
    /// Decoded bytes of the current packet not yet handed out.
    pending: Vec<u8>,
    offset: usize,
}

impl AudioFileDecoder {
    /// Probe the container and prepare a decoder for its first audio track.
    pub fn open(path: &Path) -> Result<Self, SessionError> {
        let file = File::open(path)
            .map_err(|e| SessionError::Io(format!("failed to open {}: {}", path.display(), e)))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| SessionError::Io(format!("unsupported audio file {}: {}", path.display(), e)))?;
        let reader = probed.format;

        let track = reader
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| SessionError::Io(format!("no audio track in {}", path.display())))?;

        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| SessionError::Io(format!("unknown sample rate in {}", path.display())))?;
        let channels = track
            .codec_params
            .channels
            .map(|c| c.count() as u16)
            .filter(|&c| c > 0)
            .ok_or_else(|| SessionError::Io(format!("unknown channel layout in {}", path.display())))?;
        let track_id = track.id;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| SessionError::Io(format!("failed to create decoder for {}: {}", path.display(), e)))?;

        log::debug!("reading {} ({} Hz, {} ch)", path.display(), sample_rate, channels);
        Ok(Self {
            reader: Some(reader),
            decoder,
            track_id,
            format: StreamFormat::float32(sample_rate, channels),
            samples: None,
            pending: Vec::new(),
            offset: 0,
        })
    }

    /// Decode the next packet of our track into `pending`.
    /// Returns `false` at end of stream.
    fn decode_next(&mut self) -> Result<bool, SessionError> {
        loop {
            let packet = match self.reader.as_mut().map(|r| r.next_packet()) {
                None => return Ok(false),
                Some(Ok(packet)) => packet,
                Some(Err(SymphoniaError::IoError(e))) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    self.reader = None;
                    return Ok(false);
                }
                Some(Err(SymphoniaError::ResetRequired)) => {
                    self.decoder.reset();
                    continue;
                }
                Some(Err(e)) => return Err(SessionError::Io(format!("failed to read packet: {}", e))),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    log::warn!("skipping undecodable packet: {}", e);
                    continue;
                }
                Err(e) => return Err(SessionError::Io(format!("decode failed: {}", e))),
            };
            if decoded.frames() == 0 {
                continue;
            }

            let spec = *decoded.spec();
            if spec.channels.count() != self.format.channels as usize {
                return Err(SessionError::Io(format!(
                    "channel count changed mid-stream: {} -> {}",
                    self.format.channels,
                    spec.channels.count()
                )));
            }

            let needed = decoded.capacity() * spec.channels.count();
            if self.samples.as_ref().map_or(true, |s| s.capacity() < needed) {
                self.samples = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
            }
            let Some(samples) = self.samples.as_mut() else {
                continue;
            };
            samples.copy_interleaved_ref(decoded);

            self.pending.clear();
            self.pending.reserve(samples.len() * SAMPLE_BYTES);
            for sample in samples.samples() {
                self.pending.extend_from_slice(&sample.to_le_bytes());
            }
            self.offset = 0;
            return Ok(true);
        }
    }
}

impl Decoder for AudioFileDecoder {
    fn format(&self) -> StreamFormat {
        self.format
    }

    /// Fill `buf` with whole frames. `buf` must hold at least one frame.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SessionError> {
        let block = self.format.block_align() as usize;
        let mut filled = 0;

        while buf.len() - filled >= block {
            if self.offset == self.pending.len() && !self.decode_next()? {
                break;
            }
            let available = self.pending.len() - self.offset;
            let room = buf.len() - filled;
            let n = available.min(room - room % block);
            buf[filled..filled + n].copy_from_slice(&self.pending[self.offset..self.offset + n]);
            filled += n;
            self.offset += n;
        }
        Ok(filled)
    }

    fn close(&mut self) -> Result<(), SessionError> {
        self.reader = None;
        self.pending.clear();
        self.offset = 0;
        Ok(())
    }
}
