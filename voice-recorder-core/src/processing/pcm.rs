//! Conversion of captured interleaved frames to 16-bit samples.

use crate::models::device::{SampleEncoding, StreamFormat};
use crate::models::error::SessionError;

/// Append the first `keep_channels` channels of every frame in `data` to
/// `out` as `i16` samples, still interleaved.
///
/// `data` must hold whole frames of `format`.
pub fn append_i16(
    data: &[u8],
    format: &StreamFormat,
    keep_channels: u16,
    out: &mut Vec<i16>,
) -> Result<(), SessionError> {
    let sample_bytes = (format.bits_per_sample / 8) as usize;
    let block = format.block_align() as usize;
    if block == 0 || data.len() % block != 0 {
        return Err(SessionError::Io(format!(
            "buffer of {} bytes is not a whole number of {}-byte frames",
            data.len(),
            block
        )));
    }
    let convert = converter(format)?;
    let keep = keep_channels.min(format.channels) as usize;

    out.reserve(data.len() / block * keep);
    for frame in data.chunks_exact(block) {
        for sample in frame.chunks_exact(sample_bytes).take(keep) {
            out.push(convert(sample));
        }
    }
    Ok(())
}

fn converter(format: &StreamFormat) -> Result<fn(&[u8]) -> i16, SessionError> {
    let convert: fn(&[u8]) -> i16 = match (format.encoding, format.bits_per_sample) {
        (SampleEncoding::Pcm, 8) => |s| ((s[0] as i16) - 128) << 8,
        (SampleEncoding::Pcm, 16) => |s| i16::from_le_bytes([s[0], s[1]]),
        (SampleEncoding::Pcm, 24) => |s| i16::from_le_bytes([s[1], s[2]]),
        (SampleEncoding::Pcm, 32) => |s| i16::from_le_bytes([s[2], s[3]]),
        (SampleEncoding::Float, 32) => |s| float_to_i16(f32::from_le_bytes([s[0], s[1], s[2], s[3]]) as f64),
        (SampleEncoding::Float, 64) => {
            |s| float_to_i16(f64::from_le_bytes([s[0], s[1], s[2], s[3], s[4], s[5], s[6], s[7]]))
        }
        (encoding, bits) => {
            return Err(SessionError::Configuration(format!(
                "unsupported capture format: {} bit {:?}",
                bits, encoding
            )));
        }
    };
    Ok(convert)
}

fn float_to_i16(sample: f64) -> i16 {
    (sample.clamp(-1.0, 1.0) * i16::MAX as f64).round() as i16
}
