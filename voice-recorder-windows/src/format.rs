//! Conversions between `WAVEFORMATEX` and [`StreamFormat`].

use windows::Win32::Media::Audio::{WAVEFORMATEX, WAVE_FORMAT_PCM};

use voice_recorder_core::{SampleEncoding, StreamFormat};

use crate::error::WasapiError;

const WAVE_FORMAT_IEEE_FLOAT: u16 = 3;
const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// Describe a device mix format.
///
/// Shared-mode mix formats declared as `WAVE_FORMAT_EXTENSIBLE` carry
/// 32-bit float samples unless they say 16 or 24 bits.
pub(crate) fn stream_format(format: &WAVEFORMATEX) -> Result<StreamFormat, WasapiError> {
    let tag = format.wFormatTag;
    let bits = format.wBitsPerSample;
    let encoding = match tag {
        t if t == WAVE_FORMAT_PCM as u16 => SampleEncoding::Pcm,
        WAVE_FORMAT_IEEE_FLOAT => SampleEncoding::Float,
        WAVE_FORMAT_EXTENSIBLE if bits == 32 => SampleEncoding::Float,
        WAVE_FORMAT_EXTENSIBLE => SampleEncoding::Pcm,
        other => {
            return Err(WasapiError::UnsupportedFormat(format!("format tag {:#06x}", other)));
        }
    };

    Ok(StreamFormat {
        sample_rate: format.nSamplesPerSec,
        channels: format.nChannels,
        bits_per_sample: bits,
        encoding,
    })
}

/// Plain `WAVEFORMATEX` for a decoder's output.
pub(crate) fn wave_format(format: &StreamFormat) -> WAVEFORMATEX {
    let tag = match format.encoding {
        SampleEncoding::Pcm => WAVE_FORMAT_PCM as u16,
        SampleEncoding::Float => WAVE_FORMAT_IEEE_FLOAT,
    };
    WAVEFORMATEX {
        wFormatTag: tag,
        nChannels: format.channels,
        nSamplesPerSec: format.sample_rate,
        nAvgBytesPerSec: format.byte_rate(),
        nBlockAlign: format.block_align(),
        wBitsPerSample: format.bits_per_sample,
        cbSize: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoder_format_survives_conversion() {
        let format = StreamFormat::pcm16(44100, 2);
        let wave = wave_format(&format);
        assert_eq!(wave.nBlockAlign, 4);
        assert_eq!(wave.nAvgBytesPerSec, 176_400);
        assert_eq!(stream_format(&wave).unwrap(), format);
    }

    #[test]
    fn extensible_32_bit_mix_format_is_float() {
        let mut wave = wave_format(&StreamFormat::float32(48000, 2));
        wave.wFormatTag = WAVE_FORMAT_EXTENSIBLE;
        wave.cbSize = 22;
        assert_eq!(stream_format(&wave).unwrap().encoding, SampleEncoding::Float);
    }

    #[test]
    fn rejects_compressed_tags() {
        let mut wave = wave_format(&StreamFormat::pcm16(8000, 1));
        wave.wFormatTag = 0x0055;
        assert!(matches!(stream_format(&wave), Err(WasapiError::UnsupportedFormat(_))));
    }
}
