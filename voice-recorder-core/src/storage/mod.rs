pub mod audio_decoder;
pub mod mp3_codec;
pub(crate) mod output_file;
pub mod wav_codec;

use std::sync::Arc;

use crate::models::config::{OutputCodec, SessionConfiguration};
use crate::traits::codec::CodecProvider;

/// The bundled codec selected by `config.codec`.
pub fn codec_for(config: &SessionConfiguration) -> Arc<dyn CodecProvider> {
    match config.codec {
        OutputCodec::Mp3 => Arc::new(mp3_codec::Mp3Codec::from_config(config)),
        OutputCodec::Wav => Arc::new(wav_codec::WavCodec::from_config(config)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::device::StreamFormat;

    #[test]
    fn configured_codec_writes_the_configured_container() {
        let dir = std::env::temp_dir().join(format!("voice_recorder_test_{}_codec_for", std::process::id()));
        let format = StreamFormat::pcm16(16000, 1);

        for (codec, name) in [(OutputCodec::Wav, "take.wav"), (OutputCodec::Mp3, "take.mp3")] {
            let config = SessionConfiguration {
                recording_path: dir.join(name),
                codec,
                ..SessionConfiguration::default()
            };
            let codecs = codec_for(&config);
            let mut encoder = codecs
                .open_encoder(&config.recording_path, &format, config.bitrate_kbps)
                .unwrap();
            encoder.write(&[0u8; 3200]).unwrap();
            encoder.close().unwrap();

            let bytes = std::fs::read(&config.recording_path).unwrap();
            let is_riff = bytes.starts_with(b"RIFF");
            let has_mpeg_sync = bytes.windows(2).any(|w| w[0] == 0xFF && w[1] & 0xE0 == 0xE0);
            match codec {
                OutputCodec::Wav => assert!(is_riff, "{} is not RIFF", name),
                OutputCodec::Mp3 => assert!(!is_riff && has_mpeg_sync, "{} is not MPEG audio", name),
            }
        }

        std::fs::remove_dir_all(&dir).ok();
    }
}
