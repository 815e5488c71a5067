use serde::{Deserialize, Serialize};

/// Transport type of an audio endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioTransportType {
    BuiltIn,
    Bluetooth,
    BluetoothLE,
    Usb,
    Virtual,
    Unknown,
}

/// An audio capture endpoint.
///
/// `id` is the identifier owned by the operating audio subsystem; the
/// recorder only refers to it when it opens a capture stream. Devices are
/// enumerated once and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AudioDevice {
    pub id: String,
    pub name: String,
    pub is_default: bool,
    pub transport_type: Option<AudioTransportType>,
}

impl AudioDevice {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            is_default: false,
            transport_type: None,
        }
    }

    /// Two devices are the same endpoint when their subsystem ids match.
    pub fn same_endpoint(&self, other: &AudioDevice) -> bool {
        self.id == other.id
    }
}

/// Sample encoding of an interleaved PCM stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleEncoding {
    /// Signed little-endian integers (WAV format code 1).
    Pcm,
    /// IEEE 754 floats (WAV format code 3).
    Float,
}

/// Format of the byte stream exchanged between a device and a codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    pub encoding: SampleEncoding,
}

impl StreamFormat {
    pub fn pcm16(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample: 16,
            encoding: SampleEncoding::Pcm,
        }
    }

    pub fn float32(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
            bits_per_sample: 32,
            encoding: SampleEncoding::Float,
        }
    }

    /// Bytes per interleaved frame.
    pub fn block_align(&self) -> u16 {
        self.channels * self.bits_per_sample / 8
    }

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }
}
