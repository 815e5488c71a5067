use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::device::StreamFormat;
use crate::models::error::SessionError;

/// Reads an encoded file and yields interleaved frames in `format()`.
pub trait Decoder: Send {
    fn format(&self) -> StreamFormat;

    /// Fill `buf` with decoded bytes. Returns 0 at end of stream.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, SessionError>;

    fn close(&mut self) -> Result<(), SessionError>;
}

/// Writes captured frames to an output file.
pub trait Encoder: Send {
    fn write(&mut self, data: &[u8]) -> Result<(), SessionError>;

    /// Flush and finalize the file. Called exactly once per encoder.
    fn close(&mut self) -> Result<EncoderSummary, SessionError>;
}

/// What an encoder reports once its file is finalized.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncoderSummary {
    /// Size of the finished file in bytes.
    pub file_size: u64,
    /// SHA-256 hex digest of the finished file, if computed.
    pub checksum: String,
}

/// Encoder/decoder library.
pub trait CodecProvider: Send + Sync {
    fn open_decoder(&self, path: &Path) -> Result<Box<dyn Decoder>, SessionError>;

    fn open_encoder(
        &self,
        path: &Path,
        format: &StreamFormat,
        bitrate_kbps: u32,
    ) -> Result<Box<dyn Encoder>, SessionError>;
}

/// A codec shared between its owning controller and one driver thread.
///
/// The driver thread reads or writes through [`CodecHandle::with`]; only the
/// controller closes the codec, by taking it out of the handle. After that
/// every `with` call returns `None`, so a late driver callback can never
/// touch a closed codec.
pub struct CodecHandle<T: ?Sized> {
    slot: Arc<Mutex<Option<Box<T>>>>,
}

pub type DecoderHandle = CodecHandle<dyn Decoder>;
pub type EncoderHandle = CodecHandle<dyn Encoder>;

impl<T: ?Sized> CodecHandle<T> {
    pub fn new(codec: Box<T>) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(codec))),
        }
    }

    /// Run `f` against the codec while it is open.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.slot.lock().as_deref_mut().map(f)
    }

    pub fn is_open(&self) -> bool {
        self.slot.lock().is_some()
    }

    /// Whether both handles refer to the same codec instance.
    pub fn same_handle(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.slot, &other.slot)
    }

    /// A handle with no codec yet; `with` returns `None` until [`install`](Self::install).
    pub(crate) fn empty() -> Self {
        Self {
            slot: Arc::new(Mutex::new(None)),
        }
    }

    pub(crate) fn install(&self, codec: Box<T>) {
        *self.slot.lock() = Some(codec);
    }

    pub(crate) fn take(&self) -> Option<Box<T>> {
        self.slot.lock().take()
    }
}

impl<T: ?Sized> Clone for CodecHandle<T> {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingEncoder {
        writes: usize,
    }

    impl Encoder for CountingEncoder {
        fn write(&mut self, _data: &[u8]) -> Result<(), SessionError> {
            self.writes += 1;
            Ok(())
        }

        fn close(&mut self) -> Result<EncoderSummary, SessionError> {
            Ok(EncoderSummary::default())
        }
    }

    #[test]
    fn with_returns_none_after_take() {
        let handle: EncoderHandle = CodecHandle::new(Box::new(CountingEncoder { writes: 0 }));
        let driver_side = handle.clone();

        assert_eq!(driver_side.with(|e| e.write(b"abc")), Some(Ok(())));
        assert!(handle.is_open());

        let mut encoder = handle.take().unwrap();
        assert!(encoder.close().is_ok());

        assert!(!driver_side.is_open());
        assert!(driver_side.with(|e| e.write(b"late")).is_none());
        assert!(handle.take().is_none());
    }

    #[test]
    fn empty_handle_ignores_access_until_installed() {
        let handle: EncoderHandle = CodecHandle::empty();
        assert!(handle.with(|e| e.write(b"early")).is_none());

        handle.install(Box::new(CountingEncoder { writes: 0 }));
        assert!(handle.is_open());
        assert_eq!(handle.with(|e| e.write(b"x")), Some(Ok(())));
    }

    #[test]
    fn clones_share_identity() {
        let a: EncoderHandle = CodecHandle::new(Box::new(CountingEncoder { writes: 0 }));
        let b = a.clone();
        let c: EncoderHandle = CodecHandle::new(Box::new(CountingEncoder { writes: 0 }));
        assert!(a.same_handle(&b));
        assert!(!a.same_handle(&c));
    }
}
