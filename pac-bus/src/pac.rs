//! The seam to the external PAC compression routine.
//!
//! The real library exposes three process-wide entry points: a global init, a
//! per-frame compress that reports its output through a callback, and a global
//! teardown. [`PacLibrary`] mirrors that contract so the encoder adapter can be
//! driven by the native binding, the in-process [`RawPac`], or a test double.

/// Receives compressed output from [`PacLibrary::compress`].
///
/// Called zero or more times per picture; `end_of_picture` is set on the
/// chunk that completes it. The chunk may be empty.
pub trait PictureSink {
    fn write(&mut self, chunk: &[u8], end_of_picture: bool);
}

impl<F> PictureSink for F
where
    F: FnMut(&[u8], bool),
{
    fn write(&mut self, chunk: &[u8], end_of_picture: bool) {
        self(chunk, end_of_picture)
    }
}

pub trait PacLibrary {
    /// Global initialization. Zero on success.
    fn init(&mut self) -> i32;

    /// Compresses one picture from `planes`, reporting output through `sink`
    /// before returning. `max_output` is the largest picture the caller can
    /// hold. The return value carries no contract.
    fn compress(
        &mut self,
        planes: &[&[u8]],
        max_output: usize,
        sink: &mut dyn PictureSink,
    ) -> i32;

    /// Global teardown. The return value carries no contract.
    fn close(&mut self) -> i32;
}

impl<L: PacLibrary + ?Sized> PacLibrary for Box<L> {
    fn init(&mut self) -> i32 {
        (**self).init()
    }

    fn compress(
        &mut self,
        planes: &[&[u8]],
        max_output: usize,
        sink: &mut dyn PictureSink,
    ) -> i32 {
        (**self).compress(planes, max_output, sink)
    }

    fn close(&mut self) -> i32 {
        (**self).close()
    }
}

pub const DEFAULT_CHUNK_SIZE: usize = 0x4000;

/// In-process stand-in for the native library: stores every plane verbatim,
/// delivered in `chunk_size` pieces with the last one closing the picture.
///
/// It never truncates to `max_output`, so oversized input exercises the
/// adapter's overflow handling exactly as a misbehaving native library would.
#[derive(Debug)]
pub struct RawPac {
    chunk_size: usize,
    initialized: bool,
}

impl RawPac {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
            initialized: false,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl Default for RawPac {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl PacLibrary for RawPac {
    fn init(&mut self) -> i32 {
        self.initialized = true;
        0
    }

    fn compress(
        &mut self,
        planes: &[&[u8]],
        _max_output: usize,
        sink: &mut dyn PictureSink,
    ) -> i32 {
        if !self.initialized {
            log::warn!("raw pac: compress before init");
            return -1;
        }
        let mut chunks = planes
            .iter()
            .flat_map(|plane| plane.chunks(self.chunk_size))
            .peekable();
        if chunks.peek().is_none() {
            sink.write(&[], true);
            return 0;
        }
        while let Some(chunk) = chunks.next() {
            sink.write(chunk, chunks.peek().is_none());
        }
        0
    }

    fn close(&mut self) -> i32 {
        self.initialized = false;
        0
    }
}
