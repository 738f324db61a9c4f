//! Accumulates compressed chunks into one packet per picture.

use bytes::Bytes;

use crate::{
    error::PacError,
    pac::PictureSink,
    packet::{PacketFlags, RawPacket},
};

/// Smallest output buffer handed to the compressor, whatever the frame size.
pub const MIN_OUTPUT_CAPACITY: usize = 0x8000;

/// Output capacity for a `width` x `height` picture: two bytes per pixel,
/// never below [`MIN_OUTPUT_CAPACITY`].
pub fn capacity_for(width: u32, height: u32) -> usize {
    (width as usize)
        .saturating_mul(height as usize)
        .saturating_mul(2)
        .max(MIN_OUTPUT_CAPACITY)
}

/// Write-accumulation state shared by every picture of one encoder instance.
pub struct WriteContext {
    capacity: usize,
    size: usize,
    buffer: Option<Vec<u8>>,
    overflowed: bool,
    last_error: Option<PacError>,
    emitted: u64,
    dropped: u64,
}

impl WriteContext {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            size: 0,
            buffer: None,
            overflowed: false,
            last_error: None,
            emitted: 0,
            dropped: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes accumulated for the picture in progress.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn in_picture(&self) -> bool {
        self.size != 0 || self.buffer.is_some() || self.overflowed
    }

    pub fn emitted(&self) -> u64 {
        self.emitted
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn last_error(&self) -> Option<&PacError> {
        self.last_error.as_ref()
    }

    pub fn take_error(&mut self) -> Option<PacError> {
        self.last_error.take()
    }

    /// Discards a partially accumulated picture.
    pub fn reset(&mut self) {
        self.size = 0;
        self.buffer = None;
        self.overflowed = false;
    }

    /// Appends `chunk` to the current picture and, on `end_of_picture`, moves
    /// the accumulated bytes into `packet`.
    ///
    /// A chunk that would push the picture past capacity is not copied; the
    /// overflow is recorded and the whole picture is dropped when it completes.
    pub fn write(&mut self, chunk: &[u8], end_of_picture: bool, packet: &mut RawPacket) {
        let new_size = self.size + chunk.len();
        if new_size > self.capacity {
            log::error!(
                "compressed buffer overflow {} > {}",
                new_size,
                self.capacity
            );
            self.last_error = Some(PacError::Overflow {
                needed: new_size,
                capacity: self.capacity,
            });
            self.overflowed = true;
        } else if !self.overflowed {
            let buffer = self
                .buffer
                .get_or_insert_with(|| Vec::with_capacity(self.capacity));
            buffer.extend_from_slice(chunk);
            self.size = new_size;
        }

        if end_of_picture {
            self.finish_picture(packet);
        }
    }

    fn finish_picture(&mut self, packet: &mut RawPacket) {
        let buffer = self.buffer.take();
        if self.overflowed {
            self.dropped += 1;
            log::warn!(
                "dropping picture after overflow, {} bytes discarded",
                self.size
            );
        } else if let Some(mut buffer) = buffer.filter(|_| self.size != 0) {
            // the packet keeps only what the picture used, not the full capacity
            buffer.shrink_to_fit();
            packet.set_data(Bytes::from(buffer));
            packet.set_flags(packet.flags() | PacketFlags::KEY);
            self.emitted += 1;
        }
        self.size = 0;
        self.overflowed = false;
    }
}

/// Binds a [`WriteContext`] to the packet being filled for one compress call.
pub struct PictureWriter<'a> {
    context: &'a mut WriteContext,
    packet: &'a mut RawPacket,
}

impl<'a> PictureWriter<'a> {
    pub fn new(context: &'a mut WriteContext, packet: &'a mut RawPacket) -> Self {
        Self { context, packet }
    }
}

impl PictureSink for PictureWriter<'_> {
    fn write(&mut self, chunk: &[u8], end_of_picture: bool) {
        self.context.write(chunk, end_of_picture, self.packet);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_policy() {
        assert_eq!(capacity_for(0, 0), MIN_OUTPUT_CAPACITY);
        assert_eq!(capacity_for(127, 128), MIN_OUTPUT_CAPACITY);
        // 128 * 128 * 2 == 0x8000 exactly
        assert_eq!(capacity_for(128, 128), 0x8000);
        assert_eq!(capacity_for(129, 128), 129 * 128 * 2);
        assert_eq!(capacity_for(1920, 1080), 1920 * 1080 * 2);
        assert_eq!(capacity_for(u32::MAX, u32::MAX), usize::MAX);
    }

    #[test]
    fn test_chunks_within_capacity_make_one_packet() {
        let mut ctx = WriteContext::new(16);
        let mut packet = RawPacket::empty();
        ctx.write(b"abcd", false, &mut packet);
        ctx.write(b"efgh", false, &mut packet);
        assert!(packet.is_empty());
        assert_eq!(ctx.size(), 8);
        ctx.write(b"ij", true, &mut packet);

        assert_eq!(packet.size(), 10);
        assert_eq!(&packet.data()[..], b"abcdefghij");
        assert!(packet.is_key());
        assert_eq!(ctx.size(), 0);
        assert_eq!(ctx.emitted(), 1);
    }

    #[test]
    fn test_packet_holds_only_used_bytes() {
        let mut ctx = WriteContext::new(capacity_for(1920, 1080));
        let mut packet = RawPacket::empty();
        ctx.write(&[1, 2, 3], true, &mut packet);

        let data = packet.data();
        drop(packet);
        let data = data.try_into_mut().expect("packet payload is uniquely owned");
        assert_eq!(&data[..], &[1, 2, 3]);
        assert!(data.capacity() < MIN_OUTPUT_CAPACITY);
    }

    #[test]
    fn test_exact_capacity_fits() {
        let mut ctx = WriteContext::new(8);
        let mut packet = RawPacket::empty();
        ctx.write(&[1; 8], true, &mut packet);
        assert_eq!(packet.size(), 8);
        assert!(ctx.last_error().is_none());
    }

    #[test]
    fn test_overflow_drops_picture() {
        let mut ctx = WriteContext::new(8);
        let mut packet = RawPacket::empty();
        ctx.write(&[1; 6], false, &mut packet);
        ctx.write(&[2; 6], false, &mut packet);
        assert_eq!(
            ctx.last_error(),
            Some(&PacError::Overflow {
                needed: 12,
                capacity: 8
            })
        );
        // later chunks that would fit are still skipped
        ctx.write(&[3; 1], true, &mut packet);

        assert!(packet.is_empty());
        assert_eq!(ctx.size(), 0);
        assert_eq!(ctx.dropped(), 1);
        assert!(!ctx.in_picture());

        let mut next = RawPacket::empty();
        ctx.write(&[4; 5], true, &mut next);
        assert_eq!(&next.data()[..], &[4; 5]);
        // the recorded error is sticky until taken
        assert!(ctx.take_error().is_some());
        assert!(ctx.last_error().is_none());
    }

    #[test]
    fn test_empty_picture_transfers_nothing() {
        let mut ctx = WriteContext::new(8);
        let mut packet = RawPacket::empty();
        ctx.write(&[], true, &mut packet);
        assert!(packet.is_empty());
        assert_eq!(ctx.emitted(), 0);

        ctx.write(&[], false, &mut packet);
        ctx.write(&[], true, &mut packet);
        assert!(packet.is_empty());
    }

    #[test]
    fn test_picture_writer_forwards_to_context() {
        let mut ctx = WriteContext::new(32);
        let mut packet = RawPacket::empty();
        {
            let mut writer = PictureWriter::new(&mut ctx, &mut packet);
            let sink: &mut dyn PictureSink = &mut writer;
            sink.write(b"xy", false);
            sink.write(b"z", true);
        }
        assert_eq!(&packet.data()[..], b"xyz");
    }
}
