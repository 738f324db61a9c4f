use std::io::{ErrorKind, Read, Write};

use bytes::Bytes;
use pac_bus::{encoder::VideoEncoder, frame::RawVideoFrame, packet::RawPacket};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EncodeStats {
    pub frames: u64,
    pub packets: u64,
    pub bytes: u64,
}

/// Fills `buf` from `input`. Returns the number of bytes read, which is short
/// only at end of input.
fn read_frame(input: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match input.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Encodes packed UYVY frames from `input` and writes packet payloads to `output`
/// back to back. pts is the frame index.
pub fn encode_stream(
    encoder: &mut dyn VideoEncoder,
    width: u32,
    height: u32,
    mut input: impl Read,
    mut output: impl Write,
    cancel: &CancellationToken,
) -> anyhow::Result<EncodeStats> {
    let frame_bytes = pac_bus::frame::uyvy_frame_bytes(width, height);
    let mut stats = EncodeStats::default();
    let mut buf = vec![0u8; frame_bytes];

    loop {
        if cancel.is_cancelled() {
            log::info!("encode cancelled after {} frames", stats.frames);
            break;
        }
        let n = read_frame(&mut input, &mut buf)?;
        if n == 0 {
            break;
        }
        if n < frame_bytes {
            log::warn!(
                "ignoring trailing partial frame: {} of {} bytes",
                n,
                frame_bytes
            );
            break;
        }

        let pts = stats.frames as i64;
        let frame = RawVideoFrame::from_uyvy(Bytes::copy_from_slice(&buf), width, height, Some(pts))?;
        let mut packet = RawPacket::empty();
        let got_packet = encoder.encode(Some(&frame), &mut packet)?;
        stats.frames += 1;
        if got_packet && !packet.is_empty() {
            output.write_all(&packet.data())?;
            stats.packets += 1;
            stats.bytes += packet.size() as u64;
        }
    }

    let mut packet = RawPacket::empty();
    if encoder.encode(None, &mut packet)? && !packet.is_empty() {
        output.write_all(&packet.data())?;
        stats.packets += 1;
        stats.bytes += packet.size() as u64;
    }
    output.flush()?;
    encoder.close();
    Ok(stats)
}
