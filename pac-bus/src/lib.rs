//! PAC video compression plug-in and the host-side surfaces it plugs into.

pub mod codec;
pub mod encoder;
pub mod error;
pub mod frame;
#[cfg(feature = "native")]
pub mod native;
pub mod pac;
pub mod packet;
pub mod sink;

/// Registers FFmpeg components. Only needed when frames come from ffmpeg-next.
#[cfg(feature = "ffmpeg")]
pub fn init() -> anyhow::Result<()> {
    ffmpeg_next::init().map_err(|e| anyhow::anyhow!("ffmpeg_next init: {}", e))
}

/// Registry with `pac_plugin` registered against the linked `libpac`.
#[cfg(feature = "native")]
pub fn default_registry(_chunk_size: usize) -> codec::CodecRegistry {
    let mut registry = codec::CodecRegistry::new();
    codec::register_pac_plugin(&mut registry, native::NativePac::new);
    registry
}

/// Registry with `pac_plugin` registered against the in-process [`pac::RawPac`].
#[cfg(not(feature = "native"))]
pub fn default_registry(chunk_size: usize) -> codec::CodecRegistry {
    let mut registry = codec::CodecRegistry::new();
    codec::register_pac_plugin(&mut registry, move || Ok(pac::RawPac::new(chunk_size)));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(not(feature = "native"))]
    #[test]
    fn test_default_registry_encodes_uyvy() -> anyhow::Result<()> {
        use bytes::Bytes;

        let registry = default_registry(64);
        let settings = encoder::Settings {
            width: 16,
            height: 8,
            ..Default::default()
        };
        let mut encoder = registry.open("pac_plugin", &settings)?;
        let data: Vec<u8> = (0..16 * 8 * 2).map(|i| i as u8).collect();
        let frame = frame::RawVideoFrame::from_uyvy(Bytes::from(data.clone()), 16, 8, Some(5))?;

        let mut packet = packet::RawPacket::empty();
        assert!(encoder.encode(Some(&frame), &mut packet)?);
        assert_eq!(&packet.data()[..], &data[..]);
        assert_eq!(packet.pts(), Some(5));
        assert!(packet.is_key());
        encoder.close();
        Ok(())
    }
}
