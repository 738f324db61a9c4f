use bitflags::bitflags;
use bytes::Bytes;

pub type RawPacketSender = tokio::sync::broadcast::Sender<RawPacketCmd>;
pub type RawPacketReceiver = tokio::sync::broadcast::Receiver<RawPacketCmd>;

#[derive(Clone)]
pub enum RawPacketCmd {
    Data(RawPacket),
    EOF,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct PacketFlags: u32 {
        /// Decodable without reference to any other packet.
        const KEY = 0x0001;
    }
}

/// Encoded output unit handed back to the host. Starts empty; the encoder
/// moves a filled buffer into it at end-of-picture.
#[derive(Debug, Clone, Default)]
pub struct RawPacket {
    data: Option<Bytes>,
    pts: Option<i64>,
    dts: Option<i64>,
    flags: PacketFlags,
}

impl RawPacket {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn pts(&self) -> Option<i64> {
        self.pts
    }

    pub fn dts(&self) -> Option<i64> {
        self.dts
    }

    pub fn set_pts(&mut self, pts: Option<i64>) {
        self.pts = pts;
    }

    pub fn set_dts(&mut self, dts: Option<i64>) {
        self.dts = dts;
    }

    pub fn size(&self) -> usize {
        self.data.as_ref().map(|d| d.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_none()
    }

    pub fn data(&self) -> Bytes {
        self.data.clone().unwrap_or_default()
    }

    /// Takes ownership of `data`; any previous payload is released.
    pub fn set_data(&mut self, data: Bytes) {
        self.data = Some(data);
    }

    pub fn flags(&self) -> PacketFlags {
        self.flags
    }

    pub fn set_flags(&mut self, flags: PacketFlags) {
        self.flags = flags;
    }

    pub fn is_key(&self) -> bool {
        self.flags.contains(PacketFlags::KEY)
    }
}

#[cfg(feature = "ffmpeg")]
impl From<RawPacket> for ffmpeg_next::Packet {
    fn from(packet: RawPacket) -> Self {
        let mut out = ffmpeg_next::Packet::copy(&packet.data());
        out.set_pts(packet.pts());
        out.set_dts(packet.dts());
        if packet.is_key() {
            out.set_flags(ffmpeg_next::codec::packet::Flags::KEY);
        }
        out
    }
}
