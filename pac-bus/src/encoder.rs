use futures::Stream;
use futures_util::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_util::sync::CancellationToken;

use crate::{
    codec::{CodecDescriptor, PAC_PLUGIN},
    error::PacError,
    frame::{PixelFormat, RawFrameCmd, RawFrameReceiver, RawVideoFrame},
    pac::PacLibrary,
    packet::{RawPacket, RawPacketCmd, RawPacketReceiver, RawPacketSender},
    sink::{PictureWriter, WriteContext, capacity_for},
};

/// What to do when a picture outgrows the output buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Drop the picture, keep encoding; the error is only visible through
    /// [`PacEncoder::last_error`].
    #[default]
    Drop,
    /// Fail the encode call that produced the overflow.
    Fail,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
    pub overflow_policy: OverflowPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            pixel_format: PixelFormat::Uyvy422,
            overflow_policy: OverflowPolicy::Drop,
        }
    }
}

/// The host's view of an opened encoder.
pub trait VideoEncoder: Send {
    fn descriptor(&self) -> &'static CodecDescriptor;

    /// Encodes `frame` into `packet`. `None` asks the encoder to drain.
    /// Returns whether a packet was produced.
    fn encode(
        &mut self,
        frame: Option<&RawVideoFrame>,
        packet: &mut RawPacket,
    ) -> Result<bool, PacError>;

    fn close(&mut self);
}

/// Adapter that drives a [`PacLibrary`] as a [`VideoEncoder`].
pub struct PacEncoder<L: PacLibrary> {
    library: L,
    wctx: WriteContext,
    frame_count: u64,
    overflow_policy: OverflowPolicy,
    closed: bool,
}

impl<L: PacLibrary> PacEncoder<L> {
    pub fn new(settings: Settings, mut library: L) -> Result<Self, PacError> {
        log::debug!("pac init {}x{}", settings.width, settings.height);
        let wctx = WriteContext::new(capacity_for(settings.width, settings.height));

        let err = library.init();
        if err != 0 {
            log::error!("init_pac() failed with {}", err);
            library.close();
            return Err(PacError::Init { code: err });
        }

        Ok(Self {
            library,
            wctx,
            frame_count: 0,
            overflow_policy: settings.overflow_policy,
            closed: false,
        })
    }

    pub fn capacity(&self) -> usize {
        self.wctx.capacity()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    pub fn dropped_pictures(&self) -> u64 {
        self.wctx.dropped()
    }

    /// Most recent overflow, kept until the next one or until taken by
    /// [`OverflowPolicy::Fail`].
    pub fn last_error(&self) -> Option<&PacError> {
        self.wctx.last_error()
    }

    pub fn encode(
        &mut self,
        frame: Option<&RawVideoFrame>,
        packet: &mut RawPacket,
    ) -> Result<bool, PacError> {
        log::debug!("pac frame src:{}", self.frame_count);
        if self.closed {
            return Err(PacError::Closed);
        }
        let Some(frame) = frame else {
            return Ok(false);
        };
        if frame.format() != PixelFormat::Uyvy422 {
            return Err(PacError::UnsupportedPixelFormat(frame.format()));
        }

        let planes: Vec<&[u8]> = frame.planes().iter().map(|p| p.as_ref()).collect();
        let max_output = self.wctx.capacity();
        let mut writer = PictureWriter::new(&mut self.wctx, packet);
        let status = self.library.compress(&planes, max_output, &mut writer);
        log::trace!("frame_pac returned {}", status);

        packet.set_pts(frame.pts());
        packet.set_dts(frame.pts());
        self.frame_count += 1;

        if self.overflow_policy == OverflowPolicy::Fail {
            if let Some(err) = self.wctx.take_error() {
                self.wctx.reset();
                return Err(err);
            }
        }
        Ok(true)
    }

    /// Tears the library down. Runs once; later calls and drop are no-ops.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        log::debug!(
            "pac close, frames: {}, mid-picture: {}",
            self.frame_count,
            self.wctx.in_picture()
        );
        self.wctx.reset();
        let status = self.library.close();
        log::trace!("close_pac returned {}", status);
    }
}

impl<L: PacLibrary> Drop for PacEncoder<L> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<L: PacLibrary + Send> VideoEncoder for PacEncoder<L> {
    fn descriptor(&self) -> &'static CodecDescriptor {
        &PAC_PLUGIN
    }

    fn encode(
        &mut self,
        frame: Option<&RawVideoFrame>,
        packet: &mut RawPacket,
    ) -> Result<bool, PacError> {
        PacEncoder::encode(self, frame, packet)
    }

    fn close(&mut self) {
        PacEncoder::close(self)
    }
}

pub struct EncoderTask {
    cancel: CancellationToken,
    raw_chan: RawPacketSender,
}

impl EncoderTask {
    pub fn new() -> Self {
        /// Encoder output = encoded packets (small). Moderate capacity for bursts.
        const PACKET_CHAN_CAP: usize = 64;
        Self::with_capacity(PACKET_CHAN_CAP)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let cancel = CancellationToken::new();
        let (sender, _) = tokio::sync::broadcast::channel(capacity);
        Self {
            cancel,
            raw_chan: sender,
        }
    }

    pub fn subscribe(&self) -> RawPacketReceiver {
        self.raw_chan.subscribe()
    }

    /// Encoded packets as a stream, ending at EOF. Lagged receivers skip ahead.
    pub fn packet_stream(&self) -> impl Stream<Item = RawPacket> + Send + use<> {
        BroadcastStream::new(self.subscribe())
            .take_while(|cmd| futures::future::ready(!matches!(cmd, Ok(RawPacketCmd::EOF))))
            .filter_map(|cmd| async move {
                match cmd {
                    Ok(RawPacketCmd::Data(packet)) => Some(packet),
                    Ok(RawPacketCmd::EOF) => None,
                    Err(e) => {
                        log::warn!("packet stream lagged: {}", e);
                        None
                    }
                }
            })
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn get_cancel(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn start(&self, encoder: Box<dyn VideoEncoder>, mut frames: RawFrameReceiver) {
        let cancel_clone = self.cancel.clone();
        let sender_clone = self.raw_chan.clone();
        log::info!("encoder loop started, codec: {}", encoder.descriptor().name);
        /// Frames waiting for the blocking worker; the producer is held back beyond this.
        const FRAME_QUEUE_BOUND: usize = 16;
        tokio::spawn(async move {
            let (tx, rx) = tokio::sync::mpsc::channel::<RawFrameCmd>(FRAME_QUEUE_BOUND);
            let handle_cancel = cancel_clone.clone();
            let handle = tokio::task::spawn_blocking(move || {
                Self::encoder_loop(encoder, handle_cancel, rx, sender_clone)
            });
            loop {
                let cmd = tokio::select! {
                    _ = cancel_clone.cancelled() => break,
                    cmd = frames.recv() => match cmd {
                        Some(cmd) => cmd,
                        None => RawFrameCmd::EOF,
                    },
                };
                let is_eof = matches!(cmd, RawFrameCmd::EOF);
                let sent = tokio::select! {
                    _ = cancel_clone.cancelled() => break,
                    sent = tx.send(cmd) => sent,
                };
                if sent.is_err() || is_eof {
                    break;
                }
            }
            // the worker sees the closed queue once `tx` is gone
            drop(tx);
            let _ = handle.await;
            log::info!("encoder task finished");
        });
    }

    fn encoder_loop(
        mut encoder: Box<dyn VideoEncoder>,
        cancel: CancellationToken,
        mut rx: tokio::sync::mpsc::Receiver<RawFrameCmd>,
        out: RawPacketSender,
    ) {
        let mut sent: u64 = 0;
        while let Some(cmd) = rx.blocking_recv() {
            if cancel.is_cancelled() {
                break;
            }
            let frame = match cmd {
                RawFrameCmd::Data(frame) => Some(frame),
                RawFrameCmd::EOF => None,
            };
            let eof = frame.is_none();

            let mut packet = RawPacket::empty();
            match encoder.encode(frame.as_ref(), &mut packet) {
                Ok(true) if !packet.is_empty() => {
                    sent += 1;
                    let _ = out.send(RawPacketCmd::Data(packet));
                }
                Ok(true) => log::debug!("encoder produced an empty picture"),
                Ok(false) => {}
                Err(e) => log::error!("encode error: {}", e),
            }

            if eof {
                break;
            }
        }

        encoder.close();
        log::info!("end of pac encode task loop, packets: {}", sent);
        let _ = out.send(RawPacketCmd::EOF);
    }
}

impl Default for EncoderTask {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "encoder_test.rs"]
mod encoder_test;
