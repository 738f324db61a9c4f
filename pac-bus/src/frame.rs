use std::fmt::{Display, Formatter};

use bytes::Bytes;

use crate::error::PacError;

pub type RawFrameSender = tokio::sync::mpsc::Sender<RawFrameCmd>;
pub type RawFrameReceiver = tokio::sync::mpsc::Receiver<RawFrameCmd>;

#[derive(Clone)]
pub enum RawFrameCmd {
    Data(RawVideoFrame),
    EOF,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    /// Packed 4:2:2, byte order U Y0 V Y1.
    Uyvy422,
    Yuv422p,
    Yuv420p,
    Nv12,
}

impl PixelFormat {
    pub fn planes(&self) -> usize {
        match self {
            PixelFormat::Uyvy422 => 1,
            PixelFormat::Nv12 => 2,
            PixelFormat::Yuv422p | PixelFormat::Yuv420p => 3,
        }
    }
}

#[derive(Clone)]
pub struct RawVideoFrame {
    format: PixelFormat,
    width: u32,
    height: u32,
    planes: Vec<Bytes>,
    pts: Option<i64>,
}

impl RawVideoFrame {
    pub fn new(
        format: PixelFormat,
        width: u32,
        height: u32,
        planes: Vec<Bytes>,
        pts: Option<i64>,
    ) -> Result<Self, PacError> {
        if planes.len() != format.planes() {
            return Err(PacError::InvalidFrame(format!(
                "{:?} expects {} planes, got {}",
                format,
                format.planes(),
                planes.len()
            )));
        }
        Ok(Self {
            format,
            width,
            height,
            planes,
            pts,
        })
    }

    /// Wraps one packed UYVY buffer of exactly `width * height * 2` bytes.
    pub fn from_uyvy(
        data: Bytes,
        width: u32,
        height: u32,
        pts: Option<i64>,
    ) -> Result<Self, PacError> {
        if width == 0 || height == 0 {
            return Err(PacError::InvalidFrame(format!(
                "invalid video size {}x{}",
                width, height
            )));
        }
        let expected = uyvy_frame_bytes(width, height);
        if data.len() != expected {
            return Err(PacError::InvalidFrame(format!(
                "uyvy422 {}x{} needs {} bytes, got {}",
                width,
                height,
                expected,
                data.len()
            )));
        }
        Self::new(PixelFormat::Uyvy422, width, height, vec![data], pts)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> PixelFormat {
        self.format
    }

    pub fn pts(&self) -> Option<i64> {
        self.pts
    }

    pub fn set_pts(&mut self, pts: Option<i64>) {
        self.pts = pts;
    }

    pub fn planes(&self) -> &[Bytes] {
        &self.planes
    }

    pub fn data(&self, plane: usize) -> &[u8] {
        self.planes.get(plane).map(|p| p.as_ref()).unwrap_or(&[])
    }
}

impl Display for RawVideoFrame {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(
            f,
            "RawVideoFrame format: {:?}, width: {}, height: {}, planes: {}, pts: {:?}",
            self.format,
            self.width,
            self.height,
            self.planes.len(),
            self.pts
        )
    }
}

pub fn uyvy_frame_bytes(width: u32, height: u32) -> usize {
    (width as usize)
        .saturating_mul(height as usize)
        .saturating_mul(2)
}

#[cfg(feature = "ffmpeg")]
mod ffmpeg_interop {
    use bytes::Bytes;
    use ffmpeg_next::format::Pixel;

    use super::{PixelFormat, RawVideoFrame};
    use crate::error::PacError;

    impl From<PixelFormat> for Pixel {
        fn from(format: PixelFormat) -> Self {
            match format {
                PixelFormat::Uyvy422 => Pixel::UYVY422,
                PixelFormat::Yuv422p => Pixel::YUV422P,
                PixelFormat::Yuv420p => Pixel::YUV420P,
                PixelFormat::Nv12 => Pixel::NV12,
            }
        }
    }

    impl TryFrom<Pixel> for PixelFormat {
        type Error = PacError;

        fn try_from(pixel: Pixel) -> Result<Self, Self::Error> {
            match pixel {
                Pixel::UYVY422 => Ok(PixelFormat::Uyvy422),
                Pixel::YUV422P => Ok(PixelFormat::Yuv422p),
                Pixel::YUV420P => Ok(PixelFormat::Yuv420p),
                Pixel::NV12 => Ok(PixelFormat::Nv12),
                other => Err(PacError::InvalidFrame(format!(
                    "no pac mapping for pixel format {:?}",
                    other
                ))),
            }
        }
    }

    impl TryFrom<&ffmpeg_next::frame::Video> for RawVideoFrame {
        type Error = PacError;

        fn try_from(frame: &ffmpeg_next::frame::Video) -> Result<Self, Self::Error> {
            let format = PixelFormat::try_from(frame.format())?;
            let planes = (0..frame.planes())
                .map(|i| Bytes::copy_from_slice(frame.data(i)))
                .collect();
            RawVideoFrame::new(format, frame.width(), frame.height(), planes, frame.pts())
        }
    }
}
