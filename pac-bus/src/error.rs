//! Errors reported by the PAC plug-in and the host surfaces around it.

use thiserror::Error;

use crate::frame::PixelFormat;

const EINVAL: i32 = 22;
const ERANGE: i32 = 34;
const EBUSY: i32 = 16;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacError {
    #[error("init_pac() failed with {code}")]
    Init { code: i32 },

    #[error("compressed buffer overflow {needed} > {capacity}")]
    Overflow { needed: usize, capacity: usize },

    #[error("unsupported pixel format: {0:?}")]
    UnsupportedPixelFormat(PixelFormat),

    #[error("invalid frame: {0}")]
    InvalidFrame(String),

    #[error("codec not found: {0}")]
    CodecNotFound(String),

    /// The native library keeps process-wide state, so only one instance may be live.
    #[error("PAC library already in use by another encoder")]
    LibraryBusy,

    #[error("encoder already closed")]
    Closed,
}

impl PacError {
    /// Negative errno status as reported to the host framework.
    pub fn averror(&self) -> i32 {
        match self {
            PacError::Overflow { .. } => -ERANGE,
            PacError::LibraryBusy => -EBUSY,
            PacError::Init { .. }
            | PacError::UnsupportedPixelFormat(_)
            | PacError::InvalidFrame(_)
            | PacError::CodecNotFound(_)
            | PacError::Closed => -EINVAL,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_averror_mapping() {
        assert_eq!(PacError::Init { code: 3 }.averror(), -22);
        assert_eq!(
            PacError::Overflow {
                needed: 10,
                capacity: 5
            }
            .averror(),
            -34
        );
        assert_eq!(PacError::LibraryBusy.averror(), -16);
        assert_eq!(PacError::CodecNotFound("x".into()).averror(), -22);
        assert_eq!(PacError::Closed.averror(), -22);
    }

    #[test]
    fn test_overflow_message() {
        let err = PacError::Overflow {
            needed: 40000,
            capacity: 32768,
        };
        assert_eq!(err.to_string(), "compressed buffer overflow 40000 > 32768");
    }
}
