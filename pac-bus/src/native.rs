//! Binding to the external `libpac` (`init_pac`, `frame_pac`, `close_pac`).

use std::{
    ffi::{c_int, c_void},
    sync::atomic::{AtomicBool, Ordering},
};

use crate::{
    error::PacError,
    pac::{PacLibrary, PictureSink},
};

/// Upper bound on plane pointers handed to `frame_pac`; unused slots are null.
const MAX_PLANES: usize = 8;

type WriteCallback = extern "C" fn(*mut c_void, *mut u8, c_int, c_int);

unsafe extern "C" {
    fn init_pac() -> c_int;
    fn frame_pac(
        src: *const *const c_void,
        frame_bytes: c_int,
        callback: WriteCallback,
        context: *mut c_void,
    ) -> c_int;
    fn close_pac() -> c_int;
}

static IN_USE: AtomicBool = AtomicBool::new(false);

/// Handle on the process-wide library state. At most one exists at a time.
pub struct NativePac {
    _private: (),
}

impl NativePac {
    pub fn new() -> Result<Self, PacError> {
        IN_USE
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| PacError::LibraryBusy)?;
        Ok(Self { _private: () })
    }
}

impl Drop for NativePac {
    fn drop(&mut self) {
        IN_USE.store(false, Ordering::Release);
    }
}

extern "C" fn write_trampoline(context: *mut c_void, buf: *mut u8, size: c_int, eopic: c_int) {
    // SAFETY: `context` is the `&mut &mut dyn PictureSink` passed by `compress`,
    // alive for the whole `frame_pac` call that invokes us.
    let sink = unsafe { &mut *(context as *mut &mut dyn PictureSink) };
    let chunk: &[u8] = if buf.is_null() || size <= 0 {
        &[]
    } else {
        // SAFETY: the library guarantees `buf` holds `size` bytes for this call.
        unsafe { std::slice::from_raw_parts(buf, size as usize) }
    };
    sink.write(chunk, eopic != 0);
}

impl PacLibrary for NativePac {
    fn init(&mut self) -> i32 {
        unsafe { init_pac() }
    }

    fn compress(
        &mut self,
        planes: &[&[u8]],
        max_output: usize,
        sink: &mut dyn PictureSink,
    ) -> i32 {
        let mut src = [std::ptr::null::<c_void>(); MAX_PLANES];
        for (slot, plane) in src.iter_mut().zip(planes) {
            *slot = plane.as_ptr() as *const c_void;
        }
        let frame_bytes = c_int::try_from(max_output).unwrap_or(c_int::MAX);
        let mut sink: &mut dyn PictureSink = sink;
        let context = &mut sink as *mut &mut dyn PictureSink as *mut c_void;
        unsafe { frame_pac(src.as_ptr(), frame_bytes, write_trampoline, context) }
    }

    fn close(&mut self) -> i32 {
        unsafe { close_pac() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_one_live_handle() {
        let first = NativePac::new().expect("first handle");
        assert!(matches!(NativePac::new(), Err(PacError::LibraryBusy)));
        drop(first);
        let again = NativePac::new();
        assert!(again.is_ok());
    }
}
