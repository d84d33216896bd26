use std::time::Duration;

use windows::Win32::Foundation::{
    CloseHandle, GetLastError, E_UNEXPECTED, HANDLE, WAIT_ABANDONED, WAIT_FAILED, WAIT_OBJECT_0,
    WAIT_TIMEOUT,
};
use windows::Win32::System::Threading::WaitForSingleObject;

use super::NativeResultExt;
use crate::error::InteropResult;
use crate::wait::{WaitStatus, Waitable};

/// The swap chain's frame-latency waitable object.
pub struct FrameLatencyWaitable(HANDLE);

// SAFETY: the handle is a kernel event; waiting on and closing it are valid
// from any thread.
unsafe impl Send for FrameLatencyWaitable {}

impl FrameLatencyWaitable {
    pub fn new(handle: HANDLE) -> Self {
        Self(handle)
    }
}

impl Waitable for FrameLatencyWaitable {
    fn wait(&self, timeout: Duration) -> WaitStatus {
        let millis = u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX - 1);
        let result = unsafe { WaitForSingleObject(self.0, millis) };
        match result {
            WAIT_OBJECT_0 => WaitStatus::Signaled,
            WAIT_ABANDONED => WaitStatus::Abandoned,
            WAIT_TIMEOUT => WaitStatus::TimedOut,
            // Win32 codes are reported as HRESULTs like every other native failure.
            WAIT_FAILED => WaitStatus::Failed(unsafe { GetLastError() }.to_hresult().0),
            other => {
                log::warn!("[WAIT] Unexpected wait result 0x{:08x}", other.0);
                WaitStatus::Failed(E_UNEXPECTED.0)
            }
        }
    }

    fn close(&mut self) -> InteropResult<()> {
        let handle = std::mem::take(&mut self.0);
        if handle.is_invalid() {
            return Ok(());
        }
        unsafe { CloseHandle(handle) }.native("CloseHandle")
    }
}

impl Drop for FrameLatencyWaitable {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::error!("[WAIT] Failed to close frame-latency waitable on drop: {}", e);
        }
    }
}
