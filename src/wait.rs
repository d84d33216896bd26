//! Frame-latency wait handle.
//!
//! Frame pacing is best-effort: a timed-out or abandoned wait only logs.
//! A wait that fails outright is reported with the native diagnostic.

use std::time::Duration;

use crate::diagnostics::MessageChain;
use crate::error::{InteropError, InteropResult};

/// Default bound on a single wait.
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_millis(1000);

/// Outcome of a bounded wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitStatus {
    Signaled,
    Abandoned,
    TimedOut,
    /// The wait itself failed with this HRESULT.
    Failed(i32),
}

/// An OS object the swapchain signals when it can accept the next present.
pub trait Waitable {
    fn wait(&self, timeout: Duration) -> WaitStatus;

    fn close(&mut self) -> InteropResult<()>;
}

pub struct WaitHandle<W: Waitable> {
    waitable: Option<W>,
    timeout: Duration,
    messages: Option<MessageChain>,
}

impl<W: Waitable> WaitHandle<W> {
    /// `waitable` is `None` when the swapchain has no frame-latency object;
    /// waits then return immediately.
    pub fn new(waitable: Option<W>, timeout: Duration) -> Self {
        Self {
            waitable,
            timeout,
            messages: None,
        }
    }

    /// Resolve wait failures through `messages` instead of the platform tables.
    #[cfg(test)]
    pub(crate) fn with_messages(mut self, messages: MessageChain) -> Self {
        self.messages = Some(messages);
        self
    }

    pub fn is_open(&self) -> bool {
        self.waitable.is_some()
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn wait_for_signal(&self) -> InteropResult<()> {
        let Some(waitable) = self.waitable.as_ref() else {
            return Ok(());
        };

        match waitable.wait(self.timeout) {
            WaitStatus::Signaled => Ok(()),
            WaitStatus::Abandoned => {
                log::warn!("[WAIT] Frame latency wait abandoned");
                Ok(())
            }
            WaitStatus::TimedOut => {
                log::warn!(
                    "[WAIT] Frame latency wait timed out after {} ms",
                    self.timeout.as_millis()
                );
                Ok(())
            }
            WaitStatus::Failed(code) => Err(match &self.messages {
                Some(messages) => InteropError::native_with("WaitForSingleObject", code, messages),
                None => InteropError::native("WaitForSingleObject", code),
            }),
        }
    }

    /// Release the OS handle. Failures are logged.
    pub fn close(&mut self) {
        if let Some(mut waitable) = self.waitable.take() {
            if let Err(e) = waitable.close() {
                log::error!("[WAIT] Failed to close frame latency waitable: {}", e);
            }
        }
    }
}

impl<W: Waitable> Drop for WaitHandle<W> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::StaticTable;
    use std::cell::Cell;
    use std::rc::Rc;

    struct FakeWaitable {
        status: WaitStatus,
        close_result: Option<i32>,
        closed: Rc<Cell<u32>>,
        last_timeout: Rc<Cell<Option<Duration>>>,
    }

    impl FakeWaitable {
        fn new(status: WaitStatus) -> Self {
            Self {
                status,
                close_result: None,
                closed: Rc::new(Cell::new(0)),
                last_timeout: Rc::new(Cell::new(None)),
            }
        }
    }

    impl Waitable for FakeWaitable {
        fn wait(&self, timeout: Duration) -> WaitStatus {
            self.last_timeout.set(Some(timeout));
            self.status
        }

        fn close(&mut self) -> InteropResult<()> {
            self.closed.set(self.closed.get() + 1);
            match self.close_result {
                Some(code) => Err(InteropError::native_with("CloseHandle", code, &MessageChain::new())),
                None => Ok(()),
            }
        }
    }

    #[test]
    fn test_signaled_returns_ok() {
        let waitable = FakeWaitable::new(WaitStatus::Signaled);
        let timeout = waitable.last_timeout.clone();
        let handle = WaitHandle::new(Some(waitable), DEFAULT_WAIT_TIMEOUT);
        assert!(handle.wait_for_signal().is_ok());
        assert_eq!(timeout.get(), Some(Duration::from_millis(1000)));
    }

    #[test]
    fn test_timeout_and_abandon_do_not_raise() {
        for status in [WaitStatus::TimedOut, WaitStatus::Abandoned] {
            let handle = WaitHandle::new(Some(FakeWaitable::new(status)), DEFAULT_WAIT_TIMEOUT);
            assert!(handle.wait_for_signal().is_ok());
        }
    }

    #[test]
    fn test_failure_raises_resolved_message() {
        const ERROR_INVALID_HANDLE: i32 = 6;
        let messages = MessageChain::new()
            .with_table(StaticTable::new("system"))
            .with_table(StaticTable::new("ntdll").with(ERROR_INVALID_HANDLE, "The handle is invalid."));
        let handle = WaitHandle::new(
            Some(FakeWaitable::new(WaitStatus::Failed(ERROR_INVALID_HANDLE))),
            DEFAULT_WAIT_TIMEOUT,
        )
        .with_messages(messages);

        let err = handle.wait_for_signal().unwrap_err();
        assert_eq!(err.code(), Some(ERROR_INVALID_HANDLE));
        assert!(err.to_string().contains("The handle is invalid."));
        assert!(err.to_string().starts_with("WaitForSingleObject"));
    }

    #[test]
    fn test_without_waitable_is_noop() {
        let handle = WaitHandle::<FakeWaitable>::new(None, DEFAULT_WAIT_TIMEOUT);
        assert!(!handle.is_open());
        assert!(handle.wait_for_signal().is_ok());
    }

    #[test]
    fn test_close_failure_is_swallowed_and_idempotent() {
        let mut waitable = FakeWaitable::new(WaitStatus::Signaled);
        waitable.close_result = Some(6);
        let closed = waitable.closed.clone();
        let mut handle = WaitHandle::new(Some(waitable), DEFAULT_WAIT_TIMEOUT);

        handle.close();
        handle.close();
        drop(handle);
        assert_eq!(closed.get(), 1);
    }

    #[test]
    fn test_drop_closes() {
        let waitable = FakeWaitable::new(WaitStatus::Signaled);
        let closed = waitable.closed.clone();
        drop(WaitHandle::new(Some(waitable), DEFAULT_WAIT_TIMEOUT));
        assert_eq!(closed.get(), 1);
    }
}
