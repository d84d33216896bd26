use thiserror::Error;

/// Failure raised by a WGL or `WGL_NV_DX_interop` call.
#[derive(Debug, Error)]
pub enum WglError {
    /// A native call reported failure; `code` is the thread's last error.
    #[error("{call} failed (code 0x{code:08x})")]
    Native { call: &'static str, code: i32 },

    /// The driver does not export a required entry point.
    #[error("WGL entry point {0} is not available")]
    MissingEntryPoint(&'static str),
}

impl WglError {
    /// Native error code, if the failure came from a native call.
    pub fn code(&self) -> Option<i32> {
        match self {
            WglError::Native { code, .. } => Some(*code),
            WglError::MissingEntryPoint(_) => None,
        }
    }

    /// Name of the call or entry point that failed.
    pub fn call(&self) -> &'static str {
        match self {
            WglError::Native { call, .. } => call,
            WglError::MissingEntryPoint(name) => name,
        }
    }

    #[cfg(windows)]
    pub(crate) fn last_error(call: &'static str) -> Self {
        Self::from_windows(call, windows::core::Error::from_win32())
    }

    #[cfg(windows)]
    pub(crate) fn from_windows(call: &'static str, err: windows::core::Error) -> Self {
        WglError::Native {
            call,
            code: err.code().0,
        }
    }
}

pub type WglResult<T> = Result<T, WglError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_error_display() {
        let err = WglError::Native {
            call: "wglDXLockObjectsNV",
            code: 0x8007_0005_u32 as i32,
        };
        assert_eq!(
            err.to_string(),
            "wglDXLockObjectsNV failed (code 0x80070005)"
        );
        assert_eq!(err.code(), Some(0x8007_0005_u32 as i32));
        assert_eq!(err.call(), "wglDXLockObjectsNV");
    }

    #[test]
    fn test_missing_entry_point() {
        let err = WglError::MissingEntryPoint("wglDXOpenDeviceNV");
        assert!(err.to_string().contains("wglDXOpenDeviceNV"));
        assert_eq!(err.code(), None);
    }
}
