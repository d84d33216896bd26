//! Central error types for the interop bridge.
//!
//! Native failures carry the raw status code plus a message resolved through
//! [`crate::diagnostics`]. Protocol violations name the offending texture key.

use thiserror::Error;

use crate::diagnostics::{self, MessageChain};
use crate::texture::TextureKey;

/// Main error type for interop operations.
#[derive(Error, Debug)]
pub enum InteropError {
    /// A status-returning native call failed
    #[error("{context}: HRESULT 0x{code:08x}: {message}")]
    Native {
        context: String,
        code: i32,
        message: String,
    },

    /// The key already has a shared texture
    #[error("Shared texture already allocated for identifier {key}")]
    AlreadyAllocated { key: TextureKey },

    /// No shared texture registered under the key
    #[error("No shared texture allocated for identifier {key}")]
    NotFound { key: TextureKey },

    /// The legacy format hint has no native counterpart
    #[error("Unsupported texture format 0x{format:04x}")]
    UnsupportedFormat { format: u32 },

    /// Redundant lock/unlock rejected by the strict lock policy
    #[error("Shared texture {key} is already {}", lock_word(.locked))]
    LockState { key: TextureKey, locked: bool },

    /// Blit shader failed to compile; carries the compiler output verbatim
    #[error("Failed to compile shader {entry_point}: {diagnostics}")]
    ShaderCompile {
        entry_point: String,
        diagnostics: String,
    },

    /// No thread has made the context current
    #[error("Interop context is not current on any thread")]
    NotCurrent,

    /// The context is current on a different thread
    #[error("Interop context is current on another thread")]
    WrongThread,

    /// The context has already been closed
    #[error("Interop context is closed")]
    Closed,

    /// Required driver functionality is missing
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Reading a config file or log file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

fn lock_word(locked: &bool) -> &'static str {
    if *locked {
        "locked"
    } else {
        "unlocked"
    }
}

impl InteropError {
    /// Native failure with the message resolved through the platform tables.
    pub fn native(context: impl Into<String>, code: i32) -> Self {
        Self::Native {
            context: context.into(),
            code,
            message: diagnostics::resolve(code),
        }
    }

    /// Native failure with the message resolved through `messages`.
    pub fn native_with(context: impl Into<String>, code: i32, messages: &MessageChain) -> Self {
        Self::Native {
            context: context.into(),
            code,
            message: messages.resolve(code),
        }
    }

    /// Raw native status code, if this is a native failure.
    pub fn code(&self) -> Option<i32> {
        match self {
            InteropError::Native { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// True for local-state errors on the shared-texture registry.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            InteropError::AlreadyAllocated { .. }
                | InteropError::NotFound { .. }
                | InteropError::LockState { .. }
        )
    }
}

impl From<dxgl_wgl::WglError> for InteropError {
    fn from(err: dxgl_wgl::WglError) -> Self {
        match err.code() {
            Some(code) => InteropError::native(err.call(), code),
            None => InteropError::Unsupported(err.to_string()),
        }
    }
}

impl From<String> for InteropError {
    fn from(msg: String) -> Self {
        InteropError::Other(msg)
    }
}

impl From<&str> for InteropError {
    fn from(msg: &str) -> Self {
        InteropError::Other(msg.to_string())
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error, converting it to InteropError::Other.
    fn context(self, msg: &str) -> InteropResult<T>;

    /// Add context lazily (only evaluated on error).
    fn with_context<F: FnOnce() -> String>(self, f: F) -> InteropResult<T>;
}

impl<T, E: std::fmt::Display> ResultExt<T> for Result<T, E> {
    fn context(self, msg: &str) -> InteropResult<T> {
        self.map_err(|e| InteropError::Other(format!("{}: {}", msg, e)))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> InteropResult<T> {
        self.map_err(|e| InteropError::Other(format!("{}: {}", f(), e)))
    }
}

/// Extension trait for adding context to Option types.
pub trait OptionExt<T> {
    /// Convert None to InteropError::Other with the given message.
    fn context(self, msg: &str) -> InteropResult<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn context(self, msg: &str) -> InteropResult<T> {
        self.ok_or_else(|| InteropError::Other(msg.to_string()))
    }
}

/// Type alias for Results using InteropError.
pub type InteropResult<T> = Result<T, InteropError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::StaticTable;

    #[test]
    fn test_native_error_display() {
        let chain = MessageChain::new().with_table(
            StaticTable::new("test").with(0x887A_0005_u32 as i32, "The GPU device instance has been suspended."),
        );
        let err = InteropError::native_with("IDXGISwapChain::Present", 0x887A_0005_u32 as i32, &chain);
        assert_eq!(
            err.to_string(),
            "IDXGISwapChain::Present: HRESULT 0x887a0005: The GPU device instance has been suspended."
        );
        assert_eq!(err.code(), Some(0x887A_0005_u32 as i32));
    }

    #[test]
    fn test_native_error_fallback_message() {
        let err = InteropError::native_with("CreateTexture2D", 0x1234, &MessageChain::new());
        assert!(err.to_string().ends_with("unspecified error"));
    }

    #[test]
    fn test_protocol_errors_name_the_key() {
        let err = InteropError::AlreadyAllocated { key: 7 };
        assert!(err.to_string().contains('7'));
        assert!(err.is_protocol_violation());

        let err = InteropError::NotFound { key: 42 };
        assert_eq!(err.to_string(), "No shared texture allocated for identifier 42");
        assert!(err.is_protocol_violation());
    }

    #[test]
    fn test_lock_state_display() {
        let locked = InteropError::LockState { key: 3, locked: true };
        assert_eq!(locked.to_string(), "Shared texture 3 is already locked");

        let unlocked = InteropError::LockState { key: 3, locked: false };
        assert_eq!(unlocked.to_string(), "Shared texture 3 is already unlocked");
    }

    #[test]
    fn test_shader_compile_keeps_diagnostics_verbatim() {
        let text = "blit.hlsl(12,5): error X3004: undeclared identifier 'srcTex'";
        let err = InteropError::ShaderCompile {
            entry_point: "PsMain".to_string(),
            diagnostics: text.to_string(),
        };
        assert!(err.to_string().contains(text));
        assert!(!err.is_protocol_violation());
    }

    #[test]
    fn test_from_wgl_error() {
        let err: InteropError = dxgl_wgl::WglError::MissingEntryPoint("wglDXOpenDeviceNV").into();
        assert!(matches!(err, InteropError::Unsupported(_)));

        let err: InteropError = dxgl_wgl::WglError::Native {
            call: "wglDXLockObjectsNV",
            code: 5,
        }
        .into();
        assert_eq!(err.code(), Some(5));
        assert!(err.to_string().starts_with("wglDXLockObjectsNV"));
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: InteropError = io_err.into();
        assert!(matches!(err, InteropError::Io(_)));
    }

    #[test]
    fn test_result_ext_context() {
        let result: Result<(), &str> = Err("original error");
        let msg = result.context("operation failed").unwrap_err().to_string();
        assert!(msg.contains("operation failed"));
        assert!(msg.contains("original error"));
    }

    #[test]
    fn test_result_ext_with_context() {
        let result: Result<(), &str> = Err("inner");
        let msg = result
            .with_context(|| format!("ctx-{}", 42))
            .unwrap_err()
            .to_string();
        assert!(msg.contains("ctx-42"));
        assert!(msg.contains("inner"));
    }

    #[test]
    fn test_option_ext_context() {
        let opt: Option<i32> = None;
        let result = opt.context("value was missing");
        assert!(matches!(result, Err(InteropError::Other(_))));

        assert_eq!(Some(42).context("should not appear").unwrap(), 42);
    }
}
