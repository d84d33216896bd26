//! Legacy OpenGL context for the DXGI presentation bridge.
//!
//! Provides the hidden-window WGL context the host renderer draws into and the
//! `WGL_NV_DX_interop` entry points that share Direct3D 11 textures with it.
//! The context-creation flags and their attribute encoding are platform
//! independent; everything that touches WGL is Windows only.

mod error;
mod flags;

#[cfg(windows)]
mod context;
#[cfg(windows)]
mod interop;

pub use error::{WglError, WglResult};
pub use flags::{
    ContextCreationFlags, Profile, CONTEXT_COMPATIBILITY_PROFILE_BIT_ARB,
    CONTEXT_CORE_PROFILE_BIT_ARB, CONTEXT_FLAGS_ARB, CONTEXT_FORWARD_COMPATIBLE_BIT_ARB,
    CONTEXT_MAJOR_VERSION_ARB, CONTEXT_MINOR_VERSION_ARB, CONTEXT_PROFILE_MASK_ARB,
};

#[cfg(windows)]
pub use context::WglContext;
#[cfg(windows)]
pub use interop::{DxDeviceHandle, DxInterop, DxObjectHandle};

/// Access modes accepted by `wglDXRegisterObjectNV`.
pub const ACCESS_READ_ONLY_NV: u32 = 0x0000;
pub const ACCESS_READ_WRITE_NV: u32 = 0x0001;
pub const ACCESS_WRITE_DISCARD_NV: u32 = 0x0002;
