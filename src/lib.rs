//! Presents frames rendered through a legacy OpenGL context on a DXGI
//! flip-model swap chain.
//!
//! The host engine renders into GL textures that are backed by Direct3D 11
//! textures (`WGL_NV_DX_interop`). [`InteropContext`] owns the shared-texture
//! registry, the swap chain and the frame-latency wait handle, and moves
//! pixels from a shared texture into the back buffer on request.

pub mod backend;
pub mod config;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod logging;
pub mod registry;
pub mod swapchain;
pub mod texture;
pub mod wait;

#[cfg(windows)]
pub mod ffi;

pub use backend::{BackendOptions, BlitStrategy, InteropDevice, PresentationBackend};
pub use config::InteropConfig;
pub use context::InteropContext;
pub use dxgl_wgl::{ContextCreationFlags, Profile};
pub use error::{InteropError, InteropResult};
pub use registry::{LockPolicy, SharedTexture, SharedTextureRegistry};
pub use swapchain::{PresentFlags, SwapChainDescriptor, SwapChainManager, Viewport};
pub use texture::{LockState, PixelFormat, TextureDesc, TextureKey};
pub use wait::{WaitHandle, WaitStatus, Waitable, DEFAULT_WAIT_TIMEOUT};

#[cfg(windows)]
pub use backend::d3d11::D3D11Backend;

/// Interop context on the Direct3D 11 backend.
#[cfg(windows)]
pub type D3D11InteropContext = InteropContext<D3D11Backend>;
