//! Backend seams.
//!
//! The registry only needs the shared-texture capability ([`InteropDevice`]);
//! the swapchain manager and the context need the full presentation path
//! ([`PresentationBackend`]). A different presentation API can be substituted
//! by implementing both traits.

use std::fmt::Debug;

use dxgl_wgl::ContextCreationFlags;
use serde::{Deserialize, Serialize};

use crate::error::InteropResult;
use crate::swapchain::{PresentFlags, SwapChainDescriptor, Viewport};
use crate::texture::{TextureDesc, TextureKey};
use crate::wait::Waitable;

#[cfg(windows)]
pub mod d3d11;

#[cfg(test)]
pub mod mock;

/// How a shared texture's pixels reach the back buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BlitStrategy {
    /// Full-screen triangle sampling the texture through a point sampler.
    #[default]
    ShaderSample,
    /// GPU-side copy of the overlapping region.
    DirectCopy,
}

/// Everything a backend needs at construction besides the window and flags.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackendOptions {
    pub debug_layer: bool,
    pub swap_chain: SwapChainDescriptor,
    pub blit_strategy: BlitStrategy,
}

/// Native textures that both APIs can reference.
///
/// Registration binds a native texture to a legacy texture name. Lock and
/// unlock take lists so several textures change hands in one native call.
pub trait InteropDevice {
    type Texture;
    type Handle: Copy + Debug;

    fn create_texture(&mut self, desc: &TextureDesc) -> InteropResult<Self::Texture>;

    fn release_texture(&mut self, texture: Self::Texture);

    /// Register `texture` as legacy object `key` of type `target`.
    fn register_texture(
        &mut self,
        texture: &Self::Texture,
        key: TextureKey,
        target: u32,
    ) -> InteropResult<Self::Handle>;

    fn unregister_texture(&mut self, handle: Self::Handle) -> InteropResult<()>;

    /// Hand the textures to the legacy API.
    fn lock_textures(&mut self, handles: &[Self::Handle]) -> InteropResult<()>;

    /// Hand the textures to the presentation API.
    fn unlock_textures(&mut self, handles: &[Self::Handle]) -> InteropResult<()>;
}

/// A presentation device with a swapchain bound to one window.
pub trait PresentationBackend: InteropDevice + Sized {
    type Window;
    type RenderTarget;
    type Waitable: Waitable;

    /// Build the legacy context, the device, the interop binding, the
    /// swapchain and the blit pipeline. On failure nothing created so far
    /// outlives the call.
    fn create(
        window: Self::Window,
        flags: &ContextCreationFlags,
        options: &BackendOptions,
    ) -> InteropResult<Self>;

    /// The frame-latency waitable, if the swapchain was created with one.
    /// Ownership moves to the caller.
    fn take_frame_waitable(&mut self) -> Option<Self::Waitable>;

    fn make_current(&mut self) -> InteropResult<()>;

    fn release_current(&mut self) -> InteropResult<()>;

    /// Render target for back buffer 0, with the buffer's width and height.
    fn create_back_buffer_view(&mut self) -> InteropResult<(Self::RenderTarget, u32, u32)>;

    fn release_back_buffer_view(&mut self, target: Self::RenderTarget);

    /// Move the pixels of `source` into `target`.
    fn transfer(
        &mut self,
        source: &Self::Texture,
        target: &Self::RenderTarget,
        viewport: &Viewport,
    ) -> InteropResult<()>;

    fn present(&mut self, interval: u32, flags: PresentFlags) -> InteropResult<()>;

    /// Resize the swapchain buffers, keeping format and creation flags.
    /// No back-buffer view may be alive.
    fn resize_buffers(&mut self, width: u32, height: u32) -> InteropResult<()>;

    /// Unbind all pipeline state.
    fn clear_state(&mut self);

    /// Release the swapchain, the interop binding, the device and the legacy
    /// context, in that order. Calling it again is a no-op.
    fn shutdown(&mut self) -> InteropResult<()>;
}
