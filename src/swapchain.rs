//! Swapchain manager.
//!
//! Owns the cached back-buffer view and the sync interval. The view is
//! created lazily on the first transfer after construction or a resize and
//! reused until the next resize.

use crate::backend::PresentationBackend;
use crate::config::InteropConfig;
use crate::error::InteropResult;
use crate::texture::PixelFormat;

/// How the swapchain scales its buffers to the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scaling {
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwapEffect {
    FlipDiscard,
}

/// Creation parameters for the swapchain.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SwapChainDescriptor {
    pub format: PixelFormat,
    pub sample_count: u32,
    pub buffer_count: u32,
    pub scaling: Scaling,
    pub swap_effect: SwapEffect,
    pub allow_tearing: bool,
    pub frame_latency_waitable: bool,
    pub maximum_frame_latency: u32,
}

impl Default for SwapChainDescriptor {
    fn default() -> Self {
        Self {
            format: PixelFormat::Bgra8Unorm,
            sample_count: 1,
            buffer_count: 2,
            scaling: Scaling::None,
            swap_effect: SwapEffect::FlipDiscard,
            allow_tearing: true,
            frame_latency_waitable: true,
            maximum_frame_latency: 1,
        }
    }
}

impl SwapChainDescriptor {
    pub fn from_config(config: &InteropConfig) -> Self {
        Self {
            format: config.swap_chain.format,
            allow_tearing: config.swap_chain.allow_tearing,
            frame_latency_waitable: config.swap_chain.frame_latency_waitable,
            maximum_frame_latency: config.swap_chain.maximum_frame_latency,
            ..Self::default()
        }
    }
}

/// Flags passed along with a present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PresentFlags {
    None,
    AllowTearing,
}

/// Full-target viewport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn full(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Cached render target for back buffer 0 and its matching viewport.
#[derive(Debug)]
pub struct BackBufferView<R> {
    pub target: R,
    pub viewport: Viewport,
}

pub struct SwapChainManager<B: PresentationBackend> {
    view: Option<BackBufferView<B::RenderTarget>>,
    sync_interval: u32,
    allow_tearing: bool,
}

impl<B: PresentationBackend> SwapChainManager<B> {
    pub fn new(descriptor: &SwapChainDescriptor, sync_interval: u32) -> Self {
        Self {
            view: None,
            sync_interval,
            allow_tearing: descriptor.allow_tearing,
        }
    }

    pub fn sync_interval(&self) -> u32 {
        self.sync_interval
    }

    /// Takes effect on the next present.
    pub fn set_sync_interval(&mut self, interval: u32) {
        log::debug!("[SWAPCHAIN] sync interval {} -> {}", self.sync_interval, interval);
        self.sync_interval = interval;
    }

    pub fn view(&self) -> Option<&BackBufferView<B::RenderTarget>> {
        self.view.as_ref()
    }

    /// Flags for presenting with `interval`. Tearing is only requested for
    /// interval 0, and only when the swapchain was created to allow it.
    pub fn present_flags(&self, interval: u32) -> PresentFlags {
        if interval == 0 && self.allow_tearing {
            PresentFlags::AllowTearing
        } else {
            PresentFlags::None
        }
    }

    /// Move `source` into the current back buffer, creating the view first if
    /// none is cached.
    pub fn transfer(&mut self, backend: &mut B, source: &B::Texture) -> InteropResult<()> {
        let view = match self.view {
            Some(ref view) => view,
            None => {
                let (target, width, height) = backend.create_back_buffer_view()?;
                log::debug!("[SWAPCHAIN] Created back buffer view {}x{}", width, height);
                &*self.view.insert(BackBufferView {
                    target,
                    viewport: Viewport::full(width, height),
                })
            }
        };
        backend.transfer(source, &view.target, &view.viewport)
    }

    pub fn present(&mut self, backend: &mut B) -> InteropResult<()> {
        let interval = self.sync_interval;
        backend.present(interval, self.present_flags(interval))
    }

    pub fn resize(&mut self, backend: &mut B, width: u32, height: u32) -> InteropResult<()> {
        self.release_view(backend);
        log::info!("[SWAPCHAIN] Resizing buffers to {}x{}", width, height);
        backend.resize_buffers(width, height)
    }

    /// Drop the cached view. Returns whether one was cached.
    pub fn release_view(&mut self, backend: &mut B) -> bool {
        match self.view.take() {
            Some(view) => {
                backend.release_back_buffer_view(view.target);
                true
            }
            None => false,
        }
    }
}
