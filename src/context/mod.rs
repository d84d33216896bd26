//! The interop context.
//!
//! Ties one presentation backend to the shared-texture registry, the
//! swapchain manager and the frame-latency wait handle. The context is bound
//! to at most one thread at a time; texture operations check that binding at
//! the call boundary instead of relying on thread-local state.

use std::thread::{self, ThreadId};

use dxgl_wgl::ContextCreationFlags;

use crate::backend::{BackendOptions, PresentationBackend};
use crate::config::{self, InteropConfig};
use crate::error::{InteropError, InteropResult};
use crate::registry::{SharedTexture, SharedTextureRegistry};
use crate::swapchain::{SwapChainDescriptor, SwapChainManager};
use crate::texture::{LockState, TextureKey};
use crate::wait::WaitHandle;


pub struct InteropContext<B: PresentationBackend> {
    backend: B,
    registry: SharedTextureRegistry<B>,
    swap_chain: SwapChainManager<B>,
    wait_handle: WaitHandle<B::Waitable>,
    config: InteropConfig,
    owner: Option<ThreadId>,
    closed: bool,
}

impl<B: PresentationBackend> InteropContext<B> {
    /// Create a context for `window` using the global configuration.
    pub fn new(window: B::Window, flags: &ContextCreationFlags) -> InteropResult<Self> {
        Self::with_config(window, flags, &config::current())
    }

    /// Create a context for `window`. On return the context is current on the
    /// calling thread.
    pub fn with_config(
        window: B::Window,
        flags: &ContextCreationFlags,
        config: &InteropConfig,
    ) -> InteropResult<Self> {
        config.validate()?;
        let descriptor = SwapChainDescriptor::from_config(config);
        let options = BackendOptions {
            debug_layer: config.debug_layer,
            swap_chain: descriptor,
            blit_strategy: config.blit_strategy,
        };

        let mut backend = B::create(window, flags, &options)?;
        if let Err(e) = backend.make_current() {
            log::error!("[INTEROP] Failed to make new context current: {}", e);
            if let Err(shutdown_err) = backend.shutdown() {
                log::error!("[INTEROP] Shutdown after failed construction: {}", shutdown_err);
            }
            return Err(e);
        }

        let waitable = backend.take_frame_waitable();
        log::info!(
            "[INTEROP] Context created (GL {}.{} {:?}, {:?}, {:?}, waitable: {})",
            flags.major_version,
            flags.minor_version,
            flags.profile,
            descriptor.format,
            config.blit_strategy,
            waitable.is_some()
        );

        Ok(Self {
            backend,
            registry: SharedTextureRegistry::new(config.lock_policy),
            swap_chain: SwapChainManager::new(&descriptor, config.default_sync_interval),
            wait_handle: WaitHandle::new(waitable, config.frame_wait_timeout()),
            config: config.clone(),
            owner: Some(thread::current().id()),
            closed: false,
        })
    }

    /// Configuration snapshot taken at construction.
    pub fn config(&self) -> &InteropConfig {
        &self.config
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Whether the context is bound to the calling thread.
    pub fn is_current(&self) -> bool {
        self.owner == Some(thread::current().id())
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn registry(&self) -> &SharedTextureRegistry<B> {
        &self.registry
    }

    pub fn swap_chain(&self) -> &SwapChainManager<B> {
        &self.swap_chain
    }

    fn ensure_open(&self) -> InteropResult<()> {
        if self.closed {
            return Err(InteropError::Closed);
        }
        Ok(())
    }

    fn ensure_current(&self) -> InteropResult<()> {
        self.ensure_open()?;
        match self.owner {
            None => Err(InteropError::NotCurrent),
            Some(owner) if owner != thread::current().id() => Err(InteropError::WrongThread),
            Some(_) => Ok(()),
        }
    }

    // ========================================================================
    // Context binding
    // ========================================================================

    /// Bind the legacy context to the calling thread.
    pub fn make_current(&mut self) -> InteropResult<()> {
        self.ensure_open()?;
        let me = thread::current().id();
        if matches!(self.owner, Some(owner) if owner != me) {
            return Err(InteropError::WrongThread);
        }
        self.backend.make_current()?;
        self.owner = Some(me);
        Ok(())
    }

    /// Unbind the legacy context so another thread can make it current.
    pub fn release_current(&mut self) -> InteropResult<()> {
        self.ensure_current()?;
        self.backend.release_current()?;
        self.owner = None;
        Ok(())
    }

    // ========================================================================
    // Swapchain
    // ========================================================================

    /// Store the interval used by subsequent presents.
    pub fn set_sync_interval(&mut self, interval: u32) -> InteropResult<()> {
        self.ensure_open()?;
        self.swap_chain.set_sync_interval(interval);
        Ok(())
    }

    /// Block until the swapchain can take another frame, for at most the
    /// configured timeout.
    pub fn wait_for_swap_chain_signal(&self) -> InteropResult<()> {
        self.ensure_open()?;
        self.wait_handle.wait_for_signal()
    }

    pub fn swap_chain_present(&mut self) -> InteropResult<()> {
        self.ensure_open()?;
        self.swap_chain.present(&mut self.backend)
    }

    pub fn resize_swap_chain(&mut self, width: u32, height: u32) -> InteropResult<()> {
        self.ensure_open()?;
        self.swap_chain.resize(&mut self.backend, width, height)
    }

    // ========================================================================
    // Shared textures
    // ========================================================================

    /// Create a native texture for legacy texture `key` and register it.
    /// The texture is LOCKED (held by the legacy API) on return.
    pub fn allocate_shared_texture(
        &mut self,
        key: TextureKey,
        type_hint: u32,
        format_hint: u32,
        width: u32,
        height: u32,
    ) -> InteropResult<&SharedTexture<B>> {
        self.ensure_current()?;
        self.registry
            .allocate(&mut self.backend, key, type_hint, format_hint, width, height)
    }

    pub fn deallocate_shared_texture(&mut self, key: TextureKey) -> InteropResult<()> {
        self.ensure_current()?;
        self.registry.deallocate(&mut self.backend, key)
    }

    pub fn lock_shared_texture(&mut self, key: TextureKey) -> InteropResult<()> {
        self.ensure_current()?;
        self.registry.lock(&mut self.backend, key)
    }

    pub fn unlock_shared_texture(&mut self, key: TextureKey) -> InteropResult<()> {
        self.ensure_current()?;
        self.registry.unlock(&mut self.backend, key)
    }

    pub fn lock_all_shared_textures(&mut self) -> InteropResult<usize> {
        self.ensure_current()?;
        self.registry.lock_all(&mut self.backend)
    }

    pub fn unlock_all_shared_textures(&mut self) -> InteropResult<usize> {
        self.ensure_current()?;
        self.registry.unlock_all(&mut self.backend)
    }

    pub fn shared_texture_state(&self, key: TextureKey) -> InteropResult<LockState> {
        self.registry.state(key)
    }

    /// Copy the shared texture into the current back buffer.
    ///
    /// The texture is unlocked for the transfer and locked again afterwards,
    /// even if the transfer fails.
    pub fn blit_shared_texture_to_swap_chain(&mut self, key: TextureKey) -> InteropResult<()> {
        self.ensure_current()?;
        self.registry.unlock(&mut self.backend, key)?;

        let transferred = match self.registry.get(key) {
            Ok(entry) => self.swap_chain.transfer(&mut self.backend, &entry.texture),
            Err(e) => Err(e),
        };
        let relocked = self.registry.lock(&mut self.backend, key);

        transferred.and(relocked)
    }

    // ========================================================================
    // Teardown
    // ========================================================================

    /// Release every native resource, in reverse construction order.
    ///
    /// Interop registrations can only be released with the legacy context
    /// current, so an unbound context is bound to the calling thread first.
    /// Closing from a thread other than the owner fails with `WrongThread`
    /// and leaves the context open.
    ///
    /// All release steps run even if one fails; the first failure is
    /// returned. Closing twice is a no-op.
    pub fn close(&mut self) -> InteropResult<()> {
        if self.closed {
            return Ok(());
        }
        let me = thread::current().id();
        match self.owner {
            Some(owner) if owner != me => return Err(InteropError::WrongThread),
            Some(_) => {}
            None => {
                self.backend.make_current()?;
                self.owner = Some(me);
            }
        }
        self.closed = true;
        log::info!(
            "[INTEROP] Closing context ({} shared textures)",
            self.registry.len()
        );

        self.backend.clear_state();
        let cleared = self.registry.clear(&mut self.backend);
        self.swap_chain.release_view(&mut self.backend);
        self.wait_handle.close();
        let shutdown = self.backend.shutdown();
        self.owner = None;

        cleared.and(shutdown)
    }
}

impl<B: PresentationBackend> Drop for InteropContext<B> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            log::error!("[INTEROP] Failed to close context on drop: {}", e);
        }
    }
}
