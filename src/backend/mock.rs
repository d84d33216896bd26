//! Recording backend for tests.
//!
//! Every native call is appended to a shared ledger, live resources are
//! counted, and any call can be made to fail once.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use dxgl_wgl::ContextCreationFlags;
use parking_lot::Mutex;

use super::{BackendOptions, BlitStrategy, InteropDevice, PresentationBackend};
use crate::error::{InteropError, InteropResult};
use crate::swapchain::{PresentFlags, Viewport};
use crate::texture::{TextureDesc, TextureKey};
use crate::wait::{WaitStatus, Waitable};

/// DXGI_ERROR_INVALID_CALL
pub const MOCK_FAILURE_CODE: i32 = 0x887A_0001_u32 as i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailPoint {
    CreateContext,
    CreateDevice,
    OpenInterop,
    CreateSwapChain,
    FrameWaitable,
    CompilePipeline,
    MakeCurrent,
    ReleaseCurrent,
    CreateTexture,
    Register,
    Unregister,
    Lock,
    Unlock,
    CreateView,
    Transfer,
    Present,
    Resize,
    CloseWaitable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Resource {
    Context,
    Device,
    InteropDevice,
    SwapChain,
    Waitable,
    Pipeline,
    Texture(u64),
    Registration(u64),
    View(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateContext,
    CreateDevice { debug_layer: bool },
    OpenInterop,
    CreateSwapChain { width: u32, height: u32 },
    CreateWaitable,
    CompilePipeline,
    MakeCurrent,
    ReleaseCurrent,
    CreateTexture { id: u64, width: u32, height: u32 },
    ReleaseTexture { id: u64 },
    Register { key: TextureKey },
    Unregister { key: TextureKey },
    Lock(Vec<TextureKey>),
    Unlock(Vec<TextureKey>),
    CreateView { width: u32, height: u32 },
    ReleaseView,
    Transfer { strategy: BlitStrategy, texture: u64, viewport: Viewport },
    Present { interval: u32, flags: PresentFlags },
    Resize { width: u32, height: u32 },
    ClearState,
    ReleaseSwapChain,
    CloseInterop,
    ReleasePipeline,
    ReleaseDeviceContext,
    ReleaseDevice,
    DeleteContext,
    CloseWaitable,
}

#[derive(Debug)]
pub struct Ledger {
    calls: Vec<Call>,
    live: BTreeSet<Resource>,
    fail: HashSet<FailPoint>,
    wait_status: WaitStatus,
    next_id: u64,
}

impl Default for Ledger {
    fn default() -> Self {
        Self {
            calls: Vec::new(),
            live: BTreeSet::new(),
            fail: HashSet::new(),
            wait_status: WaitStatus::Signaled,
            next_id: 1,
        }
    }
}

/// Shared view of a ledger; cloned into the window, backend and waitable.
#[derive(Debug, Clone, Default)]
pub struct MockLedger(Arc<Mutex<Ledger>>);

impl MockLedger {
    /// Fail the next call reaching `point`.
    pub fn fail_at(&self, point: FailPoint) {
        self.0.lock().fail.insert(point);
    }

    pub fn set_wait_status(&self, status: WaitStatus) {
        self.0.lock().wait_status = status;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.0.lock().calls.clear();
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.0.lock().calls.iter().filter(|c| pred(c)).count()
    }

    pub fn presents(&self) -> Vec<(u32, PresentFlags)> {
        self.0
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::Present { interval, flags } => Some((*interval, *flags)),
                _ => None,
            })
            .collect()
    }

    /// Number of native resources currently alive.
    pub fn outstanding(&self) -> usize {
        self.0.lock().live.len()
    }

    pub fn live(&self) -> Vec<Resource> {
        self.0.lock().live.iter().copied().collect()
    }

    fn record(&self, call: Call) {
        self.0.lock().calls.push(call);
    }

    fn check(&self, point: FailPoint, context: &str) -> InteropResult<()> {
        if self.0.lock().fail.remove(&point) {
            return Err(InteropError::Native {
                context: context.to_string(),
                code: MOCK_FAILURE_CODE,
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn acquire(&self, resource: Resource) {
        self.0.lock().live.insert(resource);
    }

    fn release(&self, resource: Resource) {
        self.0.lock().live.remove(&resource);
    }

    fn next_id(&self) -> u64 {
        let mut ledger = self.0.lock();
        let id = ledger.next_id;
        ledger.next_id += 1;
        id
    }
}

/// Stand-in for a native window: a client size and the ledger.
#[derive(Debug, Clone)]
pub struct MockWindow {
    pub width: u32,
    pub height: u32,
    ledger: MockLedger,
}

impl MockWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            ledger: MockLedger::default(),
        }
    }

    pub fn ledger(&self) -> &MockLedger {
        &self.ledger
    }
}

#[derive(Debug)]
pub struct MockTexture {
    pub id: u64,
    pub desc: TextureDesc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockHandle {
    pub id: u64,
    pub key: TextureKey,
}

#[derive(Debug)]
pub struct MockTarget {
    pub id: u64,
}

pub struct MockWaitable {
    ledger: MockLedger,
}

impl Waitable for MockWaitable {
    fn wait(&self, _timeout: Duration) -> WaitStatus {
        self.ledger.0.lock().wait_status
    }

    fn close(&mut self) -> InteropResult<()> {
        self.ledger.record(Call::CloseWaitable);
        self.ledger.release(Resource::Waitable);
        self.ledger.check(FailPoint::CloseWaitable, "CloseHandle")
    }
}

pub struct MockBackend {
    ledger: MockLedger,
    options: BackendOptions,
    flags: ContextCreationFlags,
    buffer_size: (u32, u32),
    waitable: Option<MockWaitable>,
    alive: bool,
}

impl MockBackend {
    pub fn options(&self) -> &BackendOptions {
        &self.options
    }

    pub fn flags(&self) -> &ContextCreationFlags {
        &self.flags
    }

    fn step(
        &self,
        created: &mut Vec<Resource>,
        point: FailPoint,
        context: &str,
        call: Call,
        resource: Resource,
    ) -> InteropResult<()> {
        if let Err(e) = self.ledger.check(point, context) {
            for resource in created.drain(..).rev() {
                if resource == Resource::Waitable {
                    self.ledger.record(Call::CloseWaitable);
                }
                self.ledger.release(resource);
            }
            return Err(e);
        }
        self.ledger.record(call);
        self.ledger.acquire(resource);
        created.push(resource);
        Ok(())
    }
}

impl InteropDevice for MockBackend {
    type Texture = MockTexture;
    type Handle = MockHandle;

    fn create_texture(&mut self, desc: &TextureDesc) -> InteropResult<MockTexture> {
        self.ledger.check(FailPoint::CreateTexture, "ID3D11Device::CreateTexture2D")?;
        let id = self.ledger.next_id();
        self.ledger.record(Call::CreateTexture {
            id,
            width: desc.width,
            height: desc.height,
        });
        self.ledger.acquire(Resource::Texture(id));
        Ok(MockTexture { id, desc: *desc })
    }

    fn release_texture(&mut self, texture: MockTexture) {
        self.ledger.record(Call::ReleaseTexture { id: texture.id });
        self.ledger.release(Resource::Texture(texture.id));
    }

    fn register_texture(
        &mut self,
        _texture: &MockTexture,
        key: TextureKey,
        _target: u32,
    ) -> InteropResult<MockHandle> {
        self.ledger.check(FailPoint::Register, "wglDXRegisterObjectNV")?;
        let id = self.ledger.next_id();
        self.ledger.record(Call::Register { key });
        self.ledger.acquire(Resource::Registration(id));
        Ok(MockHandle { id, key })
    }

    fn unregister_texture(&mut self, handle: MockHandle) -> InteropResult<()> {
        self.ledger.record(Call::Unregister { key: handle.key });
        self.ledger.check(FailPoint::Unregister, "wglDXUnregisterObjectNV")?;
        self.ledger.release(Resource::Registration(handle.id));
        Ok(())
    }

    fn lock_textures(&mut self, handles: &[MockHandle]) -> InteropResult<()> {
        self.ledger.check(FailPoint::Lock, "wglDXLockObjectsNV")?;
        self.ledger
            .record(Call::Lock(handles.iter().map(|h| h.key).collect()));
        Ok(())
    }

    fn unlock_textures(&mut self, handles: &[MockHandle]) -> InteropResult<()> {
        self.ledger.check(FailPoint::Unlock, "wglDXUnlockObjectsNV")?;
        self.ledger
            .record(Call::Unlock(handles.iter().map(|h| h.key).collect()));
        Ok(())
    }
}

impl PresentationBackend for MockBackend {
    type Window = MockWindow;
    type RenderTarget = MockTarget;
    type Waitable = MockWaitable;

    fn create(
        window: MockWindow,
        flags: &ContextCreationFlags,
        options: &BackendOptions,
    ) -> InteropResult<Self> {
        let mut backend = MockBackend {
            ledger: window.ledger.clone(),
            options: *options,
            flags: *flags,
            buffer_size: (window.width, window.height),
            waitable: None,
            alive: false,
        };

        let mut created = Vec::new();
        backend.step(
            &mut created,
            FailPoint::CreateContext,
            "wglCreateContextAttribsARB",
            Call::CreateContext,
            Resource::Context,
        )?;
        backend.step(
            &mut created,
            FailPoint::CreateDevice,
            "D3D11CreateDevice",
            Call::CreateDevice {
                debug_layer: options.debug_layer,
            },
            Resource::Device,
        )?;
        backend.step(
            &mut created,
            FailPoint::OpenInterop,
            "wglDXOpenDeviceNV",
            Call::OpenInterop,
            Resource::InteropDevice,
        )?;
        backend.step(
            &mut created,
            FailPoint::CreateSwapChain,
            "IDXGIFactory2::CreateSwapChainForHwnd",
            Call::CreateSwapChain {
                width: window.width,
                height: window.height,
            },
            Resource::SwapChain,
        )?;
        if options.swap_chain.frame_latency_waitable {
            backend.step(
                &mut created,
                FailPoint::FrameWaitable,
                "IDXGISwapChain2::GetFrameLatencyWaitableObject",
                Call::CreateWaitable,
                Resource::Waitable,
            )?;
        }
        if options.blit_strategy == BlitStrategy::ShaderSample {
            backend.step(
                &mut created,
                FailPoint::CompilePipeline,
                "D3DCompile",
                Call::CompilePipeline,
                Resource::Pipeline,
            )?;
        }

        if options.swap_chain.frame_latency_waitable {
            backend.waitable = Some(MockWaitable {
                ledger: backend.ledger.clone(),
            });
        }
        backend.alive = true;
        Ok(backend)
    }

    fn take_frame_waitable(&mut self) -> Option<MockWaitable> {
        self.waitable.take()
    }

    fn make_current(&mut self) -> InteropResult<()> {
        self.ledger.check(FailPoint::MakeCurrent, "wglMakeCurrent")?;
        self.ledger.record(Call::MakeCurrent);
        Ok(())
    }

    fn release_current(&mut self) -> InteropResult<()> {
        self.ledger.check(FailPoint::ReleaseCurrent, "wglMakeCurrent")?;
        self.ledger.record(Call::ReleaseCurrent);
        Ok(())
    }

    fn create_back_buffer_view(&mut self) -> InteropResult<(MockTarget, u32, u32)> {
        self.ledger
            .check(FailPoint::CreateView, "ID3D11Device::CreateRenderTargetView")?;
        let id = self.ledger.next_id();
        let (width, height) = self.buffer_size;
        self.ledger.record(Call::CreateView { width, height });
        self.ledger.acquire(Resource::View(id));
        Ok((MockTarget { id }, width, height))
    }

    fn release_back_buffer_view(&mut self, target: MockTarget) {
        self.ledger.record(Call::ReleaseView);
        self.ledger.release(Resource::View(target.id));
    }

    fn transfer(
        &mut self,
        source: &MockTexture,
        _target: &MockTarget,
        viewport: &Viewport,
    ) -> InteropResult<()> {
        self.ledger.check(FailPoint::Transfer, "ID3D11DeviceContext::Draw")?;
        self.ledger.record(Call::Transfer {
            strategy: self.options.blit_strategy,
            texture: source.id,
            viewport: *viewport,
        });
        Ok(())
    }

    fn present(&mut self, interval: u32, flags: PresentFlags) -> InteropResult<()> {
        self.ledger.record(Call::Present { interval, flags });
        self.ledger.check(FailPoint::Present, "IDXGISwapChain::Present")
    }

    fn resize_buffers(&mut self, width: u32, height: u32) -> InteropResult<()> {
        self.ledger.check(FailPoint::Resize, "IDXGISwapChain::ResizeBuffers")?;
        self.ledger.record(Call::Resize { width, height });
        self.buffer_size = (width, height);
        Ok(())
    }

    fn clear_state(&mut self) {
        self.ledger.record(Call::ClearState);
    }

    fn shutdown(&mut self) -> InteropResult<()> {
        if !self.alive {
            return Ok(());
        }
        self.alive = false;

        let mut sequence = vec![
            (Call::ReleaseSwapChain, Some(Resource::SwapChain)),
            (Call::CloseInterop, Some(Resource::InteropDevice)),
        ];
        if self.options.blit_strategy == BlitStrategy::ShaderSample {
            sequence.push((Call::ReleasePipeline, Some(Resource::Pipeline)));
        }
        sequence.extend([
            (Call::ReleaseDeviceContext, None),
            (Call::ReleaseDevice, Some(Resource::Device)),
            (Call::DeleteContext, Some(Resource::Context)),
        ]);
        for (call, resource) in sequence {
            self.ledger.record(call);
            if let Some(resource) = resource {
                self.ledger.release(resource);
            }
        }
        Ok(())
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        if let Some(mut waitable) = self.waitable.take() {
            let _ = waitable.close();
        }
        let _ = self.shutdown();
    }
}
