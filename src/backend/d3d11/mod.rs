//! Direct3D 11 presentation backend.
//!
//! Owns the WGL context, the D3D11 device and immediate context, the
//! `WGL_NV_DX_interop` device binding, the flip-model swap chain and the blit
//! pipeline. Shared textures are D3D11 textures registered with the interop
//! device, so GL renders straight into memory the swap chain can read.

mod device;
mod pipeline;
mod waitable;

use std::num::NonZeroIsize;

use dxgl_wgl::{ContextCreationFlags, DxDeviceHandle, DxObjectHandle, WglContext, ACCESS_WRITE_DISCARD_NV};
use raw_window_handle::{RawWindowHandle, Win32WindowHandle};
use windows::core::Interface;
use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Direct3D11::{
    ID3D11Device, ID3D11DeviceContext, ID3D11RenderTargetView, ID3D11ShaderResourceView,
    ID3D11Texture2D, D3D11_BIND_RENDER_TARGET, D3D11_BIND_SHADER_RESOURCE, D3D11_BOX,
    D3D11_TEXTURE2D_DESC, D3D11_USAGE_DEFAULT,
};
use windows::Win32::Graphics::Dxgi::Common::{DXGI_FORMAT_UNKNOWN, DXGI_SAMPLE_DESC};
use windows::Win32::Graphics::Dxgi::{
    IDXGISwapChain1, DXGI_PRESENT, DXGI_PRESENT_ALLOW_TEARING, DXGI_SWAP_CHAIN_FLAG,
};

use super::{BackendOptions, BlitStrategy, InteropDevice, PresentationBackend};
use crate::error::{InteropError, InteropResult};
use crate::swapchain::{PresentFlags, SwapChainDescriptor, Viewport};
use crate::texture::{TextureDesc, TextureKey};

pub use device::dxgi_format;
pub use pipeline::BlitPipeline;
pub use waitable::FrameLatencyWaitable;

/// Map `windows` errors to [`InteropError::Native`], naming the failed call.
pub(crate) trait NativeResultExt<T> {
    fn native(self, call: &str) -> InteropResult<T>;
}

impl<T> NativeResultExt<T> for windows::core::Result<T> {
    fn native(self, call: &str) -> InteropResult<T> {
        self.map_err(|e| {
            log::error!("[D3D11] {} failed: {}", call, e);
            InteropError::native(call, e.code().0)
        })
    }
}

/// Run an out-parameter style creation call and unwrap its result.
pub(crate) fn create<T>(
    call: &str,
    f: impl FnOnce(Option<*mut Option<T>>) -> windows::core::Result<()>,
) -> InteropResult<T> {
    let mut out = None;
    f(Some(&mut out)).native(call)?;
    out.ok_or_else(|| InteropError::Other(format!("{} returned no object", call)))
}

/// Convert a window handle from a windowing library.
pub fn hwnd_from_raw(handle: RawWindowHandle) -> InteropResult<HWND> {
    match handle {
        RawWindowHandle::Win32(handle) => Ok(HWND(handle.hwnd.get() as *mut _)),
        other => Err(InteropError::Unsupported(format!(
            "window handle {:?} is not a Win32 handle",
            other
        ))),
    }
}

/// Convert a raw `HWND` value received over the C ABI.
pub fn hwnd_from_isize(hwnd: isize) -> InteropResult<HWND> {
    let hwnd = NonZeroIsize::new(hwnd)
        .ok_or_else(|| InteropError::Other("window handle is null".to_string()))?;
    hwnd_from_raw(RawWindowHandle::Win32(Win32WindowHandle::new(hwnd)))
}

/// A texture shared with GL.
pub struct D3D11Texture {
    texture: ID3D11Texture2D,
    view: Option<ID3D11ShaderResourceView>,
    desc: TextureDesc,
}

/// Back buffer 0 and its render target view.
pub struct BackBufferTarget {
    buffer: ID3D11Texture2D,
    view: ID3D11RenderTargetView,
}

struct Inner {
    swap_chain: IDXGISwapChain1,
    interop_device: DxDeviceHandle,
    pipeline: Option<BlitPipeline>,
    context: ID3D11DeviceContext,
    device: ID3D11Device,
    wgl: WglContext,
}

pub struct D3D11Backend {
    inner: Option<Inner>,
    waitable: Option<FrameLatencyWaitable>,
    descriptor: SwapChainDescriptor,
    strategy: BlitStrategy,
}

// SAFETY: the context is only used from the thread it is current on; the
// owning `InteropContext` checks that at every texture operation.
unsafe impl Send for D3D11Backend {}

impl D3D11Backend {
    fn inner(&self) -> InteropResult<&Inner> {
        self.inner.as_ref().ok_or(InteropError::Closed)
    }

    pub fn device(&self) -> Option<&ID3D11Device> {
        self.inner.as_ref().map(|inner| &inner.device)
    }
}

/// Everything after the interop device is opened. Dropping the result on
/// failure releases whatever was created.
fn build_presentation(
    device: &ID3D11Device,
    context: &ID3D11DeviceContext,
    hwnd: HWND,
    options: &BackendOptions,
) -> InteropResult<(IDXGISwapChain1, Option<FrameLatencyWaitable>, Option<BlitPipeline>)> {
    let descriptor = &options.swap_chain;
    let swap_chain = device::create_swap_chain(device, hwnd, descriptor)?;

    let waitable = if descriptor.frame_latency_waitable {
        let handle = device::frame_latency_waitable(&swap_chain, descriptor.maximum_frame_latency)?;
        Some(FrameLatencyWaitable::new(handle))
    } else {
        None
    };

    let pipeline = match options.blit_strategy {
        BlitStrategy::ShaderSample => {
            let pipeline = BlitPipeline::new(device)?;
            pipeline.bind(context);
            Some(pipeline)
        }
        BlitStrategy::DirectCopy => None,
    };

    Ok((swap_chain, waitable, pipeline))
}

impl InteropDevice for D3D11Backend {
    type Texture = D3D11Texture;
    type Handle = DxObjectHandle;

    fn create_texture(&mut self, desc: &TextureDesc) -> InteropResult<D3D11Texture> {
        let inner = self.inner()?;
        let texture = create("ID3D11Device::CreateTexture2D", |out| unsafe {
            inner.device.CreateTexture2D(
                &D3D11_TEXTURE2D_DESC {
                    Width: desc.width,
                    Height: desc.height,
                    MipLevels: 1,
                    ArraySize: 1,
                    Format: dxgi_format(desc.format),
                    SampleDesc: DXGI_SAMPLE_DESC {
                        Count: 1,
                        Quality: 0,
                    },
                    Usage: D3D11_USAGE_DEFAULT,
                    BindFlags: (D3D11_BIND_RENDER_TARGET.0 | D3D11_BIND_SHADER_RESOURCE.0) as u32,
                    CPUAccessFlags: 0,
                    MiscFlags: 0,
                },
                None,
                out,
            )
        })?;

        let view = match self.strategy {
            BlitStrategy::ShaderSample => Some(create(
                "ID3D11Device::CreateShaderResourceView",
                |out| unsafe { inner.device.CreateShaderResourceView(&texture, None, out) },
            )?),
            BlitStrategy::DirectCopy => None,
        };

        Ok(D3D11Texture {
            texture,
            view,
            desc: *desc,
        })
    }

    fn release_texture(&mut self, texture: D3D11Texture) {
        drop(texture);
    }

    fn register_texture(
        &mut self,
        texture: &D3D11Texture,
        key: TextureKey,
        target: u32,
    ) -> InteropResult<DxObjectHandle> {
        let inner = self.inner()?;
        let handle = unsafe {
            inner.wgl.interop().register_object(
                inner.interop_device,
                texture.texture.as_raw(),
                key,
                target,
                ACCESS_WRITE_DISCARD_NV,
            )
        }?;
        Ok(handle)
    }

    fn unregister_texture(&mut self, handle: DxObjectHandle) -> InteropResult<()> {
        let inner = self.inner()?;
        unsafe { inner.wgl.interop().unregister_object(inner.interop_device, handle) }?;
        Ok(())
    }

    fn lock_textures(&mut self, handles: &[DxObjectHandle]) -> InteropResult<()> {
        let inner = self.inner()?;
        unsafe { inner.wgl.interop().lock_objects(inner.interop_device, handles) }?;
        Ok(())
    }

    fn unlock_textures(&mut self, handles: &[DxObjectHandle]) -> InteropResult<()> {
        let inner = self.inner()?;
        unsafe { inner.wgl.interop().unlock_objects(inner.interop_device, handles) }?;
        Ok(())
    }
}

impl PresentationBackend for D3D11Backend {
    type Window = HWND;
    type RenderTarget = BackBufferTarget;
    type Waitable = FrameLatencyWaitable;

    fn create(
        hwnd: HWND,
        flags: &ContextCreationFlags,
        options: &BackendOptions,
    ) -> InteropResult<Self> {
        // GL first: the interop device can only be opened with a live context.
        let wgl = WglContext::create(flags)?;
        wgl.make_current()?;

        let (device, context) = device::create_device(options.debug_layer)?;
        let interop_device = unsafe { wgl.interop().open_device(device.as_raw()) }?;

        let (swap_chain, waitable, pipeline) =
            match build_presentation(&device, &context, hwnd, options) {
                Ok(parts) => parts,
                Err(e) => {
                    if let Err(close_err) = unsafe { wgl.interop().close_device(interop_device) } {
                        log::error!("[D3D11] wglDXCloseDeviceNV during cleanup: {}", close_err);
                    }
                    return Err(e);
                }
            };

        log::info!(
            "[D3D11] Created device (debug layer: {}) and {:?} swap chain",
            options.debug_layer,
            options.swap_chain.format
        );

        Ok(Self {
            inner: Some(Inner {
                swap_chain,
                interop_device,
                pipeline,
                context,
                device,
                wgl,
            }),
            waitable,
            descriptor: options.swap_chain,
            strategy: options.blit_strategy,
        })
    }

    fn take_frame_waitable(&mut self) -> Option<FrameLatencyWaitable> {
        self.waitable.take()
    }

    fn make_current(&mut self) -> InteropResult<()> {
        self.inner()?.wgl.make_current()?;
        Ok(())
    }

    fn release_current(&mut self) -> InteropResult<()> {
        self.inner()?.wgl.release_current()?;
        Ok(())
    }

    fn create_back_buffer_view(&mut self) -> InteropResult<(BackBufferTarget, u32, u32)> {
        let inner = self.inner()?;
        let buffer: ID3D11Texture2D =
            unsafe { inner.swap_chain.GetBuffer(0) }.native("IDXGISwapChain1::GetBuffer")?;
        let view = create("ID3D11Device::CreateRenderTargetView", |out| unsafe {
            inner.device.CreateRenderTargetView(&buffer, None, out)
        })?;

        let mut desc = D3D11_TEXTURE2D_DESC::default();
        unsafe { buffer.GetDesc(&mut desc) };
        Ok((BackBufferTarget { buffer, view }, desc.Width, desc.Height))
    }

    fn release_back_buffer_view(&mut self, target: BackBufferTarget) {
        if let Some(inner) = self.inner.as_ref() {
            // The context must not hold a reference when the buffers resize.
            unsafe { inner.context.OMSetRenderTargets(None, None) };
        }
        drop(target);
    }

    fn transfer(
        &mut self,
        source: &D3D11Texture,
        target: &BackBufferTarget,
        viewport: &Viewport,
    ) -> InteropResult<()> {
        let inner = self.inner()?;
        match (&inner.pipeline, &source.view) {
            (Some(pipeline), Some(view)) => {
                pipeline.draw(&inner.context, view, &target.view, viewport);
            }
            _ => {
                let region = D3D11_BOX {
                    left: 0,
                    top: 0,
                    front: 0,
                    right: source.desc.width.min(viewport.width),
                    bottom: source.desc.height.min(viewport.height),
                    back: 1,
                };
                unsafe {
                    inner.context.CopySubresourceRegion(
                        &target.buffer,
                        0,
                        0,
                        0,
                        0,
                        &source.texture,
                        0,
                        Some(&region),
                    )
                };
            }
        }
        Ok(())
    }

    fn present(&mut self, interval: u32, flags: PresentFlags) -> InteropResult<()> {
        let inner = self.inner()?;
        let flags = match flags {
            PresentFlags::AllowTearing => DXGI_PRESENT_ALLOW_TEARING,
            PresentFlags::None => DXGI_PRESENT(0),
        };
        unsafe { inner.swap_chain.Present(interval, flags) }
            .ok()
            .native("IDXGISwapChain::Present")
    }

    fn resize_buffers(&mut self, width: u32, height: u32) -> InteropResult<()> {
        let inner = self.inner()?;
        let flags = device::swap_chain_flags(&self.descriptor);
        unsafe {
            inner.swap_chain.ResizeBuffers(
                0,
                width,
                height,
                DXGI_FORMAT_UNKNOWN,
                DXGI_SWAP_CHAIN_FLAG(flags as i32),
            )
        }
        .native("IDXGISwapChain::ResizeBuffers")
    }

    fn clear_state(&mut self) {
        if let Some(inner) = self.inner.as_ref() {
            unsafe { inner.context.ClearState() };
        }
    }

    fn shutdown(&mut self) -> InteropResult<()> {
        let Some(inner) = self.inner.take() else {
            return Ok(());
        };
        let Inner {
            swap_chain,
            interop_device,
            pipeline,
            context,
            device,
            wgl,
        } = inner;

        drop(swap_chain);

        // wglDXCloseDeviceNV needs the GL context current on this thread.
        let closed = wgl
            .make_current()
            .map_err(InteropError::from)
            .and_then(|_| unsafe { wgl.interop().close_device(interop_device) }.map_err(InteropError::from));
        if let Err(e) = &closed {
            log::error!("[D3D11] Failed to close interop device: {}", e);
        }

        drop(pipeline);
        unsafe { context.Flush() };
        drop(context);
        drop(device);
        drop(wgl);
        log::info!("[D3D11] Backend shut down");
        closed
    }
}

impl Drop for D3D11Backend {
    fn drop(&mut self) {
        if let Some(mut waitable) = self.waitable.take() {
            let _ = waitable.close();
        }
        if let Err(e) = self.shutdown() {
            log::error!("[D3D11] Shutdown on drop failed: {}", e);
        }
    }
}
