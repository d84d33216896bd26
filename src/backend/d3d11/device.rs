//! Direct3D 11 device and swap chain creation.
//!
//! The device is created with BGRA support and, optionally, the debug layer.
//! The swap chain is a two-buffer flip-discard chain bound to the host
//! window.

use windows::core::Interface;
use windows::Win32::Foundation::{HANDLE, HWND};
use windows::Win32::Graphics::Direct3D::D3D_DRIVER_TYPE_HARDWARE;
use windows::Win32::Graphics::Direct3D11::{
    D3D11CreateDevice, ID3D11Device, ID3D11DeviceContext, D3D11_CREATE_DEVICE_BGRA_SUPPORT,
    D3D11_CREATE_DEVICE_DEBUG, D3D11_SDK_VERSION,
};
use windows::Win32::Graphics::Dxgi::Common::{
    DXGI_ALPHA_MODE_UNSPECIFIED, DXGI_FORMAT, DXGI_FORMAT_B8G8R8A8_UNORM,
    DXGI_FORMAT_R8G8B8A8_UNORM, DXGI_SAMPLE_DESC,
};
use windows::Win32::Graphics::Dxgi::{
    CreateDXGIFactory2, IDXGIFactory2, IDXGISwapChain1, IDXGISwapChain2,
    DXGI_CREATE_FACTORY_FLAGS, DXGI_SCALING_NONE, DXGI_SWAP_CHAIN_DESC1,
    DXGI_SWAP_CHAIN_FLAG_ALLOW_TEARING, DXGI_SWAP_CHAIN_FLAG_FRAME_LATENCY_WAITABLE_OBJECT,
    DXGI_SWAP_EFFECT_FLIP_DISCARD, DXGI_USAGE_RENDER_TARGET_OUTPUT,
};

use super::NativeResultExt;
use crate::error::{InteropError, InteropResult, OptionExt};
use crate::swapchain::SwapChainDescriptor;
use crate::texture::PixelFormat;

pub fn dxgi_format(format: PixelFormat) -> DXGI_FORMAT {
    match format {
        PixelFormat::Rgba8Unorm => DXGI_FORMAT_R8G8B8A8_UNORM,
        PixelFormat::Bgra8Unorm => DXGI_FORMAT_B8G8R8A8_UNORM,
    }
}

/// `DXGI_SWAP_CHAIN_FLAG` bits for `descriptor`. The same bits must be passed
/// to every `ResizeBuffers` call.
pub fn swap_chain_flags(descriptor: &SwapChainDescriptor) -> u32 {
    let mut flags = 0;
    if descriptor.allow_tearing {
        flags |= DXGI_SWAP_CHAIN_FLAG_ALLOW_TEARING.0 as u32;
    }
    if descriptor.frame_latency_waitable {
        flags |= DXGI_SWAP_CHAIN_FLAG_FRAME_LATENCY_WAITABLE_OBJECT.0 as u32;
    }
    flags
}

/// Create a hardware D3D11 device and its immediate context.
pub fn create_device(debug_layer: bool) -> InteropResult<(ID3D11Device, ID3D11DeviceContext)> {
    let mut flags = D3D11_CREATE_DEVICE_BGRA_SUPPORT;
    if debug_layer {
        flags |= D3D11_CREATE_DEVICE_DEBUG;
    }

    let mut device: Option<ID3D11Device> = None;
    let mut context: Option<ID3D11DeviceContext> = None;
    unsafe {
        D3D11CreateDevice(
            None,
            D3D_DRIVER_TYPE_HARDWARE,
            None,
            flags,
            None,
            D3D11_SDK_VERSION,
            Some(&mut device),
            None,
            Some(&mut context),
        )
    }
    .native("D3D11CreateDevice")?;

    let device = device.context("D3D11CreateDevice returned no device")?;
    let context = context.context("D3D11CreateDevice returned no immediate context")?;
    Ok((device, context))
}

/// Create a flip-discard swap chain for `hwnd`.
///
/// Width and height 0 take the window's client size.
pub fn create_swap_chain(
    device: &ID3D11Device,
    hwnd: HWND,
    descriptor: &SwapChainDescriptor,
) -> InteropResult<IDXGISwapChain1> {
    let factory: IDXGIFactory2 =
        unsafe { CreateDXGIFactory2(DXGI_CREATE_FACTORY_FLAGS(0)) }.native("CreateDXGIFactory2")?;

    let desc = DXGI_SWAP_CHAIN_DESC1 {
        Width: 0,
        Height: 0,
        Format: dxgi_format(descriptor.format),
        Stereo: false.into(),
        SampleDesc: DXGI_SAMPLE_DESC {
            Count: descriptor.sample_count,
            Quality: 0,
        },
        BufferUsage: DXGI_USAGE_RENDER_TARGET_OUTPUT,
        BufferCount: descriptor.buffer_count,
        Scaling: DXGI_SCALING_NONE,
        SwapEffect: DXGI_SWAP_EFFECT_FLIP_DISCARD,
        AlphaMode: DXGI_ALPHA_MODE_UNSPECIFIED,
        Flags: swap_chain_flags(descriptor),
    };

    unsafe { factory.CreateSwapChainForHwnd(device, hwnd, &desc, None, None) }
        .native("IDXGIFactory2::CreateSwapChainForHwnd")
}

/// Cap queued frames and return the frame-latency waitable object.
pub fn frame_latency_waitable(
    swap_chain: &IDXGISwapChain1,
    maximum_frame_latency: u32,
) -> InteropResult<HANDLE> {
    let swap_chain: IDXGISwapChain2 = swap_chain
        .cast()
        .native("IDXGISwapChain1::QueryInterface(IDXGISwapChain2)")?;
    unsafe { swap_chain.SetMaximumFrameLatency(maximum_frame_latency) }
        .native("IDXGISwapChain2::SetMaximumFrameLatency")?;

    let handle = unsafe { swap_chain.GetFrameLatencyWaitableObject() };
    if handle.is_invalid() {
        return Err(InteropError::native(
            "IDXGISwapChain2::GetFrameLatencyWaitableObject",
            windows::core::Error::from_win32().code().0,
        ));
    }
    Ok(handle)
}
