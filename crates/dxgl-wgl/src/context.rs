//! Hidden-window WGL context.
//!
//! The host renderer never draws to this window; it renders into textures
//! shared with Direct3D. The window only exists because WGL needs a device
//! context with a pixel format to create a GL context.

use std::mem::size_of;

use tracing::{debug, info, warn};
use windows::core::w;
use windows::Win32::Foundation::HWND;
use windows::Win32::Graphics::Gdi::{GetDC, ReleaseDC, HDC};
use windows::Win32::Graphics::OpenGL::{
    wglCreateContext, wglDeleteContext, wglMakeCurrent, ChoosePixelFormat, DescribePixelFormat,
    SetPixelFormat, HGLRC, PFD_MAIN_PLANE, PFD_SUPPORT_OPENGL, PFD_TYPE_RGBA,
    PIXELFORMATDESCRIPTOR,
};
use windows::Win32::UI::WindowsAndMessaging::{
    CreateWindowExW, DestroyWindow, WINDOW_EX_STYLE, WS_POPUP,
};

use crate::error::{WglError, WglResult};
use crate::flags::ContextCreationFlags;
use crate::interop::{proc_address, DxInterop};

type CreateContextAttribsFn =
    unsafe extern "system" fn(dc: HDC, share: HGLRC, attribs: *const i32) -> HGLRC;

/// 1x1 popup window and its device context.
struct HiddenWindow {
    hwnd: HWND,
    dc: HDC,
}

impl HiddenWindow {
    fn create() -> WglResult<Self> {
        let hwnd = unsafe {
            CreateWindowExW(
                WINDOW_EX_STYLE::default(),
                w!("STATIC"),
                w!("Hidden Context Window"),
                WS_POPUP,
                0,
                0,
                1,
                1,
                None,
                None,
                None,
                None,
            )
        }
        .map_err(|e| WglError::from_windows("CreateWindowExW", e))?;

        let dc = unsafe { GetDC(hwnd) };
        if dc.is_invalid() {
            let err = WglError::last_error("GetDC");
            unsafe {
                let _ = DestroyWindow(hwnd);
            }
            return Err(err);
        }

        let window = Self { hwnd, dc };
        window.apply_pixel_format()?;
        Ok(window)
    }

    fn apply_pixel_format(&self) -> WglResult<()> {
        let mut pfd = PIXELFORMATDESCRIPTOR {
            nSize: size_of::<PIXELFORMATDESCRIPTOR>() as u16,
            nVersion: 1,
            dwFlags: PFD_SUPPORT_OPENGL,
            iPixelType: PFD_TYPE_RGBA,
            iLayerType: PFD_MAIN_PLANE.0 as _,
            cColorBits: 32,
            cDepthBits: 24,
            cStencilBits: 8,
            ..Default::default()
        };

        let format = unsafe { ChoosePixelFormat(self.dc, &pfd) };
        if format == 0 {
            return Err(WglError::last_error("ChoosePixelFormat"));
        }
        let described = unsafe {
            DescribePixelFormat(
                self.dc,
                format,
                size_of::<PIXELFORMATDESCRIPTOR>() as u32,
                Some(&mut pfd),
            )
        };
        if described == 0 {
            return Err(WglError::last_error("DescribePixelFormat"));
        }
        unsafe { SetPixelFormat(self.dc, format, &pfd) }
            .map_err(|e| WglError::from_windows("SetPixelFormat", e))
    }
}

impl Drop for HiddenWindow {
    fn drop(&mut self) {
        unsafe {
            ReleaseDC(self.hwnd, self.dc);
            if let Err(e) = DestroyWindow(self.hwnd) {
                warn!("Failed to destroy hidden context window: {}", e);
            }
        }
    }
}

/// Owned GL rendering context, deleted on drop.
struct RenderContext(HGLRC);

impl Drop for RenderContext {
    fn drop(&mut self) {
        if let Err(e) = unsafe { wglDeleteContext(self.0) } {
            warn!("wglDeleteContext failed: {}", e);
        }
    }
}

/// The legacy rendering context shared with the presentation device.
pub struct WglContext {
    interop: DxInterop,
    rc: RenderContext,
    window: HiddenWindow,
}

impl WglContext {
    /// Create a GL context matching `flags` and load the interop entry points.
    ///
    /// The context is not current when this returns.
    pub fn create(flags: &ContextCreationFlags) -> WglResult<Self> {
        let window = HiddenWindow::create()?;

        // wglCreateContextAttribsARB can only be resolved through a live context.
        let rc = {
            let bootstrap = RenderContext(
                unsafe { wglCreateContext(window.dc) }
                    .map_err(|e| WglError::from_windows("wglCreateContext", e))?,
            );
            make_current(window.dc, bootstrap.0)?;
            let created = create_context_attribs(window.dc, flags);
            release_current(window.dc)?;
            created?
        };

        make_current(window.dc, rc.0)?;
        let interop = DxInterop::from_current_context();
        release_current(window.dc)?;

        info!(
            "Created WGL context {}.{} {:?} (forward compatible: {})",
            flags.major_version, flags.minor_version, flags.profile, flags.forward_compatible
        );

        Ok(Self {
            interop: interop?,
            rc,
            window,
        })
    }

    /// Bind this context to the calling thread.
    pub fn make_current(&self) -> WglResult<()> {
        make_current(self.window.dc, self.rc.0)
    }

    /// Unbind whatever context is current on the calling thread.
    pub fn release_current(&self) -> WglResult<()> {
        release_current(self.window.dc)
    }

    pub fn interop(&self) -> &DxInterop {
        &self.interop
    }
}

impl Drop for WglContext {
    fn drop(&mut self) {
        if let Err(e) = self.release_current() {
            warn!("Failed to release WGL context before deletion: {}", e);
        }
        debug!("Destroying WGL context");
    }
}

fn make_current(dc: HDC, rc: HGLRC) -> WglResult<()> {
    unsafe { wglMakeCurrent(dc, rc) }.map_err(|e| WglError::from_windows("wglMakeCurrent", e))
}

fn release_current(dc: HDC) -> WglResult<()> {
    make_current(dc, HGLRC::default())
}

fn create_context_attribs(dc: HDC, flags: &ContextCreationFlags) -> WglResult<RenderContext> {
    let create: CreateContextAttribsFn = unsafe {
        std::mem::transmute::<unsafe extern "system" fn() -> isize, CreateContextAttribsFn>(
            proc_address("wglCreateContextAttribsARB\0")?,
        )
    };
    let attribs = flags.attrib_list();
    let rc = unsafe { create(dc, HGLRC::default(), attribs.as_ptr()) };
    if rc.is_invalid() {
        return Err(WglError::last_error("wglCreateContextAttribsARB"));
    }
    Ok(RenderContext(rc))
}
