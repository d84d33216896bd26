//! `WGL_NV_DX_interop` entry points.
//!
//! The table has to be loaded while the target GL context is current, and
//! every call made through it implicitly targets that context.

#![allow(non_snake_case)]

use std::ffi::c_void;

use tracing::debug;
use windows::core::PCSTR;
use windows::Win32::Foundation::{BOOL, HANDLE};
use windows::Win32::Graphics::OpenGL::wglGetProcAddress;

use crate::error::{WglError, WglResult};

/// Interop binding between a Direct3D device and the current GL context.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DxDeviceHandle(HANDLE);

/// A Direct3D resource registered with an interop device.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DxObjectHandle(HANDLE);

type RawProc = unsafe extern "system" fn() -> isize;
type OpenDeviceFn = unsafe extern "system" fn(dx_device: *mut c_void) -> HANDLE;
type CloseDeviceFn = unsafe extern "system" fn(device: HANDLE) -> BOOL;
type RegisterObjectFn = unsafe extern "system" fn(
    device: HANDLE,
    dx_object: *mut c_void,
    name: u32,
    object_type: u32,
    access: u32,
) -> HANDLE;
type UnregisterObjectFn = unsafe extern "system" fn(device: HANDLE, object: HANDLE) -> BOOL;
type LockObjectsFn = unsafe extern "system" fn(device: HANDLE, count: i32, objects: *mut HANDLE) -> BOOL;

pub struct DxInterop {
    DXOpenDeviceNV: OpenDeviceFn,
    DXCloseDeviceNV: CloseDeviceFn,
    DXRegisterObjectNV: RegisterObjectFn,
    DXUnregisterObjectNV: UnregisterObjectFn,
    DXLockObjectsNV: LockObjectsFn,
    DXUnlockObjectsNV: LockObjectsFn,
}

/// Resolve a GL extension entry point. `name` must be NUL-terminated.
pub(crate) fn proc_address(name: &'static str) -> WglResult<RawProc> {
    let display = name.trim_end_matches('\0');
    let proc = unsafe { wglGetProcAddress(PCSTR(name.as_ptr())) };
    match proc {
        // Some drivers report failure with small sentinel values instead of null.
        Some(f) if !matches!(f as usize, 1 | 2 | 3 | usize::MAX) => Ok(f),
        _ => Err(WglError::MissingEntryPoint(display)),
    }
}

fn check(call: &'static str, ok: BOOL) -> WglResult<()> {
    if ok.as_bool() {
        Ok(())
    } else {
        Err(WglError::last_error(call))
    }
}

impl DxInterop {
    /// Load the entry points from the GL context that is current on this thread.
    pub fn from_current_context() -> WglResult<Self> {
        let table = unsafe {
            Self {
                DXOpenDeviceNV: std::mem::transmute::<RawProc, OpenDeviceFn>(proc_address(
                    "wglDXOpenDeviceNV\0",
                )?),
                DXCloseDeviceNV: std::mem::transmute::<RawProc, CloseDeviceFn>(proc_address(
                    "wglDXCloseDeviceNV\0",
                )?),
                DXRegisterObjectNV: std::mem::transmute::<RawProc, RegisterObjectFn>(
                    proc_address("wglDXRegisterObjectNV\0")?,
                ),
                DXUnregisterObjectNV: std::mem::transmute::<RawProc, UnregisterObjectFn>(
                    proc_address("wglDXUnregisterObjectNV\0")?,
                ),
                DXLockObjectsNV: std::mem::transmute::<RawProc, LockObjectsFn>(proc_address(
                    "wglDXLockObjectsNV\0",
                )?),
                DXUnlockObjectsNV: std::mem::transmute::<RawProc, LockObjectsFn>(proc_address(
                    "wglDXUnlockObjectsNV\0",
                )?),
            }
        };
        debug!("Loaded WGL_NV_DX_interop entry points");
        Ok(table)
    }

    /// # Safety
    /// `dx_device` must point to a live Direct3D device and a GL context must
    /// be current on this thread.
    pub unsafe fn open_device(&self, dx_device: *mut c_void) -> WglResult<DxDeviceHandle> {
        let handle = unsafe { (self.DXOpenDeviceNV)(dx_device) };
        if handle.is_invalid() {
            return Err(WglError::last_error("wglDXOpenDeviceNV"));
        }
        Ok(DxDeviceHandle(handle))
    }

    /// # Safety
    /// Every object registered with `device` must have been unregistered.
    pub unsafe fn close_device(&self, device: DxDeviceHandle) -> WglResult<()> {
        check("wglDXCloseDeviceNV", unsafe { (self.DXCloseDeviceNV)(device.0) })
    }

    /// Register a Direct3D resource as the GL object `name` of type `object_type`.
    ///
    /// # Safety
    /// `dx_object` must point to a live resource created on the device behind
    /// `device`.
    pub unsafe fn register_object(
        &self,
        device: DxDeviceHandle,
        dx_object: *mut c_void,
        name: u32,
        object_type: u32,
        access: u32,
    ) -> WglResult<DxObjectHandle> {
        let handle = unsafe { (self.DXRegisterObjectNV)(device.0, dx_object, name, object_type, access) };
        if handle.is_invalid() {
            return Err(WglError::last_error("wglDXRegisterObjectNV"));
        }
        Ok(DxObjectHandle(handle))
    }

    /// # Safety
    /// `object` must be registered with `device` and currently unlocked.
    pub unsafe fn unregister_object(&self, device: DxDeviceHandle, object: DxObjectHandle) -> WglResult<()> {
        check("wglDXUnregisterObjectNV", unsafe {
            (self.DXUnregisterObjectNV)(device.0, object.0)
        })
    }

    /// Hand the objects to GL. Direct3D must not touch them until unlocked.
    ///
    /// # Safety
    /// All `objects` must be registered with `device`.
    pub unsafe fn lock_objects(&self, device: DxDeviceHandle, objects: &[DxObjectHandle]) -> WglResult<()> {
        check("wglDXLockObjectsNV", unsafe {
            (self.DXLockObjectsNV)(device.0, objects.len() as i32, objects.as_ptr() as *mut HANDLE)
        })
    }

    /// Hand the objects back to Direct3D.
    ///
    /// # Safety
    /// All `objects` must be registered with `device`.
    pub unsafe fn unlock_objects(&self, device: DxDeviceHandle, objects: &[DxObjectHandle]) -> WglResult<()> {
        check("wglDXUnlockObjectsNV", unsafe {
            (self.DXUnlockObjectsNV)(device.0, objects.len() as i32, objects.as_ptr() as *mut HANDLE)
        })
    }
}
