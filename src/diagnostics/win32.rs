//! Win32 message tables backed by `FormatMessageW`.

use std::ffi::c_void;

use windows::core::{w, PWSTR};
use windows::Win32::Foundation::{HLOCAL, HMODULE, LocalFree};
use windows::Win32::System::Diagnostics::Debug::{
    FormatMessageW, FORMAT_MESSAGE_ALLOCATE_BUFFER, FORMAT_MESSAGE_FROM_HMODULE,
    FORMAT_MESSAGE_FROM_SYSTEM, FORMAT_MESSAGE_IGNORE_INSERTS, FORMAT_MESSAGE_OPTIONS,
};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;

use super::MessageTable;

/// The system-wide message table.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTable;

impl MessageTable for SystemTable {
    fn name(&self) -> &str {
        "system"
    }

    fn lookup(&self, code: i32) -> Option<String> {
        format_message(FORMAT_MESSAGE_FROM_SYSTEM, None, code)
    }
}

/// Message table embedded in a loaded module.
#[derive(Debug, Clone)]
pub struct ModuleTable {
    name: String,
    // Module handles of system DLLs stay valid for the life of the process.
    module: isize,
}

impl ModuleTable {
    /// The kernel status table exported by ntdll.
    pub fn ntdll() -> Option<Self> {
        let module = unsafe { GetModuleHandleW(w!("ntdll.dll")) }.ok()?;
        Some(Self {
            name: "ntdll".to_string(),
            module: module.0 as isize,
        })
    }
}

impl MessageTable for ModuleTable {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookup(&self, code: i32) -> Option<String> {
        let module = HMODULE(self.module as *mut c_void);
        format_message(FORMAT_MESSAGE_FROM_HMODULE, Some(module.0 as *const c_void), code)
    }
}

fn format_message(
    source_flag: FORMAT_MESSAGE_OPTIONS,
    source: Option<*const c_void>,
    code: i32,
) -> Option<String> {
    let mut buffer = PWSTR::null();
    let len = unsafe {
        FormatMessageW(
            FORMAT_MESSAGE_ALLOCATE_BUFFER | FORMAT_MESSAGE_IGNORE_INSERTS | source_flag,
            source,
            code as u32,
            0,
            PWSTR(&mut buffer as *mut PWSTR as *mut u16),
            0,
            None,
        )
    };
    if len == 0 || buffer.is_null() {
        return None;
    }

    let message = unsafe {
        let text = String::from_utf16_lossy(std::slice::from_raw_parts(buffer.0, len as usize));
        let _ = LocalFree(HLOCAL(buffer.0 as *mut c_void));
        text
    };
    Some(message)
}
