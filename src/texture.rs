//! Shared-texture value types.

use serde::{Deserialize, Serialize};

use crate::error::{InteropError, InteropResult};

/// The legacy API's native texture identifier.
pub type TextureKey = u32;

/// Legacy API enumerants accepted as type and format hints.
pub mod gl {
    pub const TEXTURE_2D: u32 = 0x0DE1;
    pub const RENDERBUFFER: u32 = 0x8D41;
    pub const RGBA8: u32 = 0x8058;
}

/// 8-bit-per-channel color formats understood by the presentation side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    #[serde(rename = "RGBA8")]
    Rgba8Unorm,
    #[default]
    #[serde(rename = "BGRA8")]
    Bgra8Unorm,
}

impl PixelFormat {
    /// Map a legacy internal-format hint to a native format.
    pub fn from_gl_internal_format(format: u32) -> InteropResult<Self> {
        match format {
            gl::RGBA8 => Ok(PixelFormat::Rgba8Unorm),
            _ => Err(InteropError::UnsupportedFormat { format }),
        }
    }
}

/// Size and format of a native shared texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub width: u32,
    pub height: u32,
    pub format: PixelFormat,
}

/// Lock state of a shared texture.
///
/// `Locked` means the legacy API holds the texture and may render into it.
/// `Unlocked` means the presentation API may sample or copy from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockState {
    Locked,
    Unlocked,
}

impl LockState {
    pub fn is_locked(self) -> bool {
        self == LockState::Locked
    }
}
