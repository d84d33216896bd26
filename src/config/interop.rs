//! Interop configuration.
//!
//! One typed struct behind a RwLock. A context copies the current value at
//! construction, so later updates only affect contexts created afterwards.

use std::path::{Path, PathBuf};
use std::time::Duration;

use lazy_static::lazy_static;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::backend::BlitStrategy;
use crate::error::{InteropError, InteropResult};
use crate::registry::LockPolicy;
use crate::texture::PixelFormat;

/// Swapchain creation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SwapChainConfig {
    /// Back-buffer format (BGRA8 or RGBA8).
    pub format: PixelFormat,

    /// Create the swapchain with tearing support so interval 0 presents
    /// immediately.
    pub allow_tearing: bool,

    /// Create the frame-latency waitable object.
    pub frame_latency_waitable: bool,

    /// Frames the swapchain may queue (1-16).
    pub maximum_frame_latency: u32,
}

impl Default for SwapChainConfig {
    fn default() -> Self {
        Self {
            format: PixelFormat::Bgra8Unorm,
            allow_tearing: true,
            frame_latency_waitable: true,
            maximum_frame_latency: 1,
        }
    }
}

/// Settings applied when an interop context is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InteropConfig {
    /// Enable the device debug layer.
    pub debug_layer: bool,

    pub swap_chain: SwapChainConfig,

    pub blit_strategy: BlitStrategy,

    /// Handling of redundant lock/unlock calls.
    pub lock_policy: LockPolicy,

    /// Bound on a single frame-latency wait, in milliseconds.
    pub frame_wait_timeout_ms: u64,

    /// Sync interval used until the host sets one.
    pub default_sync_interval: u32,

    /// Log filter (e.g. "debug" or "dxgl_bridge=trace"). None = RUST_LOG/info.
    pub log_level: Option<String>,

    /// Write logs to daily files in this directory instead of stderr.
    pub log_directory: Option<PathBuf>,
}

impl Default for InteropConfig {
    fn default() -> Self {
        Self {
            debug_layer: cfg!(debug_assertions),
            swap_chain: SwapChainConfig::default(),
            blit_strategy: BlitStrategy::ShaderSample,
            lock_policy: LockPolicy::Warn,
            frame_wait_timeout_ms: 1000,
            default_sync_interval: 1,
            log_level: None,
            log_directory: None,
        }
    }
}

impl InteropConfig {
    pub fn from_json(json: &str) -> InteropResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> InteropResult<Self> {
        let json = std::fs::read_to_string(path.as_ref())?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> InteropResult<()> {
        if !(1..=16).contains(&self.swap_chain.maximum_frame_latency) {
            return Err(InteropError::Config(format!(
                "maximumFrameLatency must be between 1 and 16, got {}",
                self.swap_chain.maximum_frame_latency
            )));
        }
        if self.frame_wait_timeout_ms == 0 {
            return Err(InteropError::Config(
                "frameWaitTimeoutMs must be greater than zero".to_string(),
            ));
        }
        if self.blit_strategy == BlitStrategy::DirectCopy
            && self.swap_chain.format != PixelFormat::Rgba8Unorm
        {
            return Err(InteropError::Config(
                "DIRECT_COPY requires swapChain.format RGBA8".to_string(),
            ));
        }
        Ok(())
    }

    pub fn frame_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_wait_timeout_ms)
    }

    /// Reset all settings to defaults.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

lazy_static! {
    /// Global interop configuration.
    ///
    /// ```ignore
    /// {
    ///     let mut config = INTEROP_CONFIG.write();
    ///     config.lock_policy = LockPolicy::Strict;
    ///     config.default_sync_interval = 0;
    /// }
    /// ```
    pub static ref INTEROP_CONFIG: RwLock<InteropConfig> = RwLock::new(InteropConfig::default());
}

#[cfg(test)]
lazy_static! {
    /// Serializes tests that replace the global configuration.
    pub(crate) static ref GLOBAL_CONFIG_TEST_LOCK: parking_lot::Mutex<()> = parking_lot::Mutex::new(());
}

// ============================================================================
// Getters
// ============================================================================

/// Snapshot of the current configuration.
pub fn current() -> InteropConfig {
    INTEROP_CONFIG.read().clone()
}

pub fn get_lock_policy() -> LockPolicy {
    INTEROP_CONFIG.read().lock_policy
}

pub fn get_default_sync_interval() -> u32 {
    INTEROP_CONFIG.read().default_sync_interval
}

// ============================================================================
// Setters
// ============================================================================

/// Replace the whole configuration after validating it.
pub fn set_config(config: InteropConfig) -> InteropResult<()> {
    config.validate()?;
    log::debug!("[CONFIG] set_config({:?})", config);
    *INTEROP_CONFIG.write() = config;
    Ok(())
}

/// Load, validate and install a JSON config file.
pub fn load_global(path: impl AsRef<Path>) -> InteropResult<()> {
    let config = InteropConfig::load_from_file(path.as_ref())?;
    log::info!("[CONFIG] Loaded {}", path.as_ref().display());
    *INTEROP_CONFIG.write() = config;
    Ok(())
}

pub fn set_lock_policy(policy: LockPolicy) {
    log::debug!("[CONFIG] set_lock_policy({:?})", policy);
    INTEROP_CONFIG.write().lock_policy = policy;
}

pub fn set_default_sync_interval(interval: u32) {
    log::debug!("[CONFIG] set_default_sync_interval({})", interval);
    INTEROP_CONFIG.write().default_sync_interval = interval;
}
