//! Configuration management.
//!
//! `InteropConfig` holds every tunable of the interop path: swapchain
//! creation flags, blit strategy, lock policy, frame-wait timeout and
//! logging. It lives behind a `parking_lot::RwLock` so the host can update it
//! in one batch before creating a context.

pub mod interop;

pub use interop::{
    current, get_default_sync_interval, get_lock_policy, load_global, set_config,
    set_default_sync_interval, set_lock_policy, InteropConfig, SwapChainConfig, INTEROP_CONFIG,
};

#[cfg(test)]
pub(crate) use interop::GLOBAL_CONFIG_TEST_LOCK;
