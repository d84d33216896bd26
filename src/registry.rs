//! Shared-texture registry.
//!
//! Maps legacy texture names to native textures registered with the interop
//! device, and tracks which API currently holds each one. An entry is LOCKED
//! (held by the legacy API) as soon as `allocate` returns.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::backend::InteropDevice;
use crate::error::{InteropError, InteropResult};
use crate::texture::{LockState, PixelFormat, TextureDesc, TextureKey};

/// What to do on a redundant lock or unlock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LockPolicy {
    /// Log a warning and leave the state untouched.
    #[default]
    Warn,
    /// Fail with [`InteropError::LockState`].
    Strict,
}

/// One registered texture.
pub struct SharedTexture<D: InteropDevice> {
    pub key: TextureKey,
    pub target: u32,
    pub texture: D::Texture,
    pub handle: D::Handle,
    pub state: LockState,
    pub width: u32,
    pub height: u32,
}

impl<D: InteropDevice> std::fmt::Debug for SharedTexture<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedTexture")
            .field("key", &self.key)
            .field("target", &format_args!("0x{:04x}", self.target))
            .field("handle", &self.handle)
            .field("state", &self.state)
            .field("width", &self.width)
            .field("height", &self.height)
            .finish()
    }
}

pub struct SharedTextureRegistry<D: InteropDevice> {
    entries: BTreeMap<TextureKey, SharedTexture<D>>,
    policy: LockPolicy,
}

impl<D: InteropDevice> SharedTextureRegistry<D> {
    pub fn new(policy: LockPolicy) -> Self {
        Self {
            entries: BTreeMap::new(),
            policy,
        }
    }

    pub fn policy(&self) -> LockPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: TextureKey) -> bool {
        self.entries.contains_key(&key)
    }

    pub fn keys(&self) -> impl Iterator<Item = TextureKey> + '_ {
        self.entries.keys().copied()
    }

    pub fn get(&self, key: TextureKey) -> InteropResult<&SharedTexture<D>> {
        self.entries.get(&key).ok_or(InteropError::NotFound { key })
    }

    pub fn state(&self, key: TextureKey) -> InteropResult<LockState> {
        self.get(key).map(|entry| entry.state)
    }

    /// Create, register and lock a texture for legacy object `key`.
    pub fn allocate(
        &mut self,
        device: &mut D,
        key: TextureKey,
        type_hint: u32,
        format_hint: u32,
        width: u32,
        height: u32,
    ) -> InteropResult<&SharedTexture<D>> {
        if self.entries.contains_key(&key) {
            return Err(InteropError::AlreadyAllocated { key });
        }
        let format = PixelFormat::from_gl_internal_format(format_hint)?;

        let texture = device.create_texture(&TextureDesc {
            width,
            height,
            format,
        })?;
        let handle = match device.register_texture(&texture, key, type_hint) {
            Ok(handle) => handle,
            Err(e) => {
                device.release_texture(texture);
                return Err(e);
            }
        };
        if let Err(e) = device.lock_textures(&[handle]) {
            if let Err(unregister_err) = device.unregister_texture(handle) {
                log::error!("[REGISTRY] Failed to unregister texture {}: {}", key, unregister_err);
            }
            device.release_texture(texture);
            return Err(e);
        }

        log::debug!(
            "[REGISTRY] Allocated shared texture {} ({}x{}, {:?})",
            key,
            width,
            height,
            format
        );
        let entry = self.entries.entry(key).or_insert(SharedTexture {
            key,
            target: type_hint,
            texture,
            handle,
            state: LockState::Locked,
            width,
            height,
        });
        Ok(entry)
    }

    /// Unlock if needed, unregister and release the texture for `key`.
    pub fn deallocate(&mut self, device: &mut D, key: TextureKey) -> InteropResult<()> {
        let entry = self
            .entries
            .remove(&key)
            .ok_or(InteropError::NotFound { key })?;
        release_entry(device, entry)?;
        log::debug!("[REGISTRY] Deallocated shared texture {}", key);
        Ok(())
    }

    pub fn lock(&mut self, device: &mut D, key: TextureKey) -> InteropResult<()> {
        self.transition(device, key, LockState::Locked)
    }

    pub fn unlock(&mut self, device: &mut D, key: TextureKey) -> InteropResult<()> {
        self.transition(device, key, LockState::Unlocked)
    }

    /// Lock every unlocked entry in one native call.
    pub fn lock_all(&mut self, device: &mut D) -> InteropResult<usize> {
        self.transition_all(device, LockState::Locked)
    }

    /// Unlock every locked entry in one native call.
    pub fn unlock_all(&mut self, device: &mut D) -> InteropResult<usize> {
        self.transition_all(device, LockState::Unlocked)
    }

    /// Release every entry. All entries are removed even if some fail; the
    /// first failure is returned.
    pub fn clear(&mut self, device: &mut D) -> InteropResult<()> {
        let mut first_error = None;
        for (key, entry) in std::mem::take(&mut self.entries) {
            if let Err(e) = release_entry(device, entry) {
                log::error!("[REGISTRY] Failed to release shared texture {}: {}", key, e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn transition(&mut self, device: &mut D, key: TextureKey, target: LockState) -> InteropResult<()> {
        let policy = self.policy;
        let entry = self
            .entries
            .get_mut(&key)
            .ok_or(InteropError::NotFound { key })?;

        if entry.state == target {
            return match policy {
                LockPolicy::Warn => {
                    log::warn!("[REGISTRY] Shared texture {} is already {:?}", key, target);
                    Ok(())
                }
                LockPolicy::Strict => Err(InteropError::LockState {
                    key,
                    locked: target.is_locked(),
                }),
            };
        }

        match target {
            LockState::Locked => device.lock_textures(&[entry.handle])?,
            LockState::Unlocked => device.unlock_textures(&[entry.handle])?,
        }
        entry.state = target;
        Ok(())
    }

    fn transition_all(&mut self, device: &mut D, target: LockState) -> InteropResult<usize> {
        let pending: Vec<&mut SharedTexture<D>> = self
            .entries
            .values_mut()
            .filter(|entry| entry.state != target)
            .collect();
        if pending.is_empty() {
            return Ok(0);
        }

        let handles: Vec<D::Handle> = pending.iter().map(|entry| entry.handle).collect();
        match target {
            LockState::Locked => device.lock_textures(&handles)?,
            LockState::Unlocked => device.unlock_textures(&handles)?,
        }
        for entry in pending {
            entry.state = target;
        }
        Ok(handles.len())
    }
}

fn release_entry<D: InteropDevice>(device: &mut D, entry: SharedTexture<D>) -> InteropResult<()> {
    let mut result = Ok(());
    if entry.state.is_locked() {
        result = device.unlock_textures(&[entry.handle]);
    }
    let unregistered = device.unregister_texture(entry.handle);
    device.release_texture(entry.texture);
    result.and(unregistered)
}
