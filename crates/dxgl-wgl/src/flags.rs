//! Context-creation flags captured from the host engine's window hints.

use serde::{Deserialize, Serialize};

pub const CONTEXT_MAJOR_VERSION_ARB: i32 = 0x2091;
pub const CONTEXT_MINOR_VERSION_ARB: i32 = 0x2092;
pub const CONTEXT_FLAGS_ARB: i32 = 0x2094;
pub const CONTEXT_PROFILE_MASK_ARB: i32 = 0x9126;
pub const CONTEXT_CORE_PROFILE_BIT_ARB: i32 = 0x0001;
pub const CONTEXT_COMPATIBILITY_PROFILE_BIT_ARB: i32 = 0x0002;
pub const CONTEXT_FORWARD_COMPATIBLE_BIT_ARB: i32 = 0x0002;

/// OpenGL profile requested for the legacy context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Profile {
    #[default]
    Core,
    Compat,
    /// Let the driver pick; no profile mask is requested.
    Any,
}

impl Profile {
    /// Value for `WGL_CONTEXT_PROFILE_MASK_ARB`, or `None` for [`Profile::Any`].
    pub fn mask(self) -> Option<i32> {
        match self {
            Profile::Core => Some(CONTEXT_CORE_PROFILE_BIT_ARB),
            Profile::Compat => Some(CONTEXT_COMPATIBILITY_PROFILE_BIT_ARB),
            Profile::Any => None,
        }
    }
}

/// Immutable description of the legacy context the host engine intended to
/// create. Only consumed while the interop context is being constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContextCreationFlags {
    pub major_version: u32,
    pub minor_version: u32,
    pub profile: Profile,
    pub forward_compatible: bool,
}

impl Default for ContextCreationFlags {
    fn default() -> Self {
        Self {
            major_version: 3,
            minor_version: 2,
            profile: Profile::Core,
            forward_compatible: true,
        }
    }
}

impl ContextCreationFlags {
    pub fn new(major_version: u32, minor_version: u32, profile: Profile, forward_compatible: bool) -> Self {
        Self {
            major_version,
            minor_version,
            profile,
            forward_compatible,
        }
    }

    /// Zero-terminated attribute list for `wglCreateContextAttribsARB`.
    pub fn attrib_list(&self) -> Vec<i32> {
        let mut attribs = vec![
            CONTEXT_MAJOR_VERSION_ARB,
            self.major_version as i32,
            CONTEXT_MINOR_VERSION_ARB,
            self.minor_version as i32,
        ];
        if let Some(mask) = self.profile.mask() {
            attribs.extend([CONTEXT_PROFILE_MASK_ARB, mask]);
        }
        if self.forward_compatible {
            attribs.extend([CONTEXT_FLAGS_ARB, CONTEXT_FORWARD_COMPATIBLE_BIT_ARB]);
        }
        attribs.push(0);
        attribs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_flags() {
        let flags = ContextCreationFlags::default();
        assert_eq!(flags.major_version, 3);
        assert_eq!(flags.minor_version, 2);
        assert_eq!(flags.profile, Profile::Core);
        assert!(flags.forward_compatible);
    }

    #[test]
    fn test_core_forward_compatible_attribs() {
        let flags = ContextCreationFlags::new(4, 6, Profile::Core, true);
        assert_eq!(
            flags.attrib_list(),
            vec![
                CONTEXT_MAJOR_VERSION_ARB,
                4,
                CONTEXT_MINOR_VERSION_ARB,
                6,
                CONTEXT_PROFILE_MASK_ARB,
                CONTEXT_CORE_PROFILE_BIT_ARB,
                CONTEXT_FLAGS_ARB,
                CONTEXT_FORWARD_COMPATIBLE_BIT_ARB,
                0,
            ]
        );
    }

    #[test]
    fn test_compat_profile_without_flags() {
        let flags = ContextCreationFlags::new(2, 1, Profile::Compat, false);
        let attribs = flags.attrib_list();
        assert_eq!(attribs.len(), 7);
        assert_eq!(&attribs[4..6], &[CONTEXT_PROFILE_MASK_ARB, CONTEXT_COMPATIBILITY_PROFILE_BIT_ARB]);
        assert!(!attribs.contains(&CONTEXT_FLAGS_ARB));
        assert_eq!(attribs.last(), Some(&0));
    }

    #[test]
    fn test_any_profile_omits_mask() {
        let flags = ContextCreationFlags::new(3, 3, Profile::Any, false);
        let attribs = flags.attrib_list();
        assert!(!attribs.contains(&CONTEXT_PROFILE_MASK_ARB));
        assert_eq!(attribs, vec![CONTEXT_MAJOR_VERSION_ARB, 3, CONTEXT_MINOR_VERSION_ARB, 3, 0]);
    }

    #[test]
    fn test_deserialize_partial_flags() {
        let flags: ContextCreationFlags =
            serde_json::from_str(r#"{"majorVersion":4,"profile":"COMPAT"}"#).unwrap();
        assert_eq!(flags.major_version, 4);
        assert_eq!(flags.minor_version, 2);
        assert_eq!(flags.profile, Profile::Compat);
        assert!(flags.forward_compatible);
    }
}
