/// Highest `wl_compositor` version this crate will bind
pub const MAX_COMPOSITOR_VERSION: u32 = 6;
/// Highest `ext_background_effect_manager_v1` version this crate speaks
pub const MAX_MANAGER_VERSION: u32 = 1;

/// What an empty region list means once it reaches the compositor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmptyRegionPolicy {
    /// send `set_blur_region(null)`, which removes the blur
    #[default]
    Clear,
    /// send a region covering the whole surface, which blurs everything
    WholeSurface,
}

/// Settings shared by every binding of a [crate::BackgroundEffects]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectSettings {
    pub(crate) empty_region: EmptyRegionPolicy,
    pub(crate) compositor_version: u32,
    pub(crate) manager_version: u32,
    pub(crate) capability_roundtrip: bool,
}

impl Default for EffectSettings {
    fn default() -> Self {
        Self {
            empty_region: EmptyRegionPolicy::Clear,
            compositor_version: MAX_COMPOSITOR_VERSION,
            manager_version: MAX_MANAGER_VERSION,
            capability_roundtrip: true,
        }
    }
}

impl EffectSettings {
    /// how an empty region list is sent, see [EmptyRegionPolicy]
    pub fn with_empty_region_policy(mut self, policy: EmptyRegionPolicy) -> Self {
        self.empty_region = policy;
        self
    }

    /// lower the `wl_compositor` version cap, values above
    /// [MAX_COMPOSITOR_VERSION] are clamped
    pub fn with_compositor_version(mut self, version: u32) -> Self {
        self.compositor_version = version.clamp(1, MAX_COMPOSITOR_VERSION);
        self
    }

    /// lower the manager version cap, values above [MAX_MANAGER_VERSION] are clamped
    pub fn with_manager_version(mut self, version: u32) -> Self {
        self.manager_version = version.clamp(1, MAX_MANAGER_VERSION);
        self
    }

    /// Wait for the first `capabilities` event right after binding.
    /// When disabled, blur support is only known after the next dispatch.
    pub fn with_capability_roundtrip(mut self, roundtrip: bool) -> Self {
        self.capability_roundtrip = roundtrip;
        self
    }

    pub fn empty_region_policy(&self) -> EmptyRegionPolicy {
        self.empty_region
    }

    pub fn compositor_version(&self) -> u32 {
        self.compositor_version
    }

    pub fn manager_version(&self) -> u32 {
        self.manager_version
    }

    pub fn capability_roundtrip(&self) -> bool {
        self.capability_roundtrip
    }
}
