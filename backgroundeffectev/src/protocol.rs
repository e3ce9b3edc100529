//! Client-side implementation of the background effect protocol (ext_background_effect_manager_v1)
//!
//! This protocol allows clients to request a blurred background behind parts of
//! a surface. The manager tells the client which effects the compositor can
//! render, and hands out one effect object per surface.

use wayland_client::protocol::wl_surface::WlSurface;
use wayland_client::{Connection, Dispatch, QueueHandle, WEnum};

// Re-export only the actual code
pub use generated::{ext_background_effect_manager_v1, ext_background_effect_surface_v1};

pub use ext_background_effect_manager_v1::Capability;

#[allow(
    non_snake_case,
    non_upper_case_globals,
    non_camel_case_types,
    dead_code,
    unused_imports
)]
mod generated {
    use wayland_client;
    use wayland_client::protocol::*;

    pub mod __interfaces {
        use wayland_backend;
        use wayland_client::protocol::__interfaces::*;
        wayland_scanner::generate_interfaces!("protocols/ext-background-effect-v1.xml");
    }
    use self::__interfaces::*;

    wayland_scanner::generate_client_code!("protocols/ext-background-effect-v1.xml");
}

/// User data for the manager - remembers which registry global it was bound from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectManagerData {
    pub global_name: u32,
}

/// User data for effect objects - stores the surface reference
#[derive(Debug, Clone)]
pub struct BackgroundEffectData {
    pub surface: WlSurface,
}

/// Trait for handling manager events
pub trait BackgroundEffectHandler {
    /// Called with the raw capability bitmask every time the compositor sends one
    fn capabilities_changed(&mut self, flags: u32);
}

/// Flatten the capability bitmask, keeping bits this client does not know about
pub fn capability_bits(flags: WEnum<Capability>) -> u32 {
    match flags {
        WEnum::Value(flags) => flags.bits(),
        WEnum::Unknown(raw) => raw,
    }
}

/// Blanket implementation for the manager dispatch
impl<D>
    Dispatch<
        ext_background_effect_manager_v1::ExtBackgroundEffectManagerV1,
        EffectManagerData,
        D,
    > for ()
where
    D: Dispatch<ext_background_effect_manager_v1::ExtBackgroundEffectManagerV1, EffectManagerData>
        + BackgroundEffectHandler,
{
    fn event(
        state: &mut D,
        _proxy: &ext_background_effect_manager_v1::ExtBackgroundEffectManagerV1,
        event: ext_background_effect_manager_v1::Event,
        _data: &EffectManagerData,
        _conn: &Connection,
        _qhandle: &QueueHandle<D>,
    ) {
        let ext_background_effect_manager_v1::Event::Capabilities { flags } = event;
        state.capabilities_changed(capability_bits(flags));
    }
}

/// Blanket implementation for effect object dispatch
impl<D>
    Dispatch<
        ext_background_effect_surface_v1::ExtBackgroundEffectSurfaceV1,
        BackgroundEffectData,
        D,
    > for ()
where
    D: Dispatch<
            ext_background_effect_surface_v1::ExtBackgroundEffectSurfaceV1,
            BackgroundEffectData,
        >,
{
    fn event(
        _state: &mut D,
        _proxy: &ext_background_effect_surface_v1::ExtBackgroundEffectSurfaceV1,
        _event: ext_background_effect_surface_v1::Event,
        _data: &BackgroundEffectData,
        _conn: &Connection,
        _qhandle: &QueueHandle<D>,
    ) {
        // No events for effect objects
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_capability_bits_are_kept() {
        assert_eq!(capability_bits(WEnum::Value(Capability::Blur)), 1);
        assert_eq!(capability_bits(WEnum::Value(Capability::empty())), 0);
        assert_eq!(capability_bits(WEnum::Unknown(0b110)), 0b110);
    }
}
