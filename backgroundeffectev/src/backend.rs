//! The wire requests a binding issues, behind one trait
//!
//! [WaylandBackend] speaks the real protocol over a [GlobalBinder]. Anything
//! else implementing [EffectBackend] can stand in for it.

use wayland_client::protocol::{wl_region::WlRegion, wl_surface::WlSurface};

use crate::BackgroundEffectError;
use crate::capability::{CapabilityChange, CapabilityState};
use crate::globals::{DisplayAccessor, GlobalBinder};
use crate::protocol::{
    BackgroundEffectData, ext_background_effect_surface_v1::ExtBackgroundEffectSurfaceV1,
};
use crate::region::WireRect;
use crate::settings::EffectSettings;

pub trait EffectBackend {
    type Surface;
    /// owned by exactly one binding, handed back to [EffectBackend::destroy_effect]
    type Effect;
    type Region;

    /// Run global discovery if it has not run yet
    fn ensure_bound(&mut self);
    fn capabilities(&self) -> CapabilityState;
    /// capability flips since the last call, oldest first
    fn take_capability_changes(&mut self) -> Vec<CapabilityChange>;
    /// apply protocol events that already arrived
    fn dispatch_pending(&mut self) -> Result<(), BackgroundEffectError>;
    /// push buffered requests to the compositor
    fn flush(&mut self) -> Result<(), BackgroundEffectError>;

    /// None when no manager is bound
    fn get_background_effect(&mut self, surface: &Self::Surface) -> Option<Self::Effect>;
    fn destroy_effect(&mut self, effect: Self::Effect);
    fn set_blur_region(&mut self, effect: &Self::Effect, region: Option<&Self::Region>);

    /// None when the region factory is not bound
    fn create_region(&mut self) -> Option<Self::Region>;
    fn add_to_region(&mut self, region: &Self::Region, rect: WireRect);
    fn destroy_region(&mut self, region: Self::Region);
}

pub struct WaylandBackend<A> {
    binder: GlobalBinder<A>,
}

impl<A: DisplayAccessor> WaylandBackend<A> {
    pub fn new(accessor: A, settings: EffectSettings) -> Self {
        Self {
            binder: GlobalBinder::new(accessor, settings),
        }
    }

    pub fn binder(&self) -> &GlobalBinder<A> {
        &self.binder
    }
}

impl<A: DisplayAccessor> EffectBackend for WaylandBackend<A> {
    type Surface = WlSurface;
    type Effect = ExtBackgroundEffectSurfaceV1;
    type Region = WlRegion;

    fn ensure_bound(&mut self) {
        self.binder.bind();
    }

    fn capabilities(&self) -> CapabilityState {
        self.binder
            .bound()
            .map(|globals| globals.state().tracker().state())
            .unwrap_or_default()
    }

    fn take_capability_changes(&mut self) -> Vec<CapabilityChange> {
        match self.binder.bound_mut() {
            Some(globals) => globals.state_mut().tracker_mut().take_changes(),
            None => Vec::new(),
        }
    }

    fn dispatch_pending(&mut self) -> Result<(), BackgroundEffectError> {
        if let Some(globals) = self.binder.bound_mut() {
            globals.dispatch_pending()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), BackgroundEffectError> {
        match self.binder.bound() {
            Some(globals) => globals.flush(),
            None => Ok(()),
        }
    }

    fn get_background_effect(&mut self, surface: &WlSurface) -> Option<Self::Effect> {
        let globals = self.binder.bound()?;
        let manager = globals.state().manager()?;
        Some(manager.get_background_effect(
            surface,
            globals.queue_handle(),
            BackgroundEffectData {
                surface: surface.clone(),
            },
        ))
    }

    fn destroy_effect(&mut self, effect: Self::Effect) {
        effect.destroy();
    }

    fn set_blur_region(&mut self, effect: &Self::Effect, region: Option<&WlRegion>) {
        effect.set_blur_region(region);
    }

    fn create_region(&mut self) -> Option<WlRegion> {
        let globals = self.binder.bind()?;
        let compositor = globals.compositor()?;
        Some(compositor.create_region(globals.queue_handle(), ()))
    }

    fn add_to_region(&mut self, region: &WlRegion, rect: WireRect) {
        region.add(rect.x, rect.y, rect.width, rect.height);
    }

    fn destroy_region(&mut self, region: WlRegion) {
        region.destroy();
    }
}
