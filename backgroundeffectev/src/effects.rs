use std::collections::{BTreeMap, VecDeque};

use crate::BackgroundEffectError;
use crate::backend::EffectBackend;
use crate::binding::{BindingContext, EffectNotification, SurfaceEffectBinding, SurfaceEvent};
use crate::capability::{CapabilityChange, CapabilityState};
use crate::id::BindingId;
use crate::region::BlurRect;
use crate::settings::EffectSettings;
use crate::window::EffectWindow;

/// Owns the backend and every binding of one connection.
///
/// Toolkit events are [posted](BackgroundEffects::post) and only take effect
/// in [process](BackgroundEffects::process), in posting order. Capability
/// changes coming from the compositor are handed to every binding between two
/// messages.
pub struct BackgroundEffects<B, W>
where
    B: EffectBackend,
    W: EffectWindow<Surface = B::Surface>,
{
    backend: B,
    settings: EffectSettings,
    bindings: BTreeMap<BindingId, SurfaceEffectBinding<B, W>>,
    inbox: VecDeque<(BindingId, SurfaceEvent<W>)>,
    notifications: Vec<EffectNotification>,
}

impl<B, W> BackgroundEffects<B, W>
where
    B: EffectBackend,
    W: EffectWindow<Surface = B::Surface>,
{
    pub fn new(backend: B, settings: EffectSettings) -> Self {
        Self {
            backend,
            settings,
            bindings: BTreeMap::new(),
            inbox: VecDeque::new(),
            notifications: Vec::new(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn settings(&self) -> &EffectSettings {
        &self.settings
    }

    pub fn capabilities(&self) -> CapabilityState {
        self.backend.capabilities()
    }

    pub fn create_binding(&mut self) -> BindingId {
        let id = BindingId::unique();
        self.bindings.insert(id, SurfaceEffectBinding::new(id));
        log::debug!("created {id}");
        id
    }

    /// Detach and forget a binding. Messages still queued for it are dropped.
    pub fn remove_binding(&mut self, id: BindingId) -> bool {
        let Some(mut binding) = self.bindings.remove(&id) else {
            return false;
        };
        let mut cx = BindingContext {
            backend: &mut self.backend,
            settings: &self.settings,
            notifications: &mut self.notifications,
        };
        binding.detach(&mut cx);
        self.inbox.retain(|(target, _)| *target != id);
        log::debug!("removed {id}");
        true
    }

    pub fn contains(&self, id: BindingId) -> bool {
        self.bindings.contains_key(&id)
    }

    pub fn post(&mut self, id: BindingId, event: SurfaceEvent<W>) {
        self.inbox.push_back((id, event));
    }

    /// Post new regions and process them right away
    pub fn set_regions(&mut self, id: BindingId, regions: impl Into<Vec<BlurRect>>) {
        self.post(id, SurfaceEvent::SetRegions(regions.into()));
        self.process();
    }

    pub fn regions(&self, id: BindingId) -> Option<&[BlurRect]> {
        self.bindings.get(&id).map(SurfaceEffectBinding::regions)
    }

    /// true iff the binding currently owns an effect object
    pub fn is_active(&self, id: BindingId) -> bool {
        self.bindings
            .get(&id)
            .is_some_and(SurfaceEffectBinding::is_active)
    }

    pub fn binding(&self, id: BindingId) -> Option<&SurfaceEffectBinding<B, W>> {
        self.bindings.get(&id)
    }

    /// Handle every queued message
    pub fn process(&mut self) {
        self.broadcast_capabilities();
        while let Some((id, event)) = self.inbox.pop_front() {
            let Some(binding) = self.bindings.get_mut(&id) else {
                log::debug!("dropping {} for removed {id}", event.name());
                continue;
            };
            let mut cx = BindingContext {
                backend: &mut self.backend,
                settings: &self.settings,
                notifications: &mut self.notifications,
            };
            binding.handle(event, &mut cx);
            // the first attach attempt may have run discovery
            self.broadcast_capabilities();
        }
    }

    /// Apply protocol events that already arrived, then the queued messages
    pub fn dispatch_pending(&mut self) -> Result<(), BackgroundEffectError> {
        self.backend.dispatch_pending()?;
        self.process();
        Ok(())
    }

    /// Drain the property changes since the last call, oldest first
    pub fn take_notifications(&mut self) -> Vec<EffectNotification> {
        std::mem::take(&mut self.notifications)
    }

    fn broadcast_capabilities(&mut self) {
        let changes = self.backend.take_capability_changes();
        if changes.is_empty() {
            return;
        }
        let state = self.backend.capabilities();
        if changes.contains(&CapabilityChange::Active(false)) {
            log::info!("background effect manager went away");
        }
        let mut cx = BindingContext {
            backend: &mut self.backend,
            settings: &self.settings,
            notifications: &mut self.notifications,
        };
        for binding in self.bindings.values_mut() {
            binding.capability_changed(state, &mut cx);
        }
    }
}

impl<B, W> Drop for BackgroundEffects<B, W>
where
    B: EffectBackend,
    W: EffectWindow<Surface = B::Surface>,
{
    fn drop(&mut self) {
        let mut cx = BindingContext {
            backend: &mut self.backend,
            settings: &self.settings,
            notifications: &mut self.notifications,
        };
        for binding in self.bindings.values_mut() {
            binding.detach(&mut cx);
        }
        if let Err(err) = self.backend.flush() {
            log::warn!("cannot flush background effect teardown: {err}");
        }
    }
}
