//! The per-surface state machine
//!
//! A binding is `Detached` until every condition for an effect object holds at
//! once: the manager is bound, blur is supported, and the window is visible and
//! has a native surface. Whatever breaks one of those brings it back to
//! `Detached`. The region list is application state and survives both.

use std::rc::{Rc, Weak};

use crate::backend::EffectBackend;
use crate::capability::CapabilityState;
use crate::id::BindingId;
use crate::region::{self, BlurRect};
use crate::settings::{EffectSettings, EmptyRegionPolicy};
use crate::window::EffectWindow;

/// Lifecycle messages a binding reacts to, in the order the toolkit saw them
pub enum SurfaceEvent<W> {
    /// the effect item finished its initial setup
    ComponentComplete,
    /// the item moved to another window, or lost its window
    WindowChanged(Option<Weak<W>>),
    SurfaceRealized,
    SurfaceUnrealized,
    VisibilityChanged(bool),
    WindowDestroyed,
    SetRegions(Vec<BlurRect>),
}

impl<W> SurfaceEvent<W> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::ComponentComplete => "component-complete",
            Self::WindowChanged(_) => "window-changed",
            Self::SurfaceRealized => "surface-realized",
            Self::SurfaceUnrealized => "surface-unrealized",
            Self::VisibilityChanged(_) => "visibility-changed",
            Self::WindowDestroyed => "window-destroyed",
            Self::SetRegions(_) => "set-regions",
        }
    }
}

impl<W> std::fmt::Debug for SurfaceEvent<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WindowChanged(window) => {
                write!(f, "WindowChanged(has_window: {})", window.is_some())
            }
            Self::VisibilityChanged(visible) => write!(f, "VisibilityChanged({visible})"),
            Self::SetRegions(regions) => write!(f, "SetRegions({regions:?})"),
            other => f.write_str(other.name()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    ActiveChanged(bool),
    RegionsChanged,
}

/// Property change of one binding, for the application layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EffectNotification {
    pub id: BindingId,
    pub kind: NotificationKind,
}

pub(crate) struct BindingContext<'a, B> {
    pub backend: &'a mut B,
    pub settings: &'a EffectSettings,
    pub notifications: &'a mut Vec<EffectNotification>,
}

impl<B> BindingContext<'_, B> {
    fn notify(&mut self, id: BindingId, kind: NotificationKind) {
        self.notifications.push(EffectNotification { id, kind });
    }
}

pub struct SurfaceEffectBinding<B: EffectBackend, W> {
    id: BindingId,
    window: Option<Weak<W>>,
    // waiting on `window` to become visible, at most one retry
    visibility_wait: bool,
    effect: Option<B::Effect>,
    regions: Vec<BlurRect>,
}

impl<B, W> SurfaceEffectBinding<B, W>
where
    B: EffectBackend,
    W: EffectWindow<Surface = B::Surface>,
{
    pub fn new(id: BindingId) -> Self {
        Self {
            id,
            window: None,
            visibility_wait: false,
            effect: None,
            regions: Vec::new(),
        }
    }

    pub fn id(&self) -> BindingId {
        self.id
    }

    /// true iff an effect object exists for the surface
    pub fn is_active(&self) -> bool {
        self.effect.is_some()
    }

    pub fn regions(&self) -> &[BlurRect] {
        &self.regions
    }

    pub fn is_waiting_for_visibility(&self) -> bool {
        self.visibility_wait
    }

    fn window(&self) -> Option<Rc<W>> {
        self.window.as_ref().and_then(Weak::upgrade)
    }

    pub(crate) fn handle(&mut self, event: SurfaceEvent<W>, cx: &mut BindingContext<'_, B>) {
        log::trace!("{}: {:?}", self.id, event);
        match event {
            SurfaceEvent::ComponentComplete | SurfaceEvent::SurfaceRealized => self.try_attach(cx),
            SurfaceEvent::WindowChanged(window) => self.window_changed(window, cx),
            SurfaceEvent::SurfaceUnrealized => self.detach(cx),
            SurfaceEvent::VisibilityChanged(visible) => self.visibility_changed(visible, cx),
            SurfaceEvent::WindowDestroyed => {
                self.detach(cx);
                self.window = None;
            }
            SurfaceEvent::SetRegions(regions) => self.set_regions(regions, cx),
        }
    }

    pub(crate) fn capability_changed(
        &mut self,
        state: CapabilityState,
        cx: &mut BindingContext<'_, B>,
    ) {
        if state.can_attach() {
            self.try_attach(cx);
        } else if self.effect.is_some() {
            log::info!("{}: blur no longer available, detaching", self.id);
            self.detach(cx);
        }
    }

    fn window_changed(&mut self, window: Option<Weak<W>>, cx: &mut BindingContext<'_, B>) {
        self.detach(cx);
        self.window = window;
        if self.window.is_some() {
            self.try_attach(cx);
        }
    }

    fn visibility_changed(&mut self, visible: bool, cx: &mut BindingContext<'_, B>) {
        if !visible {
            return;
        }
        if std::mem::take(&mut self.visibility_wait) {
            log::debug!("{}: window became visible, retrying attach", self.id);
        }
        self.try_attach(cx);
    }

    fn try_attach(&mut self, cx: &mut BindingContext<'_, B>) {
        if self.effect.is_some() {
            return;
        }
        let Some(window) = self.window() else {
            return;
        };
        if !window.is_visible() {
            self.visibility_wait = true;
            return;
        }

        cx.backend.ensure_bound();
        if !cx.backend.capabilities().can_attach() {
            log::trace!("{}: compositor cannot blur, staying detached", self.id);
            return;
        }
        let Some(surface) = window.native_surface() else {
            log::debug!("{}: window has no surface yet", self.id);
            return;
        };
        let Some(effect) = cx.backend.get_background_effect(&surface) else {
            return;
        };

        self.effect = Some(effect);
        log::debug!("{}: background effect attached", self.id);
        cx.notify(self.id, NotificationKind::ActiveChanged(true));
        // an empty list only means something under the whole-surface policy
        if !self.regions.is_empty()
            || cx.settings.empty_region_policy() == EmptyRegionPolicy::WholeSurface
        {
            self.apply_regions(&window, cx);
        }
    }

    /// Safe to call in any state. Only an attached binding sends anything.
    pub(crate) fn detach(&mut self, cx: &mut BindingContext<'_, B>) {
        self.visibility_wait = false;
        let Some(effect) = self.effect.take() else {
            return;
        };
        cx.backend.destroy_effect(effect);
        if let Some(window) = self.window() {
            window.request_redraw();
        }
        log::debug!("{}: background effect detached", self.id);
        cx.notify(self.id, NotificationKind::ActiveChanged(false));
    }

    fn set_regions(&mut self, regions: Vec<BlurRect>, cx: &mut BindingContext<'_, B>) {
        if self.regions == regions {
            return;
        }
        self.regions = regions;
        cx.notify(self.id, NotificationKind::RegionsChanged);
        if let Some(window) = self.window() {
            self.apply_regions(&window, cx);
        }
    }

    fn apply_regions(&self, window: &W, cx: &mut BindingContext<'_, B>) {
        let Some(effect) = &self.effect else {
            return;
        };
        let policy = cx.settings.empty_region_policy();
        if region::apply_regions(cx.backend, effect, &self.regions, policy) {
            window.request_redraw();
        }
    }
}
