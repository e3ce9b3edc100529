//! One-time discovery of the globals the blur effect needs
//!
//! Discovery blocks on a roundtrip, so it runs at most once per
//! [GlobalBinder]. Its outcome, success or failure, is kept.

use wayland_client::{
    Connection, Dispatch, EventQueue, Proxy, QueueHandle, delegate_noop,
    globals::{GlobalList, GlobalListContents, registry_queue_init},
    protocol::{wl_compositor::WlCompositor, wl_region::WlRegion, wl_registry},
};

use crate::BackgroundEffectError;
use crate::capability::CapabilityTracker;
use crate::protocol::{
    BackgroundEffectData, BackgroundEffectHandler, EffectManagerData,
    ext_background_effect_manager_v1::{self, ExtBackgroundEffectManagerV1},
    ext_background_effect_surface_v1::{self, ExtBackgroundEffectSurfaceV1},
};
use crate::settings::EffectSettings;

/// Hands out the connection of the running process, if it is a wayland one
pub trait DisplayAccessor {
    fn connection(&self) -> Option<Connection>;
}

impl DisplayAccessor for Connection {
    fn connection(&self) -> Option<Connection> {
        Some(self.clone())
    }
}

impl DisplayAccessor for Option<Connection> {
    fn connection(&self) -> Option<Connection> {
        self.clone()
    }
}

impl<F> DisplayAccessor for F
where
    F: Fn() -> Option<Connection>,
{
    fn connection(&self) -> Option<Connection> {
        self()
    }
}

/// The per-connection manager state, and the dispatch target of the binder's queue
#[derive(Debug)]
pub struct ManagerState {
    tracker: CapabilityTracker,
    manager: Option<ExtBackgroundEffectManagerV1>,
    manager_version: u32,
}

impl ManagerState {
    fn new(manager_version: u32) -> Self {
        Self {
            tracker: CapabilityTracker::default(),
            manager: None,
            manager_version,
        }
    }

    pub fn tracker(&self) -> &CapabilityTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut CapabilityTracker {
        &mut self.tracker
    }

    pub fn manager(&self) -> Option<&ExtBackgroundEffectManagerV1> {
        self.manager.as_ref()
    }

    fn bind_manager(
        &mut self,
        registry: &wl_registry::WlRegistry,
        name: u32,
        version: u32,
        qh: &QueueHandle<Self>,
    ) {
        let version = version.min(self.manager_version);
        let manager = registry.bind::<ExtBackgroundEffectManagerV1, _, _>(
            name,
            version,
            qh,
            EffectManagerData { global_name: name },
        );
        log::info!(
            "bound {} version {version}",
            ExtBackgroundEffectManagerV1::interface().name
        );
        self.manager = Some(manager);
        self.tracker.set_active(true);
    }

    fn manager_removed(&mut self, name: u32) {
        let bound_from = self
            .manager
            .as_ref()
            .and_then(|manager| manager.data::<EffectManagerData>())
            .map(|data| data.global_name);
        if bound_from != Some(name) {
            return;
        }
        if let Some(manager) = self.manager.take() {
            manager.destroy();
        }
        log::info!("compositor removed the background effect manager");
        self.tracker.revoke();
    }
}

impl BackgroundEffectHandler for ManagerState {
    fn capabilities_changed(&mut self, flags: u32) {
        self.tracker.update_capabilities(flags);
    }
}

// globals may come and go after the initial roundtrip
impl Dispatch<wl_registry::WlRegistry, GlobalListContents> for ManagerState {
    fn event(
        state: &mut Self,
        proxy: &wl_registry::WlRegistry,
        event: <wl_registry::WlRegistry as Proxy>::Event,
        _data: &GlobalListContents,
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        match event {
            wl_registry::Event::Global {
                name,
                interface,
                version,
            } if interface == ExtBackgroundEffectManagerV1::interface().name
                && state.manager.is_none() =>
            {
                state.bind_manager(proxy, name, version, qh);
            }
            wl_registry::Event::GlobalRemove { name } => state.manager_removed(name),
            _ => {}
        }
    }
}

impl Dispatch<ExtBackgroundEffectManagerV1, EffectManagerData> for ManagerState {
    fn event(
        state: &mut Self,
        proxy: &ExtBackgroundEffectManagerV1,
        event: ext_background_effect_manager_v1::Event,
        data: &EffectManagerData,
        conn: &Connection,
        qhandle: &QueueHandle<Self>,
    ) {
        <() as Dispatch<ExtBackgroundEffectManagerV1, EffectManagerData, Self>>::event(
            state, proxy, event, data, conn, qhandle,
        )
    }
}

impl Dispatch<ExtBackgroundEffectSurfaceV1, BackgroundEffectData> for ManagerState {
    fn event(
        state: &mut Self,
        proxy: &ExtBackgroundEffectSurfaceV1,
        event: ext_background_effect_surface_v1::Event,
        data: &BackgroundEffectData,
        conn: &Connection,
        qhandle: &QueueHandle<Self>,
    ) {
        <() as Dispatch<ExtBackgroundEffectSurfaceV1, BackgroundEffectData, Self>>::event(
            state, proxy, event, data, conn, qhandle,
        )
    }
}

delegate_noop!(ManagerState: ignore WlCompositor); // the region factory
delegate_noop!(ManagerState: ignore WlRegion); // regions only live for one request

/// Everything discovery produced. Lives as long as its [GlobalBinder].
pub struct BoundGlobals {
    connection: Connection,
    queue: EventQueue<ManagerState>,
    qh: QueueHandle<ManagerState>,
    compositor: Option<WlCompositor>,
    state: ManagerState,
}

impl BoundGlobals {
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn queue_handle(&self) -> &QueueHandle<ManagerState> {
        &self.qh
    }

    /// the region factory, missing only on very unusual compositors
    pub fn compositor(&self) -> Option<&WlCompositor> {
        self.compositor.as_ref()
    }

    pub fn state(&self) -> &ManagerState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ManagerState {
        &mut self.state
    }

    /// Apply the events already read for this queue, then flush our requests
    pub fn dispatch_pending(&mut self) -> Result<usize, BackgroundEffectError> {
        let dispatched = self.queue.dispatch_pending(&mut self.state)?;
        self.flush()?;
        Ok(dispatched)
    }

    pub fn flush(&self) -> Result<(), BackgroundEffectError> {
        self.connection.flush()?;
        Ok(())
    }
}

enum BindState {
    Unbound,
    Bound(Box<BoundGlobals>),
    Unavailable,
}

/// Lazily runs discovery against the connection its [DisplayAccessor] gives
pub struct GlobalBinder<A> {
    accessor: A,
    settings: EffectSettings,
    state: BindState,
}

impl<A: DisplayAccessor> GlobalBinder<A> {
    pub fn new(accessor: A, settings: EffectSettings) -> Self {
        Self {
            accessor,
            settings,
            state: BindState::Unbound,
        }
    }

    /// Run discovery on the first call. Later calls return the cached
    /// globals, or None again without touching the connection when the first
    /// attempt failed.
    pub fn bind(&mut self) -> Option<&mut BoundGlobals> {
        if matches!(self.state, BindState::Unbound) {
            self.state = match self.discover() {
                Ok(globals) => BindState::Bound(Box::new(globals)),
                Err(BackgroundEffectError::DisplayUnavailable) => {
                    log::debug!("not running on wayland, background effects unavailable");
                    BindState::Unavailable
                }
                Err(err) => {
                    log::warn!("background effect discovery failed: {err}");
                    BindState::Unavailable
                }
            };
        }
        self.bound_mut()
    }

    /// The globals, without triggering discovery
    pub fn bound(&self) -> Option<&BoundGlobals> {
        match &self.state {
            BindState::Bound(globals) => Some(&**globals),
            _ => None,
        }
    }

    pub fn bound_mut(&mut self) -> Option<&mut BoundGlobals> {
        match &mut self.state {
            BindState::Bound(globals) => Some(&mut **globals),
            _ => None,
        }
    }

    /// true once discovery ran and failed
    pub fn is_unavailable(&self) -> bool {
        matches!(self.state, BindState::Unavailable)
    }

    fn discover(&self) -> Result<BoundGlobals, BackgroundEffectError> {
        let connection = self
            .accessor
            .connection()
            .ok_or(BackgroundEffectError::DisplayUnavailable)?;
        let (globals, mut queue) = registry_queue_init::<ManagerState>(&connection)?;
        let qh = queue.handle();

        let compositor = globals
            .bind::<WlCompositor, _, _>(&qh, 1..=self.settings.compositor_version(), ())
            .inspect_err(|err| log::warn!("cannot bind wl_compositor: {err}"))
            .ok();

        let mut state = ManagerState::new(self.settings.manager_version());
        match find_global(&globals, ExtBackgroundEffectManagerV1::interface().name) {
            Some((name, version)) => {
                state.bind_manager(globals.registry(), name, version, &qh);
                if self.settings.capability_roundtrip() {
                    // the initial capabilities event follows the bind
                    queue.roundtrip(&mut state)?;
                }
            }
            None => log::info!(
                "compositor does not support {}",
                ExtBackgroundEffectManagerV1::interface().name
            ),
        }

        Ok(BoundGlobals {
            connection,
            queue,
            qh,
            compositor,
            state,
        })
    }
}

fn find_global(globals: &GlobalList, interface: &str) -> Option<(u32, u32)> {
    globals.contents().with_list(|list| {
        list.iter()
            .find(|global| global.interface == interface)
            .map(|global| (global.name, global.version))
    })
}
