//! Runs the bindings against an in-process compositor over a socket pair

use std::cell::Cell;
use std::os::unix::net::UnixStream;
use std::rc::Rc;
use std::sync::mpsc::{self, TryRecvError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use backgroundeffectev::{
    BackgroundEffects, BlurRect, EffectSettings, EffectWindow, SurfaceEvent, WaylandBackend,
};
use wayland_client as wayc;
use wayland_server as ways;

use wayc::globals::{GlobalListContents, registry_queue_init};
use wayc::protocol::{wl_compositor, wl_registry, wl_surface};
use ways::backend::{ClientData, ClientId, DisconnectReason, GlobalId};
use ways::protocol::{
    wl_compositor as server_compositor, wl_region as server_region, wl_surface as server_surface,
};
use ways::{Client, DataInit, Dispatch, DisplayHandle, GlobalDispatch, New, Resource};

use server::{
    ext_background_effect_manager_v1::{self as server_manager, Capability},
    ext_background_effect_surface_v1 as server_effect,
};

mod server {
    #![allow(dead_code, non_camel_case_types, unused_unsafe, unused_variables)]
    #![allow(non_upper_case_globals, non_snake_case, unused_imports)]

    use wayland_server;
    use wayland_server::protocol::*;

    pub mod __interfaces {
        use wayland_server::protocol::__interfaces::*;
        wayland_scanner::generate_interfaces!("protocols/ext-background-effect-v1.xml");
    }
    use self::__interfaces::*;

    wayland_scanner::generate_server_code!("protocols/ext-background-effect-v1.xml");
}

/// What the compositor saw, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recorded {
    CompositorBound(u32),
    ManagerBound(u32),
    ManagerDestroyed,
    EffectCreated,
    EffectDestroyed,
    RegionAdded(i32, i32, i32, i32),
    BlurRegionSet(bool),
    RegionDestroyed,
}

enum Command {
    /// create the manager global, sending these capabilities to every binder
    Advertise(Option<Capability>),
    Withdraw,
    Announce(Capability),
    Shutdown,
}

struct Compositor {
    recorded: Arc<Mutex<Vec<Recorded>>>,
    manager_global: Option<GlobalId>,
    managers: Vec<server_manager::ExtBackgroundEffectManagerV1>,
    announce_on_bind: Option<Capability>,
}

impl Compositor {
    fn record(&self, recorded: Recorded) {
        self.recorded.lock().unwrap().push(recorded);
    }

    fn apply(&mut self, command: Command, handle: &DisplayHandle) {
        match command {
            Command::Advertise(capabilities) => {
                self.announce_on_bind = capabilities;
                self.manager_global = Some(handle.create_global::<
                    Self,
                    server_manager::ExtBackgroundEffectManagerV1,
                    (),
                >(1, ()));
            }
            Command::Withdraw => {
                if let Some(global) = self.manager_global.take() {
                    handle.remove_global::<Self>(global);
                }
            }
            Command::Announce(capabilities) => {
                self.managers.retain(|manager| manager.is_alive());
                for manager in &self.managers {
                    manager.capabilities(capabilities);
                }
            }
            Command::Shutdown => {}
        }
    }
}

struct TestClientData;

impl ClientData for TestClientData {
    fn initialized(&self, _client_id: ClientId) {}
    fn disconnected(&self, _client_id: ClientId, _reason: DisconnectReason) {}
}

impl GlobalDispatch<server_compositor::WlCompositor, ()> for Compositor {
    fn bind(
        state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<server_compositor::WlCompositor>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        let compositor = data_init.init(resource, ());
        state.record(Recorded::CompositorBound(compositor.version()));
    }
}

impl Dispatch<server_compositor::WlCompositor, ()> for Compositor {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &server_compositor::WlCompositor,
        request: server_compositor::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            server_compositor::Request::CreateSurface { id } => {
                data_init.init(id, ());
            }
            server_compositor::Request::CreateRegion { id } => {
                data_init.init(id, ());
            }
            _ => {}
        }
    }
}

impl Dispatch<server_surface::WlSurface, ()> for Compositor {
    fn request(
        _state: &mut Self,
        _client: &Client,
        _resource: &server_surface::WlSurface,
        _request: server_surface::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
    }
}

impl Dispatch<server_region::WlRegion, ()> for Compositor {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &server_region::WlRegion,
        request: server_region::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            server_region::Request::Add {
                x,
                y,
                width,
                height,
            } => state.record(Recorded::RegionAdded(x, y, width, height)),
            server_region::Request::Destroy => state.record(Recorded::RegionDestroyed),
            _ => {}
        }
    }
}

impl GlobalDispatch<server_manager::ExtBackgroundEffectManagerV1, ()> for Compositor {
    fn bind(
        state: &mut Self,
        _handle: &DisplayHandle,
        _client: &Client,
        resource: New<server_manager::ExtBackgroundEffectManagerV1>,
        _global_data: &(),
        data_init: &mut DataInit<'_, Self>,
    ) {
        let manager = data_init.init(resource, ());
        state.record(Recorded::ManagerBound(manager.version()));
        if let Some(capabilities) = state.announce_on_bind {
            manager.capabilities(capabilities);
        }
        state.managers.push(manager);
    }
}

impl Dispatch<server_manager::ExtBackgroundEffectManagerV1, ()> for Compositor {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &server_manager::ExtBackgroundEffectManagerV1,
        request: server_manager::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            server_manager::Request::GetBackgroundEffect { id, .. } => {
                data_init.init(id, ());
                state.record(Recorded::EffectCreated);
            }
            server_manager::Request::Destroy => state.record(Recorded::ManagerDestroyed),
            _ => {}
        }
    }
}

impl Dispatch<server_effect::ExtBackgroundEffectSurfaceV1, ()> for Compositor {
    fn request(
        state: &mut Self,
        _client: &Client,
        _resource: &server_effect::ExtBackgroundEffectSurfaceV1,
        request: server_effect::Request,
        _data: &(),
        _dhandle: &DisplayHandle,
        _data_init: &mut DataInit<'_, Self>,
    ) {
        match request {
            server_effect::Request::SetBlurRegion { region } => {
                state.record(Recorded::BlurRegionSet(region.is_some()))
            }
            server_effect::Request::Destroy => state.record(Recorded::EffectDestroyed),
            _ => {}
        }
    }
}

fn serve(
    stream: UnixStream,
    commands: mpsc::Receiver<Command>,
    acks: mpsc::Sender<()>,
    recorded: Arc<Mutex<Vec<Recorded>>>,
) {
    let mut display = ways::Display::<Compositor>::new().unwrap();
    let mut handle = display.handle();
    handle
        .insert_client(stream, Arc::new(TestClientData))
        .unwrap();
    handle.create_global::<Compositor, server_compositor::WlCompositor, ()>(6, ());

    let mut state = Compositor {
        recorded,
        manager_global: None,
        managers: Vec::new(),
        announce_on_bind: None,
    };
    loop {
        match commands.try_recv() {
            Ok(Command::Shutdown) | Err(TryRecvError::Disconnected) => break,
            Ok(command) => {
                state.apply(command, &handle);
                display.flush_clients().unwrap();
                if acks.send(()).is_err() {
                    break;
                }
            }
            Err(TryRecvError::Empty) => {}
        }
        display.dispatch_clients(&mut state).unwrap();
        display.flush_clients().unwrap();
        thread::sleep(Duration::from_millis(1));
    }
}

/// Client side of the window the effect is bound to
struct Shell;

impl wayc::Dispatch<wl_registry::WlRegistry, GlobalListContents> for Shell {
    fn event(
        _state: &mut Self,
        _proxy: &wl_registry::WlRegistry,
        _event: wl_registry::Event,
        _data: &GlobalListContents,
        _conn: &wayc::Connection,
        _qh: &wayc::QueueHandle<Self>,
    ) {
    }
}

wayc::delegate_noop!(Shell: ignore wl_compositor::WlCompositor);
wayc::delegate_noop!(Shell: ignore wl_surface::WlSurface);

struct TestSurface {
    surface: wl_surface::WlSurface,
    visible: Cell<bool>,
}

impl EffectWindow for TestSurface {
    type Surface = wl_surface::WlSurface;

    fn native_surface(&self) -> Option<wl_surface::WlSurface> {
        Some(self.surface.clone())
    }

    fn is_visible(&self) -> bool {
        self.visible.get()
    }

    fn request_redraw(&self) {
        self.surface.commit();
    }
}

type Effects = BackgroundEffects<WaylandBackend<wayc::Connection>, TestSurface>;

struct Session {
    connection: wayc::Connection,
    commands: mpsc::Sender<Command>,
    acks: mpsc::Receiver<()>,
    recorded: Arc<Mutex<Vec<Recorded>>>,
    shell_queue: wayc::EventQueue<Shell>,
    compositor: wl_compositor::WlCompositor,
    server: Option<thread::JoinHandle<()>>,
}

impl Session {
    fn start() -> Self {
        let (server_socket, client_socket) = UnixStream::pair().unwrap();
        let (commands, command_rx) = mpsc::channel();
        let (ack_tx, acks) = mpsc::channel();
        let recorded = Arc::new(Mutex::new(Vec::new()));
        let server_recorded = recorded.clone();
        let server =
            thread::spawn(move || serve(server_socket, command_rx, ack_tx, server_recorded));

        let connection = wayc::Connection::from_socket(client_socket).unwrap();
        let (globals, shell_queue) = registry_queue_init::<Shell>(&connection).unwrap();
        let compositor = globals
            .bind::<wl_compositor::WlCompositor, _, _>(&shell_queue.handle(), 1..=1, ())
            .unwrap();
        connection.roundtrip().unwrap();
        recorded.lock().unwrap().clear();

        Self {
            connection,
            commands,
            acks,
            recorded,
            shell_queue,
            compositor,
            server: Some(server),
        }
    }

    /// Run a command on the compositor and wait until it went out
    fn command(&self, command: Command) {
        self.commands.send(command).unwrap();
        self.acks.recv().unwrap();
    }

    /// Flush our requests and read everything the compositor answered
    fn sync(&self) {
        self.connection.roundtrip().unwrap();
    }

    fn window(&self) -> Rc<TestSurface> {
        let surface = self.compositor.create_surface(&self.shell_queue.handle(), ());
        Rc::new(TestSurface {
            surface,
            visible: Cell::new(true),
        })
    }

    fn effects(&self, settings: EffectSettings) -> Effects {
        BackgroundEffects::new(
            WaylandBackend::new(self.connection.clone(), settings),
            settings,
        )
    }

    fn take_recorded(&self) -> Vec<Recorded> {
        std::mem::take(&mut *self.recorded.lock().unwrap())
    }

    /// Wait for the compositor to see something without flushing ourselves
    fn wait_for(&self, recorded: Recorded) -> bool {
        (0..500).any(|_| {
            if self.recorded.lock().unwrap().contains(&recorded) {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
            false
        })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Some(server) = self.server.take() {
            let _ = server.join();
        }
    }
}

fn attached(session: &Session, window: &Rc<TestSurface>, settings: EffectSettings) -> Effects {
    let mut effects = session.effects(settings);
    let id = effects.create_binding();
    effects.post(id, SurfaceEvent::WindowChanged(Some(Rc::downgrade(window))));
    effects.process();
    effects
}

#[test]
fn discovery_caps_versions_and_reads_initial_capabilities() {
    let session = Session::start();
    session.command(Command::Advertise(Some(Capability::Blur)));
    let window = session.window();

    let settings = EffectSettings::default().with_compositor_version(4);
    let mut effects = session.effects(settings);
    let id = effects.create_binding();
    effects.post(id, SurfaceEvent::WindowChanged(Some(Rc::downgrade(&window))));
    effects.process();
    assert!(effects.capabilities().can_attach());
    assert!(effects.is_active(id));

    session.sync();
    assert_eq!(
        session.take_recorded(),
        vec![
            Recorded::CompositorBound(4),
            Recorded::ManagerBound(1),
            Recorded::EffectCreated,
        ]
    );
}

#[test]
fn missing_manager_leaves_bindings_detached() {
    let session = Session::start();
    let window = session.window();
    let mut effects = attached(&session, &window, EffectSettings::default());
    effects.dispatch_pending().unwrap();

    assert!(!effects.capabilities().active);
    session.sync();
    assert_eq!(session.take_recorded(), vec![Recorded::CompositorBound(6)]);
}

#[test]
fn late_capabilities_attach_waiting_bindings() {
    let session = Session::start();
    session.command(Command::Advertise(Some(Capability::empty())));
    let window = session.window();
    let mut effects = attached(&session, &window, EffectSettings::default());
    assert!(effects.capabilities().active);
    assert!(!effects.capabilities().supports_blur);

    session.command(Command::Announce(Capability::Blur));
    session.sync();
    effects.dispatch_pending().unwrap();
    assert!(effects.capabilities().can_attach());

    session.sync();
    assert!(session.take_recorded().contains(&Recorded::EffectCreated));

    session.command(Command::Announce(Capability::empty()));
    session.sync();
    effects.dispatch_pending().unwrap();
    session.sync();
    assert_eq!(session.take_recorded(), vec![Recorded::EffectDestroyed]);
}

#[test]
fn regions_reach_the_compositor_rounded() {
    let session = Session::start();
    session.command(Command::Advertise(Some(Capability::Blur)));
    let window = session.window();
    let mut effects = session.effects(EffectSettings::default());
    let id = effects.create_binding();
    effects.post(id, SurfaceEvent::WindowChanged(Some(Rc::downgrade(&window))));
    effects.process();
    session.sync();
    session.take_recorded();

    effects.set_regions(
        id,
        [
            BlurRect::new(0.4, 0.6, 3.5, 3.5),
            BlurRect::new(10., 10., 5., 5.),
        ],
    );
    session.sync();
    assert_eq!(
        session.take_recorded(),
        vec![
            Recorded::RegionAdded(0, 1, 4, 4),
            Recorded::RegionAdded(10, 10, 5, 5),
            Recorded::BlurRegionSet(true),
            Recorded::RegionDestroyed,
        ]
    );

    effects.set_regions(id, Vec::<BlurRect>::new());
    session.sync();
    assert_eq!(session.take_recorded(), vec![Recorded::BlurRegionSet(false)]);

    effects.post(id, SurfaceEvent::SurfaceUnrealized);
    effects.process();
    session.sync();
    assert_eq!(session.take_recorded(), vec![Recorded::EffectDestroyed]);
}

#[test]
fn withdrawn_manager_detaches_and_rebind_waits_for_capabilities() {
    let session = Session::start();
    session.command(Command::Advertise(Some(Capability::Blur)));
    let window = session.window();
    let mut effects = session.effects(EffectSettings::default());
    let id = effects.create_binding();
    effects.post(id, SurfaceEvent::WindowChanged(Some(Rc::downgrade(&window))));
    effects.process();
    assert!(effects.is_active(id));
    session.sync();
    session.take_recorded();

    session.command(Command::Withdraw);
    session.sync();
    effects.dispatch_pending().unwrap();
    assert!(!effects.is_active(id));
    assert!(!effects.capabilities().active);
    assert!(!effects.capabilities().supports_blur);
    session.sync();
    assert_eq!(
        session.take_recorded(),
        vec![Recorded::ManagerDestroyed, Recorded::EffectDestroyed]
    );

    // the new global stays quiet until told otherwise
    session.command(Command::Advertise(None));
    session.sync();
    effects.dispatch_pending().unwrap();
    assert!(effects.capabilities().active);
    assert!(!effects.is_active(id));
    session.sync();
    assert_eq!(session.take_recorded(), vec![Recorded::ManagerBound(1)]);

    session.command(Command::Announce(Capability::Blur));
    session.sync();
    effects.dispatch_pending().unwrap();
    assert!(effects.is_active(id));
    session.sync();
    assert_eq!(session.take_recorded(), vec![Recorded::EffectCreated]);
}

#[test]
fn dropping_the_effects_flushes_the_teardown() {
    let session = Session::start();
    session.command(Command::Advertise(Some(Capability::Blur)));
    let window = session.window();
    let effects = attached(&session, &window, EffectSettings::default());
    session.sync();
    session.take_recorded();

    drop(effects);
    assert!(session.wait_for(Recorded::EffectDestroyed));
}
