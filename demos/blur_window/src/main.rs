use std::cell::{Cell, RefCell};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::os::fd::AsFd;
use std::rc::Rc;
use std::time::Duration;

use backgroundeffectev::{
    BackgroundEffectError, BackgroundEffects, BindingId, BlurRect, EffectSettings, EffectWindow,
    SurfaceEvent, WaylandBackend,
};
use calloop::{
    EventLoop,
    timer::{TimeoutAction, Timer},
};
use calloop_wayland_source::WaylandSource;
use tracing_subscriber::EnvFilter;
use wayland_client::{
    ConnectError, Connection, Dispatch, QueueHandle, delegate_noop,
    globals::{BindError, GlobalError, GlobalListContents, registry_queue_init},
    protocol::{
        wl_buffer::WlBuffer, wl_compositor::WlCompositor, wl_registry::WlRegistry,
        wl_shm::{self, WlShm},
        wl_shm_pool::WlShmPool,
        wl_surface::WlSurface,
    },
};
use wayland_protocols::xdg::shell::client::{
    xdg_surface::{self, XdgSurface},
    xdg_toplevel::{self, XdgToplevel},
    xdg_wm_base::{self, XdgWmBase},
};

const DEFAULT_SIZE: (i32, i32) = (400, 300);
const REGION_PERIOD: Duration = Duration::from_secs(2);

#[derive(Debug, thiserror::Error)]
enum DemoError {
    #[error("connect error")]
    ConnectError(#[from] ConnectError),
    #[error("Global Error")]
    GlobalError(#[from] GlobalError),
    #[error("Bind Error")]
    BindError(#[from] BindError),
    #[error("background effect error")]
    EffectError(#[from] BackgroundEffectError),
    #[error("Event Loop Error")]
    EventLoopError(#[from] calloop::Error),
}

/// What the effect binding sees of our toplevel
#[derive(Debug, Default)]
struct DemoWindow {
    surface: RefCell<Option<WlSurface>>,
    visible: Cell<bool>,
    needs_commit: Cell<bool>,
}

impl EffectWindow for DemoWindow {
    type Surface = WlSurface;

    fn native_surface(&self) -> Option<WlSurface> {
        self.surface.borrow().clone()
    }

    fn is_visible(&self) -> bool {
        self.visible.get()
    }

    fn request_redraw(&self) {
        self.needs_commit.set(true);
    }
}

struct BlurWindow {
    window: Rc<DemoWindow>,
    effects: BackgroundEffects<WaylandBackend<Connection>, DemoWindow>,
    blur: BindingId,
    wl_surface: WlSurface,
    shm: WlShm,
    buffer: Option<(WlBuffer, (i32, i32))>,
    size: (i32, i32),
    step: usize,
    running: bool,
}

impl BlurWindow {
    fn redraw(&mut self, qh: &QueueHandle<Self>) {
        if self.buffer.as_ref().is_none_or(|(_, size)| *size != self.size) {
            if let Some((old, _)) = self.buffer.take() {
                old.destroy();
            }
            let Ok(mut file) = tempfile::tempfile() else {
                log::error!("Cannot create new file from tempfile");
                return;
            };
            let (width, height) = self.size;
            if let Err(err) = draw(&mut file, self.size) {
                log::error!("Cannot draw into the buffer: {err}");
                return;
            }
            let pool = self
                .shm
                .create_pool(file.as_fd(), width * height * 4, qh, ());
            let buffer = pool.create_buffer(
                0,
                width,
                height,
                width * 4,
                wl_shm::Format::Argb8888,
                qh,
                (),
            );
            pool.destroy();
            self.buffer = Some((buffer, self.size));
        }
        if let Some((buffer, (width, height))) = &self.buffer {
            self.wl_surface.attach(Some(buffer), 0, 0);
            self.wl_surface.damage(0, 0, *width, *height);
        }
        self.wl_surface.commit();
    }

    fn cycle_regions(&mut self) {
        self.step += 1;
        let regions = regions_for(self.step, self.size);
        log::info!("step {}: {} blur rects", self.step, regions.len());
        self.effects.set_regions(self.blur, regions);
    }

    fn after_dispatch(&mut self) -> Result<(), BackgroundEffectError> {
        self.effects.dispatch_pending()?;
        for notification in self.effects.take_notifications() {
            log::info!("{} {:?}", notification.id, notification.kind);
        }
        if self.window.needs_commit.replace(false) {
            self.wl_surface.commit();
        }
        Ok(())
    }
}

/// Bands at the top and bottom, the whole window, then nothing
fn regions_for(step: usize, (width, height): (i32, i32)) -> Vec<BlurRect> {
    let (width, height) = (f64::from(width), f64::from(height));
    match step % 3 {
        0 => vec![
            BlurRect::new(0., 0., width, height / 3.),
            BlurRect::new(0., height * 2. / 3., width, height / 3.),
        ],
        1 => vec![BlurRect::new(0., 0., width, height)],
        _ => Vec::new(),
    }
}

fn draw(file: &mut File, (width, height): (i32, i32)) -> std::io::Result<()> {
    let mut buf = BufWriter::new(file);
    for y in 0..height {
        // premultiplied, darker where the bands are
        let pixel: u32 = if y < height / 3 || y >= height * 2 / 3 {
            0x6010_1820
        } else {
            0x3008_0c10
        };
        for _ in 0..width {
            buf.write_all(&pixel.to_le_bytes())?;
        }
    }
    buf.flush()
}

impl Dispatch<WlRegistry, GlobalListContents> for BlurWindow {
    fn event(
        _state: &mut Self,
        _proxy: &WlRegistry,
        _event: <WlRegistry as wayland_client::Proxy>::Event,
        _data: &GlobalListContents,
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<XdgWmBase, ()> for BlurWindow {
    fn event(
        _state: &mut Self,
        wm_base: &XdgWmBase,
        event: xdg_wm_base::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let xdg_wm_base::Event::Ping { serial } = event {
            wm_base.pong(serial);
        }
    }
}

impl Dispatch<XdgSurface, ()> for BlurWindow {
    fn event(
        state: &mut Self,
        xdg_surface: &XdgSurface,
        event: xdg_surface::Event,
        _data: &(),
        _conn: &Connection,
        qh: &QueueHandle<Self>,
    ) {
        let xdg_surface::Event::Configure { serial } = event else {
            return;
        };
        xdg_surface.ack_configure(serial);
        state.redraw(qh);
        if state.window.surface.borrow().is_some() {
            return;
        }
        // first configure, the toplevel is mapped from now on
        *state.window.surface.borrow_mut() = Some(state.wl_surface.clone());
        state.window.visible.set(true);
        state.effects.post(state.blur, SurfaceEvent::SurfaceRealized);
        state
            .effects
            .post(state.blur, SurfaceEvent::VisibilityChanged(true));
        state.cycle_regions();
    }
}

impl Dispatch<XdgToplevel, ()> for BlurWindow {
    fn event(
        state: &mut Self,
        _toplevel: &XdgToplevel,
        event: xdg_toplevel::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            xdg_toplevel::Event::Configure { width, height, .. } if width > 0 && height > 0 => {
                state.size = (width, height);
            }
            xdg_toplevel::Event::Close => {
                state.running = false;
            }
            _ => {}
        }
    }
}

delegate_noop!(BlurWindow: ignore WlCompositor);
delegate_noop!(BlurWindow: ignore WlSurface);
delegate_noop!(BlurWindow: ignore WlShm);
delegate_noop!(BlurWindow: ignore WlShmPool);
delegate_noop!(BlurWindow: ignore WlBuffer);

fn main() -> Result<(), DemoError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let connection = Connection::connect_to_env()?;
    let (globals, event_queue) = registry_queue_init::<BlurWindow>(&connection)?;
    let qh = event_queue.handle();

    let compositor = globals.bind::<WlCompositor, _, _>(&qh, 1..=6, ())?;
    let shm = globals.bind::<WlShm, _, _>(&qh, 1..=1, ())?;
    let wm_base = globals.bind::<XdgWmBase, _, _>(&qh, 1..=6, ())?;

    let wl_surface = compositor.create_surface(&qh, ());
    let xdg_surface = wm_base.get_xdg_surface(&wl_surface, &qh, ());
    let toplevel = xdg_surface.get_toplevel(&qh, ());
    toplevel.set_title("background blur".to_owned());
    toplevel.set_app_id("blur_window".to_owned());
    wl_surface.commit();

    let settings = EffectSettings::default();
    let mut effects = BackgroundEffects::new(
        WaylandBackend::new(connection.clone(), settings),
        settings,
    );
    let window = Rc::new(DemoWindow::default());
    let blur = effects.create_binding();
    effects.post(blur, SurfaceEvent::WindowChanged(Some(Rc::downgrade(&window))));
    effects.post(blur, SurfaceEvent::ComponentComplete);

    let mut state = BlurWindow {
        window,
        effects,
        blur,
        wl_surface,
        shm,
        buffer: None,
        size: DEFAULT_SIZE,
        step: 0,
        running: true,
    };

    let mut event_loop: EventLoop<BlurWindow> = EventLoop::try_new()?;
    WaylandSource::new(connection, event_queue)
        .insert(event_loop.handle())
        .map_err(|err| err.error)?;
    event_loop
        .handle()
        .insert_source(Timer::from_duration(REGION_PERIOD), |_, _, state| {
            state.cycle_regions();
            TimeoutAction::ToDuration(REGION_PERIOD)
        })
        .map_err(|err| err.error)?;

    let signal = event_loop.get_signal();
    let mut result = Ok(());
    event_loop.run(Duration::from_millis(50), &mut state, |state| {
        if let Err(err) = state.after_dispatch() {
            log::error!("background effect dispatch failed: {err}");
            result = Err(err);
            signal.stop();
        }
        if !state.running {
            signal.stop();
        }
    })?;

    state.effects.post(state.blur, SurfaceEvent::WindowDestroyed);
    state.effects.dispatch_pending()?;
    toplevel.destroy();
    xdg_surface.destroy();
    state.wl_surface.destroy();
    result.map_err(DemoError::from)
}
