//! # Background blur regions for wayland surfaces
//!
//! Asks the compositor, through `ext-background-effect-v1`, to blur what lies
//! behind chosen rectangles of a surface. The crate does not own the
//! connection or the windows: the toolkit hands in its [wayland_client::Connection]
//! and tells every binding what happens to its window, the crate takes care of
//! creating and destroying the protocol objects at the right time.
//!
//! ```rust, no_run
//! use std::cell::{Cell, RefCell};
//! use std::rc::Rc;
//!
//! use backgroundeffectev::reexport::wayland_client::{Connection, WlSurface};
//! use backgroundeffectev::*;
//!
//! struct Window {
//!     surface: RefCell<Option<WlSurface>>,
//!     visible: Cell<bool>,
//! }
//!
//! impl EffectWindow for Window {
//!     type Surface = WlSurface;
//!
//!     fn native_surface(&self) -> Option<WlSurface> {
//!         self.surface.borrow().clone()
//!     }
//!
//!     fn is_visible(&self) -> bool {
//!         self.visible.get()
//!     }
//!
//!     fn request_redraw(&self) {
//!         // NOTE: commit the surface on the next frame
//!     }
//! }
//!
//! fn setup(connection: Connection, window: &Rc<Window>) -> Result<(), BackgroundEffectError> {
//!     let settings = EffectSettings::default();
//!     let mut effects = BackgroundEffects::new(WaylandBackend::new(connection, settings), settings);
//!
//!     let blur = effects.create_binding();
//!     effects.post(blur, SurfaceEvent::WindowChanged(Some(Rc::downgrade(window))));
//!     effects.post(blur, SurfaceEvent::ComponentComplete);
//!     effects.set_regions(blur, [BlurRect::new(0., 0., 200., 40.)]);
//!
//!     // call this every time the event loop woke up
//!     effects.dispatch_pending()?;
//!     for notification in effects.take_notifications() {
//!         println!("{notification:?}");
//!     }
//!     Ok(())
//! }
//! ```

mod backend;
mod binding;
mod capability;
mod effects;
mod globals;
mod id;
pub mod native;
pub mod protocol;
mod region;
mod settings;
mod window;

pub use backend::{EffectBackend, WaylandBackend};
pub use binding::{EffectNotification, NotificationKind, SurfaceEffectBinding, SurfaceEvent};
pub use capability::{CapabilityChange, CapabilityState, CapabilityTracker};
pub use effects::BackgroundEffects;
pub use globals::{BoundGlobals, DisplayAccessor, GlobalBinder, ManagerState};
pub use id::BindingId;
pub use region::{BlurRect, ScopedRegion, WireRect, apply_regions};
pub use settings::{
    EffectSettings, EmptyRegionPolicy, MAX_COMPOSITOR_VERSION, MAX_MANAGER_VERSION,
};
pub use window::EffectWindow;

use wayland_client::{
    ConnectError, DispatchError,
    backend::WaylandError,
    globals::{BindError, GlobalError},
};

#[derive(Debug, thiserror::Error)]
pub enum BackgroundEffectError {
    #[error("no wayland display available")]
    DisplayUnavailable,
    #[error("connect error")]
    ConnectError(#[from] ConnectError),
    #[error("Global Error")]
    GlobalError(#[from] GlobalError),
    #[error("Bind Error")]
    BindError(#[from] BindError),
    #[error("Error during queue")]
    DispatchError(#[from] DispatchError),
    #[error("wayland connection error")]
    WaylandError(#[from] WaylandError),
}

pub mod reexport {
    pub mod wayland_client {
        pub use wayland_client::{
            Connection, QueueHandle, WEnum,
            protocol::{wl_region::WlRegion, wl_surface::WlSurface},
        };
    }
    pub use crate::protocol::{
        ext_background_effect_manager_v1::ExtBackgroundEffectManagerV1,
        ext_background_effect_surface_v1::ExtBackgroundEffectSurfaceV1,
    };
}
