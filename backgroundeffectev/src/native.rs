//! Getting wayland objects out of a toolkit's raw window handles
//!
//! Toolkits built on raw-window-handle own the `wl_display` and every
//! `wl_surface`. These helpers wrap them without taking ownership, and give
//! up quietly when the toolkit runs on another display server.

use rwh_06::{HasDisplayHandle, RawDisplayHandle, RawWindowHandle};
use wayland_backend::client::{Backend, ObjectId};
use wayland_client::{Connection, Proxy, protocol::wl_surface::WlSurface};

use crate::globals::DisplayAccessor;

/// [DisplayAccessor] over anything that has a raw display handle
pub struct RawDisplayAccessor<H> {
    handle: H,
}

impl<H: HasDisplayHandle> RawDisplayAccessor<H> {
    /// # Safety
    ///
    /// If `handle` yields a wayland display, that `wl_display` must stay
    /// connected for as long as any object bound through this accessor is used.
    pub unsafe fn new(handle: H) -> Self {
        Self { handle }
    }
}

impl<H: HasDisplayHandle> DisplayAccessor for RawDisplayAccessor<H> {
    fn connection(&self) -> Option<Connection> {
        let handle = match self.handle.display_handle() {
            Ok(handle) => handle,
            Err(err) => {
                log::debug!("no display handle: {err}");
                return None;
            }
        };
        match handle.as_raw() {
            RawDisplayHandle::Wayland(display) => {
                // SAFETY: the display outlives our objects, as promised to `new`
                let backend = unsafe { Backend::from_foreign_display(display.display.as_ptr().cast()) };
                Some(Connection::from_backend(backend))
            }
            other => {
                log::debug!("display handle is not wayland: {other:?}");
                None
            }
        }
    }
}

/// Wrap the `wl_surface` behind a raw window handle.
///
/// # Safety
///
/// For a wayland handle, `handle.surface` must point to a live `wl_surface`
/// created on the display `connection` wraps.
pub unsafe fn surface_from_raw(
    connection: &Connection,
    handle: RawWindowHandle,
) -> Option<WlSurface> {
    let RawWindowHandle::Wayland(handle) = handle else {
        return None;
    };
    // SAFETY: forwarded to the caller
    let id = unsafe { ObjectId::from_ptr(WlSurface::interface(), handle.surface.as_ptr().cast()) }
        .inspect_err(|err| log::warn!("cannot wrap wl_surface: {err}"))
        .ok()?;
    WlSurface::from_id(connection, id).ok()
}
