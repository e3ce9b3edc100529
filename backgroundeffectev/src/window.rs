/// The toolkit window a binding follows. Bindings only keep a
/// [std::rc::Weak] to it, so implementations use interior mutability.
pub trait EffectWindow {
    type Surface;

    /// None while the window has no backing surface
    fn native_surface(&self) -> Option<Self::Surface>;
    fn is_visible(&self) -> bool;
    /// the compositor only picks up effect changes with the next commit
    fn request_redraw(&self);
}
