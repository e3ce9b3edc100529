//! Turning rectangle lists into `wl_region` objects
//!
//! A region only lives for the duration of one `set_blur_region` call: the
//! compositor copies it, so it is destroyed right after being handed over.

use crate::backend::EffectBackend;
use crate::settings::EmptyRegionPolicy;

/// Rectangle in surface-local logical coordinates, as the application gives it
///
/// Equality is bitwise through [f64::total_cmp], so a rectangle holding a NaN
/// still equals itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlurRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BlurRect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Round every field on its own to the nearest integer, halves away from
    /// zero. The area is not preserved.
    pub fn to_wire(&self) -> WireRect {
        WireRect {
            x: round_edge(self.x),
            y: round_edge(self.y),
            width: round_edge(self.width),
            height: round_edge(self.height),
        }
    }
}

impl PartialEq for BlurRect {
    fn eq(&self, other: &Self) -> bool {
        [
            (self.x, other.x),
            (self.y, other.y),
            (self.width, other.width),
            (self.height, other.height),
        ]
        .iter()
        .all(|(a, b)| a.total_cmp(b).is_eq())
    }
}

impl Eq for BlurRect {}

impl From<(f64, f64, f64, f64)> for BlurRect {
    fn from((x, y, width, height): (f64, f64, f64, f64)) -> Self {
        Self::new(x, y, width, height)
    }
}

impl From<(i32, i32, i32, i32)> for BlurRect {
    fn from((x, y, width, height): (i32, i32, i32, i32)) -> Self {
        Self::new(x.into(), y.into(), width.into(), height.into())
    }
}

/// Rectangle as `wl_region.add` takes it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WireRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl WireRect {
    /// large enough to cover any surface
    pub const WHOLE_SURFACE: WireRect = WireRect {
        x: 0,
        y: 0,
        width: i32::MAX,
        height: i32::MAX,
    };
}

// `as` saturates out of range values and maps NaN to 0
fn round_edge(value: f64) -> i32 {
    value.round() as i32
}

/// A `wl_region` that is destroyed when the guard goes out of scope
pub struct ScopedRegion<'a, B: EffectBackend> {
    backend: &'a mut B,
    region: Option<B::Region>,
}

impl<'a, B: EffectBackend> ScopedRegion<'a, B> {
    /// None when the region factory is not bound
    pub fn create(backend: &'a mut B) -> Option<Self> {
        let region = backend.create_region()?;
        Some(Self {
            backend,
            region: Some(region),
        })
    }

    pub fn add(&mut self, rect: WireRect) {
        if let Some(region) = &self.region {
            self.backend.add_to_region(region, rect);
        }
    }

    /// Hand the region to the effect object. The guard still destroys it.
    pub fn install(&mut self, effect: &B::Effect) {
        self.backend.set_blur_region(effect, self.region.as_ref());
    }
}

impl<B: EffectBackend> Drop for ScopedRegion<'_, B> {
    fn drop(&mut self) {
        if let Some(region) = self.region.take() {
            self.backend.destroy_region(region);
        }
    }
}

/// Send `regions` as the blur region of `effect`.
///
/// Returns false when nothing was sent because no region factory is bound;
/// the compositor then keeps whatever region it had before.
pub fn apply_regions<B: EffectBackend>(
    backend: &mut B,
    effect: &B::Effect,
    regions: &[BlurRect],
    policy: EmptyRegionPolicy,
) -> bool {
    if regions.is_empty() && policy == EmptyRegionPolicy::Clear {
        backend.set_blur_region(effect, None);
        log::debug!("cleared blur region");
        return true;
    }

    let Some(mut region) = ScopedRegion::create(backend) else {
        log::warn!("wl_compositor is not bound, blur region left unchanged");
        return false;
    };
    if regions.is_empty() {
        region.add(WireRect::WHOLE_SURFACE);
    } else {
        for rect in regions {
            region.add(rect.to_wire());
        }
    }
    region.install(effect);
    log::debug!("set blur region with {} rectangles", regions.len());
    true
}
