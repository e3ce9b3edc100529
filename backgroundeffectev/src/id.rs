use std::sync::atomic::{self, AtomicU64};

static COUNT: AtomicU64 = AtomicU64::new(1);

/// Identifies one binding inside a [crate::BackgroundEffects]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BindingId(u64);

impl BindingId {
    pub fn unique() -> Self {
        Self(COUNT.fetch_add(1, atomic::Ordering::Relaxed))
    }

    pub fn inner(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for BindingId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "binding-{}", self.0)
    }
}
