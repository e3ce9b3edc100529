//! Blur support as announced by the compositor
//!
//! The manager global is only a promise that the protocol exists. Whether blur
//! can actually be rendered comes from the `capabilities` event, which may
//! arrive at any time and may take support away again.

use crate::protocol::Capability;

/// A flip of one of the two booleans the tracker derives
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityChange {
    /// the manager global got bound, or was removed by the compositor
    Active(bool),
    /// the blur bit of the capability mask flipped
    Blur(bool),
}

/// Copyable view of the tracker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilityState {
    pub active: bool,
    pub supports_blur: bool,
}

impl CapabilityState {
    /// an effect object may only be created when both hold
    pub fn can_attach(&self) -> bool {
        self.active && self.supports_blur
    }
}

#[derive(Debug, Default)]
pub struct CapabilityTracker {
    state: CapabilityState,
    flags: u32,
    pending: Vec<CapabilityChange>,
}

impl CapabilityTracker {
    pub fn is_active(&self) -> bool {
        self.state.active
    }

    pub fn supports_blur(&self) -> bool {
        self.state.supports_blur
    }

    /// last raw bitmask, unknown bits included
    pub fn flags(&self) -> u32 {
        self.flags
    }

    pub fn state(&self) -> CapabilityState {
        self.state
    }

    pub fn set_active(&mut self, active: bool) {
        if self.state.active == active {
            return;
        }
        self.state.active = active;
        log::debug!("background effect manager active: {active}");
        self.pending.push(CapabilityChange::Active(active));
    }

    /// Record a capability mask. Only the blur bit matters, so churn in the
    /// other bits never queues a change.
    pub fn update_capabilities(&mut self, flags: u32) {
        self.flags = flags;
        let blur = flags & Capability::Blur.bits() != 0;
        if self.state.supports_blur == blur {
            return;
        }
        self.state.supports_blur = blur;
        log::info!("compositor blur support changed: {blur}");
        self.pending.push(CapabilityChange::Blur(blur));
    }

    /// The manager global is gone. Blur support is forgotten along with it, a
    /// rebound manager has to announce its capabilities again.
    pub fn revoke(&mut self) {
        self.set_active(false);
        self.update_capabilities(0);
    }

    /// Drain the changes queued since the last call, oldest first
    pub fn take_changes(&mut self) -> Vec<CapabilityChange> {
        std::mem::take(&mut self.pending)
    }
}
