//! Process-wide resize switch and per-dictionary configuration.
//!
//! The process-wide flag exists so a server can suppress growth while a
//! forked child shares pages with the parent. Dictionaries built with
//! `ResizePolicy::Global` consult it on every expansion check; the explicit
//! policies ignore it.

use core::sync::atomic::{AtomicBool, Ordering};

static RESIZE_ENABLED: AtomicBool = AtomicBool::new(true);

/// Allow dictionaries following the global policy to grow on insert.
pub fn enable_resize() {
    RESIZE_ENABLED.store(true, Ordering::Relaxed);
}

/// Suppress ordinary growth for dictionaries following the global policy.
/// Forced expansion past the force ratio still happens.
pub fn disable_resize() {
    RESIZE_ENABLED.store(false, Ordering::Relaxed);
}

pub fn resize_enabled() -> bool {
    RESIZE_ENABLED.load(Ordering::Relaxed)
}

/// Whether a dictionary may grow or be explicitly resized.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum ResizePolicy {
    /// Follow `enable_resize` / `disable_resize`.
    #[default]
    Global,
    Enabled,
    Disabled,
}

impl ResizePolicy {
    pub fn allows_resize(self) -> bool {
        match self {
            ResizePolicy::Global => resize_enabled(),
            ResizePolicy::Enabled => true,
            ResizePolicy::Disabled => false,
        }
    }
}

/// Load factor past which a dictionary grows even when resizing is disabled.
pub const FORCE_RESIZE_RATIO: usize = 5;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct DictConfig {
    pub resize: ResizePolicy,
    pub force_resize_ratio: usize,
}

impl Default for DictConfig {
    fn default() -> Self {
        Self {
            resize: ResizePolicy::Global,
            force_resize_ratio: FORCE_RESIZE_RATIO,
        }
    }
}

impl DictConfig {
    pub fn with_resize(mut self, resize: ResizePolicy) -> Self {
        self.resize = resize;
        self
    }

    pub fn with_force_resize_ratio(mut self, ratio: usize) -> Self {
        self.force_resize_ratio = ratio.max(1);
        self
    }
}
