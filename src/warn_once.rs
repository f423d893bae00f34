use std::sync::atomic::{AtomicBool, Ordering};

/// A latch that lets a warning through the first time only.
///
/// Shared species and breeders are read from several workers, so the latch
/// is atomic rather than a plain flag.
#[derive(Debug, Default)]
pub struct WarnOnce(AtomicBool);

impl WarnOnce {
    pub const fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    /// Runs `emit` if this latch has not fired yet.
    pub fn warn(&self, emit: impl FnOnce()) {
        if !self.0.swap(true, Ordering::Relaxed) {
            emit();
        }
    }

    /// Whether the warning has been emitted.
    pub fn fired(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

impl Clone for WarnOnce {
    fn clone(&self) -> Self {
        Self(AtomicBool::new(self.fired()))
    }
}
