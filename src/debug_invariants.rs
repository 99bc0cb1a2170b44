//! Opt-in structural checks for layouts and interfaces.
//!
//! Checks run in debug builds and whenever the `check-invariants` or
//! `strict-invariants` feature is enabled. Release builds skip them.

use crate::layout_error::LayoutError;

/// Validation hook implemented by the layout containers.
pub trait DebugInvariants {
    /// Validate invariants and return the first violation found.
    fn validate_invariants(&self) -> Result<(), LayoutError>;

    /// Panic on the first violation when invariant checking is enabled.
    #[inline]
    fn debug_assert_invariants(&self) {
        #[cfg(any(
            debug_assertions,
            feature = "strict-invariants",
            feature = "check-invariants"
        ))]
        if let Err(e) = self.validate_invariants() {
            panic!("[invariants] {e}");
        }
    }
}
