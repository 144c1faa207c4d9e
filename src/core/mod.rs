// Core infrastructure shared by the run pipeline

pub mod errors;
pub mod limits;

// Re-export commonly used types
pub use errors::{LocportError, Result};
pub use limits::{SlotGuard, SlotTracker};
