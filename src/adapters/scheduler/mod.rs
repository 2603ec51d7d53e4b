//! Periodic background jobs.
//!
//! - `SessionSweeper` - closes sessions whose end time passed
//! - `HoldReaper` - expires abandoned registration holds

mod hold_reaper;
mod session_sweeper;

pub use hold_reaper::{HoldReaper, DEFAULT_HOLD_SWEEP_INTERVAL};
pub use session_sweeper::{SessionSweeper, DEFAULT_SESSION_SWEEP_INTERVAL};
