//! Wall-clock sources for lazy accumulation

pub mod clock;

pub use clock::{Clock, ManualClock, SystemClock};

/// Milliseconds in one second
pub const MILLIS_PER_SECOND: i64 = 1000;
