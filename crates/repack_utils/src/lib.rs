//! Shared process-level utilities: logging setup and wall-clock timing.

pub mod logger;
pub mod timing;

pub use logger::{init_logging, init_test_logging};
pub use timing::{PhaseTimings, Stopwatch};
