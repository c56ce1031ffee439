use std::sync::atomic::AtomicUsize;

/// Process-wide run state. The sampling loop keeps going while the state is
/// `RUNNING`. The first ctrl-c moves it to `TERMINATING` so the loop can stop
/// at the next tick and the recording collected so far still gets finalized.
pub static STATE: AtomicUsize = AtomicUsize::new(RUNNING);

pub const RUNNING: usize = 0;
pub const TERMINATING: usize = 1;

/// Percentiles included in the run summary.
pub static PERCENTILES: &[(&str, f64)] = &[("p50", 50.0), ("p90", 90.0), ("p99", 99.0)];
