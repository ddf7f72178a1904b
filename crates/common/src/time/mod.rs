//! Time sources
//!
//! Everything in the pipeline that stamps or compares times (cache expiry,
//! LRU bookkeeping, queue timestamps) reads the clock through [`Clock`] so
//! tests can move time by hand with [`MockClock`].

pub mod clock;

pub use clock::{Clock, MockClock, SharedClock, SystemClock};
