//! Clock adapters for time operations.
//!
//! Provides [`SystemClock`] for synchronous hosts and, with the `async`
//! feature, [`TokioClock`] for nodes driven by a [`NodeRuntime`].
//!
//! # Testing
//!
//! See `MockClock` (in `crate::infrastructure::mocks`) for a controllable test clock.
//! Available with the `test-helpers` feature or in test builds:
//!
//! ```toml
//! [dev-dependencies]
//! topic-throttle = { version = "*", features = ["test-helpers"] }
//! ```
//!
//! [`NodeRuntime`]: crate::infrastructure::runtime::NodeRuntime

use crate::application::ports::Clock;
use std::time::Instant;

/// System clock implementation using `Instant::now()`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Create a new system clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock reading tokio's time source.
///
/// Follows tokio's paused and auto-advanced time in tests, so timer-driven
/// behaviour can be checked without real sleeps.
#[cfg(feature = "async")]
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

#[cfg(feature = "async")]
impl TokioClock {
    /// Create a new tokio clock.
    pub fn new() -> Self {
        Self
    }
}

#[cfg(feature = "async")]
impl Clock for TokioClock {
    fn now(&self) -> Instant {
        tokio::time::Instant::now().into_std()
    }
}
