//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the application
//! layer needs. Infrastructure adapters implement these ports.

use crate::domain::message::Message;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;

/// Port for obtaining current time.
///
/// This abstraction allows the application layer to work with time
/// without depending on system clock implementation details.
/// Infrastructure provides concrete implementations (SystemClock, TokioClock, MockClock).
pub trait Clock: Send + Sync + Debug {
    /// Get the current instant.
    fn now(&self) -> Instant;
}

/// Port for delivering output messages back to the host.
///
/// Sinks are called synchronously from inside input handling and timer
/// callbacks, so implementations must not block on the node that owns them.
pub trait OutputSink: Send {
    /// Deliver one output message.
    fn send(&self, message: Message);
}

impl<T> OutputSink for Arc<T>
where
    T: OutputSink + Sync + ?Sized,
{
    fn send(&self, message: Message) {
        (**self).send(message)
    }
}

impl<T> OutputSink for Box<T>
where
    T: OutputSink + ?Sized,
{
    fn send(&self, message: Message) {
        (**self).send(message)
    }
}
