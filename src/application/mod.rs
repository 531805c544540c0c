//! Application layer - orchestration of domain logic.
//!
//! This layer coordinates the domain types and owns all mutable node state:
//! - Key registry (bounded, insertion-ordered topic tracking)
//! - Timer queue (deadlines plus stale-timer guards)
//! - Flow core (shared admit / evict / flush lifecycle)
//! - Policies (batcher, debouncer, trickle rate limiter)
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters must implement. This keeps the application layer independent
//! from infrastructure details.

pub mod batcher;
pub mod debouncer;
pub mod flow;
pub mod limiter;
pub mod metrics;
pub mod node;
pub mod ports;
pub mod registry;
pub mod timer;
