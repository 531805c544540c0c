//! Domain layer - pure types with no runtime concerns.
//!
//! This layer contains the vocabulary of the flow control system:
//! - Topic keys
//! - Wire messages and decoded inputs
//! - Per-policy configuration
//! - Normalisation of host-supplied settings
//!
//! All types in this layer are pure and easily testable.

pub mod config;
pub mod message;
pub mod settings;
pub mod topic;
