//! Shared types for the seating platform
//!
//! Wire protocol, error codes and domain models used by the seating server
//! and its clients.

pub mod error;
pub mod message;
pub mod models;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use error::{ErrorCategory, ErrorCode};
pub use message::{BusMessage, EventType};
