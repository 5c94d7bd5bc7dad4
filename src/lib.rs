//! wafleet - Multi-tenant WhatsApp bot fleet controller
//!
//! Runs many authenticated WhatsApp client sessions concurrently across
//! logically partitioned tenants, each with a capped number of slots, and
//! exposes a Control Plane that registers sessions, gates them through
//! approval and expiration, dispatches bot lifecycle operations, and
//! coordinates cross-tenant moves via a global phone-to-tenant registry.
//!
//! ## Quick Start
//!
//! ```bash
//! # Serve the fleet
//! wafleet serve
//!
//! # Register a bot from a wire-format session string
//! wafleet register "my-bot" "TREKKER~..."
//! ```

pub mod cli;
pub mod config;
pub mod container;
pub mod control_plane;
pub mod credentials;
pub mod db;
pub mod engine;
pub mod error;
pub mod logging;
pub mod pairing;
pub mod supervisor;
pub mod worker;

// Re-export commonly used types
pub use error::{ErrorCode, FleetError};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const AUTHORS: &str = env!("CARGO_PKG_AUTHORS");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
