//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! Active health checks (active.rs):
//!     Periodic timer
//!     → Probe every backend in the current pool snapshot
//!     → Backend::set_alive
//! ```
//!
//! # Design Decisions
//! - One probe decides: exactly `200 OK` within the timeout is alive
//! - Backends added at runtime are picked up on the next tick
//! - Proxy traffic never changes liveness; only probes do

pub mod active;

pub use active::{HealthError, HealthMonitor};
