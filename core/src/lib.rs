//! # Marquee Core
//!
//! Domain types and service contracts for the Marquee seat-booking platform.
//!
//! This crate defines the shared vocabulary of the booking saga: identifiers,
//! money, the entities that cross service boundaries, and the traits behind
//! which each collaborator lives.
//!
//! ## Components
//!
//! - **Seat Ledger** (implemented in `marquee-inventory`): authoritative
//!   per-seat, per-showtime reservation status.
//! - **Inventory contract** ([`inventory`]): the three remote operations the
//!   orchestrator may call, with their safe-retry guarantees.
//! - **Catalogs** ([`catalog`]): read-only product and promotion lookups.
//! - **Record store** ([`store`]): durable booking + line-item storage with
//!   transactional create and cascading delete.
//! - **Dead letters** ([`dead_letter`]): operator-visible records of
//!   compensations that exhausted their retries.
//!
//! ## Architecture Principles
//!
//! - Every cross-service payload is an explicitly tagged type, validated at
//!   the boundary
//! - Dependencies are injected as `Arc<dyn Trait>` environments
//! - Remote calls return typed results; transport failure is its own variant,
//!   never an opaque panic
//! - Time is read through [`environment::Clock`] so every decision is
//!   reproducible under test

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};

pub mod catalog;
pub mod dead_letter;
pub mod inventory;
pub mod store;
pub mod types;

/// Environment module - dependency injection traits shared across services.
///
/// All external dependencies are abstracted behind traits and injected via
/// constructor parameters, so business logic stays deterministic under test.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability.
    ///
    /// Production code injects [`SystemClock`]; tests inject a fixed clock so
    /// promotion windows and lock expiry are deterministic.
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock implementation of [`Clock`].
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
