//! # Marquee Booking
//!
//! The booking orchestrator: a saga over the inventory service, the pricing
//! engine, and the booking record store.
//!
//! One booking attempt runs `validate → fetch showtime → build line items →
//! price → persist pending → lock seats → confirm`, and compensates (deletes
//! the pending booking, releasing its idempotency key) whenever the lock
//! step fails or its outcome is unknown. The caller only ever sees a
//! confirmed booking or one of the typed [`BookingError`] kinds — never a
//! partially locked state.
//!
//! This crate also carries the in-memory record store and dead-letter sink
//! ([`store`]); the durable PostgreSQL implementations live in
//! `marquee-postgres`.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod store;

pub use config::OrchestratorConfig;
pub use error::BookingError;
pub use orchestrator::BookingOrchestrator;
pub use store::{MemoryBookingStore, MemoryDeadLetters};
