//! # Marquee Pricing
//!
//! The pricing engine: computes a booking's subtotal from its line items and
//! applies at most one promotion, producing a total and discount breakdown.
//!
//! Pricing is local and synchronous — it runs between the showtime read and
//! the pending-booking write, and a rejected promotion aborts the saga
//! before any side effect exists. The arithmetic core ([`engine::compute_quote`])
//! is a pure function over already-resolved inputs; [`engine::PricingEngine`]
//! wraps it with the promotion catalog lookup and the clock.

pub mod engine;

pub use engine::{PricingEngine, PricingError, PromotionRejection, Quote, compute_quote};
