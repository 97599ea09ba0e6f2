//! # Marquee Inventory
//!
//! The inventory side of the booking saga: the seat ledger state machine and
//! the in-process service that implements the remote inventory contract.
//!
//! The ledger ([`ledger::ShowtimeLedger`]) is pure data plus transition
//! rules — no clocks, no locks, no I/O — so every transition is unit-testable
//! in isolation. The service ([`service::InventoryService`]) owns one ledger
//! per showtime behind a per-showtime async mutex and implements
//! [`marquee_core::inventory::InventoryApi`], which makes the lock batch
//! atomic and serializes contending lock attempts for the same seat.

pub mod ledger;
pub mod service;

pub use ledger::{MarkBookedError, SeatState, ShowtimeLedger};
pub use service::{BookedTransitionError, InventoryService};
