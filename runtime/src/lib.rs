//! # Marquee Runtime
//!
//! Failure-handling primitives shared by the Marquee services.
//!
//! ## Core Components
//!
//! - **Retry** ([`retry`]): exponential backoff for operations that must
//!   eventually succeed, chiefly the saga's compensating delete
//! - **Deadline** ([`deadline`]): timeout bounding for remote calls, folding
//!   the elapsed case into a typed error so callers treat it as an unknown
//!   outcome
//!
//! ## Example
//!
//! ```rust
//! use marquee_runtime::deadline::{DeadlineError, with_deadline};
//! use marquee_runtime::retry::{RetryPolicy, retry_with_backoff};
//! use std::time::Duration;
//!
//! # async fn example() {
//! let outcome = with_deadline(Duration::from_millis(250), async {
//!     retry_with_backoff(RetryPolicy::default(), || async {
//!         Ok::<_, std::io::Error>(())
//!     })
//!     .await
//! })
//! .await;
//!
//! assert!(matches!(outcome, Ok(()) | Err(DeadlineError::Elapsed(_))));
//! # }
//! ```

pub mod deadline;
pub mod retry;

pub use deadline::{DeadlineError, with_deadline};
pub use retry::{RetryPolicy, retry_with_backoff, retry_with_predicate};
