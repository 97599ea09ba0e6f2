//! Domain types for the Marquee seat-booking platform.
//!
//! Value objects, entities, and request types shared by the inventory
//! service, the pricing engine, the booking orchestrator, and the record
//! store. Everything that crosses a service boundary is defined here as an
//! explicitly tagged type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a showtime
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShowtimeId(Uuid);

impl ShowtimeId {
    /// Creates a new random `ShowtimeId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `ShowtimeId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ShowtimeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ShowtimeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a seat.
///
/// Ordered so seat sets can be reported deterministically.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeatId(Uuid);

impl SeatId {
    /// Creates a new random `SeatId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `SeatId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SeatId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a cinema room
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoomId(Uuid);

impl RoomId {
    /// Creates a new random `RoomId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `RoomId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for RoomId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a booking.
///
/// Doubles as the holder identifier on locked seat ledger entries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BookingId(Uuid);

impl BookingId {
    /// Creates a new random `BookingId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `BookingId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for BookingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for BookingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a user
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a new random `UserId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `UserId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a concession product
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(Uuid);

impl ProductId {
    /// Creates a new random `ProductId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `ProductId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ProductId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a promotion
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PromotionId(Uuid);

impl PromotionId {
    /// Creates a new random `PromotionId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a `PromotionId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for PromotionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PromotionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Client-supplied idempotency token for `CreateBooking`.
///
/// Deduplicated by the record store atomically with the pending insert, so a
/// retried request cannot create a second booking for the same intent.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    /// Creates an idempotency key from a client-supplied token
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Get the token as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Money Value Object (integer minor units to avoid floating point errors)
// ============================================================================

/// Represents money in integer minor units of the showtime's currency.
///
/// Unsigned by construction: discounts are capped rather than allowed to
/// drive a total negative.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Money(u64);

impl Money {
    /// Money value of zero
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from minor units
    #[must_use]
    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }

    /// Returns the amount in minor units
    #[must_use]
    pub const fn minor(&self) -> u64 {
        self.0
    }

    /// Checks if the amount is zero
    #[must_use]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Adds two money amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Adds two money amounts
    ///
    /// # Panics
    ///
    /// Panics if the addition would overflow.
    /// Use `checked_add` for non-panicking addition.
    #[must_use]
    #[allow(clippy::panic)]
    pub const fn add(self, other: Self) -> Self {
        match self.checked_add(other) {
            Some(result) => result,
            None => panic!("Money::add overflow"),
        }
    }

    /// Subtracts two money amounts (returns None if result would be negative)
    #[must_use]
    pub const fn checked_sub(self, other: Self) -> Option<Self> {
        if self.0 >= other.0 {
            Some(Self(self.0 - other.0))
        } else {
            None
        }
    }

    /// Subtracts two money amounts, flooring at zero
    #[must_use]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Multiplies money by a quantity with overflow checking
    #[must_use]
    pub const fn checked_multiply(self, quantity: u32) -> Option<Self> {
        match self.0.checked_mul(quantity as u64) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Returns `percent` percent of this amount, rounded down.
    ///
    /// Computed in 128-bit arithmetic; a result beyond `u64::MAX` saturates,
    /// which is invisible to callers that cap the discount at the subtotal.
    #[must_use]
    pub const fn percent_of(self, percent: u32) -> Self {
        let raw = (self.0 as u128) * (percent as u128) / 100;
        if raw > u64::MAX as u128 {
            Self(u64::MAX)
        } else {
            // Guarded above, cannot truncate
            #[allow(clippy::cast_possible_truncation)]
            let minor = raw as u64;
            Self(minor)
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ISO-style currency code carried by a showtime and snapshotted onto quotes
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Currency(String);

impl Currency {
    /// Creates a currency from its code
    #[must_use]
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    /// Get the currency code as a string slice
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Catalog Entities (read-only during a booking attempt)
// ============================================================================

/// A scheduled screening. Owned by the catalog subsystem and immutable for
/// the duration of a booking attempt; the saga only ever reads it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Showtime {
    /// Showtime identifier
    pub id: ShowtimeId,
    /// Room the screening runs in
    pub room_id: RoomId,
    /// Screening start
    pub starts_at: DateTime<Utc>,
    /// Screening end
    pub ends_at: DateTime<Utc>,
    /// Price of every seat for this screening
    pub seat_price: Money,
    /// Currency of `seat_price`
    pub currency: Currency,
}

/// A concession product sold alongside seats
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Product identifier
    pub id: ProductId,
    /// Display name
    pub name: String,
    /// Unit price, snapshotted onto line items at booking time
    pub price: Money,
}

/// Discount terms of a promotion, tagged by kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiscountTerms {
    /// Percentage of the subtotal, rounded down
    Percentage {
        /// Discount percentage (e.g. 10 for 10%)
        percent: u32,
    },
    /// Fixed amount off the subtotal
    FixedAmount {
        /// Discount amount in minor units
        amount: Money,
    },
}

/// A promotion code with its validity rules. Owned by the promotion catalog;
/// read-only during pricing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Promotion {
    /// Promotion identifier
    pub id: PromotionId,
    /// Client-facing code
    pub code: String,
    /// Discount terms
    pub terms: DiscountTerms,
    /// Start of the validity window (inclusive)
    pub starts_at: DateTime<Utc>,
    /// End of the validity window (inclusive)
    pub ends_at: DateTime<Utc>,
    /// Minimum subtotal required to apply, if any
    pub minimum_order: Option<Money>,
    /// Whether the promotion is currently enabled
    pub active: bool,
}

// ============================================================================
// Booking Entities
// ============================================================================

/// Lifecycle status of a booking.
///
/// The saga only ever produces `Pending` and `Confirmed`; `Cancelled` and
/// `Paid` belong to the cancellation and wallet flows, which live outside
/// the saga.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookingStatus {
    /// Persisted, seats not yet locked
    Pending,
    /// All seat locks succeeded
    Confirmed,
    /// Cancelled by an out-of-band flow
    Cancelled,
    /// Paid via the wallet subsystem
    Paid,
}

impl BookingStatus {
    /// Convert status to its storage string representation
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Cancelled => "CANCELLED",
            Self::Paid => "PAID",
        }
    }
}

/// Error returned when parsing an unknown booking status string
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid booking status: {0}")]
pub struct InvalidBookingStatus(pub String);

impl std::str::FromStr for BookingStatus {
    type Err = InvalidBookingStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "CONFIRMED" => Ok(Self::Confirmed),
            "CANCELLED" => Ok(Self::Cancelled),
            "PAID" => Ok(Self::Paid),
            _ => Err(InvalidBookingStatus(s.to_owned())),
        }
    }
}

/// What a line item refers to, tagged by kind
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LineItemKind {
    /// A seat of the booking's showtime
    Seat {
        /// The seat being booked
        seat_id: SeatId,
    },
    /// A concession product
    Product {
        /// The product being purchased
        product_id: ProductId,
    },
}

impl LineItemKind {
    /// Storage label for the kind column
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Seat { .. } => "SEAT",
            Self::Product { .. } => "PRODUCT",
        }
    }

    /// The referenced seat or product id as a raw UUID
    #[must_use]
    pub const fn item_uuid(&self) -> &Uuid {
        match self {
            Self::Seat { seat_id } => seat_id.as_uuid(),
            Self::Product { product_id } => product_id.as_uuid(),
        }
    }
}

/// One line of a booking: a seat or a quantity of a product, priced at
/// booking time. Immutable once the booking is finalized.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// What this line refers to
    pub kind: LineItemKind,
    /// Quantity (always 1 for seats)
    pub quantity: u32,
    /// Unit price snapshotted when the booking was created
    pub unit_price: Money,
}

impl LineItem {
    /// Line item for one seat at the showtime's seat price
    #[must_use]
    pub const fn seat(seat_id: SeatId, unit_price: Money) -> Self {
        Self {
            kind: LineItemKind::Seat { seat_id },
            quantity: 1,
            unit_price,
        }
    }

    /// Line item for a quantity of a concession product
    #[must_use]
    pub const fn product(product_id: ProductId, quantity: u32, unit_price: Money) -> Self {
        Self {
            kind: LineItemKind::Product { product_id },
            quantity,
            unit_price,
        }
    }

    /// Extended price of this line with overflow checking
    #[must_use]
    pub const fn line_total(&self) -> Option<Money> {
        self.unit_price.checked_multiply(self.quantity)
    }
}

/// A booking as owned by the orchestrator and the record store.
///
/// Created in `Pending`, promoted to `Confirmed` once every seat lock
/// succeeded, and deleted outright when seat locking fails — a failed
/// attempt leaves no row behind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Booking {
    /// Booking identifier
    pub id: BookingId,
    /// User the booking belongs to
    pub user_id: UserId,
    /// Showtime the seats belong to
    pub showtime_id: ShowtimeId,
    /// Lifecycle status
    pub status: BookingStatus,
    /// Sum of all line totals before discount
    pub subtotal: Money,
    /// Discount applied, already capped at the subtotal
    pub discount: Money,
    /// Amount due
    pub total: Money,
    /// Promotion that produced the discount, if any
    pub promotion_id: Option<PromotionId>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Booking Requests
// ============================================================================

/// One requested item of a `CreateBooking` call, tagged by kind.
///
/// A seat item carries no quantity: a seat is a single unit by construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderItem {
    /// Request one specific seat
    Seat {
        /// The seat to lock and book
        seat_id: SeatId,
    },
    /// Request a quantity of a concession product
    Product {
        /// The product to purchase
        product_id: ProductId,
        /// How many units
        quantity: u32,
    },
}

/// A request to create a booking
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateBookingRequest {
    /// Requesting user
    pub user_id: UserId,
    /// Showtime the seats belong to
    pub showtime_id: ShowtimeId,
    /// Optional promotion code (at most one promotion per booking)
    pub promotion_code: Option<String>,
    /// Requested seats and products
    pub items: Vec<OrderItem>,
    /// Optional client-supplied deduplication token
    pub idempotency_key: Option<IdempotencyKey>,
}
