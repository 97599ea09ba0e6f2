//! Quote computation and promotion validation.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use marquee_core::catalog::PromotionCatalog;
use marquee_core::environment::Clock;
use marquee_core::types::{DiscountTerms, LineItem, Money, Promotion, PromotionId};

/// Why a promotion code was rejected.
///
/// Carried on [`PricingError::InvalidPromotion`] for logs and operators; the
/// caller-facing outcome is the same for every variant.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PromotionRejection {
    /// The catalog has no promotion for the code
    #[error("unknown code")]
    UnknownCode,

    /// The promotion exists but is disabled
    #[error("not active")]
    Inactive,

    /// The current time is outside the validity window
    #[error("outside validity window")]
    OutsideWindow,

    /// The subtotal does not reach the promotion's minimum order value
    #[error("subtotal {subtotal} below minimum order {minimum}")]
    BelowMinimum {
        /// Required minimum subtotal
        minimum: Money,
        /// Actual subtotal of the quoted items
        subtotal: Money,
    },
}

/// Errors surfaced while pricing a booking
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum PricingError {
    /// The supplied promotion code cannot be applied
    #[error("promotion {code:?} rejected: {reason}")]
    InvalidPromotion {
        /// The code as supplied by the client
        code: String,
        /// Why it was rejected
        reason: PromotionRejection,
    },

    /// A line total or the subtotal exceeded the representable range
    #[error("price computation overflowed")]
    Overflow,
}

/// Price breakdown of a booking
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Sum of all line totals before discount
    pub subtotal: Money,
    /// Discount granted, capped at the subtotal
    pub discount: Money,
    /// Amount due: subtotal minus discount
    pub total: Money,
    /// Promotion that produced the discount, if one applied
    pub promotion_id: Option<PromotionId>,
}

/// Sum the extended line totals with overflow checking.
///
/// # Errors
///
/// Returns [`PricingError::Overflow`] if any line total or the running sum
/// exceeds the representable range.
fn subtotal_of(line_items: &[LineItem]) -> Result<Money, PricingError> {
    line_items.iter().try_fold(Money::ZERO, |acc, item| {
        let line = item.line_total().ok_or(PricingError::Overflow)?;
        acc.checked_add(line).ok_or(PricingError::Overflow)
    })
}

/// Check a resolved promotion against the rules: active flag, validity
/// window (inclusive on both ends), and minimum order value.
fn validate_promotion(
    promotion: &Promotion,
    subtotal: Money,
    now: DateTime<Utc>,
) -> Result<(), PromotionRejection> {
    if !promotion.active {
        return Err(PromotionRejection::Inactive);
    }
    if now < promotion.starts_at || now > promotion.ends_at {
        return Err(PromotionRejection::OutsideWindow);
    }
    if let Some(minimum) = promotion.minimum_order
        && subtotal < minimum
    {
        return Err(PromotionRejection::BelowMinimum { minimum, subtotal });
    }
    Ok(())
}

/// Discount granted by the promotion's terms, capped at the subtotal so a
/// promotion can never drive a total negative.
fn discount_for(terms: DiscountTerms, subtotal: Money) -> Money {
    let raw = match terms {
        DiscountTerms::Percentage { percent } => subtotal.percent_of(percent),
        DiscountTerms::FixedAmount { amount } => amount,
    };
    raw.min(subtotal)
}

/// Price a set of line items against an already-resolved promotion.
///
/// This is the arithmetic core of the engine: no catalog, no ambient time.
/// `promotion` of `None` means no code was supplied — discount is zero.
///
/// # Errors
///
/// Returns [`PricingError::InvalidPromotion`] if the promotion fails
/// validation, or [`PricingError::Overflow`] if the subtotal cannot be
/// represented.
pub fn compute_quote(
    line_items: &[LineItem],
    promotion: Option<&Promotion>,
    now: DateTime<Utc>,
) -> Result<Quote, PricingError> {
    let subtotal = subtotal_of(line_items)?;

    let Some(promotion) = promotion else {
        return Ok(Quote {
            subtotal,
            discount: Money::ZERO,
            total: subtotal,
            promotion_id: None,
        });
    };

    validate_promotion(promotion, subtotal, now).map_err(|reason| {
        PricingError::InvalidPromotion {
            code: promotion.code.clone(),
            reason,
        }
    })?;

    let discount = discount_for(promotion.terms, subtotal);
    Ok(Quote {
        subtotal,
        discount,
        total: subtotal.saturating_sub(discount),
        promotion_id: Some(promotion.id),
    })
}

/// The pricing engine: promotion lookup + the pure quote computation.
///
/// Holds the promotion catalog and the clock so pricing decisions are
/// reproducible under test.
pub struct PricingEngine {
    promotions: Arc<dyn PromotionCatalog>,
    clock: Arc<dyn Clock>,
}

impl PricingEngine {
    /// Create an engine over a promotion catalog and a clock
    #[must_use]
    pub fn new(promotions: Arc<dyn PromotionCatalog>, clock: Arc<dyn Clock>) -> Self {
        Self { promotions, clock }
    }

    /// Price line items, resolving and validating an optional promotion code.
    ///
    /// An unknown code is rejected the same way as an invalid one; the
    /// caller never learns whether the code existed.
    ///
    /// # Errors
    ///
    /// Returns [`PricingError::InvalidPromotion`] for unknown or
    /// non-applicable codes, and [`PricingError::Overflow`] if the subtotal
    /// cannot be represented.
    pub fn price(
        &self,
        line_items: &[LineItem],
        promotion_code: Option<&str>,
    ) -> Result<Quote, PricingError> {
        let promotion = match promotion_code {
            None => None,
            Some(code) => match self.promotions.promotion_by_code(code) {
                Some(found) => Some(found),
                None => {
                    metrics::counter!("pricing.promotion.rejected").increment(1);
                    tracing::info!(code, reason = "unknown code", "promotion rejected");
                    return Err(PricingError::InvalidPromotion {
                        code: code.to_owned(),
                        reason: PromotionRejection::UnknownCode,
                    });
                }
            },
        };

        let result = compute_quote(line_items, promotion.as_ref(), self.clock.now());
        if let Err(PricingError::InvalidPromotion { code, reason }) = &result {
            metrics::counter!("pricing.promotion.rejected").increment(1);
            tracing::info!(code, reason = %reason, "promotion rejected");
        }
        result
    }
}
