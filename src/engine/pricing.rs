use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::limits::MAX_PROMO_CODE_LEN;
use crate::model::*;

use super::EngineError;

/// Round half-up to cents and pin the scale so `150` renders as `150.00`.
pub fn money(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded
}

/// What a promo code is worth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Discount {
    /// Percentage of the base price, 0..=100.
    Percent(Decimal),
    /// Flat amount in the facility currency.
    Fixed(Decimal),
}

impl Discount {
    fn is_sane(&self) -> bool {
        match self {
            Discount::Percent(p) => *p >= Decimal::ZERO && *p <= dec!(100),
            Discount::Fixed(a) => *a >= Decimal::ZERO,
        }
    }

    pub fn amount_off(&self, base_price: Decimal) -> Decimal {
        match self {
            Discount::Percent(p) => money(base_price * *p / dec!(100)),
            Discount::Fixed(a) => money(*a),
        }
    }
}

/// External promo-code catalogue consumed by the pricing engine.
pub trait PromoLookup: Send + Sync {
    fn lookup(&self, code: &str) -> Option<Discount>;
}

/// Every code is unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPromos;

impl PromoLookup for NoPromos {
    fn lookup(&self, _code: &str) -> Option<Discount> {
        None
    }
}

/// In-memory catalogue. Codes match case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct PromoTable {
    codes: HashMap<String, Discount>,
}

impl PromoTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, code: &str, discount: Discount) -> Self {
        self.insert(code, discount);
        self
    }

    pub fn insert(&mut self, code: &str, discount: Discount) {
        self.codes.insert(code.trim().to_uppercase(), discount);
    }
}

impl PromoLookup for PromoTable {
    fn lookup(&self, code: &str) -> Option<Discount> {
        self.codes.get(&code.trim().to_uppercase()).copied()
    }
}

/// List price of a slot: hours × hourly rate, rounded once.
pub(crate) fn slot_price(span: &Span, pricing: &PricingConfig) -> Decimal {
    money(span.duration_hours() * pricing.base_price_per_hour)
}

/// Resolve a promo code to a discount. Unknown, oversized, or nonsensical
/// codes are no discount rather than an error.
fn resolve_discount(code: Option<&str>, promos: &dyn PromoLookup) -> Option<Discount> {
    let code = code.map(str::trim).filter(|c| !c.is_empty())?;
    if code.len() > MAX_PROMO_CODE_LEN {
        tracing::debug!("promo code too long, ignoring");
        return None;
    }
    match promos.lookup(code) {
        Some(discount) if discount.is_sane() => Some(discount),
        Some(discount) => {
            tracing::warn!("promo code {code} maps to invalid discount {discount:?}, ignoring");
            None
        }
        None => {
            tracing::debug!("unknown promo code {code}, pricing without discount");
            None
        }
    }
}

/// Deterministic price breakdown for `span` under `pricing`.
pub fn calculate_price(
    span: &Span,
    pricing: &PricingConfig,
    promo_code: Option<&str>,
    promos: &dyn PromoLookup,
) -> Result<PriceBreakdown, EngineError> {
    span.validate()?;
    if pricing.base_price_per_hour.is_sign_negative() {
        return Err(EngineError::InvalidInput(
            "base price per hour must not be negative".into(),
        ));
    }

    let hours = span.duration_hours();
    let base_price = money(hours * pricing.base_price_per_hour);
    let discount = resolve_discount(promo_code, promos)
        .map(|d| d.amount_off(base_price))
        .unwrap_or_else(|| money(Decimal::ZERO));
    let total = money((base_price - discount).max(Decimal::ZERO));

    Ok(PriceBreakdown {
        duration_hours: hours.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero),
        base_price,
        discount,
        total,
        currency: pricing.currency.clone(),
    })
}
