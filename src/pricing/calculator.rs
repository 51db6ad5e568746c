use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Margin percentages offered by the product form.
pub const MARGIN_STEPS: [u32; 11] = [0, 10, 20, 30, 40, 50, 60, 70, 80, 90, 100];

pub fn is_allowed_margin(pct: u32) -> bool {
    MARGIN_STEPS.contains(&pct)
}

/// `None` when the result does not fit a `Decimal`.
fn apply_margin(price: Decimal, margin_pct: Decimal) -> Option<Decimal> {
    let factor = Decimal::ONE.checked_add(margin_pct.checked_div(Decimal::ONE_HUNDRED)?)?;
    price.checked_mul(factor)
}

pub fn cost(base: Decimal, cost_margin_pct: Decimal) -> Option<Decimal> {
    apply_margin(base, cost_margin_pct)
}

pub fn cash(cost: Decimal, cash_margin_pct: Decimal) -> Option<Decimal> {
    apply_margin(cost, cash_margin_pct)
}

pub fn credit(cash: Decimal, credit_margin_pct: Decimal) -> Option<Decimal> {
    apply_margin(cash, credit_margin_pct)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PriceTiers {
    pub cost: Decimal,
    pub cash: Decimal,
    pub credit: Decimal,
}

/// Inputs of the cascade: a base cost and one margin per tier.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Margins {
    pub base_cost: Decimal,
    pub cost_margin: u32,
    pub cash_margin: u32,
    pub credit_margin: u32,
}

impl Margins {
    /// First margin outside `MARGIN_STEPS`, if any.
    pub fn first_disallowed(&self) -> Option<(&'static str, u32)> {
        [
            ("costMargin", self.cost_margin),
            ("cashMargin", self.cash_margin),
            ("creditMargin", self.credit_margin),
        ]
        .into_iter()
        .find(|(_, pct)| !is_allowed_margin(*pct))
    }
}

/// Runs the cascade. `None` on overflow.
pub fn quote(m: &Margins) -> Option<PriceTiers> {
    let cost = cost(m.base_cost, Decimal::from(m.cost_margin))?;
    let cash = cash(cost, Decimal::from(m.cash_margin))?;
    let credit = credit(cash, Decimal::from(m.credit_margin))?;
    Some(PriceTiers { cost, cash, credit })
}

fn step_margin(upper: Decimal, lower: Decimal) -> u32 {
    if lower <= Decimal::ZERO {
        return 0;
    }
    upper
        .checked_div(lower)
        .and_then(|ratio| ratio.checked_sub(Decimal::ONE))
        .and_then(|growth| growth.checked_mul(Decimal::ONE_HUNDRED))
        .map(|pct| pct.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|pct| pct.to_u32())
        .filter(|pct| is_allowed_margin(*pct))
        .unwrap_or(0)
}

/// Best-effort inverse of [`quote`] for stored prices.
///
/// Margins are not persisted, so the stored cost becomes the base with a zero
/// cost margin, and the other two margins are re-derived from price ratios.
/// Ratios that do not land on a `MARGIN_STEPS` value, or overflow, snap to
/// zero.
pub fn reconstruct(tiers: &PriceTiers) -> Margins {
    Margins {
        base_cost: tiers.cost,
        cost_margin: 0,
        cash_margin: step_margin(tiers.cash, tiers.cost),
        credit_margin: step_margin(tiers.credit, tiers.cash),
    }
}
