// ============================================================================
// Pricing - Virtual-depth share curve
// ============================================================================
//
// Every outcome carries a virtual depth V on top of its real stakes:
//
//   V = virtual_liquidity + outstanding_borrow / outcome_count
//   L = outcome_liquidity[o] + V        (depth of the outcome)
//   T = total_liquidity + n_outcomes * V (depth of the market)
//
// The implied probability of an outcome is L / T. A net stake `n` buys
//
//   shares = n * (T + n) / (L + n)
//
// i.e. each share is priced at the post-trade probability (L+n)/(T+n) < 1.
// More stake buys more shares; more existing same-outcome depth buys fewer.
//
// ============================================================================

use rust_decimal::Decimal;

use super::{Market, MarketError};
use crate::models::{mul_div, Amount, OutcomeId, BPS_DENOMINATOR};

/// Decimal places used for display prices
pub const PRICE_SCALE: u32 = 12;

const PRICE_UNIT: Amount = 1_000_000_000_000;

/// Depth of one outcome against the whole market
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Curve {
    pub outcome_depth: Amount,
    pub total_depth: Amount,
}

impl Curve {
    pub fn shares_for(&self, net: Amount) -> Result<Amount, MarketError> {
        let total = self.total_depth.checked_add(net).ok_or(MarketError::Overflow)?;
        let outcome = self.outcome_depth.checked_add(net).ok_or(MarketError::Overflow)?;
        mul_div(net, total, outcome).ok_or(MarketError::Overflow)
    }

    /// How far the effective price sits above the reference price, in bps,
    /// rounded up: n(T-L) / (L(T+n)) * 10000
    pub fn slippage_bps(&self, net: Amount) -> Result<Amount, MarketError> {
        if net == 0 {
            return Ok(0);
        }
        let spread = self.total_depth - self.outcome_depth;
        let numerator = net
            .checked_mul(spread)
            .and_then(|v| v.checked_mul(BPS_DENOMINATOR as Amount))
            .ok_or(MarketError::Overflow)?;
        let denominator = self
            .total_depth
            .checked_add(net)
            .and_then(|t| t.checked_mul(self.outcome_depth))
            .ok_or(MarketError::Overflow)?;
        if denominator == 0 {
            return Err(MarketError::Overflow);
        }
        Ok(numerator.div_ceil(denominator))
    }

    /// Pre-trade price L / T
    pub fn reference_price(&self) -> Result<Decimal, MarketError> {
        price_ratio(self.outcome_depth, self.total_depth)
    }

    /// Average price paid per share for a net stake
    pub fn effective_price(&self, net: Amount) -> Result<Decimal, MarketError> {
        let outcome = self.outcome_depth.checked_add(net).ok_or(MarketError::Overflow)?;
        let total = self.total_depth.checked_add(net).ok_or(MarketError::Overflow)?;
        price_ratio(outcome, total)
    }
}

/// `numerator / denominator` as a Decimal with PRICE_SCALE places
pub fn price_ratio(numerator: Amount, denominator: Amount) -> Result<Decimal, MarketError> {
    let scaled = mul_div(numerator, PRICE_UNIT, denominator).ok_or(MarketError::Overflow)?;
    let mantissa = i128::try_from(scaled).map_err(|_| MarketError::Overflow)?;
    Decimal::try_from_i128_with_scale(mantissa, PRICE_SCALE)
        .map(|d| d.normalize())
        .map_err(|_| MarketError::Overflow)
}

impl Market {
    /// Per-outcome virtual depth, including borrowed capital while it is out
    pub fn virtual_depth(&self) -> Amount {
        let borrowed = match &self.v2 {
            Some(v2) if v2.outstanding() => v2.borrowed_amount / self.outcome_count.max(1) as Amount,
            _ => 0,
        };
        self.virtual_liquidity.saturating_add(borrowed)
    }

    pub fn curve(&self, outcome: OutcomeId) -> Result<Curve, MarketError> {
        self.ensure_outcome(outcome)?;
        let depth = self.virtual_depth();
        let stake = self.outcome_liquidity[outcome as usize];

        let outcome_depth = stake.checked_add(depth).ok_or(MarketError::Overflow)?;
        let total_depth = (self.outcome_count as Amount)
            .checked_mul(depth)
            .and_then(|v| v.checked_add(self.total_liquidity))
            .ok_or(MarketError::Overflow)?;

        Ok(Curve {
            outcome_depth,
            total_depth,
        })
    }

    /// L / T for every outcome
    pub fn implied_probabilities(&self) -> Result<Vec<Decimal>, MarketError> {
        (0..self.outcome_count)
            .map(|o| self.curve(o).and_then(|c| c.reference_price()))
            .collect()
    }
}
