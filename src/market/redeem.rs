// ============================================================================
// Redemption - burning outcome shares against the settled pool
// ============================================================================
//
// At resolution the pool P and the winning supply S are frozen. A winner
// burning s shares receives
//
//   payout = s * P_remaining / S_remaining
//
// and both remainders shrink, so the last winner out collects the exact
// residue. Losing shares burn for nothing.
//
// ============================================================================

use tracing::info;

use super::{Market, MarketError};
use crate::collaborators::TokenLedger;
use crate::events::Event;
use crate::models::{mul_div, Amount, OutcomeId};

impl Market {
    fn ensure_settled(&self) -> Result<(), MarketError> {
        if !self.status.is_resolved() || self.settlement.is_none() {
            return Err(MarketError::StatusMismatch {
                expected: "resolved or finalized",
                actual: self.status,
            });
        }
        Ok(())
    }

    /// What burning `shares` of `outcome` would pay right now
    pub fn claim_value(&self, outcome: OutcomeId, shares: Amount) -> Result<Amount, MarketError> {
        self.ensure_settled()?;
        let Some(pool) = self.settlement.as_ref() else {
            return Ok(0);
        };
        if self.winning_outcome != Some(outcome) || shares == 0 {
            return Ok(0);
        }
        if shares > pool.winning_shares_remaining {
            return Err(MarketError::InsufficientShares {
                have: pool.winning_shares_remaining,
                need: shares,
            });
        }
        mul_div(shares, pool.pool_remaining, pool.winning_shares_remaining).ok_or(MarketError::Overflow)
    }

    /// Take a claim out of the settlement pool and return its payout
    pub(crate) fn settle_claim(&mut self, outcome: OutcomeId, shares: Amount) -> Result<Amount, MarketError> {
        let payout = self.claim_value(outcome, shares)?;
        if self.winning_outcome == Some(outcome) {
            if let Some(pool) = self.settlement.as_mut() {
                pool.pool_remaining = pool.pool_remaining.checked_sub(payout).ok_or(MarketError::Overflow)?;
                pool.winning_shares_remaining = pool
                    .winning_shares_remaining
                    .checked_sub(shares)
                    .ok_or(MarketError::Overflow)?;
            }
        }
        Ok(payout)
    }

    /// Burn `shares` of `outcome` held by `user` and pay out their claim
    pub fn redeem(
        &mut self,
        ledger: &mut dyn TokenLedger,
        user: &str,
        outcome: OutcomeId,
        shares: Amount,
        events: &mut Vec<Event>,
    ) -> Result<Amount, MarketError> {
        self.ensure_settled()?;
        self.ensure_outcome(outcome)?;
        if shares == 0 {
            return Err(MarketError::ZeroAmount);
        }
        if let Some(v2) = self.v2.as_ref().filter(|v2| v2.outstanding()) {
            return Err(MarketError::OutstandingLiquidity {
                borrowed: v2.borrowed_amount,
            });
        }

        self.positions.debit(user, outcome, shares)?;
        let payout = self.settle_claim(outcome, shares)?;
        if payout > 0 {
            ledger.transfer(&self.settlement_token, &self.vault(), user, payout)?;
        }

        info!(
            market = self.id,
            user,
            outcome,
            shares = %shares,
            payout = %payout,
            "💰 shares redeemed"
        );
        events.push(Event::Redeemed {
            market_id: self.id,
            user: user.to_string(),
            outcome_id: outcome,
            shares,
            payout,
        });
        Ok(payout)
    }
}
