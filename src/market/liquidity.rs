// ============================================================================
// V2 Liquidity - borrowed depth, repayment, emergency exits
// ============================================================================
//
// A V2 market with a liquidity provider borrows `borrow_target` into its
// vault after a bet while Open. The borrowed capital only deepens pricing
// (see pricing::virtual_depth); it never enters the payout pool. Borrowing
// is best effort: a refusal is logged as BorrowFailed and the bet stands.
//
// Once Resolved, the admin repays principal plus a revenue share taken
// from the pool. Redemptions and finalization wait for that repayment.
//
// ============================================================================

use tracing::{info, warn};

use super::{Market, MarketEnv, MarketError, MarketStatus};
use crate::collaborators::{CollaboratorError, LiquidityProvider, TokenLedger};
use crate::events::Event;
use crate::models::{apply_bps, mul_div, Amount, OutcomeId};

impl Market {
    /// Post-bet borrow attempt. Never fails the surrounding call.
    pub(crate) fn try_borrow(&mut self, env: &mut MarketEnv<'_>) {
        if self.status != MarketStatus::Open {
            return;
        }
        let id = self.id;
        let vault = self.vault();
        let Some(v2) = self.v2.as_mut() else {
            return;
        };
        let Some(provider) = v2.liquidity_provider.clone() else {
            return;
        };
        if v2.liquidity_borrowed || v2.borrow_target == 0 {
            return;
        }

        let amount = v2.borrow_target;
        let reason = if env.lender.address() != provider {
            Some("liquidity provider unavailable")
        } else if !env.lender.borrow(&mut *env.ledger, &self.settlement_token, &vault, amount) {
            Some("liquidity provider declined")
        } else {
            None
        };

        match reason {
            None => {
                v2.borrowed_amount = amount;
                v2.liquidity_borrowed = true;
                info!(market = id, provider = %provider, amount = %amount, "🏦 liquidity borrowed");
                env.events.push(Event::LiquidityBorrowed {
                    market_id: id,
                    provider,
                    amount,
                });
            }
            Some(reason) => {
                warn!(market = id, provider = %provider, amount = %amount, reason, "borrow failed");
                env.events.push(Event::BorrowFailed {
                    market_id: id,
                    provider,
                    amount,
                    reason: reason.to_string(),
                });
            }
        }
    }

    /// Return borrowed principal plus the revenue share. Returns
    /// `(principal, revenue)`.
    pub fn repay_liquidity(
        &mut self,
        ledger: &mut dyn TokenLedger,
        lender: &mut dyn LiquidityProvider,
        caller: &str,
        events: &mut Vec<Event>,
    ) -> Result<(Amount, Amount), MarketError> {
        self.ensure_v2("repayLiquidity")?;
        self.ensure_admin(caller)?;
        if self.status != MarketStatus::Resolved {
            return Err(MarketError::StatusMismatch {
                expected: "resolved",
                actual: self.status,
            });
        }

        let id = self.id;
        let vault = self.vault();
        let (v2, pool) = match (self.v2.as_mut(), self.settlement.as_mut()) {
            (Some(v2), Some(pool)) if v2.outstanding() => (v2, pool),
            _ => return Err(MarketError::NoBorrowOutstanding),
        };
        let provider = v2.liquidity_provider.clone().unwrap_or_default();
        if lender.address() != provider {
            return Err(CollaboratorError::Unavailable(provider).into());
        }

        let principal = v2.borrowed_amount;
        let revenue = apply_bps(principal, v2.revenue_share_bps)
            .ok_or(MarketError::Overflow)?
            .min(pool.pool_remaining);
        if !lender.repay(ledger, &self.settlement_token, &vault, principal, revenue) {
            return Err(MarketError::RepayRejected { provider });
        }

        pool.pool_remaining -= revenue;
        v2.liquidity_repaid = true;
        v2.repaid_revenue = revenue;

        info!(
            market = id,
            provider = %provider,
            principal = %principal,
            revenue = %revenue,
            "🏦 liquidity repaid"
        );
        events.push(Event::LiquidityRepaid {
            market_id: id,
            provider,
            principal,
            revenue,
        });
        Ok((principal, revenue))
    }

    /// Reserved entry point; liquidity only arrives through bets and borrowing
    pub fn add_liquidity(&self, _amount: Amount, _weights: &[Amount]) -> Result<(), MarketError> {
        Err(MarketError::Unsupported("addLiquidity"))
    }

    /// Admin-forced exit for a stuck position. Before resolution the user
    /// gets their share of the outcome's stakes back; afterwards the normal
    /// redemption value, which like `redeem` waits for loan repayment.
    pub fn emergency_withdraw_user(
        &mut self,
        ledger: &mut dyn TokenLedger,
        caller: &str,
        user: &str,
        outcome: OutcomeId,
        shares: Amount,
        events: &mut Vec<Event>,
    ) -> Result<Amount, MarketError> {
        self.ensure_v2("emergencyWithdrawUser")?;
        self.ensure_admin(caller)?;
        self.ensure_outcome(outcome)?;
        if shares == 0 {
            return Err(MarketError::ZeroAmount);
        }
        if let Some(v2) = self.v2.as_ref().filter(|v2| self.status.is_resolved() && v2.outstanding()) {
            return Err(MarketError::OutstandingLiquidity {
                borrowed: v2.borrowed_amount,
            });
        }

        let supply = self.positions.supply_of(outcome);
        self.positions.debit(user, outcome, shares)?;

        let amount = if self.status.is_resolved() {
            self.settle_claim(outcome, shares)?
        } else {
            let index = outcome as usize;
            let refund = mul_div(shares, self.outcome_liquidity[index], supply).ok_or(MarketError::Overflow)?;
            self.outcome_liquidity[index] -= refund;
            self.total_liquidity = self.total_liquidity.checked_sub(refund).ok_or(MarketError::Overflow)?;
            refund
        };
        if amount > 0 {
            ledger.transfer(&self.settlement_token, &self.vault(), user, amount)?;
        }

        warn!(
            market = self.id,
            user,
            admin = caller,
            outcome,
            shares = %shares,
            amount = %amount,
            "🚨 emergency user withdrawal"
        );
        events.push(Event::EmergencyUserWithdrawal {
            market_id: self.id,
            user: user.to_string(),
            admin: caller.to_string(),
            outcome_id: outcome,
            shares,
            amount,
        });
        Ok(amount)
    }
}
