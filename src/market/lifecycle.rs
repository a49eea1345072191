// ============================================================================
// Lifecycle - lock, resolve, finalize, sweep
// ============================================================================

use tracing::{info, warn};

use super::{Market, MarketError, MarketStatus, SettlementPool};
use crate::collaborators::{CollaboratorError, ResultOracle, TokenLedger};
use crate::events::Event;
use crate::models::{is_zero_address, Amount, OutcomeId};

impl Market {
    /// Stop accepting bets. The admin may lock early; anyone may lock once
    /// the betting deadline has passed.
    pub fn lock(&mut self, now: u64, caller: &str, events: &mut Vec<Event>) -> Result<(), MarketError> {
        if self.status != MarketStatus::Open {
            return Err(MarketError::StatusMismatch {
                expected: "open",
                actual: self.status,
            });
        }
        let lock_at = self.betting_closes_at();
        if caller != self.admin && now < lock_at {
            return Err(MarketError::LockNotReached { now, lock_at });
        }

        self.status = MarketStatus::Locked;
        info!(market = self.id, by = caller, "🔒 market locked");
        events.push(Event::MarketLocked {
            market_id: self.id,
            by: caller.to_string(),
        });
        Ok(())
    }

    /// Admin resolution
    pub fn resolve(
        &mut self,
        now: u64,
        caller: &str,
        winning_outcome: OutcomeId,
        events: &mut Vec<Event>,
    ) -> Result<(), MarketError> {
        self.ensure_admin(caller)?;
        self.apply_resolution(now, winning_outcome, events)
    }

    /// Permissionless resolution from the market's result oracle. Records
    /// the oracle's result hash alongside the outcome.
    pub fn resolve_from_oracle(
        &mut self,
        now: u64,
        results: &dyn ResultOracle,
        events: &mut Vec<Event>,
    ) -> Result<(), MarketError> {
        self.ensure_unresolved()?;
        let configured = self.result_oracle.as_deref().ok_or(MarketError::NoResultOracle)?;
        if results.address() != configured {
            return Err(CollaboratorError::Unavailable(configured.to_string()).into());
        }
        let result = results.latest_result(self.id)?;

        self.apply_resolution(now, result.winning_outcome, events)?;
        self.result_hash = Some(result.result_hash.clone());
        events.push(Event::ResolvedWithOracle {
            market_id: self.id,
            winning_outcome: result.winning_outcome,
            result_hash: result.result_hash,
        });
        Ok(())
    }

    fn ensure_unresolved(&self) -> Result<(), MarketError> {
        if self.status.is_resolved() {
            return Err(MarketError::AlreadyResolved);
        }
        Ok(())
    }

    /// Freeze the payout pool and move to Resolved
    fn apply_resolution(&mut self, now: u64, winning_outcome: OutcomeId, events: &mut Vec<Event>) -> Result<(), MarketError> {
        self.ensure_unresolved()?;
        self.ensure_outcome(winning_outcome)?;

        let winning_supply = self.positions.supply_of(winning_outcome);
        self.settlement = Some(SettlementPool {
            pool_total: self.total_liquidity,
            pool_remaining: self.total_liquidity,
            winning_supply,
            winning_shares_remaining: winning_supply,
        });
        self.winning_outcome = Some(winning_outcome);
        self.resolved_at = Some(now);
        self.status = MarketStatus::Resolved;

        if winning_supply == 0 {
            warn!(market = self.id, outcome = winning_outcome, "resolved with no winning shares");
        }
        info!(
            market = self.id,
            outcome = winning_outcome,
            pool = %self.total_liquidity,
            "✅ market resolved"
        );
        events.push(Event::Resolved {
            market_id: self.id,
            winning_outcome,
        });
        Ok(())
    }

    /// End of the dispute window
    pub fn dispute_ends_at(&self) -> Option<u64> {
        self.resolved_at.map(|t| t.saturating_add(self.dispute_period))
    }

    /// Fix payouts permanently once the dispute period has elapsed
    pub fn finalize(&mut self, now: u64, events: &mut Vec<Event>) -> Result<(), MarketError> {
        if self.status != MarketStatus::Resolved {
            return Err(MarketError::StatusMismatch {
                expected: "resolved",
                actual: self.status,
            });
        }
        let ends_at = self.dispute_ends_at().unwrap_or(u64::MAX);
        if now < ends_at {
            return Err(MarketError::DisputePeriodActive { now, ends_at });
        }
        if let Some(v2) = self.v2.as_ref().filter(|v2| v2.outstanding()) {
            return Err(MarketError::OutstandingLiquidity {
                borrowed: v2.borrowed_amount,
            });
        }

        self.status = MarketStatus::Finalized;
        info!(market = self.id, "🏁 market finalized");
        events.push(Event::Finalized { market_id: self.id });
        Ok(())
    }

    /// Recover a finalized pool that no one can claim because no winning
    /// shares existed at resolution
    pub fn sweep_unclaimed(
        &mut self,
        ledger: &mut dyn TokenLedger,
        caller: &str,
        to: &str,
        events: &mut Vec<Event>,
    ) -> Result<Amount, MarketError> {
        self.ensure_admin(caller)?;
        if is_zero_address(to) {
            return Err(MarketError::ZeroAddress("sweep recipient"));
        }
        if self.status != MarketStatus::Finalized {
            return Err(MarketError::StatusMismatch {
                expected: "finalized",
                actual: self.status,
            });
        }
        let vault = self.vault();
        let pool = match self.settlement.as_mut() {
            Some(pool) if pool.winning_supply == 0 && pool.pool_remaining > 0 => pool,
            _ => return Err(MarketError::NothingToSweep),
        };

        let amount = pool.pool_remaining;
        ledger.transfer(&self.settlement_token, &vault, to, amount)?;
        pool.pool_remaining = 0;

        info!(market = self.id, to, amount = %amount, "🧹 unclaimed pool swept");
        events.push(Event::UnclaimedSwept {
            market_id: self.id,
            to: to.to_string(),
            amount,
        });
        Ok(amount)
    }
}
