// ============================================================================
// Betting - fee deduction, share minting, slippage protection
// ============================================================================
//
// A bet is check-then-commit:
//   1. status, deadline, outcome and amount checks
//   2. fee from the (discounted) rate, net stake = amount - fee
//   3. shares quoted off the current curve, slippage limit applied here
//   4. net stake pulled into the vault, fee sent through the fee sink
//   5. shares minted, liquidity updated, BetPlaced emitted
//
// Nothing is written to market state before step 4 succeeds.
//
// ============================================================================

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{Market, MarketEnv, MarketError, MarketStatus};
use crate::collaborators::{CollaboratorError, DiscountOracle};
use crate::events::Event;
use crate::models::{apply_bps, Amount, Bps, OutcomeId, BPS_DENOMINATOR};

/// Read-only preview of a bet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BetQuote {
    pub amount: Amount,
    pub fee: Amount,
    pub net_amount: Amount,
    pub shares: Amount,
    pub reference_price: Decimal,
    pub effective_price: Decimal,
    pub slippage_bps: Amount,
}

impl Market {
    /// Discount in bps from the market's discount oracle, 0 when none is set
    fn discount_for(&self, discounts: &dyn DiscountOracle, user: &str) -> Result<Bps, MarketError> {
        match self.discount_oracle.as_deref() {
            None => Ok(0),
            Some(configured) if discounts.address() == configured => {
                Ok(discounts.discount_factor(user).min(BPS_DENOMINATOR))
            }
            Some(configured) => Err(CollaboratorError::Unavailable(configured.to_string()).into()),
        }
    }

    /// Fee rate after the user's discount
    pub fn effective_fee_rate(&self, discounts: &dyn DiscountOracle, user: &str) -> Result<Bps, MarketError> {
        let discount = self.discount_for(discounts, user)?;
        let rate = self.fee_rate as u64 * (BPS_DENOMINATOR - discount) as u64 / BPS_DENOMINATOR as u64;
        Ok(rate as Bps)
    }

    pub fn calculate_fee(&self, discounts: &dyn DiscountOracle, user: &str, amount: Amount) -> Result<Amount, MarketError> {
        let rate = self.effective_fee_rate(discounts, user)?;
        apply_bps(amount, rate).ok_or(MarketError::Overflow)
    }

    pub fn quote_bet(
        &self,
        discounts: &dyn DiscountOracle,
        user: &str,
        outcome: OutcomeId,
        amount: Amount,
    ) -> Result<BetQuote, MarketError> {
        if amount == 0 {
            return Err(MarketError::ZeroAmount);
        }
        let curve = self.curve(outcome)?;
        let fee = self.calculate_fee(discounts, user, amount)?;
        let net_amount = amount - fee;
        if net_amount == 0 {
            return Err(MarketError::BetTooSmall { amount, fee });
        }

        Ok(BetQuote {
            amount,
            fee,
            net_amount,
            shares: curve.shares_for(net_amount)?,
            reference_price: curve.reference_price()?,
            effective_price: curve.effective_price(net_amount)?,
            slippage_bps: curve.slippage_bps(net_amount)?,
        })
    }

    fn ensure_betting_open(&self, now: u64) -> Result<(), MarketError> {
        if self.status != MarketStatus::Open {
            return Err(MarketError::StatusMismatch {
                expected: "open",
                actual: self.status,
            });
        }
        let closes_at = self.betting_closes_at();
        if now >= closes_at {
            return Err(MarketError::BettingClosed { now, closes_at });
        }
        Ok(())
    }

    /// Stake `amount` on `outcome`. Returns the shares minted.
    pub fn place_bet(
        &mut self,
        env: &mut MarketEnv<'_>,
        user: &str,
        outcome: OutcomeId,
        amount: Amount,
    ) -> Result<Amount, MarketError> {
        self.execute_bet(env, user, outcome, amount, None)
    }

    /// `place_bet` that refuses to fill if the price moves more than
    /// `max_slippage_bps` past the pre-trade reference price
    pub fn place_bet_with_slippage(
        &mut self,
        env: &mut MarketEnv<'_>,
        user: &str,
        outcome: OutcomeId,
        amount: Amount,
        max_slippage_bps: Bps,
    ) -> Result<Amount, MarketError> {
        self.ensure_v2("placeBetWithSlippage")?;
        self.execute_bet(env, user, outcome, amount, Some(max_slippage_bps))
    }

    fn execute_bet(
        &mut self,
        env: &mut MarketEnv<'_>,
        user: &str,
        outcome: OutcomeId,
        amount: Amount,
        max_slippage_bps: Option<Bps>,
    ) -> Result<Amount, MarketError> {
        self.ensure_betting_open(env.now)?;
        let quote = self.quote_bet(env.discounts, user, outcome, amount)?;

        if let Some(max_bps) = max_slippage_bps {
            if quote.slippage_bps > max_bps as Amount {
                return Err(MarketError::SlippageExceeded {
                    deviation_bps: quote.slippage_bps,
                    max_bps,
                });
            }
        }

        let index = outcome as usize;
        let outcome_liquidity = self.outcome_liquidity[index]
            .checked_add(quote.net_amount)
            .ok_or(MarketError::Overflow)?;
        let total_liquidity = self
            .total_liquidity
            .checked_add(quote.net_amount)
            .ok_or(MarketError::Overflow)?;

        let vault = self.vault();
        env.ledger
            .transfer_from(&self.settlement_token, &vault, user, &vault, quote.net_amount)?;
        if quote.fee > 0 {
            env.fees.route_fee(
                &mut *env.ledger,
                &self.settlement_token,
                user,
                quote.fee,
                amount,
                &mut *env.events,
            )?;
        }

        self.positions.credit(user, outcome, quote.shares)?;
        self.outcome_liquidity[index] = outcome_liquidity;
        self.total_liquidity = total_liquidity;
        self.total_volume = self.total_volume.saturating_add(amount);
        self.total_fees = self.total_fees.saturating_add(quote.fee);

        info!(
            market = self.id,
            user,
            outcome,
            amount = %amount,
            fee = %quote.fee,
            shares = %quote.shares,
            "🎲 bet placed"
        );
        env.events.push(Event::BetPlaced {
            market_id: self.id,
            user: user.to_string(),
            outcome_id: outcome,
            amount,
            shares: quote.shares,
            fee: quote.fee,
        });

        self.try_borrow(env);
        Ok(quote.shares)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::collaborators::{
        MemoryDiscountOracle, MemoryLiquidityProvider, MemoryToken, TokenLedger, DISCOUNT_ORACLE_ADDRESS,
    };
    use crate::market::tests::{base_params, new_market, LOCK_AT, T0};
    use crate::market::DirectFeeSink;
    use rust_decimal_macros::dec;

    /// Host-side collaborators for driving a market directly
    pub struct Harness {
        pub token: MemoryToken,
        pub discounts: MemoryDiscountOracle,
        pub lender: MemoryLiquidityProvider,
        pub events: Vec<Event>,
    }

    impl Harness {
        pub fn new() -> Self {
            Self {
                token: MemoryToken::new(),
                discounts: MemoryDiscountOracle::default(),
                lender: MemoryLiquidityProvider::default(),
                events: Vec::new(),
            }
        }

        pub fn fund(&mut self, market: &Market, user: &str, amount: Amount) {
            self.token.mint(&market.settlement_token, user, amount).unwrap();
            self.token
                .approve(&market.settlement_token, user, &market.vault(), amount)
                .unwrap();
        }

        pub fn bet(
            &mut self,
            market: &mut Market,
            now: u64,
            user: &str,
            outcome: OutcomeId,
            amount: Amount,
            max_slippage: Option<Bps>,
        ) -> Result<Amount, MarketError> {
            let mut sink = DirectFeeSink {
                spender: market.vault(),
                recipient: market.fee_recipient.clone(),
            };
            let mut env = MarketEnv {
                now,
                ledger: &mut self.token,
                fees: &mut sink,
                discounts: &self.discounts,
                lender: &mut self.lender,
                events: &mut self.events,
            };
            match max_slippage {
                Some(max) => market.place_bet_with_slippage(&mut env, user, outcome, amount, max),
                None => market.place_bet(&mut env, user, outcome, amount),
            }
        }
    }

    #[test]
    fn test_bet_deducts_fee_and_mints_shares() {
        let mut market = new_market(base_params());
        let mut h = Harness::new();
        h.fund(&market, "alice", 1_000);

        let shares = h.bet(&mut market, T0, "alice", 0, 1_000, None).unwrap();

        // fee 20, net 980 into a fresh 1000/2000 curve
        assert_eq!(shares, 1_474);
        assert_eq!(market.positions.balance_of("alice", 0), 1_474);
        assert_eq!(market.outcome_liquidity, vec![980, 0]);
        assert_eq!(market.total_liquidity, 980);
        assert_eq!(h.token.balance_of("USDC", "market:1"), 980);
        assert_eq!(h.token.balance_of("USDC", "treasury"), 20);
        assert_eq!(h.token.balance_of("USDC", "alice"), 0);
        assert!(matches!(
            h.events.last(),
            Some(Event::BetPlaced { amount: 1_000, shares: 1_474, fee: 20, .. })
        ));
    }

    #[test]
    fn test_discount_reduces_fee() {
        let mut market = new_market(base_params().with_oracles(None, Some(DISCOUNT_ORACLE_ADDRESS)));
        let mut h = Harness::new();
        h.discounts.set_discount("alice", 5_000);

        assert_eq!(market.calculate_fee(&h.discounts, "alice", 1_000).unwrap(), 10);
        assert_eq!(market.calculate_fee(&h.discounts, "bob", 1_000).unwrap(), 20);

        h.discounts.set_discount("alice", 10_000);
        h.fund(&market, "alice", 500);
        h.bet(&mut market, T0, "alice", 1, 500, None).unwrap();
        assert_eq!(market.total_fees, 0);
    }

    #[test]
    fn test_wrong_discount_oracle_is_unavailable() {
        let market = new_market(base_params().with_oracles(None, Some("other-oracle")));
        let h = Harness::new();
        assert_eq!(
            market.calculate_fee(&h.discounts, "alice", 1_000),
            Err(MarketError::Collaborator(CollaboratorError::Unavailable("other-oracle".into())))
        );
    }

    #[test]
    fn test_bet_after_deadline_fails() {
        let mut market = new_market(base_params());
        let mut h = Harness::new();
        h.fund(&market, "alice", 1_000);

        assert_eq!(
            h.bet(&mut market, LOCK_AT, "alice", 0, 100, None),
            Err(MarketError::BettingClosed { now: LOCK_AT, closes_at: LOCK_AT })
        );
        assert_eq!(market.total_liquidity, 0);
    }

    #[test]
    fn test_bet_validation() {
        let mut market = new_market(base_params());
        let mut h = Harness::new();
        h.fund(&market, "alice", 1_000);

        assert_eq!(h.bet(&mut market, T0, "alice", 0, 0, None), Err(MarketError::ZeroAmount));
        assert!(matches!(
            h.bet(&mut market, T0, "alice", 2, 100, None),
            Err(MarketError::InvalidOutcome { outcome: 2, outcome_count: 2 })
        ));
        // more than approved
        assert!(matches!(
            h.bet(&mut market, T0, "alice", 0, 2_000, None),
            Err(MarketError::Collaborator(_))
        ));
        assert_eq!(market.positions.supply_of(0), 0);
    }

    #[test]
    fn test_slippage_limit_checked_before_mutation() {
        let mut market = new_market(base_params().v2(1_500, None, 0, 0));
        let mut h = Harness::new();
        h.fund(&market, "alice", 10_000);

        let quote = market.quote_bet(&h.discounts, "alice", 0, 1_000).unwrap();
        assert!(quote.slippage_bps > 100);

        let err = h.bet(&mut market, T0, "alice", 0, 1_000, Some(100)).unwrap_err();
        assert!(matches!(err, MarketError::SlippageExceeded { max_bps: 100, .. }));
        assert_eq!(market.total_liquidity, 0);
        assert_eq!(h.token.balance_of("USDC", "alice"), 10_000);

        let shares = h
            .bet(&mut market, T0, "alice", 0, 1_000, Some(quote.slippage_bps as Bps))
            .unwrap();
        assert_eq!(shares, quote.shares);
    }

    #[test]
    fn test_slippage_bet_requires_v2() {
        let mut market = new_market(base_params());
        let mut h = Harness::new();
        assert_eq!(
            h.bet(&mut market, T0, "alice", 0, 100, Some(50)),
            Err(MarketError::RequiresV2("placeBetWithSlippage"))
        );
    }

    #[test]
    fn test_v2_kickoff_closes_betting() {
        let mut market = new_market(base_params().v2(1_500, None, 0, 0));
        let mut h = Harness::new();
        h.fund(&market, "alice", 100);

        assert!(matches!(
            h.bet(&mut market, 1_500, "alice", 0, 100, None),
            Err(MarketError::BettingClosed { closes_at: 1_500, .. })
        ));
        assert_eq!(market.status, MarketStatus::Open);
    }

    #[test]
    fn test_quote_reports_prices() {
        let market = new_market(base_params());
        let h = Harness::new();
        let quote = market.quote_bet(&h.discounts, "alice", 0, 1_000).unwrap();

        assert_eq!(quote.fee, 20);
        assert_eq!(quote.net_amount, 980);
        assert_eq!(quote.reference_price, dec!(0.5));
        assert!(quote.effective_price > dec!(0.5));
    }
}
