// ============================================================================
// Fee Routing - single fees and isolated batches
// ============================================================================
//
// A single route is validate-then-commit:
//   1. resolve referrer and rate from the registry
//   2. compute the breakdown and the new stats (pure)
//   3. check the payer's balance and the router's allowance
//   4. pull the fee into router custody (the only fallible external step)
//   5. pay out referral and pools from router custody, then store stats
//
// Batches run that routine per item. An item that fails in steps 1-4 has
// touched nothing, so the batch records its index and carries on.
//
// ============================================================================

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{FeeBreakdown, FeeRouter, FeeRouterError};
use crate::collaborators::{CollaboratorError, ReferralRegistry, TokenLedger};
use crate::events::Event;
use crate::models::{Address, Amount, Bps};

/// Result of `batch_route_fee`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub total: u32,
    pub success_count: u32,
    /// Positions of failed items, in input order
    pub failed_indices: Vec<u32>,
    pub failed_amount: Amount,
}

/// Batch counters are `u32` on the wire
fn batch_size(len: usize) -> Result<u32, FeeRouterError> {
    u32::try_from(len).map_err(|_| FeeRouterError::BatchTooLarge { len })
}

impl FeeRouter {
    /// Look up the payer's referrer and rate through the configured registry
    fn referral_terms(
        &self,
        registry: Option<&dyn ReferralRegistry>,
        user: &str,
    ) -> Result<(Option<Address>, Bps), FeeRouterError> {
        let Some(configured) = self.referral_registry.as_deref() else {
            return Ok((None, 0));
        };
        match registry {
            Some(r) if r.address() == configured => Ok((r.referrer_of(user), r.get_referral_bps(user))),
            _ => Err(CollaboratorError::Unavailable(configured.to_string()).into()),
        }
    }

    /// Read-only preview of how a fee from `user` would be divided
    pub fn preview_route(
        &self,
        registry: Option<&dyn ReferralRegistry>,
        user: &str,
        fee_amount: Amount,
    ) -> Result<FeeBreakdown, FeeRouterError> {
        let (referrer, bps) = self.referral_terms(registry, user)?;
        let breakdown = FeeBreakdown::compute(fee_amount, bps, referrer, &self.split)?;
        if breakdown.referral > 0 && breakdown.referrer.is_none() {
            return Err(FeeRouterError::ReferrerNotSet {
                user: user.to_string(),
                amount: breakdown.referral,
            });
        }
        Ok(breakdown)
    }

    /// Route one fee pulled from `from`. Emits `FeeRouted`.
    pub fn route_fee(
        &mut self,
        ledger: &mut dyn TokenLedger,
        registry: Option<&dyn ReferralRegistry>,
        token: &str,
        from: &str,
        fee_amount: Amount,
        bet_amount: Amount,
        events: &mut Vec<Event>,
    ) -> Result<FeeBreakdown, FeeRouterError> {
        if self.paused {
            return Err(FeeRouterError::Paused);
        }

        let breakdown = self.route_single(ledger, registry, token, from, fee_amount)?;
        info!(
            token,
            from,
            fee = %fee_amount,
            referral = %breakdown.referral,
            treasury = %breakdown.treasury,
            "💸 fee routed"
        );
        events.push(Event::FeeRouted {
            token: token.to_string(),
            from: from.to_string(),
            referrer: breakdown.referrer.clone(),
            fee_amount,
            bet_amount,
            referral_amount: breakdown.referral,
            lp_amount: breakdown.lp,
            promo_amount: breakdown.promo,
            insurance_amount: breakdown.insurance,
            treasury_amount: breakdown.treasury,
        });
        Ok(breakdown)
    }

    /// Route `amounts[i]` from `users[i]` for every i, in order. Item failures
    /// are recorded, not propagated. Emits one `BatchProcessed`.
    pub fn batch_route_fee(
        &mut self,
        ledger: &mut dyn TokenLedger,
        registry: Option<&dyn ReferralRegistry>,
        token: &str,
        users: &[Address],
        amounts: &[Amount],
        events: &mut Vec<Event>,
    ) -> Result<BatchOutcome, FeeRouterError> {
        if self.paused {
            return Err(FeeRouterError::Paused);
        }
        if users.len() != amounts.len() {
            return Err(FeeRouterError::ArrayLengthMismatch {
                users: users.len(),
                amounts: amounts.len(),
            });
        }

        let mut outcome = BatchOutcome {
            total: batch_size(users.len())?,
            ..BatchOutcome::default()
        };

        for (index, (user, amount)) in (0..outcome.total).zip(users.iter().zip(amounts)) {
            match self.route_single(ledger, registry, token, user, *amount) {
                Ok(_) => outcome.success_count += 1,
                Err(e) => {
                    warn!(index, user = %user, amount = %amount, error = %e, "batch item failed");
                    outcome.failed_indices.push(index);
                    outcome.failed_amount = outcome.failed_amount.saturating_add(*amount);
                }
            }
        }

        info!(
            token,
            total = outcome.total,
            success = outcome.success_count,
            failed = outcome.failed_indices.len(),
            "📦 fee batch processed"
        );
        events.push(Event::BatchProcessed {
            token: token.to_string(),
            total: outcome.total,
            success: outcome.success_count,
            failed: outcome.total - outcome.success_count,
            failed_amount: outcome.failed_amount,
        });
        Ok(outcome)
    }

    /// Shared routine behind `route_fee` and each batch item
    fn route_single(
        &mut self,
        ledger: &mut dyn TokenLedger,
        registry: Option<&dyn ReferralRegistry>,
        token: &str,
        from: &str,
        fee_amount: Amount,
    ) -> Result<FeeBreakdown, FeeRouterError> {
        let breakdown = self.preview_route(registry, from, fee_amount)?;
        let new_stats = self.fee_stats(token).accumulate(&breakdown)?;

        let available = ledger.balance_of(token, from);
        if available < fee_amount {
            return Err(CollaboratorError::InsufficientBalance {
                token: token.to_string(),
                account: from.to_string(),
                available,
                required: fee_amount,
            }
            .into());
        }

        ledger.transfer_from(token, &self.address, from, &self.address, fee_amount)?;

        let router = self.address.clone();
        let payouts = [
            (breakdown.referrer.as_deref(), breakdown.referral),
            (Some(self.recipients.lp_vault.as_str()), breakdown.lp),
            (Some(self.recipients.promo_pool.as_str()), breakdown.promo),
            (Some(self.recipients.insurance_fund.as_str()), breakdown.insurance),
            (Some(self.recipients.treasury.as_str()), breakdown.treasury),
        ];
        for (to, amount) in payouts {
            if let (Some(to), true) = (to, amount > 0) {
                ledger.transfer(token, &router, to, amount)?;
            }
        }

        self.stats.insert(token.to_string(), new_stats);
        debug!(token, from, fee = %fee_amount, "fee split paid out");
        Ok(breakdown)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{MemoryReferralRegistry, MemoryToken, REFERRAL_REGISTRY_ADDRESS};
    use crate::fee_router::{tests::test_router, FeeSplit, FEE_ROUTER_ADDRESS};

    fn funded(accounts: &[(&str, Amount)]) -> MemoryToken {
        let mut token = MemoryToken::new();
        for (account, amount) in accounts {
            token.mint("USDC", account, *amount).unwrap();
            token.approve("USDC", account, FEE_ROUTER_ADDRESS, *amount).unwrap();
        }
        token
    }

    fn registry_with_referral() -> MemoryReferralRegistry {
        let mut registry = MemoryReferralRegistry::default();
        registry.register("alice", Some("carol"), 1_000).unwrap();
        registry
    }

    #[test]
    fn test_batch_size_bounds() {
        assert_eq!(batch_size(3), Ok(3));
        assert_eq!(batch_size(u32::MAX as usize), Ok(u32::MAX));
        #[cfg(target_pointer_width = "64")]
        assert_eq!(
            batch_size(u32::MAX as usize + 1),
            Err(FeeRouterError::BatchTooLarge {
                len: u32::MAX as usize + 1
            })
        );
    }

    #[test]
    fn test_route_fee_no_referrer() {
        let mut router = test_router();
        let mut token = funded(&[("bob", 100)]);
        let mut events = Vec::new();

        let b = router
            .route_fee(&mut token, None, "USDC", "bob", 20, 1_000, &mut events)
            .unwrap();

        assert_eq!((b.referral, b.lp, b.promo, b.insurance, b.treasury), (0, 8, 4, 2, 6));
        assert_eq!(token.balance_of("USDC", "bob"), 80);
        assert_eq!(token.balance_of("USDC", "lp-vault"), 8);
        assert_eq!(token.balance_of("USDC", "treasury"), 6);
        assert_eq!(token.balance_of("USDC", FEE_ROUTER_ADDRESS), 0);

        let stats = router.fee_stats("USDC");
        assert_eq!(stats.total_received, 20);
        assert_eq!(stats.total_lp, 8);
        assert!(matches!(events.as_slice(), [Event::FeeRouted { fee_amount: 20, bet_amount: 1_000, .. }]));
    }

    #[test]
    fn test_route_fee_pays_referrer_first() {
        let registry = registry_with_referral();
        let mut router = test_router().with_referral_registry(REFERRAL_REGISTRY_ADDRESS);
        let mut token = funded(&[("alice", 1_000)]);
        let mut events = Vec::new();

        let b = router
            .route_fee(&mut token, Some(&registry), "USDC", "alice", 1_000, 50_000, &mut events)
            .unwrap();

        assert_eq!(b.referral, 100);
        assert_eq!(token.balance_of("USDC", "carol"), 100);
        // the 900 remainder is split 40/20/10/30
        assert_eq!((b.lp, b.promo, b.insurance, b.treasury), (360, 180, 90, 270));
        assert_eq!(router.fee_stats("USDC").total_referral, 100);
    }

    #[test]
    fn test_referral_without_referrer_fails() {
        let mut registry = MemoryReferralRegistry::default();
        registry.register("alice", None, 1_000).unwrap();
        let mut router = test_router().with_referral_registry(REFERRAL_REGISTRY_ADDRESS);
        let mut token = funded(&[("alice", 1_000)]);
        let mut events = Vec::new();

        let err = router
            .route_fee(&mut token, Some(&registry), "USDC", "alice", 1_000, 0, &mut events)
            .unwrap_err();
        assert_eq!(err, FeeRouterError::ReferrerNotSet { user: "alice".into(), amount: 100 });
        assert_eq!(token.balance_of("USDC", "alice"), 1_000);
        assert_eq!(router.fee_stats("USDC"), Default::default());
        assert!(events.is_empty());
    }

    #[test]
    fn test_unreachable_registry_fails() {
        let registry = MemoryReferralRegistry::new("old-registry");
        let mut router = test_router().with_referral_registry(REFERRAL_REGISTRY_ADDRESS);
        let mut token = funded(&[("alice", 1_000)]);
        let mut events = Vec::new();

        let err = router
            .route_fee(&mut token, Some(&registry), "USDC", "alice", 10, 0, &mut events)
            .unwrap_err();
        assert!(matches!(err, FeeRouterError::Collaborator(CollaboratorError::Unavailable(_))));
    }

    #[test]
    fn test_paused_router_rejects_routing() {
        let mut router = test_router();
        let mut token = funded(&[("bob", 100)]);
        let mut events = Vec::new();
        router.pause("owner", &mut events).unwrap();
        events.clear();

        assert_eq!(
            router.route_fee(&mut token, None, "USDC", "bob", 20, 0, &mut events),
            Err(FeeRouterError::Paused)
        );
        assert_eq!(
            router.batch_route_fee(&mut token, None, "USDC", &["bob".into()], &[20], &mut events),
            Err(FeeRouterError::Paused)
        );
        assert!(events.is_empty());
    }

    #[test]
    fn test_batch_isolates_failures() {
        let mut router = test_router();
        // dave never approved the router, erin is short on funds
        let mut token = funded(&[("alice", 100), ("bob", 100), ("erin", 5)]);
        token.mint("USDC", "dave", 100).unwrap();
        let mut events = Vec::new();

        let users: Vec<Address> = ["alice", "dave", "bob", "erin"].iter().map(|s| s.to_string()).collect();
        let outcome = router
            .batch_route_fee(&mut token, None, "USDC", &users, &[10, 10, 30, 50], &mut events)
            .unwrap();

        assert_eq!(outcome.total, 4);
        assert_eq!(outcome.success_count, 2);
        assert_eq!(outcome.failed_indices, vec![1, 3]);
        assert_eq!(outcome.failed_amount, 60);

        assert_eq!(token.balance_of("USDC", "dave"), 100);
        assert_eq!(token.balance_of("USDC", "erin"), 5);
        assert_eq!(router.fee_stats("USDC").total_received, 40);

        // the surviving items' totals match routing them on their own
        let mut solo = test_router();
        let mut solo_token = funded(&[("alice", 100), ("bob", 100)]);
        let mut solo_events = Vec::new();
        solo.route_fee(&mut solo_token, None, "USDC", "alice", 10, 0, &mut solo_events).unwrap();
        solo.route_fee(&mut solo_token, None, "USDC", "bob", 30, 0, &mut solo_events).unwrap();
        assert_eq!(solo.fee_stats("USDC"), router.fee_stats("USDC"));

        assert_eq!(
            events,
            vec![Event::BatchProcessed {
                token: "USDC".into(),
                total: 4,
                success: 2,
                failed: 2,
                failed_amount: 60,
            }]
        );
    }

    #[test]
    fn test_batch_length_mismatch_fails_whole_call() {
        let mut router = test_router();
        let mut token = funded(&[("alice", 100)]);
        let mut events = Vec::new();

        let err = router
            .batch_route_fee(&mut token, None, "USDC", &["alice".into()], &[10, 20], &mut events)
            .unwrap_err();
        assert_eq!(err, FeeRouterError::ArrayLengthMismatch { users: 1, amounts: 2 });
        assert_eq!(token.balance_of("USDC", "alice"), 100);
        assert!(events.is_empty());
    }

    #[test]
    fn test_preview_matches_route() {
        let registry = registry_with_referral();
        let mut router = test_router().with_referral_registry(REFERRAL_REGISTRY_ADDRESS);
        router.split = FeeSplit::new(2_500, 2_500, 2_500, 2_500);
        let preview = router.preview_route(Some(&registry), "alice", 777).unwrap();

        let mut token = funded(&[("alice", 1_000)]);
        let mut events = Vec::new();
        let routed = router
            .route_fee(&mut token, Some(&registry), "USDC", "alice", 777, 0, &mut events)
            .unwrap();
        assert_eq!(preview, routed);
    }
}
