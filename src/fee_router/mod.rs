// ============================================================================
// Fee Router Module - Referral payouts and pool distribution
// ============================================================================
//
// Every wager fee flows through the router:
//
//   fee ──► referral (referrer's rate, capped at MAX_REFERRAL_BPS)
//    │
//    └──► remainder ──► lp / promo / insurance / treasury (FeeSplit bps)
//
// Integer division dust always lands in the treasury bucket, so the five
// outputs reconcile exactly to the fee.
//
//   - split: FeeSplit / Recipients / FeeBreakdown math
//   - routing: single and batch routing
//
// ============================================================================

pub mod routing;
pub mod split;

pub use routing::*;
pub use split::*;

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::info;

use crate::collaborators::{CollaboratorError, TokenLedger};
use crate::events::Event;
use crate::models::{is_zero_address, Address, Amount, Bps};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Upper bound on any user's referral rate (50%)
pub const MAX_REFERRAL_BPS: Bps = 5_000;

/// Address the router is deployed at
pub const FEE_ROUTER_ADDRESS: &str = "fee-router";

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeeRouterError {
    #[error("Fee split must total 10000 bps, got {total}")]
    InvalidFeeSplit { total: u64 },

    #[error("Referral bps {provided} exceeds maximum {max}")]
    InvalidReferralBps { provided: Bps, max: Bps },

    #[error("Zero address: {0}")]
    ZeroAddress(&'static str),

    #[error("Recipient {0} appears more than once")]
    DuplicateRecipient(Address),

    #[error("Caller {caller} is not the router owner")]
    NotOwner { caller: Address },

    #[error("Router is paused")]
    Paused,

    #[error("Router is not paused")]
    NotPaused,

    #[error("Array length mismatch: {users} users, {amounts} amounts")]
    ArrayLengthMismatch { users: usize, amounts: usize },

    #[error("Batch of {len} items exceeds {max}", max = u32::MAX)]
    BatchTooLarge { len: usize },

    #[error("Referral of {amount} for {user} has no referrer to receive it")]
    ReferrerNotSet { user: Address, amount: Amount },

    #[error("Arithmetic overflow")]
    Overflow,

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

// ============================================================================
// STATS
// ============================================================================

/// Monotonic per-token counters, updated only by successful routing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeStats {
    pub total_received: Amount,
    pub total_referral: Amount,
    pub total_lp: Amount,
    pub total_promo: Amount,
    pub total_insurance: Amount,
    pub total_treasury: Amount,
}

impl FeeStats {
    /// Fold a routed fee into the counters. Computed on a copy so a
    /// failure leaves the stored counters untouched.
    pub fn accumulate(&self, b: &FeeBreakdown) -> Result<FeeStats, FeeRouterError> {
        let add = |a: Amount, b: Amount| a.checked_add(b).ok_or(FeeRouterError::Overflow);
        Ok(FeeStats {
            total_received: add(self.total_received, b.total()?)?,
            total_referral: add(self.total_referral, b.referral)?,
            total_lp: add(self.total_lp, b.lp)?,
            total_promo: add(self.total_promo, b.promo)?,
            total_insurance: add(self.total_insurance, b.insurance)?,
            total_treasury: add(self.total_treasury, b.treasury)?,
        })
    }
}

// ============================================================================
// FEE ROUTER
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeRouter {
    /// Address fees are pulled into before distribution
    pub address: Address,
    pub owner: Address,
    pub paused: bool,
    pub split: FeeSplit,
    pub recipients: Recipients,
    /// None disables referral payouts entirely
    pub referral_registry: Option<Address>,
    /// token -> counters
    pub stats: BTreeMap<String, FeeStats>,
}

impl FeeRouter {
    pub fn new(owner: &str, split: FeeSplit, recipients: Recipients) -> Result<Self, FeeRouterError> {
        if is_zero_address(owner) {
            return Err(FeeRouterError::ZeroAddress("owner"));
        }
        split.validate()?;
        recipients.validate()?;

        Ok(Self {
            address: FEE_ROUTER_ADDRESS.to_string(),
            owner: owner.to_string(),
            paused: false,
            split,
            recipients,
            referral_registry: None,
            stats: BTreeMap::new(),
        })
    }

    pub fn with_referral_registry(mut self, registry: &str) -> Self {
        self.referral_registry = Some(registry.to_string());
        self
    }

    pub fn fee_stats(&self, token: &str) -> FeeStats {
        self.stats.get(token).copied().unwrap_or_default()
    }

    fn ensure_owner(&self, caller: &str) -> Result<(), FeeRouterError> {
        if caller != self.owner {
            return Err(FeeRouterError::NotOwner {
                caller: caller.to_string(),
            });
        }
        Ok(())
    }

    fn ensure_not_paused(&self) -> Result<(), FeeRouterError> {
        if self.paused {
            return Err(FeeRouterError::Paused);
        }
        Ok(())
    }

    // ========================================================================
    // OWNER CONFIGURATION
    // ========================================================================

    /// Replace the pool split. A split not totalling 10000 bps is rejected
    /// and the previous split stays in force.
    pub fn set_fee_split(&mut self, caller: &str, split: FeeSplit, events: &mut Vec<Event>) -> Result<(), FeeRouterError> {
        self.ensure_owner(caller)?;
        split.validate()?;

        self.split = split;
        info!(
            lp = split.lp_bps,
            promo = split.promo_bps,
            insurance = split.insurance_bps,
            treasury = split.treasury_bps,
            "fee split updated"
        );
        events.push(Event::FeeSplitUpdated {
            lp_bps: split.lp_bps,
            promo_bps: split.promo_bps,
            insurance_bps: split.insurance_bps,
            treasury_bps: split.treasury_bps,
        });
        Ok(())
    }

    pub fn set_recipients(&mut self, caller: &str, recipients: Recipients, events: &mut Vec<Event>) -> Result<(), FeeRouterError> {
        self.ensure_owner(caller)?;
        recipients.validate()?;

        info!(treasury = %recipients.treasury, "fee recipients updated");
        events.push(Event::RecipientsUpdated {
            lp_vault: recipients.lp_vault.clone(),
            promo_pool: recipients.promo_pool.clone(),
            insurance_fund: recipients.insurance_fund.clone(),
            treasury: recipients.treasury.clone(),
        });
        self.recipients = recipients;
        Ok(())
    }

    pub fn set_referral_registry(&mut self, caller: &str, registry: &str, events: &mut Vec<Event>) -> Result<(), FeeRouterError> {
        self.ensure_owner(caller)?;
        if is_zero_address(registry) {
            return Err(FeeRouterError::ZeroAddress("referral registry"));
        }

        self.referral_registry = Some(registry.to_string());
        info!(registry, "referral registry updated");
        events.push(Event::ReferralRegistryUpdated {
            registry: registry.to_string(),
        });
        Ok(())
    }

    pub fn pause(&mut self, caller: &str, events: &mut Vec<Event>) -> Result<(), FeeRouterError> {
        self.ensure_owner(caller)?;
        self.ensure_not_paused()?;
        self.paused = true;
        info!(by = caller, "⏸️ fee router paused");
        events.push(Event::RouterPaused { by: caller.to_string() });
        Ok(())
    }

    pub fn unpause(&mut self, caller: &str, events: &mut Vec<Event>) -> Result<(), FeeRouterError> {
        self.ensure_owner(caller)?;
        if !self.paused {
            return Err(FeeRouterError::NotPaused);
        }
        self.paused = false;
        info!(by = caller, "▶️ fee router unpaused");
        events.push(Event::RouterUnpaused { by: caller.to_string() });
        Ok(())
    }

    pub fn transfer_ownership(&mut self, caller: &str, new_owner: &str, events: &mut Vec<Event>) -> Result<(), FeeRouterError> {
        self.ensure_owner(caller)?;
        if is_zero_address(new_owner) {
            return Err(FeeRouterError::ZeroAddress("new owner"));
        }

        let previous_owner = std::mem::replace(&mut self.owner, new_owner.to_string());
        info!(%previous_owner, new_owner, "router ownership transferred");
        events.push(Event::OwnershipTransferred {
            previous_owner,
            new_owner: new_owner.to_string(),
        });
        Ok(())
    }

    /// Stuck-funds recovery. Moves router-held tokens without touching
    /// the split accounting or stats. Works while paused.
    pub fn emergency_withdraw(
        &mut self,
        ledger: &mut dyn TokenLedger,
        caller: &str,
        token: &str,
        to: &str,
        amount: Amount,
        events: &mut Vec<Event>,
    ) -> Result<(), FeeRouterError> {
        self.ensure_owner(caller)?;
        if is_zero_address(to) {
            return Err(FeeRouterError::ZeroAddress("withdrawal recipient"));
        }

        ledger.transfer(token, &self.address, to, amount)?;
        tracing::warn!(token, to, amount = %amount, "🚨 emergency withdrawal from fee router");
        events.push(Event::EmergencyWithdrawal {
            token: token.to_string(),
            to: to.to_string(),
            amount,
        });
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::MemoryToken;

    pub(crate) fn test_router() -> FeeRouter {
        FeeRouter::new("owner", FeeSplit::default(), Recipients::default()).unwrap()
    }

    #[test]
    fn test_set_fee_split_rejects_bad_total() {
        let mut router = test_router();
        let mut events = Vec::new();
        let before = router.split;

        let bad = FeeSplit::new(5000, 2000, 1000, 1000);
        let err = router.set_fee_split("owner", bad, &mut events).unwrap_err();
        assert_eq!(err, FeeRouterError::InvalidFeeSplit { total: 9000 });
        assert_eq!(router.split, before);
        assert!(events.is_empty());

        let good = FeeSplit::new(2500, 2500, 2500, 2500);
        router.set_fee_split("owner", good, &mut events).unwrap();
        assert_eq!(router.split, good);
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn test_owner_only_configuration() {
        let mut router = test_router();
        let mut events = Vec::new();

        let err = router
            .set_fee_split("mallory", FeeSplit::default(), &mut events)
            .unwrap_err();
        assert_eq!(err, FeeRouterError::NotOwner { caller: "mallory".into() });
        assert!(router.set_referral_registry("mallory", "registry", &mut events).is_err());
        assert!(router.pause("mallory", &mut events).is_err());
        assert!(events.is_empty());
    }

    #[test]
    fn test_set_recipients_rejects_duplicates() {
        let mut router = test_router();
        let mut events = Vec::new();
        let recipients = Recipients {
            lp_vault: "vault".into(),
            promo_pool: "vault".into(),
            insurance_fund: "insurance".into(),
            treasury: "treasury".into(),
        };
        let err = router.set_recipients("owner", recipients, &mut events).unwrap_err();
        assert_eq!(err, FeeRouterError::DuplicateRecipient("vault".into()));
    }

    #[test]
    fn test_pause_cycle() {
        let mut router = test_router();
        let mut events = Vec::new();

        router.pause("owner", &mut events).unwrap();
        assert!(router.paused);
        assert_eq!(router.pause("owner", &mut events), Err(FeeRouterError::Paused));
        router.unpause("owner", &mut events).unwrap();
        assert_eq!(router.unpause("owner", &mut events), Err(FeeRouterError::NotPaused));
    }

    #[test]
    fn test_transfer_ownership() {
        let mut router = test_router();
        let mut events = Vec::new();

        assert!(router.transfer_ownership("owner", "", &mut events).is_err());
        router.transfer_ownership("owner", "dao", &mut events).unwrap();
        assert_eq!(router.owner, "dao");
        assert!(router.pause("owner", &mut events).is_err());
        router.pause("dao", &mut events).unwrap();
    }

    #[test]
    fn test_emergency_withdraw_bypasses_stats() {
        let mut router = test_router();
        let mut token = MemoryToken::new();
        let mut events = Vec::new();
        token.mint("USDC", FEE_ROUTER_ADDRESS, 500).unwrap();

        router
            .emergency_withdraw(&mut token, "owner", "USDC", "rescue", 300, &mut events)
            .unwrap();
        assert_eq!(token.balance_of("USDC", "rescue"), 300);
        assert_eq!(router.fee_stats("USDC"), FeeStats::default());

        let err = router
            .emergency_withdraw(&mut token, "owner", "USDC", "rescue", 300, &mut events)
            .unwrap_err();
        assert!(matches!(err, FeeRouterError::Collaborator(CollaboratorError::InsufficientBalance { .. })));
    }
}
