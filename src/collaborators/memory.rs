// ============================================================================
// In-Memory Collaborators - Host-side implementations
// ============================================================================
//
// Deterministic, serializable stand-ins for the external contracts. The
// engine host owns one of each; they snapshot and restore together with the
// rest of the engine state so every call stays all-or-nothing.
//
// ============================================================================

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use super::{
    CollaboratorError, DiscountOracle, LiquidityProvider, OracleResult, ReferralRegistry, ResultOracle,
    TokenLedger,
};
use crate::fee_router::MAX_REFERRAL_BPS;
use crate::models::{is_zero_address, Address, Amount, Bps, MarketId, OutcomeId, BPS_DENOMINATOR};

pub const REFERRAL_REGISTRY_ADDRESS: &str = "referral-registry";
pub const DISCOUNT_ORACLE_ADDRESS: &str = "discount-oracle";
pub const RESULT_ORACLE_ADDRESS: &str = "result-oracle";
pub const LIQUIDITY_PROVIDER_ADDRESS: &str = "liquidity-provider";

// ============================================================================
// TOKEN LEDGER
// ============================================================================

/// Multi-token balance sheet with ERC20-style allowances
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryToken {
    /// token -> account -> balance
    pub balances: BTreeMap<String, BTreeMap<Address, Amount>>,

    /// token -> owner -> spender -> allowance
    pub allowances: BTreeMap<String, BTreeMap<Address, BTreeMap<Address, Amount>>>,
}

impl MemoryToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit freshly issued tokens (host faucet)
    pub fn mint(&mut self, token: &str, to: &str, amount: Amount) -> Result<(), CollaboratorError> {
        if is_zero_address(to) {
            return Err(CollaboratorError::ZeroAddress("mint recipient"));
        }
        let balance = self
            .balances
            .entry(token.to_string())
            .or_default()
            .entry(to.to_string())
            .or_insert(0);
        *balance = balance.checked_add(amount).ok_or(CollaboratorError::Overflow)?;
        Ok(())
    }

    pub fn approve(&mut self, token: &str, owner: &str, spender: &str, amount: Amount) -> Result<(), CollaboratorError> {
        if is_zero_address(spender) {
            return Err(CollaboratorError::ZeroAddress("spender"));
        }
        self.allowances
            .entry(token.to_string())
            .or_default()
            .entry(owner.to_string())
            .or_default()
            .insert(spender.to_string(), amount);
        Ok(())
    }

    /// Total issued supply of a token
    pub fn total_supply(&self, token: &str) -> Amount {
        self.balances
            .get(token)
            .map(|accounts| accounts.values().sum())
            .unwrap_or(0)
    }

    fn move_balance(&mut self, token: &str, from: &str, to: &str, amount: Amount) -> Result<(), CollaboratorError> {
        if is_zero_address(to) {
            return Err(CollaboratorError::ZeroAddress("transfer recipient"));
        }
        let available = self.balance_of(token, from);
        if available < amount {
            return Err(CollaboratorError::InsufficientBalance {
                token: token.to_string(),
                account: from.to_string(),
                available,
                required: amount,
            });
        }
        if amount == 0 || from == to {
            return Ok(());
        }

        let receiver_balance = self.balance_of(token, to);
        let new_receiver_balance = receiver_balance.checked_add(amount).ok_or(CollaboratorError::Overflow)?;

        let accounts = self.balances.entry(token.to_string()).or_default();
        accounts.insert(from.to_string(), available - amount);
        accounts.insert(to.to_string(), new_receiver_balance);
        Ok(())
    }
}

impl TokenLedger for MemoryToken {
    fn balance_of(&self, token: &str, account: &str) -> Amount {
        self.balances
            .get(token)
            .and_then(|accounts| accounts.get(account))
            .copied()
            .unwrap_or(0)
    }

    fn allowance(&self, token: &str, owner: &str, spender: &str) -> Amount {
        self.allowances
            .get(token)
            .and_then(|owners| owners.get(owner))
            .and_then(|spenders| spenders.get(spender))
            .copied()
            .unwrap_or(0)
    }

    fn transfer(&mut self, token: &str, from: &str, to: &str, amount: Amount) -> Result<(), CollaboratorError> {
        self.move_balance(token, from, to, amount)
    }

    fn transfer_from(
        &mut self,
        token: &str,
        spender: &str,
        from: &str,
        to: &str,
        amount: Amount,
    ) -> Result<(), CollaboratorError> {
        let allowance = self.allowance(token, from, spender);
        if allowance < amount {
            return Err(CollaboratorError::InsufficientAllowance {
                token: token.to_string(),
                owner: from.to_string(),
                spender: spender.to_string(),
                available: allowance,
                required: amount,
            });
        }

        self.move_balance(token, from, to, amount)?;
        self.allowances
            .entry(token.to_string())
            .or_default()
            .entry(from.to_string())
            .or_default()
            .insert(spender.to_string(), allowance - amount);
        Ok(())
    }
}

// ============================================================================
// REFERRAL REGISTRY
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferralEntry {
    pub referrer: Option<Address>,
    pub bps: Bps,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryReferralRegistry {
    pub address: Address,
    pub entries: BTreeMap<Address, ReferralEntry>,
}

impl MemoryReferralRegistry {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            entries: BTreeMap::new(),
        }
    }

    /// Attach a referrer and rate to a user. A rate above
    /// `MAX_REFERRAL_BPS` is rejected.
    pub fn register(&mut self, user: &str, referrer: Option<&str>, bps: Bps) -> Result<(), CollaboratorError> {
        if bps > MAX_REFERRAL_BPS {
            return Err(CollaboratorError::InvalidReferralBps {
                provided: bps,
                max: MAX_REFERRAL_BPS,
            });
        }
        if is_zero_address(user) {
            return Err(CollaboratorError::ZeroAddress("referred user"));
        }
        let referrer = referrer.filter(|r| !is_zero_address(r)).map(str::to_string);
        self.entries.insert(user.to_string(), ReferralEntry { referrer, bps });
        Ok(())
    }
}

impl Default for MemoryReferralRegistry {
    fn default() -> Self {
        Self::new(REFERRAL_REGISTRY_ADDRESS)
    }
}

impl ReferralRegistry for MemoryReferralRegistry {
    fn address(&self) -> &str {
        &self.address
    }

    fn referrer_of(&self, user: &str) -> Option<Address> {
        self.entries.get(user).and_then(|e| e.referrer.clone())
    }

    fn get_referral_bps(&self, user: &str) -> Bps {
        self.entries.get(user).map(|e| e.bps).unwrap_or(0)
    }
}

// ============================================================================
// DISCOUNT ORACLE
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryDiscountOracle {
    pub address: Address,
    pub discounts: BTreeMap<Address, Bps>,
}

impl MemoryDiscountOracle {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            discounts: BTreeMap::new(),
        }
    }

    pub fn set_discount(&mut self, user: &str, discount_bps: Bps) {
        self.discounts
            .insert(user.to_string(), discount_bps.min(BPS_DENOMINATOR));
    }
}

impl Default for MemoryDiscountOracle {
    fn default() -> Self {
        Self::new(DISCOUNT_ORACLE_ADDRESS)
    }
}

impl DiscountOracle for MemoryDiscountOracle {
    fn address(&self) -> &str {
        &self.address
    }

    fn discount_factor(&self, user: &str) -> Bps {
        self.discounts.get(user).copied().unwrap_or(0)
    }
}

// ============================================================================
// RESULT ORACLE
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryResultOracle {
    pub address: Address,
    pub results: BTreeMap<MarketId, OracleResult>,
}

impl MemoryResultOracle {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            results: BTreeMap::new(),
        }
    }

    /// Hash binding a reported outcome to its source payload
    pub fn compute_result_hash(market_id: MarketId, outcome: OutcomeId, payload: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(market_id.to_be_bytes());
        hasher.update(outcome.to_be_bytes());
        hasher.update(payload.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Record the latest result for a market, replacing any earlier report
    pub fn publish(&mut self, market_id: MarketId, outcome: OutcomeId, payload: &str) -> OracleResult {
        let result = OracleResult {
            winning_outcome: outcome,
            result_hash: Self::compute_result_hash(market_id, outcome, payload),
        };
        self.results.insert(market_id, result.clone());
        result
    }
}

impl Default for MemoryResultOracle {
    fn default() -> Self {
        Self::new(RESULT_ORACLE_ADDRESS)
    }
}

impl ResultOracle for MemoryResultOracle {
    fn address(&self) -> &str {
        &self.address
    }

    fn latest_result(&self, market_id: MarketId) -> Result<OracleResult, CollaboratorError> {
        self.results
            .get(&market_id)
            .cloned()
            .ok_or(CollaboratorError::NoResult(market_id))
    }
}

// ============================================================================
// LIQUIDITY PROVIDER
// ============================================================================

/// Lends its own token balance to V2 markets, one open loan per borrower
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryLiquidityProvider {
    pub address: Address,

    /// Refuse all new loans while false
    pub lending_enabled: bool,

    /// borrower -> outstanding principal
    pub outstanding: BTreeMap<Address, Amount>,

    /// Revenue received across all repaid loans
    pub total_revenue: Amount,
}

impl MemoryLiquidityProvider {
    pub fn new(address: &str) -> Self {
        Self {
            address: address.to_string(),
            lending_enabled: true,
            outstanding: BTreeMap::new(),
            total_revenue: 0,
        }
    }

    pub fn outstanding_for(&self, borrower: &str) -> Amount {
        self.outstanding.get(borrower).copied().unwrap_or(0)
    }
}

impl Default for MemoryLiquidityProvider {
    fn default() -> Self {
        Self::new(LIQUIDITY_PROVIDER_ADDRESS)
    }
}

impl LiquidityProvider for MemoryLiquidityProvider {
    fn address(&self) -> &str {
        &self.address
    }

    fn borrow(&mut self, ledger: &mut dyn TokenLedger, token: &str, borrower: &str, amount: Amount) -> bool {
        if !self.lending_enabled || amount == 0 || self.outstanding.contains_key(borrower) {
            return false;
        }
        let lender = self.address.clone();
        if ledger.transfer(token, &lender, borrower, amount).is_err() {
            return false;
        }
        self.outstanding.insert(borrower.to_string(), amount);
        true
    }

    fn repay(
        &mut self,
        ledger: &mut dyn TokenLedger,
        token: &str,
        borrower: &str,
        principal: Amount,
        revenue: Amount,
    ) -> bool {
        if self.outstanding_for(borrower) != principal {
            return false;
        }
        let Some(total) = principal.checked_add(revenue) else {
            return false;
        };
        let lender = self.address.clone();
        if ledger.transfer(token, borrower, &lender, total).is_err() {
            return false;
        }
        self.outstanding.remove(borrower);
        self.total_revenue = self.total_revenue.saturating_add(revenue);
        true
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_moves_balance() {
        let mut token = MemoryToken::new();
        token.mint("USDC", "alice", 100).unwrap();

        token.transfer("USDC", "alice", "bob", 40).unwrap();
        assert_eq!(token.balance_of("USDC", "alice"), 60);
        assert_eq!(token.balance_of("USDC", "bob"), 40);
        assert_eq!(token.total_supply("USDC"), 100);
    }

    #[test]
    fn test_transfer_insufficient_balance_leaves_state() {
        let mut token = MemoryToken::new();
        token.mint("USDC", "alice", 10).unwrap();

        let err = token.transfer("USDC", "alice", "bob", 11).unwrap_err();
        assert!(matches!(err, CollaboratorError::InsufficientBalance { available: 10, required: 11, .. }));
        assert_eq!(token.balance_of("USDC", "alice"), 10);
        assert_eq!(token.balance_of("USDC", "bob"), 0);
    }

    #[test]
    fn test_transfer_from_spends_allowance() {
        let mut token = MemoryToken::new();
        token.mint("USDC", "alice", 100).unwrap();
        token.approve("USDC", "alice", "router", 50).unwrap();

        token.transfer_from("USDC", "router", "alice", "treasury", 30).unwrap();
        assert_eq!(token.allowance("USDC", "alice", "router"), 20);
        assert_eq!(token.balance_of("USDC", "treasury"), 30);

        let err = token.transfer_from("USDC", "router", "alice", "treasury", 30).unwrap_err();
        assert!(matches!(err, CollaboratorError::InsufficientAllowance { .. }));
    }

    #[test]
    fn test_referral_register_caps_bps() {
        let mut registry = MemoryReferralRegistry::default();
        let err = registry.register("alice", Some("carol"), MAX_REFERRAL_BPS + 1).unwrap_err();
        assert_eq!(
            err,
            CollaboratorError::InvalidReferralBps { provided: MAX_REFERRAL_BPS + 1, max: MAX_REFERRAL_BPS }
        );

        registry.register("alice", Some("carol"), 1000).unwrap();
        assert_eq!(registry.referrer_of("alice"), Some("carol".to_string()));
        assert_eq!(registry.get_referral_bps("alice"), 1000);
        assert_eq!(registry.get_referral_bps("bob"), 0);
    }

    #[test]
    fn test_result_hash_is_deterministic() {
        let mut oracle = MemoryResultOracle::default();
        let first = oracle.publish(7, 1, "final score 2-1");
        let again = MemoryResultOracle::compute_result_hash(7, 1, "final score 2-1");
        assert_eq!(first.result_hash, again);
        assert_eq!(first.result_hash.len(), 64);
        assert_ne!(first.result_hash, MemoryResultOracle::compute_result_hash(7, 0, "final score 2-1"));
        assert_eq!(oracle.latest_result(7).unwrap().winning_outcome, 1);
        assert_eq!(oracle.latest_result(8), Err(CollaboratorError::NoResult(8)));
    }

    #[test]
    fn test_lender_borrow_and_repay() {
        let mut token = MemoryToken::new();
        token.mint("USDC", LIQUIDITY_PROVIDER_ADDRESS, 1_000).unwrap();
        let mut lender = MemoryLiquidityProvider::default();

        assert!(lender.borrow(&mut token, "USDC", "market:1", 400));
        assert!(!lender.borrow(&mut token, "USDC", "market:1", 100));
        assert_eq!(token.balance_of("USDC", "market:1"), 400);

        token.mint("USDC", "market:1", 20).unwrap();
        assert!(!lender.repay(&mut token, "USDC", "market:1", 399, 20));
        assert!(lender.repay(&mut token, "USDC", "market:1", 400, 20));
        assert_eq!(token.balance_of("USDC", LIQUIDITY_PROVIDER_ADDRESS), 1_020);
        assert_eq!(lender.total_revenue, 20);
        assert_eq!(lender.outstanding_for("market:1"), 0);
    }

    #[test]
    fn test_lender_refuses_without_capital() {
        let mut token = MemoryToken::new();
        let mut lender = MemoryLiquidityProvider::default();
        assert!(!lender.borrow(&mut token, "USDC", "market:1", 400));
        assert_eq!(lender.outstanding_for("market:1"), 0);
    }
}
