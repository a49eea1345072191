// ============================================================================
// Positions - Outcome share balances
// ============================================================================
//
// Shares are a multi-token balance keyed by (account, outcome). The outcome
// index doubles as the token id. Supply per outcome always equals the sum
// of all holders' balances for it.
//
// ============================================================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::MarketError;
use crate::models::{Address, Amount, OutcomeId};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionBook {
    /// account -> outcome -> shares
    holdings: BTreeMap<Address, BTreeMap<OutcomeId, Amount>>,
    /// outcome -> total shares outstanding
    supply: Vec<Amount>,
}

impl PositionBook {
    pub fn new(outcome_count: u32) -> Self {
        Self {
            holdings: BTreeMap::new(),
            supply: vec![0; outcome_count as usize],
        }
    }

    pub fn balance_of(&self, account: &str, outcome: OutcomeId) -> Amount {
        self.holdings
            .get(account)
            .and_then(|h| h.get(&outcome))
            .copied()
            .unwrap_or(0)
    }

    pub fn supply_of(&self, outcome: OutcomeId) -> Amount {
        self.supply.get(outcome as usize).copied().unwrap_or(0)
    }

    pub fn supply(&self) -> &[Amount] {
        &self.supply
    }

    /// All non-zero positions of one account
    pub fn positions_of(&self, account: &str) -> BTreeMap<OutcomeId, Amount> {
        self.holdings.get(account).cloned().unwrap_or_default()
    }

    pub fn holder_count(&self) -> usize {
        self.holdings.len()
    }

    /// Mint shares to an account
    pub fn credit(&mut self, account: &str, outcome: OutcomeId, shares: Amount) -> Result<(), MarketError> {
        let outcome_count = self.supply.len() as u32;
        let supply = self
            .supply
            .get_mut(outcome as usize)
            .ok_or(MarketError::InvalidOutcome { outcome, outcome_count })?;
        let new_supply = supply.checked_add(shares).ok_or(MarketError::Overflow)?;

        let balance = self
            .holdings
            .entry(account.to_string())
            .or_default()
            .entry(outcome)
            .or_insert(0);
        *balance = balance.checked_add(shares).ok_or(MarketError::Overflow)?;
        *supply = new_supply;
        Ok(())
    }

    /// Burn shares from an account. Empty positions are dropped.
    pub fn debit(&mut self, account: &str, outcome: OutcomeId, shares: Amount) -> Result<(), MarketError> {
        let have = self.balance_of(account, outcome);
        if have < shares {
            return Err(MarketError::InsufficientShares { have, need: shares });
        }
        let supply = self.supply.get_mut(outcome as usize).ok_or(MarketError::Overflow)?;
        *supply = supply.checked_sub(shares).ok_or(MarketError::Overflow)?;

        if let Some(held) = self.holdings.get_mut(account) {
            let remaining = have - shares;
            if remaining == 0 {
                held.remove(&outcome);
            } else {
                held.insert(outcome, remaining);
            }
            if held.is_empty() {
                self.holdings.remove(account);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credit_and_debit() {
        let mut book = PositionBook::new(2);
        book.credit("alice", 0, 100).unwrap();
        book.credit("bob", 0, 50).unwrap();
        book.credit("alice", 1, 10).unwrap();

        assert_eq!(book.balance_of("alice", 0), 100);
        assert_eq!(book.supply_of(0), 150);
        assert_eq!(book.supply_of(1), 10);

        book.debit("alice", 0, 100).unwrap();
        assert_eq!(book.balance_of("alice", 0), 0);
        assert_eq!(book.supply_of(0), 50);
        assert_eq!(book.positions_of("alice").len(), 1);
    }

    #[test]
    fn test_debit_more_than_held_fails() {
        let mut book = PositionBook::new(2);
        book.credit("alice", 1, 5).unwrap();

        assert_eq!(
            book.debit("alice", 1, 6),
            Err(MarketError::InsufficientShares { have: 5, need: 6 })
        );
        assert_eq!(book.balance_of("alice", 1), 5);
        assert_eq!(book.supply_of(1), 5);
    }

    #[test]
    fn test_empty_account_is_removed() {
        let mut book = PositionBook::new(3);
        book.credit("carol", 2, 7).unwrap();
        book.debit("carol", 2, 7).unwrap();
        assert_eq!(book.holder_count(), 0);
    }

    #[test]
    fn test_unknown_outcome_rejected() {
        let mut book = PositionBook::new(2);
        assert!(book.credit("alice", 5, 1).is_err());
        assert_eq!(book.holder_count(), 0);
    }
}
