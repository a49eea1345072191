// ============================================================================
// Events - Structured records of every committed state transition
// ============================================================================
//
// Operations push `Event`s into a per-call buffer. The engine appends the
// buffer to the `EventLog` only when the call commits, so a reverted call
// never leaves an event behind.
//
// ============================================================================

use serde::{Deserialize, Serialize};

use crate::models::{Address, Amount, Bps, MarketId, OutcomeId};

/// Serialized as `{"name": ..., "data": {...}}`. The name is written first,
/// so deserializing reads `data` in place without buffering, which keeps
/// `u128` amounts above `u64::MAX` intact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", content = "data")]
pub enum Event {
    // ===== SETTLEMENT TOKEN (host collaborator) =====
    Transfer {
        token: String,
        from: Address,
        to: Address,
        amount: Amount,
    },
    Approval {
        token: String,
        owner: Address,
        spender: Address,
        amount: Amount,
    },
    Minted {
        token: String,
        to: Address,
        amount: Amount,
    },
    ReferralRegistered {
        user: Address,
        referrer: Option<Address>,
        bps: Bps,
    },
    DiscountSet {
        user: Address,
        discount_bps: Bps,
    },
    OracleResultPublished {
        market_id: MarketId,
        winning_outcome: OutcomeId,
        result_hash: String,
    },

    // ===== FEE ROUTER =====
    FeeRouted {
        token: String,
        from: Address,
        referrer: Option<Address>,
        fee_amount: Amount,
        bet_amount: Amount,
        referral_amount: Amount,
        lp_amount: Amount,
        promo_amount: Amount,
        insurance_amount: Amount,
        treasury_amount: Amount,
    },
    BatchProcessed {
        token: String,
        total: u32,
        success: u32,
        failed: u32,
        failed_amount: Amount,
    },
    FeeSplitUpdated {
        lp_bps: Bps,
        promo_bps: Bps,
        insurance_bps: Bps,
        treasury_bps: Bps,
    },
    RecipientsUpdated {
        lp_vault: Address,
        promo_pool: Address,
        insurance_fund: Address,
        treasury: Address,
    },
    ReferralRegistryUpdated {
        registry: Address,
    },
    EmergencyWithdrawal {
        token: String,
        to: Address,
        amount: Amount,
    },
    RouterPaused {
        by: Address,
    },
    RouterUnpaused {
        by: Address,
    },
    OwnershipTransferred {
        previous_owner: Address,
        new_owner: Address,
    },

    // ===== MARKETS =====
    MarketCreated {
        market_id: MarketId,
        variant: String,
        admin: Address,
        outcome_count: u32,
        settlement_token: String,
    },
    BetPlaced {
        market_id: MarketId,
        user: Address,
        outcome_id: OutcomeId,
        amount: Amount,
        shares: Amount,
        fee: Amount,
    },
    MarketLocked {
        market_id: MarketId,
        by: Address,
    },
    Resolved {
        market_id: MarketId,
        winning_outcome: OutcomeId,
    },
    ResolvedWithOracle {
        market_id: MarketId,
        winning_outcome: OutcomeId,
        result_hash: String,
    },
    Finalized {
        market_id: MarketId,
    },
    Redeemed {
        market_id: MarketId,
        user: Address,
        outcome_id: OutcomeId,
        shares: Amount,
        payout: Amount,
    },
    LiquidityBorrowed {
        market_id: MarketId,
        provider: Address,
        amount: Amount,
    },
    BorrowFailed {
        market_id: MarketId,
        provider: Address,
        amount: Amount,
        reason: String,
    },
    LiquidityRepaid {
        market_id: MarketId,
        provider: Address,
        principal: Amount,
        revenue: Amount,
    },
    EmergencyUserWithdrawal {
        market_id: MarketId,
        user: Address,
        admin: Address,
        outcome_id: OutcomeId,
        shares: Amount,
        amount: Amount,
    },
    UnclaimedSwept {
        market_id: MarketId,
        to: Address,
        amount: Amount,
    },
}

impl Event {
    /// Event name as it appears in the log
    pub fn name(&self) -> &'static str {
        match self {
            Event::Transfer { .. } => "Transfer",
            Event::Approval { .. } => "Approval",
            Event::Minted { .. } => "Minted",
            Event::ReferralRegistered { .. } => "ReferralRegistered",
            Event::DiscountSet { .. } => "DiscountSet",
            Event::OracleResultPublished { .. } => "OracleResultPublished",
            Event::FeeRouted { .. } => "FeeRouted",
            Event::BatchProcessed { .. } => "BatchProcessed",
            Event::FeeSplitUpdated { .. } => "FeeSplitUpdated",
            Event::RecipientsUpdated { .. } => "RecipientsUpdated",
            Event::ReferralRegistryUpdated { .. } => "ReferralRegistryUpdated",
            Event::EmergencyWithdrawal { .. } => "EmergencyWithdrawal",
            Event::RouterPaused { .. } => "RouterPaused",
            Event::RouterUnpaused { .. } => "RouterUnpaused",
            Event::OwnershipTransferred { .. } => "OwnershipTransferred",
            Event::MarketCreated { .. } => "MarketCreated",
            Event::BetPlaced { .. } => "BetPlaced",
            Event::MarketLocked { .. } => "MarketLocked",
            Event::Resolved { .. } => "Resolved",
            Event::ResolvedWithOracle { .. } => "ResolvedWithOracle",
            Event::Finalized { .. } => "Finalized",
            Event::Redeemed { .. } => "Redeemed",
            Event::LiquidityBorrowed { .. } => "LiquidityBorrowed",
            Event::BorrowFailed { .. } => "BorrowFailed",
            Event::LiquidityRepaid { .. } => "LiquidityRepaid",
            Event::EmergencyUserWithdrawal { .. } => "EmergencyUserWithdrawal",
            Event::UnclaimedSwept { .. } => "UnclaimedSwept",
        }
    }

    /// Market the event belongs to, if any
    pub fn market_id(&self) -> Option<MarketId> {
        match self {
            Event::OracleResultPublished { market_id, .. }
            | Event::MarketCreated { market_id, .. }
            | Event::BetPlaced { market_id, .. }
            | Event::MarketLocked { market_id, .. }
            | Event::Resolved { market_id, .. }
            | Event::ResolvedWithOracle { market_id, .. }
            | Event::Finalized { market_id }
            | Event::Redeemed { market_id, .. }
            | Event::LiquidityBorrowed { market_id, .. }
            | Event::BorrowFailed { market_id, .. }
            | Event::LiquidityRepaid { market_id, .. }
            | Event::EmergencyUserWithdrawal { market_id, .. }
            | Event::UnclaimedSwept { market_id, .. } => Some(*market_id),
            _ => None,
        }
    }
}

/// An event as committed to the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Position in the log, starting at 0
    pub seq: u64,
    pub tx_id: String,
    pub caller: Address,
    pub timestamp: u64,
    pub event: Event,
}

/// Append-only event log
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventLog {
    records: Vec<EventRecord>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a committed call's events and return the stored records
    pub fn append(&mut self, tx_id: &str, caller: &str, timestamp: u64, events: Vec<Event>) -> Vec<EventRecord> {
        let start = self.records.len() as u64;
        let committed: Vec<EventRecord> = events
            .into_iter()
            .enumerate()
            .map(|(i, event)| EventRecord {
                seq: start + i as u64,
                tx_id: tx_id.to_string(),
                caller: caller.to_string(),
                timestamp,
                event,
            })
            .collect();
        self.records.extend(committed.iter().cloned());
        committed
    }

    /// Records with `seq >= from`, at most `limit` of them
    pub fn since(&self, from: u64, limit: usize) -> &[EventRecord] {
        let start = (from as usize).min(self.records.len());
        let end = start.saturating_add(limit).min(self.records.len());
        &self.records[start..end]
    }

    pub fn for_market(&self, market_id: MarketId) -> Vec<&EventRecord> {
        self.records
            .iter()
            .filter(|r| r.event.market_id() == Some(market_id))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn last(&self) -> Option<&EventRecord> {
        self.records.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_assigns_sequence_numbers() {
        let mut log = EventLog::new();
        log.append("tx_a", "owner", 10, vec![Event::Finalized { market_id: 1 }]);
        let records = log.append(
            "tx_b",
            "alice",
            11,
            vec![
                Event::MarketLocked { market_id: 2, by: "alice".into() },
                Event::Finalized { market_id: 2 },
            ],
        );

        assert_eq!(records[0].seq, 1);
        assert_eq!(records[1].seq, 2);
        assert_eq!(log.len(), 3);
        assert_eq!(log.since(1, 10).len(), 2);
        assert_eq!(log.since(99, 10).len(), 0);
        assert_eq!(log.for_market(2).len(), 2);
    }

    #[test]
    fn test_record_wire_shape() {
        let mut log = EventLog::new();
        let records = log.append("tx_a", "owner", 10, vec![Event::Finalized { market_id: 4 }]);
        let json = serde_json::to_value(&records[0]).unwrap();
        assert_eq!(json["event"]["name"], "Finalized");
        assert_eq!(json["event"]["data"]["market_id"], 4);
        assert_eq!(json["seq"], 0);
    }

    #[test]
    fn test_log_reloads_amounts_above_u64() {
        let amount: Amount = 100 * 10u128.pow(18);
        let mut log = EventLog::new();
        log.append(
            "tx_a",
            "owner",
            10,
            vec![Event::Minted {
                token: "USDC".into(),
                to: "alice".into(),
                amount,
            }],
        );

        let json = serde_json::to_string(&log).unwrap();
        let restored: EventLog = serde_json::from_str(&json).unwrap();
        assert_eq!(
            restored.last().map(|r| &r.event),
            Some(&Event::Minted {
                token: "USDC".into(),
                to: "alice".into(),
                amount,
            })
        );
    }
}
