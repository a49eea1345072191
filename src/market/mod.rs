// ============================================================================
// Market Module - Share-based outcome pools with a settlement lifecycle
// ============================================================================
//
// Lifecycle:
//
//   Open ──lock()──► Locked ──resolve()/resolve_from_oracle()──► Resolved
//     │                                    ▲                        │
//     └────────────────────────────────────┘       finalize() after dispute
//                                                                   ▼
//                                                               Finalized
//
// Status only moves forward. Bets are accepted while Open and before the
// betting deadline; redemptions once Resolved.
//
// Two variants share one state struct:
//   - Base: bets, lock, resolve, finalize, redeem
//   - V2:   adds kickoff gating, slippage-bounded bets, borrowed depth from
//           an external liquidity provider, and admin emergency exits
//
//   - pricing: share quotes over virtual + real outcome liquidity
//   - positions: per-user outcome share balances and supply
//   - fee_sink: where a bet's fee is sent (fee router or direct recipient)
//   - betting / lifecycle / redeem / liquidity: the operations
//
// ============================================================================

pub mod betting;
pub mod fee_sink;
pub mod lifecycle;
pub mod liquidity;
pub mod positions;
pub mod pricing;
pub mod redeem;

pub use betting::*;
pub use fee_sink::*;
pub use positions::*;
pub use pricing::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::collaborators::{CollaboratorError, DiscountOracle, LiquidityProvider, TokenLedger};
use crate::events::Event;
use crate::fee_router::FeeRouterError;
use crate::models::{is_zero_address, Address, Amount, Bps, MarketId, OutcomeId, BPS_DENOMINATOR};

// ============================================================================
// CONSTANTS
// ============================================================================

pub const MIN_OUTCOMES: u32 = 2;
pub const MAX_OUTCOMES: u32 = 32;

/// Highest fee rate a market may charge (10%)
pub const MAX_FEE_RATE_BPS: Bps = 1_000;

/// Virtual depth per outcome when the creator does not pick one
pub const DEFAULT_VIRTUAL_LIQUIDITY: Amount = 1_000;

// ============================================================================
// STATUS / VARIANT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    Open,
    Locked,
    Resolved,
    Finalized,
}

impl MarketStatus {
    pub fn is_resolved(&self) -> bool {
        matches!(self, MarketStatus::Resolved | MarketStatus::Finalized)
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            MarketStatus::Open => "🟢",
            MarketStatus::Locked => "🔒",
            MarketStatus::Resolved => "✅",
            MarketStatus::Finalized => "🏁",
        }
    }
}

impl fmt::Display for MarketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MarketStatus::Open => "open",
            MarketStatus::Locked => "locked",
            MarketStatus::Resolved => "resolved",
            MarketStatus::Finalized => "finalized",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketVariant {
    #[default]
    Base,
    V2,
}

impl fmt::Display for MarketVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarketVariant::Base => write!(f, "base"),
            MarketVariant::V2 => write!(f, "v2"),
        }
    }
}

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MarketError {
    #[error("Invalid market parameters: {0}")]
    InvalidParams(String),

    #[error("Zero address: {0}")]
    ZeroAddress(&'static str),

    #[error("Caller {caller} is not the market admin")]
    NotAdmin { caller: Address },

    #[error("Market is {actual}, expected {expected}")]
    StatusMismatch { expected: &'static str, actual: MarketStatus },

    #[error("Betting closed at {closes_at} (now {now})")]
    BettingClosed { now: u64, closes_at: u64 },

    #[error("Lock time {lock_at} not reached (now {now})")]
    LockNotReached { now: u64, lock_at: u64 },

    #[error("Market already resolved")]
    AlreadyResolved,

    #[error("Dispute period ends at {ends_at} (now {now})")]
    DisputePeriodActive { now: u64, ends_at: u64 },

    #[error("Borrowed liquidity of {borrowed} has not been repaid")]
    OutstandingLiquidity { borrowed: Amount },

    #[error("Outcome {outcome} out of range (market has {outcome_count})")]
    InvalidOutcome { outcome: OutcomeId, outcome_count: u32 },

    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Bet of {amount} is entirely consumed by a fee of {fee}")]
    BetTooSmall { amount: Amount, fee: Amount },

    #[error("Insufficient shares: have {have}, need {need}")]
    InsufficientShares { have: Amount, need: Amount },

    #[error("Price moved {deviation_bps} bps, limit {max_bps} bps")]
    SlippageExceeded { deviation_bps: Amount, max_bps: Bps },

    #[error("{0} is not supported")]
    Unsupported(&'static str),

    #[error("{0} is only available on V2 markets")]
    RequiresV2(&'static str),

    #[error("Market has no result oracle configured")]
    NoResultOracle,

    #[error("No borrowed liquidity outstanding")]
    NoBorrowOutstanding,

    #[error("Liquidity provider {provider} rejected repayment")]
    RepayRejected { provider: Address },

    #[error("Nothing to sweep")]
    NothingToSweep,

    #[error("Arithmetic overflow")]
    Overflow,

    #[error(transparent)]
    FeeRouting(#[from] FeeRouterError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

// ============================================================================
// PARAMETERS
// ============================================================================

fn default_virtual_liquidity() -> Amount {
    DEFAULT_VIRTUAL_LIQUIDITY
}

/// Creation parameters. The V2 fields must stay unset on base markets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketParams {
    #[serde(default)]
    pub variant: MarketVariant,
    /// Defaults to the creator
    #[serde(default)]
    pub admin: Option<Address>,
    pub outcome_count: u32,
    #[serde(default = "default_virtual_liquidity")]
    pub virtual_liquidity: Amount,
    pub lock_timestamp: u64,
    pub dispute_period: u64,
    pub fee_rate: Bps,
    pub fee_recipient: Address,
    #[serde(default)]
    pub result_oracle: Option<Address>,
    #[serde(default)]
    pub discount_oracle: Option<Address>,
    pub settlement_token: String,

    #[serde(default)]
    pub kickoff_time: Option<u64>,
    #[serde(default)]
    pub liquidity_provider: Option<Address>,
    #[serde(default)]
    pub borrow_target: Amount,
    #[serde(default)]
    pub revenue_share_bps: Bps,
}

impl MarketParams {
    /// Base market with no oracles wired in
    pub fn base(
        outcome_count: u32,
        settlement_token: &str,
        fee_rate: Bps,
        fee_recipient: &str,
        lock_timestamp: u64,
        dispute_period: u64,
    ) -> Self {
        Self {
            variant: MarketVariant::Base,
            admin: None,
            outcome_count,
            virtual_liquidity: DEFAULT_VIRTUAL_LIQUIDITY,
            lock_timestamp,
            dispute_period,
            fee_rate,
            fee_recipient: fee_recipient.to_string(),
            result_oracle: None,
            discount_oracle: None,
            settlement_token: settlement_token.to_string(),
            kickoff_time: None,
            liquidity_provider: None,
            borrow_target: 0,
            revenue_share_bps: 0,
        }
    }

    /// Turn these parameters into a V2 market
    pub fn v2(
        mut self,
        kickoff_time: u64,
        liquidity_provider: Option<&str>,
        borrow_target: Amount,
        revenue_share_bps: Bps,
    ) -> Self {
        self.variant = MarketVariant::V2;
        self.kickoff_time = Some(kickoff_time);
        self.liquidity_provider = liquidity_provider.map(str::to_string);
        self.borrow_target = borrow_target;
        self.revenue_share_bps = revenue_share_bps;
        self
    }

    pub fn with_oracles(mut self, result_oracle: Option<&str>, discount_oracle: Option<&str>) -> Self {
        self.result_oracle = result_oracle.map(str::to_string);
        self.discount_oracle = discount_oracle.map(str::to_string);
        self
    }

    fn validate(&self, now: u64) -> Result<(), MarketError> {
        if !(MIN_OUTCOMES..=MAX_OUTCOMES).contains(&self.outcome_count) {
            return Err(MarketError::InvalidParams(format!(
                "outcome_count must be between {} and {}, got {}",
                MIN_OUTCOMES, MAX_OUTCOMES, self.outcome_count
            )));
        }
        if self.fee_rate > MAX_FEE_RATE_BPS {
            return Err(MarketError::InvalidParams(format!(
                "fee_rate {} exceeds maximum {}",
                self.fee_rate, MAX_FEE_RATE_BPS
            )));
        }
        if is_zero_address(&self.fee_recipient) {
            return Err(MarketError::ZeroAddress("fee recipient"));
        }
        if matches!(self.admin.as_deref(), Some(a) if is_zero_address(a)) {
            return Err(MarketError::ZeroAddress("admin"));
        }
        if self.settlement_token.trim().is_empty() {
            return Err(MarketError::InvalidParams("settlement_token is required".into()));
        }
        if self.lock_timestamp <= now {
            return Err(MarketError::InvalidParams(format!(
                "lock_timestamp {} must be in the future (now {})",
                self.lock_timestamp, now
            )));
        }
        if self.virtual_liquidity == 0 {
            return Err(MarketError::InvalidParams("virtual_liquidity must be positive".into()));
        }

        match self.variant {
            MarketVariant::Base => {
                if self.kickoff_time.is_some()
                    || self.liquidity_provider.is_some()
                    || self.borrow_target > 0
                    || self.revenue_share_bps > 0
                {
                    return Err(MarketError::InvalidParams(
                        "kickoff and liquidity settings require a v2 market".into(),
                    ));
                }
            }
            MarketVariant::V2 => {
                match self.kickoff_time {
                    Some(kickoff) if kickoff > now => {}
                    Some(kickoff) => {
                        return Err(MarketError::InvalidParams(format!(
                            "kickoff_time {} must be in the future (now {})",
                            kickoff, now
                        )))
                    }
                    None => return Err(MarketError::InvalidParams("v2 markets need a kickoff_time".into())),
                }
                if self.revenue_share_bps > BPS_DENOMINATOR {
                    return Err(MarketError::InvalidParams(format!(
                        "revenue_share_bps {} exceeds {}",
                        self.revenue_share_bps, BPS_DENOMINATOR
                    )));
                }
                if matches!(self.liquidity_provider.as_deref(), Some(p) if is_zero_address(p)) {
                    return Err(MarketError::ZeroAddress("liquidity provider"));
                }
                if self.borrow_target > 0 && self.liquidity_provider.is_none() {
                    return Err(MarketError::InvalidParams(
                        "borrow_target needs a liquidity_provider".into(),
                    ));
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// STATE
// ============================================================================

/// Borrowing state carried by V2 markets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct V2State {
    pub kickoff_time: u64,
    pub liquidity_provider: Option<Address>,
    pub borrow_target: Amount,
    pub revenue_share_bps: Bps,
    pub borrowed_amount: Amount,
    pub liquidity_borrowed: bool,
    pub liquidity_repaid: bool,
    pub repaid_revenue: Amount,
}

impl V2State {
    /// Borrowed and not yet paid back
    pub fn outstanding(&self) -> bool {
        self.liquidity_borrowed && !self.liquidity_repaid
    }
}

/// Payout pool frozen at resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementPool {
    pub pool_total: Amount,
    pub pool_remaining: Amount,
    /// Winning supply at the moment of resolution
    pub winning_supply: Amount,
    pub winning_shares_remaining: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub id: MarketId,
    pub variant: MarketVariant,
    pub admin: Address,
    pub status: MarketStatus,
    pub outcome_count: u32,
    /// Net stakes per outcome
    pub outcome_liquidity: Vec<Amount>,
    pub total_liquidity: Amount,
    pub virtual_liquidity: Amount,
    pub lock_timestamp: u64,
    pub dispute_period: u64,
    pub winning_outcome: Option<OutcomeId>,
    pub resolved_at: Option<u64>,
    pub result_hash: Option<String>,
    pub fee_rate: Bps,
    pub fee_recipient: Address,
    pub result_oracle: Option<Address>,
    pub discount_oracle: Option<Address>,
    pub settlement_token: String,
    pub positions: PositionBook,
    pub settlement: Option<SettlementPool>,
    pub v2: Option<V2State>,
    pub created_at: u64,
    pub total_volume: Amount,
    pub total_fees: Amount,
}

/// Collaborators a bet needs, borrowed from the host for one call
pub struct MarketEnv<'a> {
    pub now: u64,
    pub ledger: &'a mut dyn TokenLedger,
    pub fees: &'a mut dyn FeeSink,
    pub discounts: &'a dyn DiscountOracle,
    pub lender: &'a mut dyn LiquidityProvider,
    pub events: &'a mut Vec<Event>,
}

/// Account holding a market's stakes and borrowed capital
pub fn vault_address(id: MarketId) -> Address {
    format!("market:{}", id)
}

impl Market {
    /// Validate `params` and build an Open market. Emits `MarketCreated`.
    pub fn create(
        id: MarketId,
        creator: &str,
        params: MarketParams,
        now: u64,
        events: &mut Vec<Event>,
    ) -> Result<Self, MarketError> {
        params.validate(now)?;

        let admin = params.admin.clone().unwrap_or_else(|| creator.to_string());
        let v2 = match params.variant {
            MarketVariant::Base => None,
            MarketVariant::V2 => Some(V2State {
                kickoff_time: params.kickoff_time.unwrap_or(params.lock_timestamp),
                liquidity_provider: params.liquidity_provider.clone(),
                borrow_target: params.borrow_target,
                revenue_share_bps: params.revenue_share_bps,
                borrowed_amount: 0,
                liquidity_borrowed: false,
                liquidity_repaid: false,
                repaid_revenue: 0,
            }),
        };

        events.push(Event::MarketCreated {
            market_id: id,
            variant: params.variant.to_string(),
            admin: admin.clone(),
            outcome_count: params.outcome_count,
            settlement_token: params.settlement_token.clone(),
        });

        Ok(Self {
            id,
            variant: params.variant,
            admin,
            status: MarketStatus::Open,
            outcome_count: params.outcome_count,
            outcome_liquidity: vec![0; params.outcome_count as usize],
            total_liquidity: 0,
            virtual_liquidity: params.virtual_liquidity,
            lock_timestamp: params.lock_timestamp,
            dispute_period: params.dispute_period,
            winning_outcome: None,
            resolved_at: None,
            result_hash: None,
            fee_rate: params.fee_rate,
            fee_recipient: params.fee_recipient,
            result_oracle: params.result_oracle,
            discount_oracle: params.discount_oracle,
            settlement_token: params.settlement_token,
            positions: PositionBook::new(params.outcome_count),
            settlement: None,
            v2,
            created_at: now,
            total_volume: 0,
            total_fees: 0,
        })
    }

    pub fn vault(&self) -> Address {
        vault_address(self.id)
    }

    pub fn is_v2(&self) -> bool {
        self.variant == MarketVariant::V2
    }

    /// Last second bets are accepted before (exclusive)
    pub fn betting_closes_at(&self) -> u64 {
        match &self.v2 {
            Some(v2) => self.lock_timestamp.min(v2.kickoff_time),
            None => self.lock_timestamp,
        }
    }

    /// V2: kickoff has passed, regardless of status.
    /// Base: no longer accepting bets.
    pub fn is_locked(&self, now: u64) -> bool {
        match &self.v2 {
            Some(v2) => now >= v2.kickoff_time,
            None => self.status != MarketStatus::Open || now >= self.lock_timestamp,
        }
    }

    pub fn has_outstanding_loan(&self) -> bool {
        self.v2.as_ref().map(V2State::outstanding).unwrap_or(false)
    }

    pub(crate) fn ensure_admin(&self, caller: &str) -> Result<(), MarketError> {
        if caller != self.admin {
            return Err(MarketError::NotAdmin {
                caller: caller.to_string(),
            });
        }
        Ok(())
    }

    pub(crate) fn ensure_outcome(&self, outcome: OutcomeId) -> Result<(), MarketError> {
        if outcome >= self.outcome_count {
            return Err(MarketError::InvalidOutcome {
                outcome,
                outcome_count: self.outcome_count,
            });
        }
        Ok(())
    }

    pub(crate) fn ensure_v2(&self, operation: &'static str) -> Result<(), MarketError> {
        if !self.is_v2() {
            return Err(MarketError::RequiresV2(operation));
        }
        Ok(())
    }
}
