//! Typed call and query envelopes
//!
//! Every operation the engine exposes is one variant here. On the wire a
//! command is `{"method": "...", "params": {...}}`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::collaborators::OracleResult;
use crate::fee_router::{BatchOutcome, FeeBreakdown, FeeSplit, FeeStats, Recipients};
use crate::market::{BetQuote, Market, MarketParams, MarketStatus, MarketVariant};
use crate::models::{Address, Amount, Bps, MarketId, OutcomeId};

/// Mutating transaction. The caller and block time travel separately in
/// the `CallContext`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "params", rename_all = "snake_case")]
pub enum Command {
    // ===== HOST COLLABORATORS =====
    /// Owner faucet
    Mint { token: String, to: Address, amount: Amount },
    Approve { token: String, spender: Address, amount: Amount },
    Transfer { token: String, to: Address, amount: Amount },
    RegisterReferral {
        user: Address,
        #[serde(default)]
        referrer: Option<Address>,
        bps: Bps,
    },
    SetDiscount { user: Address, discount_bps: Bps },
    PublishResult {
        market_id: MarketId,
        winning_outcome: OutcomeId,
        payload: String,
    },
    /// Owner mints lendable capital to the liquidity provider
    FundLender { token: String, amount: Amount },
    SetLendingEnabled { enabled: bool },

    // ===== FEE ROUTER =====
    RouteFee {
        token: String,
        fee_amount: Amount,
        bet_amount: Amount,
    },
    BatchRouteFee {
        token: String,
        users: Vec<Address>,
        amounts: Vec<Amount>,
    },
    SetFeeSplit { split: FeeSplit },
    SetRecipients { recipients: Recipients },
    SetReferralRegistry { registry: Address },
    EmergencyWithdraw { token: String, to: Address, amount: Amount },
    PauseRouter,
    UnpauseRouter,
    TransferOwnership { new_owner: Address },

    // ===== MARKETS =====
    CreateMarket { params: MarketParams },
    PlaceBet {
        market_id: MarketId,
        outcome_id: OutcomeId,
        amount: Amount,
    },
    PlaceBetWithSlippage {
        market_id: MarketId,
        outcome_id: OutcomeId,
        amount: Amount,
        max_slippage_bps: Bps,
    },
    LockMarket { market_id: MarketId },
    Resolve {
        market_id: MarketId,
        winning_outcome: OutcomeId,
    },
    ResolveFromOracle { market_id: MarketId },
    Finalize { market_id: MarketId },
    Redeem {
        market_id: MarketId,
        outcome_id: OutcomeId,
        shares: Amount,
    },
    RepayLiquidity { market_id: MarketId },
    AddLiquidity {
        market_id: MarketId,
        amount: Amount,
        #[serde(default)]
        weights: Vec<Amount>,
    },
    EmergencyWithdrawUser {
        market_id: MarketId,
        user: Address,
        outcome_id: OutcomeId,
        shares: Amount,
    },
    SweepUnclaimed { market_id: MarketId, to: Address },
}

impl Command {
    /// Method name as it appears on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Command::Mint { .. } => "mint",
            Command::Approve { .. } => "approve",
            Command::Transfer { .. } => "transfer",
            Command::RegisterReferral { .. } => "register_referral",
            Command::SetDiscount { .. } => "set_discount",
            Command::PublishResult { .. } => "publish_result",
            Command::FundLender { .. } => "fund_lender",
            Command::SetLendingEnabled { .. } => "set_lending_enabled",
            Command::RouteFee { .. } => "route_fee",
            Command::BatchRouteFee { .. } => "batch_route_fee",
            Command::SetFeeSplit { .. } => "set_fee_split",
            Command::SetRecipients { .. } => "set_recipients",
            Command::SetReferralRegistry { .. } => "set_referral_registry",
            Command::EmergencyWithdraw { .. } => "emergency_withdraw",
            Command::PauseRouter => "pause_router",
            Command::UnpauseRouter => "unpause_router",
            Command::TransferOwnership { .. } => "transfer_ownership",
            Command::CreateMarket { .. } => "create_market",
            Command::PlaceBet { .. } => "place_bet",
            Command::PlaceBetWithSlippage { .. } => "place_bet_with_slippage",
            Command::LockMarket { .. } => "lock_market",
            Command::Resolve { .. } => "resolve",
            Command::ResolveFromOracle { .. } => "resolve_from_oracle",
            Command::Finalize { .. } => "finalize",
            Command::Redeem { .. } => "redeem",
            Command::RepayLiquidity { .. } => "repay_liquidity",
            Command::AddLiquidity { .. } => "add_liquidity",
            Command::EmergencyWithdrawUser { .. } => "emergency_withdraw_user",
            Command::SweepUnclaimed { .. } => "sweep_unclaimed",
        }
    }
}

/// Typed return value of a committed command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallOutput {
    Done,
    MarketCreated { market_id: MarketId },
    Shares { shares: Amount },
    Payout { amount: Amount },
    FeeRouted(FeeBreakdown),
    Batch(BatchOutcome),
    Repaid { principal: Amount, revenue: Amount },
    OracleResult(OracleResult),
}

/// Read-only request. Never mutates state or emits events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "query", content = "params", rename_all = "snake_case")]
pub enum Query {
    Balance {
        token: String,
        account: Address,
    },
    Allowance {
        token: String,
        owner: Address,
        spender: Address,
    },
    RouterStatus,
    FeeSplit,
    Recipients,
    FeeStats {
        token: String,
    },
    PreviewRoute {
        user: Address,
        fee_amount: Amount,
    },
    Markets,
    Market {
        market_id: MarketId,
    },
    Position {
        market_id: MarketId,
        user: Address,
        outcome_id: OutcomeId,
    },
    QuoteBet {
        market_id: MarketId,
        user: Address,
        outcome_id: OutcomeId,
        amount: Amount,
    },
    ImpliedProbabilities {
        market_id: MarketId,
    },
    CalculateFee {
        market_id: MarketId,
        user: Address,
        amount: Amount,
    },
    IsLocked {
        market_id: MarketId,
    },
    ClaimValue {
        market_id: MarketId,
        outcome_id: OutcomeId,
        shares: Amount,
    },
}

/// One line per market in listings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSummary {
    pub market_id: MarketId,
    pub variant: MarketVariant,
    pub status: MarketStatus,
    pub outcome_count: u32,
    pub total_liquidity: Amount,
    pub settlement_token: String,
}

impl From<&Market> for MarketSummary {
    fn from(m: &Market) -> Self {
        Self {
            market_id: m.id,
            variant: m.variant,
            status: m.status,
            outcome_count: m.outcome_count,
            total_liquidity: m.total_liquidity,
            settlement_token: m.settlement_token.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryResponse {
    Amount(Amount),
    Router {
        address: Address,
        owner: Address,
        paused: bool,
        referral_registry: Option<Address>,
    },
    FeeSplit(FeeSplit),
    Recipients(Recipients),
    FeeStats(FeeStats),
    FeeBreakdown(FeeBreakdown),
    Markets(Vec<MarketSummary>),
    Market(Box<Market>),
    Quote(BetQuote),
    Probabilities(Vec<Decimal>),
    Fee { fee: Amount, effective_rate_bps: Bps },
    Locked(bool),
}
