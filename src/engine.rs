// ============================================================================
// Engine - All-or-nothing execution over the router, markets and host state
// ============================================================================
//
// The engine plays the host ledger: it owns every piece of state (token
// balances, collaborators, fee router, markets, event log) and applies one
// call at a time.
//
//   execute(ctx, command)
//     ├─ re-entrancy guard: a nested call while busy is rejected
//     ├─ snapshot state
//     ├─ apply command, collecting events in a call buffer
//     ├─ Ok  → append buffer to the event log, return a receipt
//     └─ Err → restore snapshot, drop buffer, return the revert reason
//
// ============================================================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::collaborators::{
    MemoryDiscountOracle, MemoryLiquidityProvider, MemoryReferralRegistry, MemoryResultOracle, MemoryToken,
    REFERRAL_REGISTRY_ADDRESS,
};
use crate::error::EngineError;
use crate::events::{Event, EventLog, EventRecord};
use crate::fee_router::{FeeRouter, FeeSplit, Recipients};
use crate::market::{DirectFeeSink, FeeSink, Market, MarketEnv, MarketParams, RouterFeeSink};
use crate::models::{Address, Amount, Bps, CallContext, MarketId, OutcomeId};
use crate::rpc::{CallOutput, Command};

// ============================================================================
// RE-ENTRANCY GUARD
// ============================================================================

/// Busy flag held for the duration of a call. `execute(&mut self)` already
/// rules out nesting within this crate; the flag is for hosts whose
/// collaborators (a token hook, an oracle callback) call back into the
/// engine through a shared handle while a call is still running.
#[derive(Debug, Clone, Default)]
pub struct ReentrancyGuard {
    busy: bool,
}

impl ReentrancyGuard {
    pub fn enter(&mut self) -> Result<(), EngineError> {
        if self.busy {
            return Err(EngineError::Reentrancy);
        }
        self.busy = true;
        Ok(())
    }

    pub fn exit(&mut self) {
        self.busy = false;
    }

    pub fn is_busy(&self) -> bool {
        self.busy
    }
}

// ============================================================================
// RECEIPT
// ============================================================================

/// Result of a committed call
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_id: String,
    pub caller: Address,
    pub timestamp: u64,
    pub output: CallOutput,
    pub events: Vec<EventRecord>,
}

// ============================================================================
// ENGINE
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Engine {
    /// May create markets and operate the host collaborators
    pub owner: Address,
    pub token: MemoryToken,
    pub referrals: MemoryReferralRegistry,
    pub discounts: MemoryDiscountOracle,
    pub results: MemoryResultOracle,
    pub lender: MemoryLiquidityProvider,
    pub fee_router: FeeRouter,
    pub markets: BTreeMap<MarketId, Market>,
    pub next_market_id: MarketId,
    pub events: EventLog,
    #[serde(skip)]
    guard: ReentrancyGuard,
}

impl Engine {
    /// Fresh engine whose router reads the in-memory referral registry
    pub fn new(owner: &str, split: FeeSplit, recipients: Recipients) -> Result<Self, EngineError> {
        let fee_router = FeeRouter::new(owner, split, recipients)?.with_referral_registry(REFERRAL_REGISTRY_ADDRESS);

        Ok(Self {
            owner: owner.to_string(),
            token: MemoryToken::new(),
            referrals: MemoryReferralRegistry::default(),
            discounts: MemoryDiscountOracle::default(),
            results: MemoryResultOracle::default(),
            lender: MemoryLiquidityProvider::default(),
            fee_router,
            markets: BTreeMap::new(),
            next_market_id: 1,
            events: EventLog::new(),
            guard: ReentrancyGuard::default(),
        })
    }

    /// Apply one mutating call atomically
    pub fn execute(&mut self, ctx: &CallContext, command: Command) -> Result<Receipt, EngineError> {
        self.guard.enter()?;

        // the log is append-only and large; keep it out of the snapshot
        let log = std::mem::take(&mut self.events);
        let snapshot = self.clone();
        self.events = log;

        let method = command.name();
        let mut buffer = Vec::new();
        let result = self.apply(ctx, command, &mut buffer);

        let outcome = match result {
            Ok(output) => {
                let tx_id = format!("tx_{}", Uuid::new_v4().simple());
                let events = self.events.append(&tx_id, &ctx.caller, ctx.timestamp, buffer);
                debug!(tx_id = %tx_id, method, events = events.len(), "call committed");
                Ok(Receipt {
                    tx_id,
                    caller: ctx.caller.clone(),
                    timestamp: ctx.timestamp,
                    output,
                    events,
                })
            }
            Err(e) => {
                let log = std::mem::take(&mut self.events);
                *self = snapshot;
                self.events = log;
                warn!(caller = %ctx.caller, method, reason = e.reason(), error = %e, "❌ call reverted");
                Err(e)
            }
        };

        self.guard.exit();
        outcome
    }

    pub fn is_busy(&self) -> bool {
        self.guard.is_busy()
    }

    pub(crate) fn ensure_owner(&self, caller: &str) -> Result<(), EngineError> {
        if caller != self.owner {
            return Err(EngineError::Unauthorized {
                caller: caller.to_string(),
            });
        }
        Ok(())
    }

    pub fn market(&self, market_id: MarketId) -> Result<&Market, EngineError> {
        self.markets.get(&market_id).ok_or(EngineError::MarketNotFound(market_id))
    }

    pub(crate) fn market_mut(&mut self, market_id: MarketId) -> Result<&mut Market, EngineError> {
        self.markets
            .get_mut(&market_id)
            .ok_or(EngineError::MarketNotFound(market_id))
    }

    // ========================================================================
    // MARKET WIRING
    // ========================================================================

    pub(crate) fn create_market(
        &mut self,
        ctx: &CallContext,
        params: MarketParams,
        events: &mut Vec<Event>,
    ) -> Result<MarketId, EngineError> {
        self.ensure_owner(&ctx.caller)?;

        let id = self.next_market_id;
        let market = Market::create(id, &ctx.caller, params, ctx.timestamp, events)?;
        info!(
            market = id,
            variant = %market.variant,
            outcomes = market.outcome_count,
            token = %market.settlement_token,
            "{} market created",
            market.status.emoji()
        );
        self.markets.insert(id, market);
        self.next_market_id += 1;
        Ok(id)
    }

    /// Place a bet, sending the fee through the router when the market's fee
    /// recipient is the router, straight to the recipient otherwise
    pub(crate) fn place_bet(
        &mut self,
        ctx: &CallContext,
        market_id: MarketId,
        outcome: OutcomeId,
        amount: Amount,
        max_slippage_bps: Option<Bps>,
        events: &mut Vec<Event>,
    ) -> Result<Amount, EngineError> {
        let Engine {
            token,
            referrals,
            discounts,
            lender,
            fee_router,
            markets,
            ..
        } = self;
        let market = markets
            .get_mut(&market_id)
            .ok_or(EngineError::MarketNotFound(market_id))?;

        let mut router_sink;
        let mut direct_sink;
        let fees: &mut dyn FeeSink = if market.fee_recipient == fee_router.address {
            router_sink = RouterFeeSink {
                router: fee_router,
                registry: &*referrals,
            };
            &mut router_sink
        } else {
            direct_sink = DirectFeeSink {
                spender: market.vault(),
                recipient: market.fee_recipient.clone(),
            };
            &mut direct_sink
        };

        let mut env = MarketEnv {
            now: ctx.timestamp,
            ledger: token,
            fees,
            discounts: &*discounts,
            lender,
            events,
        };
        let shares = match max_slippage_bps {
            Some(max) => market.place_bet_with_slippage(&mut env, &ctx.caller, outcome, amount, max)?,
            None => market.place_bet(&mut env, &ctx.caller, outcome, amount)?,
        };
        Ok(shares)
    }
}
