//! Prediction market settlement engine
//!
//! A fee router that splits betting fees across four protocol pools and
//! referrers, and a market engine that prices bets, holds stakes and pays
//! out winners. Exports all modules for use as a library crate.

pub mod app_state;
pub mod collaborators;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod fee_router;
pub mod handlers;
pub mod market;
pub mod models;
pub mod routes;

#[path = "../rpc/mod.rs"]
pub mod rpc;

pub use app_state::{AppState, SharedState, StateError};
pub use collaborators::{
    CollaboratorError, DiscountOracle, LiquidityProvider, MemoryDiscountOracle, MemoryLiquidityProvider,
    MemoryReferralRegistry, MemoryResultOracle, MemoryToken, OracleResult, ReferralRegistry, ResultOracle,
    TokenLedger,
};
pub use config::EngineConfig;
pub use engine::{Engine, ReentrancyGuard, Receipt};
pub use error::{EngineError, ErrorClass};
pub use events::{Event, EventLog, EventRecord};
pub use fee_router::{BatchOutcome, FeeBreakdown, FeeRouter, FeeRouterError, FeeSplit, FeeStats, Recipients};
pub use market::{BetQuote, Market, MarketError, MarketParams, MarketStatus, MarketVariant};
pub use models::{Address, Amount, Bps, CallContext, MarketId, OutcomeId, BPS_DENOMINATOR};
pub use routes::build_router;
pub use rpc::{CallOutput, Command, MarketSummary, Query, QueryResponse};
