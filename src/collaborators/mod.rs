// ============================================================================
// Collaborators Module - External Contracts the Engine Calls Into
// ============================================================================
//
// The fee router and the markets never own token balances, referral data,
// oracle answers or lender capital themselves. They reach them through the
// traits below:
//   - TokenLedger: fungible settlement token (transfer / approve semantics)
//   - ReferralRegistry: referrer and referral rate per user
//   - DiscountOracle: per-user fee discount
//   - ResultOracle: market outcome plus a verifiable result hash
//   - LiquidityProvider: external capital for V2 markets
//
// memory: in-process implementations used by the engine host and tests
//
// ============================================================================

pub mod memory;

pub use memory::*;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{Address, Amount, Bps, MarketId, OutcomeId};

// ============================================================================
// ERRORS
// ============================================================================

/// Failure reported by an external collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("Insufficient balance of {token} for {account}: have {available}, need {required}")]
    InsufficientBalance {
        token: String,
        account: Address,
        available: Amount,
        required: Amount,
    },

    #[error("Insufficient allowance of {token} from {owner} to {spender}: have {available}, need {required}")]
    InsufficientAllowance {
        token: String,
        owner: Address,
        spender: Address,
        available: Amount,
        required: Amount,
    },

    #[error("No contract deployed at {0}")]
    Unavailable(Address),

    #[error("No result published for market {0}")]
    NoResult(MarketId),

    #[error("Referral bps {provided} exceeds maximum {max}")]
    InvalidReferralBps { provided: Bps, max: Bps },

    #[error("Zero address: {0}")]
    ZeroAddress(&'static str),

    #[error("Balance overflow")]
    Overflow,
}

// ============================================================================
// TRAITS
// ============================================================================

/// Fungible settlement token ledger, keyed by token symbol
pub trait TokenLedger {
    fn balance_of(&self, token: &str, account: &str) -> Amount;

    fn allowance(&self, token: &str, owner: &str, spender: &str) -> Amount;

    /// Move funds the caller (`from`) controls directly
    fn transfer(&mut self, token: &str, from: &str, to: &str, amount: Amount) -> Result<(), CollaboratorError>;

    /// Move funds on behalf of `from`, spending `spender`'s allowance
    fn transfer_from(
        &mut self,
        token: &str,
        spender: &str,
        from: &str,
        to: &str,
        amount: Amount,
    ) -> Result<(), CollaboratorError>;
}

pub trait ReferralRegistry {
    /// Address the registry is deployed at
    fn address(&self) -> &str;

    fn referrer_of(&self, user: &str) -> Option<Address>;

    fn get_referral_bps(&self, user: &str) -> Bps;
}

pub trait DiscountOracle {
    fn address(&self) -> &str;

    /// Discount on the fee rate in bps (10000 = fee waived)
    fn discount_factor(&self, user: &str) -> Bps;
}

/// Result pulled from an oracle for oracle-driven resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleResult {
    pub winning_outcome: OutcomeId,
    /// Hex-encoded hash binding the resolution to the reported data
    pub result_hash: String,
}

pub trait ResultOracle {
    fn address(&self) -> &str;

    fn latest_result(&self, market_id: MarketId) -> Result<OracleResult, CollaboratorError>;
}

/// External capital source for V2 markets. Both calls report acceptance
/// with a bool; the provider moves the funds itself.
pub trait LiquidityProvider {
    fn address(&self) -> &str;

    fn borrow(&mut self, ledger: &mut dyn TokenLedger, token: &str, borrower: &str, amount: Amount) -> bool;

    fn repay(
        &mut self,
        ledger: &mut dyn TokenLedger,
        token: &str,
        borrower: &str,
        principal: Amount,
        revenue: Amount,
    ) -> bool;
}
