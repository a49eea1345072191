// ============================================================================
// Errors - Engine-level error and failure classes
// ============================================================================
//
// Every rejected call reverts in full. The class tells callers which kind of
// failure they hit; the reason is the stable condition name.
//
//   Configuration  invalid split, zero address, bad market parameters
//   Authorization  non-owner / non-admin caller, paused router
//   StateMachine   wrong-phase operation
//   ExternalCall   token transfer failure, oracle or lender unavailable
//   Arithmetic     caps, length mismatches, share shortfalls, overflow
//
// ============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::collaborators::CollaboratorError;
use crate::fee_router::FeeRouterError;
use crate::market::MarketError;
use crate::models::{Address, MarketId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    Configuration,
    Authorization,
    StateMachine,
    ExternalCall,
    Arithmetic,
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorClass::Configuration => "configuration",
            ErrorClass::Authorization => "authorization",
            ErrorClass::StateMachine => "state_machine",
            ErrorClass::ExternalCall => "external_call",
            ErrorClass::Arithmetic => "arithmetic",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Re-entrant call rejected")]
    Reentrancy,

    #[error("Caller {caller} is not the engine owner")]
    Unauthorized { caller: Address },

    #[error("Market {0} not found")]
    MarketNotFound(MarketId),

    #[error(transparent)]
    FeeRouter(#[from] FeeRouterError),

    #[error(transparent)]
    Market(#[from] MarketError),

    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

impl EngineError {
    pub fn class(&self) -> ErrorClass {
        match self {
            EngineError::Reentrancy => ErrorClass::StateMachine,
            EngineError::Unauthorized { .. } => ErrorClass::Authorization,
            EngineError::MarketNotFound(_) => ErrorClass::Configuration,
            EngineError::FeeRouter(e) => e.class(),
            EngineError::Market(e) => e.class(),
            EngineError::Collaborator(e) => e.class(),
        }
    }

    /// Condition name of the innermost error
    pub fn reason(&self) -> &'static str {
        match self {
            EngineError::Reentrancy => "Reentrancy",
            EngineError::Unauthorized { .. } => "Unauthorized",
            EngineError::MarketNotFound(_) => "MarketNotFound",
            EngineError::FeeRouter(e) => e.reason(),
            EngineError::Market(e) => e.reason(),
            EngineError::Collaborator(e) => e.reason(),
        }
    }
}

impl CollaboratorError {
    pub fn class(&self) -> ErrorClass {
        match self {
            CollaboratorError::InsufficientBalance { .. }
            | CollaboratorError::InsufficientAllowance { .. }
            | CollaboratorError::Unavailable(_)
            | CollaboratorError::NoResult(_) => ErrorClass::ExternalCall,
            CollaboratorError::ZeroAddress(_) => ErrorClass::Configuration,
            CollaboratorError::InvalidReferralBps { .. } | CollaboratorError::Overflow => ErrorClass::Arithmetic,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            CollaboratorError::InsufficientBalance { .. } => "InsufficientBalance",
            CollaboratorError::InsufficientAllowance { .. } => "InsufficientAllowance",
            CollaboratorError::Unavailable(_) => "CollaboratorUnavailable",
            CollaboratorError::NoResult(_) => "NoResult",
            CollaboratorError::InvalidReferralBps { .. } => "InvalidReferralBps",
            CollaboratorError::ZeroAddress(_) => "ZeroAddress",
            CollaboratorError::Overflow => "Overflow",
        }
    }
}

impl FeeRouterError {
    pub fn class(&self) -> ErrorClass {
        match self {
            FeeRouterError::InvalidFeeSplit { .. }
            | FeeRouterError::ZeroAddress(_)
            | FeeRouterError::DuplicateRecipient(_) => ErrorClass::Configuration,
            FeeRouterError::NotOwner { .. } | FeeRouterError::Paused => ErrorClass::Authorization,
            FeeRouterError::NotPaused => ErrorClass::StateMachine,
            FeeRouterError::InvalidReferralBps { .. }
            | FeeRouterError::ArrayLengthMismatch { .. }
            | FeeRouterError::BatchTooLarge { .. }
            | FeeRouterError::ReferrerNotSet { .. }
            | FeeRouterError::Overflow => ErrorClass::Arithmetic,
            FeeRouterError::Collaborator(e) => e.class(),
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            FeeRouterError::InvalidFeeSplit { .. } => "InvalidFeeSplit",
            FeeRouterError::InvalidReferralBps { .. } => "InvalidReferralBps",
            FeeRouterError::ZeroAddress(_) => "ZeroAddress",
            FeeRouterError::DuplicateRecipient(_) => "DuplicateRecipient",
            FeeRouterError::NotOwner { .. } => "NotOwner",
            FeeRouterError::Paused => "Paused",
            FeeRouterError::NotPaused => "NotPaused",
            FeeRouterError::ArrayLengthMismatch { .. } => "ArrayLengthMismatch",
            FeeRouterError::BatchTooLarge { .. } => "BatchTooLarge",
            FeeRouterError::ReferrerNotSet { .. } => "ReferrerNotSet",
            FeeRouterError::Overflow => "Overflow",
            FeeRouterError::Collaborator(e) => e.reason(),
        }
    }
}

impl MarketError {
    pub fn class(&self) -> ErrorClass {
        match self {
            MarketError::InvalidParams(_) | MarketError::ZeroAddress(_) | MarketError::NoResultOracle => {
                ErrorClass::Configuration
            }
            MarketError::NotAdmin { .. } => ErrorClass::Authorization,
            MarketError::StatusMismatch { .. }
            | MarketError::BettingClosed { .. }
            | MarketError::LockNotReached { .. }
            | MarketError::AlreadyResolved
            | MarketError::DisputePeriodActive { .. }
            | MarketError::OutstandingLiquidity { .. }
            | MarketError::Unsupported(_)
            | MarketError::RequiresV2(_)
            | MarketError::NoBorrowOutstanding
            | MarketError::NothingToSweep => ErrorClass::StateMachine,
            MarketError::InvalidOutcome { .. }
            | MarketError::ZeroAmount
            | MarketError::BetTooSmall { .. }
            | MarketError::InsufficientShares { .. }
            | MarketError::SlippageExceeded { .. }
            | MarketError::Overflow => ErrorClass::Arithmetic,
            MarketError::RepayRejected { .. } => ErrorClass::ExternalCall,
            MarketError::FeeRouting(e) => e.class(),
            MarketError::Collaborator(e) => e.class(),
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            MarketError::InvalidParams(_) => "InvalidParams",
            MarketError::ZeroAddress(_) => "ZeroAddress",
            MarketError::NotAdmin { .. } => "NotAdmin",
            MarketError::StatusMismatch { .. } => "StatusMismatch",
            MarketError::BettingClosed { .. } => "BettingClosed",
            MarketError::LockNotReached { .. } => "LockNotReached",
            MarketError::AlreadyResolved => "AlreadyResolved",
            MarketError::DisputePeriodActive { .. } => "DisputePeriodActive",
            MarketError::OutstandingLiquidity { .. } => "OutstandingLiquidity",
            MarketError::InvalidOutcome { .. } => "InvalidOutcome",
            MarketError::ZeroAmount => "ZeroAmount",
            MarketError::BetTooSmall { .. } => "BetTooSmall",
            MarketError::InsufficientShares { .. } => "InsufficientShares",
            MarketError::SlippageExceeded { .. } => "SlippageExceeded",
            MarketError::Unsupported(_) => "Unsupported",
            MarketError::RequiresV2(_) => "RequiresV2",
            MarketError::NoResultOracle => "NoResultOracle",
            MarketError::NoBorrowOutstanding => "NoBorrowOutstanding",
            MarketError::RepayRejected { .. } => "RepayRejected",
            MarketError::NothingToSweep => "NothingToSweep",
            MarketError::Overflow => "Overflow",
            MarketError::FeeRouting(e) => e.reason(),
            MarketError::Collaborator(e) => e.reason(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::MarketStatus;

    #[test]
    fn test_nested_errors_report_inner_reason() {
        let err: EngineError = MarketError::FeeRouting(FeeRouterError::Paused).into();
        assert_eq!(err.reason(), "Paused");
        assert_eq!(err.class(), ErrorClass::Authorization);

        let err: EngineError = FeeRouterError::Collaborator(CollaboratorError::Unavailable("registry".into())).into();
        assert_eq!(err.class(), ErrorClass::ExternalCall);
    }

    #[test]
    fn test_taxonomy() {
        assert_eq!(
            EngineError::from(FeeRouterError::InvalidFeeSplit { total: 9_999 }).class(),
            ErrorClass::Configuration
        );
        assert_eq!(
            EngineError::from(MarketError::StatusMismatch {
                expected: "open",
                actual: MarketStatus::Locked
            })
            .class(),
            ErrorClass::StateMachine
        );
        assert_eq!(
            EngineError::from(FeeRouterError::ArrayLengthMismatch { users: 2, amounts: 1 }).class(),
            ErrorClass::Arithmetic
        );
        assert_eq!(EngineError::Reentrancy.reason(), "Reentrancy");
    }
}
