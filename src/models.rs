// Shared primitive types for the fee router and market engine

use serde::{Deserialize, Serialize};

/// Account identifier on the host ledger
pub type Address = String;

/// Token amounts are integer base units
pub type Amount = u128;

/// Basis points (1/100 of a percent)
pub type Bps = u32;

pub type MarketId = u64;

/// Outcome index, also the token id of its shares
pub type OutcomeId = u32;

/// 10000 bps = 100%
pub const BPS_DENOMINATOR: Bps = 10_000;

pub const ZERO_ADDRESS: &str = "0x0000000000000000000000000000000000000000";

pub fn is_zero_address(address: &str) -> bool {
    address.trim().is_empty() || address == ZERO_ADDRESS
}

/// `amount * bps / 10000`, floored. None on overflow.
pub fn apply_bps(amount: Amount, bps: Bps) -> Option<Amount> {
    amount
        .checked_mul(bps as Amount)
        .map(|v| v / BPS_DENOMINATOR as Amount)
}

/// `a * b / d`, floored. None on overflow or zero divisor.
pub fn mul_div(a: Amount, b: Amount, d: Amount) -> Option<Amount> {
    if d == 0 {
        return None;
    }
    a.checked_mul(b).map(|v| v / d)
}

/// Opaque caller/transaction context supplied by the host ledger with every call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    /// Account that signed the call
    pub caller: Address,

    /// Block time in unix seconds
    pub timestamp: u64,
}

impl CallContext {
    pub fn new(caller: impl Into<Address>, timestamp: u64) -> Self {
        Self {
            caller: caller.into(),
            timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_address() {
        assert!(is_zero_address(""));
        assert!(is_zero_address("   "));
        assert!(is_zero_address(ZERO_ADDRESS));
        assert!(!is_zero_address("treasury"));
    }

    #[test]
    fn test_apply_bps_floors() {
        assert_eq!(apply_bps(1000, 200), Some(20));
        assert_eq!(apply_bps(99, 100), Some(0));
        assert_eq!(apply_bps(u128::MAX, 2), None);
    }

    #[test]
    fn test_mul_div() {
        assert_eq!(mul_div(10, 3, 4), Some(7));
        assert_eq!(mul_div(10, 3, 0), None);
    }
}
