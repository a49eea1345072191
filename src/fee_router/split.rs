use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::{FeeRouterError, MAX_REFERRAL_BPS};
use crate::models::{apply_bps, is_zero_address, Address, Amount, Bps, BPS_DENOMINATOR};

/// Pool shares of the post-referral fee, in bps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplit {
    pub lp_bps: Bps,
    pub promo_bps: Bps,
    pub insurance_bps: Bps,
    pub treasury_bps: Bps,
}

impl FeeSplit {
    pub const fn new(lp_bps: Bps, promo_bps: Bps, insurance_bps: Bps, treasury_bps: Bps) -> Self {
        Self {
            lp_bps,
            promo_bps,
            insurance_bps,
            treasury_bps,
        }
    }

    /// Sum of the four components (u64 so huge inputs cannot wrap)
    pub fn total(&self) -> u64 {
        self.lp_bps as u64 + self.promo_bps as u64 + self.insurance_bps as u64 + self.treasury_bps as u64
    }

    pub fn validate(&self) -> Result<(), FeeRouterError> {
        let total = self.total();
        if total != BPS_DENOMINATOR as u64 {
            return Err(FeeRouterError::InvalidFeeSplit { total });
        }
        Ok(())
    }

    /// Parse "lp,promo,insurance,treasury"
    pub fn parse(s: &str) -> Result<Self, String> {
        let parts: Vec<Bps> = s
            .split(',')
            .map(|p| p.trim().parse::<Bps>().map_err(|e| format!("invalid bps '{}': {}", p.trim(), e)))
            .collect::<Result<_, _>>()?;
        match parts.as_slice() {
            [lp, promo, insurance, treasury] => Ok(Self::new(*lp, *promo, *insurance, *treasury)),
            _ => Err(format!("expected 4 comma-separated bps values, got {}", parts.len())),
        }
    }
}

impl Default for FeeSplit {
    fn default() -> Self {
        Self::new(4_000, 2_000, 1_000, 3_000)
    }
}

/// Where each pool's share is paid
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipients {
    pub lp_vault: Address,
    pub promo_pool: Address,
    pub insurance_fund: Address,
    pub treasury: Address,
}

impl Recipients {
    /// All four must be set and pairwise distinct
    pub fn validate(&self) -> Result<(), FeeRouterError> {
        let named = [
            ("lp vault", &self.lp_vault),
            ("promo pool", &self.promo_pool),
            ("insurance fund", &self.insurance_fund),
            ("treasury", &self.treasury),
        ];

        let mut seen = HashSet::new();
        for (name, address) in named {
            if is_zero_address(address) {
                return Err(FeeRouterError::ZeroAddress(name));
            }
            if !seen.insert(address.as_str()) {
                return Err(FeeRouterError::DuplicateRecipient(address.clone()));
            }
        }
        Ok(())
    }
}

impl Default for Recipients {
    fn default() -> Self {
        Self {
            lp_vault: "lp-vault".to_string(),
            promo_pool: "promo-pool".to_string(),
            insurance_fund: "insurance-fund".to_string(),
            treasury: "treasury".to_string(),
        }
    }
}

/// How a single fee is divided
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub referrer: Option<Address>,
    pub referral: Amount,
    pub lp: Amount,
    pub promo: Amount,
    pub insurance: Amount,
    pub treasury: Amount,
}

impl FeeBreakdown {
    /// Divide `fee_amount` given the payer's referral rate.
    ///
    /// The referral rate is clamped to `MAX_REFERRAL_BPS`. The treasury takes
    /// whatever the three floored pool shares leave over, so the parts always
    /// add back up to `fee_amount`.
    pub fn compute(
        fee_amount: Amount,
        referral_bps: Bps,
        referrer: Option<Address>,
        split: &FeeSplit,
    ) -> Result<Self, FeeRouterError> {
        let referral_bps = referral_bps.min(MAX_REFERRAL_BPS);
        let referral = apply_bps(fee_amount, referral_bps).ok_or(FeeRouterError::Overflow)?;
        let remainder = fee_amount - referral;

        let lp = apply_bps(remainder, split.lp_bps).ok_or(FeeRouterError::Overflow)?;
        let promo = apply_bps(remainder, split.promo_bps).ok_or(FeeRouterError::Overflow)?;
        let insurance = apply_bps(remainder, split.insurance_bps).ok_or(FeeRouterError::Overflow)?;
        let treasury = remainder
            .checked_sub(lp + promo + insurance)
            .ok_or(FeeRouterError::Overflow)?;

        Ok(Self {
            referrer: if referral > 0 { referrer } else { None },
            referral,
            lp,
            promo,
            insurance,
            treasury,
        })
    }

    pub fn total(&self) -> Result<Amount, FeeRouterError> {
        [self.lp, self.promo, self.insurance, self.treasury]
            .iter()
            .try_fold(self.referral, |acc, v| acc.checked_add(*v))
            .ok_or(FeeRouterError::Overflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_split_is_valid() {
        assert!(FeeSplit::default().validate().is_ok());
        assert_eq!(FeeSplit::default().total(), 10_000);
    }

    #[test]
    fn test_split_total_does_not_wrap() {
        let split = FeeSplit::new(u32::MAX, u32::MAX, 0, 0);
        assert_eq!(
            split.validate(),
            Err(FeeRouterError::InvalidFeeSplit { total: 2 * u32::MAX as u64 })
        );
    }

    #[test]
    fn test_parse_split() {
        assert_eq!(FeeSplit::parse("4000, 2000,1000,3000").unwrap(), FeeSplit::default());
        assert!(FeeSplit::parse("4000,2000,1000").is_err());
        assert!(FeeSplit::parse("a,b,c,d").is_err());
    }

    #[test]
    fn test_breakdown_without_referral() {
        // 200 bps fee on a 1000 unit bet
        let b = FeeBreakdown::compute(20, 0, None, &FeeSplit::default()).unwrap();
        assert_eq!(b.referral, 0);
        assert_eq!(b.lp, 8);
        assert_eq!(b.promo, 4);
        assert_eq!(b.insurance, 2);
        assert_eq!(b.treasury, 6);
        assert_eq!(b.total().unwrap(), 20);
    }

    #[test]
    fn test_treasury_absorbs_remainder() {
        let split = FeeSplit::new(3_333, 3_333, 3_333, 1);
        let b = FeeBreakdown::compute(100, 0, None, &split).unwrap();
        assert_eq!(b.lp + b.promo + b.insurance, 99);
        assert_eq!(b.treasury, 1);
        assert_eq!(b.total().unwrap(), 100);
    }

    #[test]
    fn test_breakdown_reconciles_for_many_amounts() {
        let split = FeeSplit::new(4_100, 1_900, 1_300, 2_700);
        for fee in (0..2_000u128).chain([u64::MAX as u128, 10u128.pow(30)]) {
            for bps in [0, 1, 999, 2_500, MAX_REFERRAL_BPS] {
                let b = FeeBreakdown::compute(fee, bps, Some("ref".into()), &split).unwrap();
                assert_eq!(b.total().unwrap(), fee, "fee {} bps {}", fee, bps);
            }
        }
    }

    #[test]
    fn test_referral_rate_is_capped() {
        let b = FeeBreakdown::compute(1_000, 9_000, Some("ref".into()), &FeeSplit::default()).unwrap();
        assert_eq!(b.referral, 500);
        assert_eq!(b.referrer.as_deref(), Some("ref"));
    }

    #[test]
    fn test_zero_referral_drops_referrer() {
        let b = FeeBreakdown::compute(1, 100, Some("ref".into()), &FeeSplit::default()).unwrap();
        assert_eq!(b.referral, 0);
        assert_eq!(b.referrer, None);
    }

    #[test]
    fn test_recipients_validation() {
        assert!(Recipients::default().validate().is_ok());
        let mut r = Recipients::default();
        r.treasury = String::new();
        assert_eq!(r.validate(), Err(FeeRouterError::ZeroAddress("treasury")));
    }
}
