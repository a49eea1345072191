// Where a bet's fee goes once it has been deducted

use super::MarketError;
use crate::collaborators::{ReferralRegistry, TokenLedger};
use crate::events::Event;
use crate::fee_router::FeeRouter;
use crate::models::{Address, Amount};

pub trait FeeSink {
    /// Collect `fee` of `token` from the bettor `from`
    fn route_fee(
        &mut self,
        ledger: &mut dyn TokenLedger,
        token: &str,
        from: &str,
        fee: Amount,
        bet_amount: Amount,
        events: &mut Vec<Event>,
    ) -> Result<(), MarketError>;
}

/// Fee recipient is the fee router: referral payout plus pool split
pub struct RouterFeeSink<'a> {
    pub router: &'a mut FeeRouter,
    pub registry: &'a dyn ReferralRegistry,
}

impl FeeSink for RouterFeeSink<'_> {
    fn route_fee(
        &mut self,
        ledger: &mut dyn TokenLedger,
        token: &str,
        from: &str,
        fee: Amount,
        bet_amount: Amount,
        events: &mut Vec<Event>,
    ) -> Result<(), MarketError> {
        self.router
            .route_fee(ledger, Some(self.registry), token, from, fee, bet_amount, events)?;
        Ok(())
    }
}

/// Fee recipient is a plain account: the market pulls the fee straight to it
pub struct DirectFeeSink {
    /// Market vault, spending the bettor's allowance
    pub spender: Address,
    pub recipient: Address,
}

impl FeeSink for DirectFeeSink {
    fn route_fee(
        &mut self,
        ledger: &mut dyn TokenLedger,
        token: &str,
        from: &str,
        fee: Amount,
        _bet_amount: Amount,
        _events: &mut Vec<Event>,
    ) -> Result<(), MarketError> {
        ledger.transfer_from(token, &self.spender, from, &self.recipient, fee)?;
        Ok(())
    }
}
