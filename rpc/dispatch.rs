//! Command and query dispatch onto the engine

use tracing::info;

use super::{CallOutput, Command, MarketSummary, Query, QueryResponse};
use crate::collaborators::{CollaboratorError, TokenLedger};
use crate::engine::Engine;
use crate::error::EngineError;
use crate::events::Event;
use crate::models::{is_zero_address, CallContext, BPS_DENOMINATOR};

impl Engine {
    /// Run one command against live state. Atomicity is provided by
    /// `execute`; this only routes.
    pub(crate) fn apply(
        &mut self,
        ctx: &CallContext,
        command: Command,
        events: &mut Vec<Event>,
    ) -> Result<CallOutput, EngineError> {
        let caller = ctx.caller.as_str();
        let now = ctx.timestamp;

        let output = match command {
            // ===== HOST COLLABORATORS =====
            Command::Mint { token, to, amount } => {
                self.ensure_owner(caller)?;
                self.token.mint(&token, &to, amount)?;
                info!(token = %token, to = %to, amount = %amount, "🪙 minted");
                events.push(Event::Minted { token, to, amount });
                CallOutput::Done
            }
            Command::Approve { token, spender, amount } => {
                self.token.approve(&token, caller, &spender, amount)?;
                events.push(Event::Approval {
                    token,
                    owner: caller.to_string(),
                    spender,
                    amount,
                });
                CallOutput::Done
            }
            Command::Transfer { token, to, amount } => {
                if is_zero_address(&to) {
                    return Err(CollaboratorError::ZeroAddress("transfer recipient").into());
                }
                self.token.transfer(&token, caller, &to, amount)?;
                events.push(Event::Transfer {
                    token,
                    from: caller.to_string(),
                    to,
                    amount,
                });
                CallOutput::Done
            }
            Command::RegisterReferral { user, referrer, bps } => {
                self.ensure_owner(caller)?;
                self.referrals.register(&user, referrer.as_deref(), bps)?;
                events.push(Event::ReferralRegistered { user, referrer, bps });
                CallOutput::Done
            }
            Command::SetDiscount { user, discount_bps } => {
                self.ensure_owner(caller)?;
                self.discounts.set_discount(&user, discount_bps);
                events.push(Event::DiscountSet {
                    user,
                    discount_bps: discount_bps.min(BPS_DENOMINATOR),
                });
                CallOutput::Done
            }
            Command::PublishResult {
                market_id,
                winning_outcome,
                payload,
            } => {
                self.ensure_owner(caller)?;
                let result = self.results.publish(market_id, winning_outcome, &payload);
                info!(market = market_id, outcome = winning_outcome, hash = %result.result_hash, "📡 oracle result published");
                events.push(Event::OracleResultPublished {
                    market_id,
                    winning_outcome,
                    result_hash: result.result_hash.clone(),
                });
                CallOutput::OracleResult(result)
            }
            Command::FundLender { token, amount } => {
                self.ensure_owner(caller)?;
                let lender = self.lender.address.clone();
                self.token.mint(&token, &lender, amount)?;
                events.push(Event::Minted {
                    token,
                    to: lender,
                    amount,
                });
                CallOutput::Done
            }
            Command::SetLendingEnabled { enabled } => {
                self.ensure_owner(caller)?;
                self.lender.lending_enabled = enabled;
                CallOutput::Done
            }

            // ===== FEE ROUTER =====
            Command::RouteFee {
                token,
                fee_amount,
                bet_amount,
            } => {
                let breakdown = self.fee_router.route_fee(
                    &mut self.token,
                    Some(&self.referrals),
                    &token,
                    caller,
                    fee_amount,
                    bet_amount,
                    events,
                )?;
                CallOutput::FeeRouted(breakdown)
            }
            Command::BatchRouteFee { token, users, amounts } => {
                let outcome = self.fee_router.batch_route_fee(
                    &mut self.token,
                    Some(&self.referrals),
                    &token,
                    &users,
                    &amounts,
                    events,
                )?;
                CallOutput::Batch(outcome)
            }
            Command::SetFeeSplit { split } => {
                self.fee_router.set_fee_split(caller, split, events)?;
                CallOutput::Done
            }
            Command::SetRecipients { recipients } => {
                self.fee_router.set_recipients(caller, recipients, events)?;
                CallOutput::Done
            }
            Command::SetReferralRegistry { registry } => {
                self.fee_router.set_referral_registry(caller, &registry, events)?;
                CallOutput::Done
            }
            Command::EmergencyWithdraw { token, to, amount } => {
                self.fee_router
                    .emergency_withdraw(&mut self.token, caller, &token, &to, amount, events)?;
                CallOutput::Done
            }
            Command::PauseRouter => {
                self.fee_router.pause(caller, events)?;
                CallOutput::Done
            }
            Command::UnpauseRouter => {
                self.fee_router.unpause(caller, events)?;
                CallOutput::Done
            }
            Command::TransferOwnership { new_owner } => {
                self.fee_router.transfer_ownership(caller, &new_owner, events)?;
                CallOutput::Done
            }

            // ===== MARKETS =====
            Command::CreateMarket { params } => {
                let market_id = self.create_market(ctx, params, events)?;
                CallOutput::MarketCreated { market_id }
            }
            Command::PlaceBet {
                market_id,
                outcome_id,
                amount,
            } => {
                let shares = self.place_bet(ctx, market_id, outcome_id, amount, None, events)?;
                CallOutput::Shares { shares }
            }
            Command::PlaceBetWithSlippage {
                market_id,
                outcome_id,
                amount,
                max_slippage_bps,
            } => {
                let shares = self.place_bet(ctx, market_id, outcome_id, amount, Some(max_slippage_bps), events)?;
                CallOutput::Shares { shares }
            }
            Command::LockMarket { market_id } => {
                self.market_mut(market_id)?.lock(now, caller, events)?;
                CallOutput::Done
            }
            Command::Resolve {
                market_id,
                winning_outcome,
            } => {
                self.market_mut(market_id)?.resolve(now, caller, winning_outcome, events)?;
                CallOutput::Done
            }
            Command::ResolveFromOracle { market_id } => {
                let Engine { results, markets, .. } = self;
                markets
                    .get_mut(&market_id)
                    .ok_or(EngineError::MarketNotFound(market_id))?
                    .resolve_from_oracle(now, results, events)?;
                CallOutput::Done
            }
            Command::Finalize { market_id } => {
                self.market_mut(market_id)?.finalize(now, events)?;
                CallOutput::Done
            }
            Command::Redeem {
                market_id,
                outcome_id,
                shares,
            } => {
                let Engine { token, markets, .. } = self;
                let amount = markets
                    .get_mut(&market_id)
                    .ok_or(EngineError::MarketNotFound(market_id))?
                    .redeem(token, caller, outcome_id, shares, events)?;
                CallOutput::Payout { amount }
            }
            Command::RepayLiquidity { market_id } => {
                let Engine {
                    token, lender, markets, ..
                } = self;
                let (principal, revenue) = markets
                    .get_mut(&market_id)
                    .ok_or(EngineError::MarketNotFound(market_id))?
                    .repay_liquidity(token, lender, caller, events)?;
                CallOutput::Repaid { principal, revenue }
            }
            Command::AddLiquidity {
                market_id,
                amount,
                weights,
            } => {
                self.market(market_id)?.add_liquidity(amount, &weights)?;
                CallOutput::Done
            }
            Command::EmergencyWithdrawUser {
                market_id,
                user,
                outcome_id,
                shares,
            } => {
                let Engine { token, markets, .. } = self;
                let amount = markets
                    .get_mut(&market_id)
                    .ok_or(EngineError::MarketNotFound(market_id))?
                    .emergency_withdraw_user(token, caller, &user, outcome_id, shares, events)?;
                CallOutput::Payout { amount }
            }
            Command::SweepUnclaimed { market_id, to } => {
                let Engine { token, markets, .. } = self;
                let amount = markets
                    .get_mut(&market_id)
                    .ok_or(EngineError::MarketNotFound(market_id))?
                    .sweep_unclaimed(token, caller, &to, events)?;
                CallOutput::Payout { amount }
            }
        };
        Ok(output)
    }

    /// Answer a read-only query at block time `now`
    pub fn query(&self, now: u64, query: Query) -> Result<QueryResponse, EngineError> {
        let response = match query {
            Query::Balance { token, account } => QueryResponse::Amount(self.token.balance_of(&token, &account)),
            Query::Allowance { token, owner, spender } => {
                QueryResponse::Amount(self.token.allowance(&token, &owner, &spender))
            }
            Query::RouterStatus => QueryResponse::Router {
                address: self.fee_router.address.clone(),
                owner: self.fee_router.owner.clone(),
                paused: self.fee_router.paused,
                referral_registry: self.fee_router.referral_registry.clone(),
            },
            Query::FeeSplit => QueryResponse::FeeSplit(self.fee_router.split),
            Query::Recipients => QueryResponse::Recipients(self.fee_router.recipients.clone()),
            Query::FeeStats { token } => QueryResponse::FeeStats(self.fee_router.fee_stats(&token)),
            Query::PreviewRoute { user, fee_amount } => QueryResponse::FeeBreakdown(
                self.fee_router
                    .preview_route(Some(&self.referrals), &user, fee_amount)?,
            ),
            Query::Markets => QueryResponse::Markets(self.markets.values().map(MarketSummary::from).collect()),
            Query::Market { market_id } => QueryResponse::Market(Box::new(self.market(market_id)?.clone())),
            Query::Position {
                market_id,
                user,
                outcome_id,
            } => QueryResponse::Amount(self.market(market_id)?.positions.balance_of(&user, outcome_id)),
            Query::QuoteBet {
                market_id,
                user,
                outcome_id,
                amount,
            } => QueryResponse::Quote(
                self.market(market_id)?
                    .quote_bet(&self.discounts, &user, outcome_id, amount)?,
            ),
            Query::ImpliedProbabilities { market_id } => {
                QueryResponse::Probabilities(self.market(market_id)?.implied_probabilities()?)
            }
            Query::CalculateFee {
                market_id,
                user,
                amount,
            } => {
                let market = self.market(market_id)?;
                QueryResponse::Fee {
                    fee: market.calculate_fee(&self.discounts, &user, amount)?,
                    effective_rate_bps: market.effective_fee_rate(&self.discounts, &user)?,
                }
            }
            Query::IsLocked { market_id } => QueryResponse::Locked(self.market(market_id)?.is_locked(now)),
            Query::ClaimValue {
                market_id,
                outcome_id,
                shares,
            } => QueryResponse::Amount(self.market(market_id)?.claim_value(outcome_id, shares)?),
        };
        Ok(response)
    }
}
