#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! # Myco-IAA
//! Inter-area agent (spec component C5): forwards every eligible child offer upward into the
//! parent market (adjusted by this area's grid fee) and, symmetrically, every eligible child
//! bid. When a forwarded order is accepted in the parent, the agent chains the trade down into
//! the child market on behalf of the true counterparty, rolling the parent-side trade back via
//! `Market::void_trade` if the child-side leg fails.
//!
//! Grounded on `original_source/.../market.py`'s one-hop forwarding behaviour and on
//! `barter_execution::simulated`'s request/response event shape for the chaining step.

pub mod error;

pub use error::IaaError;

use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use myco_fees::{fee_price, GridFeePolicy};
use myco_market::Market;
use myco_model::{ActorId, OrderId, Trade, TradeId};
use rust_decimal::Decimal;
use tracing::debug;

/// Minimum age, in ticks, a child order must reach before this agent will forward it upward.
/// Matches `myco_matching::DEFAULT_MIN_ORDER_AGE_TICKS`; kept as its own constant here since
/// forwarding and matching are independent concerns that happen to share a default (spec §4.5
/// "Forwarding respects MIN_OFFER_AGE/MIN_BID_AGE to avoid cycle amplification").
pub const DEFAULT_FORWARDING_MIN_AGE_TICKS: u64 = 2;

fn order_age_ok(market: &Market, id: &OrderId, min_age: u64) -> bool {
    market.order_age(id).map(|age| age >= min_age).unwrap_or(false)
}

/// One parent/child boundary. An `Area` with N children owns N of these, one per child.
#[derive(Debug)]
pub struct InterAreaAgent {
    pub grid_fee: GridFeePolicy,
    /// The actor identity this agent uses when posting forwarded orders into the parent market,
    /// standing in for the child area as a whole rather than exposing individual child traders.
    pub forwarding_actor: ActorId,
    offer_pipe: FnvHashMap<OrderId, OrderId>,
    parent_offer_origin: FnvHashMap<OrderId, OrderId>,
    bid_pipe: FnvHashMap<OrderId, OrderId>,
    parent_bid_origin: FnvHashMap<OrderId, OrderId>,
    fee_ledger: FnvHashMap<TradeId, Decimal>,
}

impl InterAreaAgent {
    pub fn new(grid_fee: GridFeePolicy, forwarding_actor: ActorId) -> Self {
        Self {
            grid_fee,
            forwarding_actor,
            offer_pipe: FnvHashMap::default(),
            parent_offer_origin: FnvHashMap::default(),
            bid_pipe: FnvHashMap::default(),
            parent_bid_origin: FnvHashMap::default(),
            fee_ledger: FnvHashMap::default(),
        }
    }

    pub fn is_forwarded_offer(&self, parent_offer_id: &OrderId) -> bool {
        self.parent_offer_origin.contains_key(parent_offer_id)
    }

    pub fn is_forwarded_bid(&self, parent_bid_id: &OrderId) -> bool {
        self.parent_bid_origin.contains_key(parent_bid_id)
    }

    /// Drops every forwarding pipe and fee ledger entry, for use at slot rotation once the
    /// child and parent markets it references have both been replaced.
    pub fn clear_pipes(&mut self) {
        self.offer_pipe.clear();
        self.parent_offer_origin.clear();
        self.bid_pipe.clear();
        self.parent_bid_origin.clear();
        self.fee_ledger.clear();
    }

    /// Hop fee charged against a parent-side trade that this agent chained down, or `ZERO` if
    /// the trade wasn't chained by this agent.
    pub fn fee_for(&self, parent_trade_id: &TradeId) -> Decimal {
        self.fee_ledger.get(parent_trade_id).copied().unwrap_or(Decimal::ZERO)
    }

    /// Upward offer pipe: posts a forwarded offer into `parent` for every eligible child offer
    /// not already forwarded, at `grid_fee.apply(offer.rate())`. Returns the newly forwarded
    /// parent-side offer ids.
    pub fn forward_offers(
        &mut self,
        child: &Market,
        parent: &mut Market,
        min_age_ticks: Option<u64>,
    ) -> Result<Vec<OrderId>, IaaError> {
        let min_age = min_age_ticks.unwrap_or(DEFAULT_FORWARDING_MIN_AGE_TICKS);
        let mut forwarded = Vec::new();

        let candidates: Vec<OrderId> = child.offers().map(|o| o.id.clone()).collect();
        for child_offer_id in candidates {
            if self.offer_pipe.contains_key(&child_offer_id) {
                continue;
            }
            if !order_age_ok(child, &child_offer_id, min_age) {
                continue;
            }
            let offer = child.offer(&child_offer_id).expect("just collected").clone();
            let forwarded_rate = self.grid_fee.apply(offer.rate());
            let forwarded_price = forwarded_rate * offer.energy;

            let parent_offer = parent.post_offer(
                offer.energy,
                forwarded_price,
                self.forwarding_actor.clone(),
                offer.seller_origin.clone(),
                forwarded_price,
                offer.attributes.clone(),
                offer.requirements.clone(),
            )?;
            debug!(
                child_offer = %child_offer_id,
                parent_offer = %parent_offer.id,
                rate = %forwarded_rate,
                "offer forwarded upward"
            );
            self.offer_pipe.insert(child_offer_id.clone(), parent_offer.id.clone());
            self.parent_offer_origin
                .insert(parent_offer.id.clone(), child_offer_id);
            forwarded.push(parent_offer.id);
        }
        Ok(forwarded)
    }

    /// Downward bid pipe, symmetric to `forward_offers`: the forwarded rate has this hop's fee
    /// backed out via `GridFeePolicy::invert`, so that chaining the resulting trade back down
    /// and re-applying the fee reproduces the child buyer's own rate.
    pub fn forward_bids(
        &mut self,
        child: &Market,
        parent: &mut Market,
        min_age_ticks: Option<u64>,
    ) -> Result<Vec<OrderId>, IaaError> {
        let min_age = min_age_ticks.unwrap_or(DEFAULT_FORWARDING_MIN_AGE_TICKS);
        let mut forwarded = Vec::new();

        let candidates: Vec<OrderId> = child.bids().map(|b| b.id.clone()).collect();
        for child_bid_id in candidates {
            if self.bid_pipe.contains_key(&child_bid_id) {
                continue;
            }
            if !order_age_ok(child, &child_bid_id, min_age) {
                continue;
            }
            let bid = child.bid(&child_bid_id).expect("just collected").clone();
            let forwarded_rate = self.grid_fee.invert(bid.rate());
            let forwarded_price = forwarded_rate * bid.energy;

            let parent_bid = parent.post_bid(
                bid.energy,
                forwarded_price,
                self.forwarding_actor.clone(),
                bid.buyer_origin.clone(),
                forwarded_price,
                forwarded_rate,
                bid.attributes.clone(),
                bid.requirements.clone(),
            )?;
            debug!(
                child_bid = %child_bid_id,
                parent_bid = %parent_bid.id,
                rate = %forwarded_rate,
                "bid forwarded upward"
            );
            self.bid_pipe.insert(child_bid_id.clone(), parent_bid.id.clone());
            self.parent_bid_origin.insert(parent_bid.id.clone(), child_bid_id);
            forwarded.push(parent_bid.id);
        }
        Ok(forwarded)
    }

    /// Chains a parent-side trade against a forwarded offer down into the child market. On
    /// success, re-establishes the forwarding pipe for any residual left on either side so a
    /// later partial fill continues to be tracked. On failure, rolls the parent trade back via
    /// `Market::void_trade` (spec §4.5 "transactional... rolled back via match_recommendations-
    /// style batch semantics") and returns the chain error.
    pub fn chain_offer_trade(
        &mut self,
        parent: &mut Market,
        child: &mut Market,
        parent_trade: &Trade,
        true_buyer: ActorId,
        time: Option<DateTime<Utc>>,
    ) -> Result<Trade, IaaError> {
        let child_offer_id = self
            .parent_offer_origin
            .get(&parent_trade.order_id)
            .cloned()
            .ok_or_else(|| IaaError::NotForwarded(parent_trade.order_id.clone()))?;

        match child.accept_offer(&child_offer_id, true_buyer, Some(parent_trade.traded_energy), time) {
            Ok(child_trade) => {
                let fee = fee_price(
                    child_trade.clearing_rate(),
                    std::slice::from_ref(&self.grid_fee),
                    child_trade.traded_energy,
                );
                self.fee_ledger.insert(parent_trade.id.clone(), fee);
                self.offer_pipe.remove(&child_offer_id);
                self.parent_offer_origin.remove(&parent_trade.order_id);

                if let Some(child_residual_id) = &child_trade.residual {
                    if let Some(parent_residual) = parent
                        .offers()
                        .find(|o| o.residual_of.as_ref() == Some(&parent_trade.order_id))
                    {
                        let parent_residual_id = parent_residual.id.clone();
                        self.offer_pipe
                            .insert(child_residual_id.clone(), parent_residual_id.clone());
                        self.parent_offer_origin
                            .insert(parent_residual_id, child_residual_id.clone());
                    }
                }
                Ok(child_trade)
            }
            Err(chain_err) => {
                parent.void_trade(&parent_trade.id).map_err(|source| IaaError::RollbackFailed {
                    parent_trade: parent_trade.id.clone(),
                    source,
                })?;
                Err(IaaError::Chain(chain_err))
            }
        }
    }

    /// Symmetric to `chain_offer_trade` for a parent-side trade against a forwarded bid.
    pub fn chain_bid_trade(
        &mut self,
        parent: &mut Market,
        child: &mut Market,
        parent_trade: &Trade,
        true_seller: ActorId,
        time: Option<DateTime<Utc>>,
    ) -> Result<Trade, IaaError> {
        let child_bid_id = self
            .parent_bid_origin
            .get(&parent_trade.order_id)
            .cloned()
            .ok_or_else(|| IaaError::NotForwarded(parent_trade.order_id.clone()))?;

        match child.accept_bid(&child_bid_id, true_seller, Some(parent_trade.traded_energy), time) {
            Ok(child_trade) => {
                let fee = fee_price(
                    child_trade.clearing_rate(),
                    std::slice::from_ref(&self.grid_fee),
                    child_trade.traded_energy,
                );
                self.fee_ledger.insert(parent_trade.id.clone(), fee);
                self.bid_pipe.remove(&child_bid_id);
                self.parent_bid_origin.remove(&parent_trade.order_id);

                if let Some(child_residual_id) = &child_trade.residual {
                    if let Some(parent_residual) = parent
                        .bids()
                        .find(|b| b.residual_of.as_ref() == Some(&parent_trade.order_id))
                    {
                        let parent_residual_id = parent_residual.id.clone();
                        self.bid_pipe
                            .insert(child_residual_id.clone(), parent_residual_id.clone());
                        self.parent_bid_origin
                            .insert(parent_residual_id, child_residual_id.clone());
                    }
                }
                Ok(child_trade)
            }
            Err(chain_err) => {
                parent.void_trade(&parent_trade.id).map_err(|source| IaaError::RollbackFailed {
                    parent_trade: parent_trade.id.clone(),
                    source,
                })?;
                Err(IaaError::Chain(chain_err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use myco_model::{MarketId, OrderAttributes, OrderRequirements};
    use rust_decimal_macros::dec;

    fn child_and_parent() -> (Market, Market) {
        (
            Market::new(MarketId::new("child"), Utc::now(), GridFeePolicy::default()),
            Market::new(MarketId::new("parent"), Utc::now(), GridFeePolicy::default()),
        )
    }

    #[test]
    fn forwards_offer_with_fee_adjusted_rate_and_chains_full_trade() {
        let (mut child, mut parent) = child_and_parent();
        let offer = child
            .post_offer(
                dec!(2),
                dec!(10),
                ActorId::new("seller"),
                ActorId::new("seller"),
                dec!(10),
                OrderAttributes::default(),
                OrderRequirements::default(),
            )
            .unwrap();
        child.set_current_tick(2);
        parent.set_current_tick(2);

        let mut iaa =
            InterAreaAgent::new(GridFeePolicy::constant(dec!(1)), ActorId::new("iaa-boundary"));
        let forwarded = iaa.forward_offers(&child, &mut parent, None).unwrap();
        assert_eq!(forwarded.len(), 1);
        let parent_offer_id = forwarded[0].clone();
        assert_eq!(parent.offer(&parent_offer_id).unwrap().rate(), dec!(6));

        let parent_trade = parent
            .accept_offer(&parent_offer_id, ActorId::new("true-buyer"), None, None)
            .unwrap();

        let child_trade = iaa
            .chain_offer_trade(
                &mut parent,
                &mut child,
                &parent_trade,
                ActorId::new("true-buyer"),
                None,
            )
            .unwrap();
        assert_eq!(child_trade.order_id, offer.id);
        assert_eq!(child_trade.traded_energy, dec!(2));
        assert_eq!(iaa.fee_for(&parent_trade.id), dec!(2)); // 2 kWh * fee(1)
        assert!(!iaa.is_forwarded_offer(&parent_offer_id));
    }

    #[test]
    fn partial_parent_accept_propagates_residual_on_both_sides() {
        let (mut child, mut parent) = child_and_parent();
        child
            .post_offer(
                dec!(4),
                dec!(40),
                ActorId::new("seller"),
                ActorId::new("seller"),
                dec!(40),
                OrderAttributes::default(),
                OrderRequirements::default(),
            )
            .unwrap();
        child.set_current_tick(2);
        parent.set_current_tick(2);

        let mut iaa = InterAreaAgent::new(GridFeePolicy::default(), ActorId::new("iaa-boundary"));
        let forwarded = iaa.forward_offers(&child, &mut parent, None).unwrap();
        let parent_offer_id = forwarded[0].clone();

        let parent_trade = parent
            .accept_offer(&parent_offer_id, ActorId::new("true-buyer"), Some(dec!(3)), None)
            .unwrap();
        let child_trade = iaa
            .chain_offer_trade(
                &mut parent,
                &mut child,
                &parent_trade,
                ActorId::new("true-buyer"),
                None,
            )
            .unwrap();

        let child_residual_id = child_trade.residual.expect("partial accept leaves a residual");
        assert_eq!(child.offer(&child_residual_id).unwrap().energy, dec!(1));
        assert!(iaa.is_forwarded_offer(
            &parent
                .offers()
                .find(|o| o.residual_of.is_some())
                .unwrap()
                .id
        ));
    }

    #[test]
    fn failed_chain_rolls_back_parent_trade() {
        let (mut child, mut parent) = child_and_parent();
        child
            .post_offer(
                dec!(2),
                dec!(10),
                ActorId::new("seller"),
                ActorId::new("seller"),
                dec!(10),
                OrderAttributes::default(),
                OrderRequirements::default(),
            )
            .unwrap();
        child.set_current_tick(2);
        parent.set_current_tick(2);

        let mut iaa = InterAreaAgent::new(GridFeePolicy::default(), ActorId::new("iaa-boundary"));
        let forwarded = iaa.forward_offers(&child, &mut parent, None).unwrap();
        let parent_offer_id = forwarded[0].clone();

        // The child offer vanishes (e.g. deleted) before the chain can run.
        let child_offer_id = child.offers().next().unwrap().id.clone();
        child.delete_offer(&child_offer_id).unwrap();

        let parent_trade = parent
            .accept_offer(&parent_offer_id, ActorId::new("true-buyer"), None, None)
            .unwrap();
        assert_eq!(parent.trades().len(), 1);

        let result = iaa.chain_offer_trade(
            &mut parent,
            &mut child,
            &parent_trade,
            ActorId::new("true-buyer"),
            None,
        );
        assert!(result.is_err());
        assert!(parent.trades().is_empty());
        assert!(parent.offer(&parent_offer_id).is_some());
    }
}
