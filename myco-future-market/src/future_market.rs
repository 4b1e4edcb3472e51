use crate::error::FutureMarketError;
use crate::horizon::Horizon;
use chrono::{DateTime, Utc};
use myco_fees::GridFeePolicy;
use myco_market::Market;
use myco_model::{ActorId, Bid, MarketId, Offer, OrderAttributes, OrderId, OrderRequirements, Trade};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::debug;

/// Per-slot sub-books for one look-ahead horizon (spec §4.6). Each slot is an ordinary `Market`;
/// `FutureMarket` only owns the collection and its rotation.
///
/// Grounded on `original_source/.../market/future.py::FutureMarket`. That source has two bugs
/// this crate does not reproduce (spec §9 Open Questions): `delete_offer` removed from
/// `slot_bid_mapping` instead of `slot_offer_mapping`, and `accept_bid`/`accept_offer` both
/// `return Trade` (the class) instead of the `trade` instance. Here `delete_offer` touches only
/// the offer book of its slot, and both accept methods return the `Trade` value produced by the
/// underlying `Market`.
#[derive(Debug)]
pub struct FutureMarket {
    pub horizon: Horizon,
    grid_fees: GridFeePolicy,
    slots: BTreeMap<DateTime<Utc>, Market>,
}

impl FutureMarket {
    pub fn new(horizon: Horizon, grid_fees: GridFeePolicy) -> Self {
        Self { horizon, grid_fees, slots: BTreeMap::new() }
    }

    pub fn future_market_slots(&self) -> impl Iterator<Item = &DateTime<Utc>> {
        self.slots.keys()
    }

    pub fn market(&self, slot: &DateTime<Utc>) -> Option<&Market> {
        self.slots.get(slot)
    }

    pub fn market_mut(&mut self, slot: &DateTime<Utc>) -> Option<&mut Market> {
        self.slots.get_mut(slot)
    }

    /// Idempotent: creates any missing slots up to the horizon, then deletes sub-books whose
    /// slot is now in the past. Calling twice with the same `now` leaves the set of open slots
    /// unchanged.
    pub fn rotate_future_markets(&mut self, now: DateTime<Utc>) {
        self.create_future_markets(now);
        self.delete_old_future_markets(now);
    }

    fn create_future_markets(&mut self, now: DateTime<Utc>) {
        let mut slot = self.horizon.first_slot_at_or_after(now);
        for _ in 0..self.horizon.slot_count() {
            self.slots.entry(slot).or_insert_with(|| {
                debug!(slot = %slot, "future market slot opened");
                Market::new(MarketId::new(format!("future-{slot}")), slot, self.grid_fees)
            });
            slot = self.horizon.step(slot);
        }
    }

    fn delete_old_future_markets(&mut self, now: DateTime<Utc>) {
        let stale: Vec<DateTime<Utc>> =
            self.slots.keys().filter(|slot| **slot < now).copied().collect();
        for slot in stale {
            self.slots.remove(&slot);
            debug!(slot = %slot, "future market slot rotated out");
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub fn post_offer(
        &mut self,
        slot: &DateTime<Utc>,
        energy: Decimal,
        price: Decimal,
        seller: ActorId,
        seller_origin: ActorId,
        attributes: OrderAttributes,
        requirements: OrderRequirements,
    ) -> Result<Offer, FutureMarketError> {
        let market = self
            .slots
            .get_mut(slot)
            .ok_or(FutureMarketError::UnknownSlot(*slot))?;
        market
            .post_offer(energy, price, seller, seller_origin, price, attributes, requirements)
            .map_err(Into::into)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn post_bid(
        &mut self,
        slot: &DateTime<Utc>,
        energy: Decimal,
        price: Decimal,
        buyer: ActorId,
        buyer_origin: ActorId,
        final_buying_rate: Decimal,
        attributes: OrderAttributes,
        requirements: OrderRequirements,
    ) -> Result<Bid, FutureMarketError> {
        let market = self
            .slots
            .get_mut(slot)
            .ok_or(FutureMarketError::UnknownSlot(*slot))?;
        market
            .post_bid(energy, price, buyer, buyer_origin, price, final_buying_rate, attributes, requirements)
            .map_err(Into::into)
    }

    /// Removes an offer from its slot's offer book. Unlike the source this is grounded on, this
    /// never touches the bid book of the slot.
    pub fn delete_offer(
        &mut self,
        slot: &DateTime<Utc>,
        id: &OrderId,
    ) -> Result<Offer, FutureMarketError> {
        let market = self
            .slots
            .get_mut(slot)
            .ok_or(FutureMarketError::UnknownSlot(*slot))?;
        market.delete_offer(id).map_err(Into::into)
    }

    pub fn delete_bid(&mut self, slot: &DateTime<Utc>, id: &OrderId) -> Result<Bid, FutureMarketError> {
        let market = self
            .slots
            .get_mut(slot)
            .ok_or(FutureMarketError::UnknownSlot(*slot))?;
        market.delete_bid(id).map_err(Into::into)
    }

    /// Returns the `Trade` produced by the accept, not the `Trade` type.
    pub fn accept_offer(
        &mut self,
        slot: &DateTime<Utc>,
        id: &OrderId,
        buyer: ActorId,
        energy: Option<Decimal>,
        time: Option<DateTime<Utc>>,
    ) -> Result<Trade, FutureMarketError> {
        let market = self
            .slots
            .get_mut(slot)
            .ok_or(FutureMarketError::UnknownSlot(*slot))?;
        market.accept_offer(id, buyer, energy, time).map_err(Into::into)
    }

    pub fn accept_bid(
        &mut self,
        slot: &DateTime<Utc>,
        id: &OrderId,
        seller: ActorId,
        energy: Option<Decimal>,
        time: Option<DateTime<Utc>>,
    ) -> Result<Trade, FutureMarketError> {
        let market = self
            .slots
            .get_mut(slot)
            .ok_or(FutureMarketError::UnknownSlot(*slot))?;
        market.accept_bid(id, seller, energy, time).map_err(Into::into)
    }
}
