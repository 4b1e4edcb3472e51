use crate::error::MarketError;
use crate::event::{Listener, MarketEvent, OrderEvent, OrderListener};
use chrono::{DateTime, Utc};
use fnv::FnvHashMap;
use indexmap::IndexMap;
use myco_fees::GridFeePolicy;
use myco_model::{
    split_residual_energy, AcceptedSide, ActorId, Bid, MarketId, Offer, OrderAttributes, OrderId,
    OrderRequirements, Trade, TradeId,
};
use rand::seq::SliceRandom;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

/// One accepted bid/offer pairing within a bulk `match_recommendations` application.
///
/// Grounded on spec §4.2/§4.8: the external matcher and the pay-as-clear engine both produce
/// batches of these instead of calling `accept_offer`/`accept_bid` one at a time, because the
/// clearing rate (`trade_rate`) is not necessarily either side's own posted rate.
#[derive(Debug, Clone)]
pub struct MatchRecommendation {
    pub offer_id: OrderId,
    pub bid_id: OrderId,
    pub trade_rate: Decimal,
    pub selected_energy: Decimal,
}

/// Per-`time_slot` order book and accounting ledger for one `Area`.
///
/// Exclusively owns its order maps and trade list (spec §3 Ownership): strategies and IAAs
/// hold only ids and must re-resolve through the market before acting.
///
/// Grounded on `original_source/.../market.py::Market` for the operations and on
/// `barter_execution`'s `AccountEvent`/`Tx` plumbing for the listener-notification mechanics.
#[derive(Debug)]
pub struct Market {
    pub id: MarketId,
    pub time_slot: DateTime<Utc>,
    pub grid_fees: GridFeePolicy,
    offers: IndexMap<OrderId, Offer>,
    bids: IndexMap<OrderId, Bid>,
    trades: Vec<Trade>,
    accounting: FnvHashMap<ActorId, Decimal>,
    ious: FnvHashMap<ActorId, FnvHashMap<ActorId, Decimal>>,
    readonly: bool,
    current_tick: u64,
    posted_tick: FnvHashMap<OrderId, u64>,
    listeners: Vec<Listener>,
    order_listeners: FnvHashMap<OrderId, Vec<OrderListener>>,
    undo_log: FnvHashMap<TradeId, UndoEntry>,
}

/// Enough of the pre-acceptance order state to restore it exactly, keyed by the `Trade` it
/// produced. Populated by `accept_offer`/`accept_bid` and consumed by `void_trade`.
#[derive(Debug, Clone)]
enum UndoEntry {
    Offer(Offer, Option<OrderId>),
    Bid(Bid, Option<OrderId>),
}

impl Market {
    pub fn new(id: MarketId, time_slot: DateTime<Utc>, grid_fees: GridFeePolicy) -> Self {
        Self {
            id,
            time_slot,
            grid_fees,
            offers: IndexMap::new(),
            bids: IndexMap::new(),
            trades: Vec::new(),
            accounting: FnvHashMap::default(),
            ious: FnvHashMap::default(),
            readonly: false,
            current_tick: 0,
            posted_tick: FnvHashMap::default(),
            listeners: Vec::new(),
            order_listeners: FnvHashMap::default(),
            undo_log: FnvHashMap::default(),
        }
    }

    pub fn add_listener(&mut self, listener: Listener) {
        self.listeners.push(listener);
    }

    pub fn add_order_listener(&mut self, id: OrderId, listener: OrderListener) {
        self.order_listeners.entry(id).or_default().push(listener);
    }

    /// Advances this market's notion of "now" for minimum-order-age enforcement (spec §4.3b).
    /// Called by the scheduler once per tick.
    pub fn set_current_tick(&mut self, tick: u64) {
        self.current_tick = tick;
    }

    pub fn current_tick(&self) -> u64 {
        self.current_tick
    }

    /// Age in ticks of the given order, or `None` if the order is unknown (already matched or
    /// never posted in this market).
    pub fn order_age(&self, id: &OrderId) -> Option<u64> {
        self.posted_tick
            .get(id)
            .map(|posted| self.current_tick.saturating_sub(*posted))
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// Transitions *open* -> *readonly* (spec §3 Lifecycle). Irreversible.
    pub fn mark_readonly(&mut self) {
        self.readonly = true;
    }

    fn notify(&self, event: MarketEvent) {
        // Deliver to the per-order listener first (mirrors the source's
        // Offer._call_listeners, invoked from within Market before the market-wide broadcast).
        if let MarketEvent::Trade(trade) = &event {
            self.fire_order_listeners(&trade.order_id, OrderEvent::Accepted);
        }

        // Listeners observe events in randomized order to prevent registration-order bias
        // (spec §4.2, §5).
        let mut order: Vec<&Listener> = self.listeners.iter().collect();
        order.shuffle(&mut rand::rng());
        for listener in order {
            listener(&event);
        }
    }

    fn fire_order_listeners(&self, id: &OrderId, event: OrderEvent) {
        if let Some(listeners) = self.order_listeners.get(id) {
            let mut order: Vec<&OrderListener> = listeners.iter().collect();
            order.shuffle(&mut rand::rng());
            for listener in order {
                listener(event);
            }
        }
    }

    fn fire_order_deleted(&self, id: &OrderId) {
        self.fire_order_listeners(id, OrderEvent::Deleted);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn post_offer(
        &mut self,
        energy: Decimal,
        price: Decimal,
        seller: ActorId,
        seller_origin: ActorId,
        original_price: Decimal,
        attributes: OrderAttributes,
        requirements: OrderRequirements,
    ) -> Result<Offer, MarketError> {
        if self.readonly {
            return Err(MarketError::ReadOnly);
        }
        Offer::validate(energy, price).map_err(MarketError::InvalidOffer)?;

        let offer = Offer::new(
            OrderId::next_residual(),
            self.time_slot,
            price,
            energy,
            seller,
            seller_origin,
            original_price,
            attributes,
            requirements,
            None,
        );
        self.posted_tick.insert(offer.id.clone(), self.current_tick);
        self.offers.insert(offer.id.clone(), offer.clone());
        info!(offer = %offer.id, rate = %offer.rate(), "offer posted");
        self.notify(MarketEvent::Offer(offer.clone()));
        Ok(offer)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn post_bid(
        &mut self,
        energy: Decimal,
        price: Decimal,
        buyer: ActorId,
        buyer_origin: ActorId,
        original_price: Decimal,
        final_buying_rate: Decimal,
        attributes: OrderAttributes,
        requirements: OrderRequirements,
    ) -> Result<Bid, MarketError> {
        if self.readonly {
            return Err(MarketError::ReadOnly);
        }
        Bid::validate(energy, price).map_err(MarketError::InvalidBid)?;

        let bid = Bid::new(
            OrderId::next_residual(),
            self.time_slot,
            price,
            energy,
            buyer,
            buyer_origin,
            original_price,
            final_buying_rate,
            attributes,
            requirements,
            None,
        );
        self.posted_tick.insert(bid.id.clone(), self.current_tick);
        self.bids.insert(bid.id.clone(), bid.clone());
        info!(bid = %bid.id, rate = %bid.rate(), "bid posted");
        self.notify(MarketEvent::Bid(bid.clone()));
        Ok(bid)
    }

    pub fn delete_offer(&mut self, id: &OrderId) -> Result<Offer, MarketError> {
        if self.readonly {
            return Err(MarketError::ReadOnly);
        }
        let offer = self
            .offers
            .shift_remove(id)
            .ok_or_else(|| MarketError::OfferNotFound(id.clone()))?;
        self.posted_tick.remove(id);
        debug!(offer = %offer.id, "offer deleted");
        self.fire_order_deleted(id);
        self.notify(MarketEvent::OfferDeleted(offer.clone()));
        Ok(offer)
    }

    pub fn delete_bid(&mut self, id: &OrderId) -> Result<Bid, MarketError> {
        if self.readonly {
            return Err(MarketError::ReadOnly);
        }
        let bid = self
            .bids
            .shift_remove(id)
            .ok_or_else(|| MarketError::BidNotFound(id.clone()))?;
        self.posted_tick.remove(id);
        debug!(bid = %bid.id, "bid deleted");
        self.fire_order_deleted(id);
        self.notify(MarketEvent::BidDeleted(bid.clone()));
        Ok(bid)
    }

    /// Accepts (fully or partially) an offer at the offer's own posted rate (pay-as-offer).
    /// Atomic: either the whole operation (residual re-insertion + trade + accounting) happens,
    /// or nothing does. Acquisition order is offer-then-trade: the offer book is mutated before
    /// the trade is recorded. A single-threaded scheduler makes this order observational only,
    /// but any future multi-threaded executor locking the two must take them in this order.
    pub fn accept_offer(
        &mut self,
        id: &OrderId,
        buyer: ActorId,
        energy: Option<Decimal>,
        time: Option<DateTime<Utc>>,
    ) -> Result<Trade, MarketError> {
        if self.readonly {
            return Err(MarketError::ReadOnly);
        }
        let offer = self
            .offers
            .get(id)
            .cloned()
            .ok_or_else(|| MarketError::OfferNotFound(id.clone()))?;

        let accepted_energy = energy.unwrap_or(offer.energy);
        let rate = offer.rate();
        let (trade, residual) =
            self.settle(id, accepted_energy, rate, offer.seller.clone(), buyer, time, true)?;

        let mut residual_id = None;
        if let Some(residual) = &residual {
            let residual_offer = Offer::new(
                residual.0.clone(),
                self.time_slot,
                residual.2,
                residual.1,
                offer.seller.clone(),
                offer.seller_origin.clone(),
                residual.2,
                offer.attributes.clone(),
                offer.requirements.clone(),
                Some(offer.id.clone()),
            );
            residual_id = Some(residual_offer.id.clone());
            self.posted_tick
                .insert(residual_offer.id.clone(), self.current_tick);
            self.offers.insert(residual_offer.id.clone(), residual_offer.clone());
            self.notify(MarketEvent::OfferChanged {
                existing: offer.clone(),
                residual: residual_offer,
            });
        }
        self.offers.shift_remove(id);
        self.posted_tick.remove(id);
        self.undo_log
            .insert(trade.id.clone(), UndoEntry::Offer(offer.clone(), residual_id));

        warn!(trade = %trade.id, energy = %trade.traded_energy, rate = %rate, "trade");
        self.notify(MarketEvent::Trade(trade.clone()));
        Ok(trade)
    }

    /// Accepts (fully or partially) a bid at the bid's own posted rate (pay-as-bid), symmetric
    /// to `accept_offer`. Same bid-then-trade acquisition order.
    pub fn accept_bid(
        &mut self,
        id: &OrderId,
        seller: ActorId,
        energy: Option<Decimal>,
        time: Option<DateTime<Utc>>,
    ) -> Result<Trade, MarketError> {
        if self.readonly {
            return Err(MarketError::ReadOnly);
        }
        let bid = self
            .bids
            .get(id)
            .cloned()
            .ok_or_else(|| MarketError::BidNotFound(id.clone()))?;

        let accepted_energy = energy.unwrap_or(bid.energy);
        let rate = bid.rate();
        let (trade, residual) =
            self.settle(id, accepted_energy, rate, seller, bid.buyer.clone(), time, false)?;

        let mut residual_id = None;
        if let Some(residual) = &residual {
            let residual_bid = Bid::new(
                residual.0.clone(),
                self.time_slot,
                residual.2,
                residual.1,
                bid.buyer.clone(),
                bid.buyer_origin.clone(),
                residual.2,
                bid.final_buying_rate,
                bid.attributes.clone(),
                bid.requirements.clone(),
                Some(bid.id.clone()),
            );
            residual_id = Some(residual_bid.id.clone());
            self.posted_tick
                .insert(residual_bid.id.clone(), self.current_tick);
            self.bids.insert(residual_bid.id.clone(), residual_bid.clone());
            self.notify(MarketEvent::BidChanged {
                existing: bid.clone(),
                residual: residual_bid,
            });
        }
        self.bids.shift_remove(id);
        self.posted_tick.remove(id);
        self.undo_log
            .insert(trade.id.clone(), UndoEntry::Bid(bid.clone(), residual_id));

        warn!(trade = %trade.id, energy = %trade.traded_energy, rate = %rate, "trade");
        self.notify(MarketEvent::Trade(trade.clone()));
        Ok(trade)
    }

    /// Reverses a trade previously produced by `accept_offer`/`accept_bid` in this market:
    /// restores accounting/IOUs, drops any residual it left behind, and re-inserts the original
    /// order exactly as it was before acceptance. Used by the inter-area agent to undo a
    /// parent-side trade when the matching child-side chain fails (spec §4.5).
    ///
    /// Trades applied through `match_recommendations` cannot be voided (no undo entry is kept
    /// for them, since that batch is already all-or-nothing).
    pub fn void_trade(&mut self, trade_id: &TradeId) -> Result<(), MarketError> {
        let idx = self
            .trades
            .iter()
            .position(|t| &t.id == trade_id)
            .ok_or_else(|| MarketError::TradeNotFound(trade_id.clone()))?;
        let entry = self
            .undo_log
            .remove(trade_id)
            .ok_or_else(|| MarketError::TradeNotFound(trade_id.clone()))?;
        let trade = self.trades.remove(idx);

        *self.accounting.entry(trade.seller.clone()).or_insert(Decimal::ZERO) +=
            trade.traded_energy;
        *self.accounting.entry(trade.buyer.clone()).or_insert(Decimal::ZERO) -=
            trade.traded_energy;
        if let Some(v) = self
            .ious
            .get_mut(&trade.buyer)
            .and_then(|sellers| sellers.get_mut(&trade.seller))
        {
            *v -= trade.trade_price;
        }

        match entry {
            UndoEntry::Offer(original, residual_id) => {
                if let Some(rid) = residual_id {
                    self.offers.shift_remove(&rid);
                    self.posted_tick.remove(&rid);
                }
                self.posted_tick.insert(original.id.clone(), self.current_tick);
                self.offers.insert(original.id.clone(), original);
            }
            UndoEntry::Bid(original, residual_id) => {
                if let Some(rid) = residual_id {
                    self.bids.shift_remove(&rid);
                    self.posted_tick.remove(&rid);
                }
                self.posted_tick.insert(original.id.clone(), self.current_tick);
                self.bids.insert(original.id.clone(), original);
            }
        }

        warn!(trade = %trade.id, "trade voided");
        Ok(())
    }

    /// Shared settlement arithmetic for `accept_offer`/`accept_bid`: validates the requested
    /// energy, builds the `Trade`, updates accounting/IOUs, and computes the residual split
    /// (if any) without mutating the book — callers insert the residual and fire events.
    #[allow(clippy::too_many_arguments)]
    fn settle(
        &mut self,
        id: &OrderId,
        accepted_energy: Decimal,
        rate: Decimal,
        seller: ActorId,
        buyer: ActorId,
        time: Option<DateTime<Utc>>,
        from_offer: bool,
    ) -> Result<(Trade, Option<(OrderId, Decimal, Decimal)>), MarketError> {
        let (original_energy, original_price) = if from_offer {
            let offer = self.offers.get(id).expect("checked by caller");
            (offer.energy, offer.price)
        } else {
            let bid = self.bids.get(id).expect("checked by caller");
            (bid.energy, bid.price)
        };

        if accepted_energy > original_energy {
            return Err(MarketError::InvalidTrade(
                myco_model::InvalidOrder::InvalidTrade {
                    id: id.clone(),
                    requested: accepted_energy,
                    available: original_energy,
                },
            ));
        }

        let residual = if accepted_energy < original_energy {
            let (_, residual_energy, residual_price) =
                split_residual_energy(original_energy, original_price, accepted_energy)
                    .map_err(MarketError::InvalidTrade)?;
            Some((OrderId::next_residual(), residual_energy, residual_price))
        } else {
            None
        };

        let trade_price = accepted_energy * rate;
        let trade = Trade::new(
            TradeId::next(),
            time.unwrap_or_else(Utc::now),
            if from_offer {
                AcceptedSide::Offer
            } else {
                AcceptedSide::Bid
            },
            id.clone(),
            seller.clone(),
            buyer.clone(),
            accepted_energy,
            trade_price,
            Decimal::ZERO,
            residual.as_ref().map(|r| r.0.clone()),
            self.time_slot,
        );

        *self.accounting.entry(seller).or_insert(Decimal::ZERO) -= accepted_energy;
        *self.accounting.entry(buyer.clone()).or_insert(Decimal::ZERO) += accepted_energy;
        *self
            .ious
            .entry(buyer)
            .or_default()
            .entry(trade.seller.clone())
            .or_insert(Decimal::ZERO) += trade_price;

        self.trades.push(trade.clone());
        Ok((trade, residual))
    }

    /// Pre-flight validation used by the external matcher before applying a batch of
    /// recommended matches (spec §4.8, rules 1-5; rule 1 "market not readonly" is checked by
    /// the caller since it applies to the whole batch, not one pairing).
    pub fn validate_bid_offer_match(
        &self,
        rec: &MatchRecommendation,
    ) -> Result<(), MarketError> {
        let offer = self
            .offers
            .get(&rec.offer_id)
            .ok_or_else(|| MarketError::OfferNotFound(rec.offer_id.clone()))?;
        let bid = self
            .bids
            .get(&rec.bid_id)
            .ok_or_else(|| MarketError::BidNotFound(rec.bid_id.clone()))?;

        if offer.energy < rec.selected_energy || bid.energy < rec.selected_energy {
            return Err(MarketError::InvalidBidOfferPair(format!(
                "selected_energy {} exceeds available offer/bid energy ({}/{})",
                rec.selected_energy, offer.energy, bid.energy
            )));
        }
        if rec.trade_rate > bid.rate() || rec.trade_rate < offer.rate() {
            return Err(MarketError::InvalidBidOfferPair(format!(
                "trade_rate {} outside [offer {}, bid {}]",
                rec.trade_rate,
                offer.rate(),
                bid.rate()
            )));
        }
        if !offer.requirements.is_satisfied_by(&bid.attributes)
            || !bid.requirements.is_satisfied_by(&offer.attributes)
        {
            return Err(MarketError::InvalidBidOfferPair(
                "attribute/requirement predicate not satisfied".into(),
            ));
        }
        Ok(())
    }

    /// Atomically applies a batch of `MatchRecommendation`s. Any single failure (missing order,
    /// over-subscribed energy across the batch, out-of-bound rate) aborts the whole batch and
    /// leaves the book unchanged (spec §4.2, §7).
    ///
    /// A single offer or bid may appear in more than one recommendation (a many-to-many
    /// pairing, e.g. one offer split across two bids): consumption against each referenced id
    /// is accumulated across the *whole* batch before anything is removed from the book, so
    /// that an id is only ever read once (avoiding the trap of re-reading an order that a
    /// prior recommendation in the same batch already replaced with a residual).
    pub fn match_recommendations(
        &mut self,
        recommendations: &[MatchRecommendation],
    ) -> Result<Vec<Trade>, MarketError> {
        if self.readonly {
            return Err(MarketError::ReadOnly);
        }

        let mut offer_consumed: FnvHashMap<OrderId, Decimal> = FnvHashMap::default();
        let mut bid_consumed: FnvHashMap<OrderId, Decimal> = FnvHashMap::default();
        for rec in recommendations {
            self.validate_bid_offer_match(rec)?;

            let offer_energy = self.offers[&rec.offer_id].energy;
            let bid_energy = self.bids[&rec.bid_id].energy;
            let offer_total = offer_consumed.entry(rec.offer_id.clone()).or_insert(Decimal::ZERO);
            *offer_total += rec.selected_energy;
            if *offer_total > offer_energy {
                return Err(MarketError::InvalidBidOfferPair(
                    "selected_energy exceeds offer energy across the batch".into(),
                ));
            }
            let bid_total = bid_consumed.entry(rec.bid_id.clone()).or_insert(Decimal::ZERO);
            *bid_total += rec.selected_energy;
            if *bid_total > bid_energy {
                return Err(MarketError::InvalidBidOfferPair(
                    "selected_energy exceeds bid energy across the batch".into(),
                ));
            }
        }

        // Validated: build every trade against the original (still-untouched) offers/bids,
        // then remove each referenced id exactly once and insert at most one residual per id.
        let mut trades = Vec::with_capacity(recommendations.len());
        for rec in recommendations {
            let offer = self.offers[&rec.offer_id].clone();
            let bid = self.bids[&rec.bid_id].clone();
            let trade_price = rec.selected_energy * rec.trade_rate;

            let trade = Trade::new(
                TradeId::next(),
                Utc::now(),
                AcceptedSide::Offer,
                rec.offer_id.clone(),
                offer.seller.clone(),
                bid.buyer.clone(),
                rec.selected_energy,
                trade_price,
                Decimal::ZERO,
                None,
                self.time_slot,
            );

            *self.accounting.entry(offer.seller.clone()).or_insert(Decimal::ZERO) -=
                rec.selected_energy;
            *self.accounting.entry(bid.buyer.clone()).or_insert(Decimal::ZERO) +=
                rec.selected_energy;
            *self
                .ious
                .entry(bid.buyer.clone())
                .or_default()
                .entry(offer.seller.clone())
                .or_insert(Decimal::ZERO) += trade_price;

            self.trades.push(trade.clone());
            self.notify(MarketEvent::Trade(trade.clone()));
            trades.push(trade);
        }

        for (offer_id, consumed) in offer_consumed {
            let offer = self.offers.shift_remove(&offer_id).expect("validated above");
            self.posted_tick.remove(&offer_id);
            if consumed < offer.energy {
                let (_, residual_energy, residual_price) =
                    split_residual_energy(offer.energy, offer.price, consumed)
                        .expect("consumed <= offer.energy validated above");
                let residual_offer = Offer::new(
                    OrderId::next_residual(),
                    self.time_slot,
                    residual_price,
                    residual_energy,
                    offer.seller.clone(),
                    offer.seller_origin.clone(),
                    residual_price,
                    offer.attributes.clone(),
                    offer.requirements.clone(),
                    Some(offer.id.clone()),
                );
                self.posted_tick
                    .insert(residual_offer.id.clone(), self.current_tick);
                self.offers.insert(residual_offer.id.clone(), residual_offer.clone());
                self.notify(MarketEvent::OfferChanged {
                    existing: offer,
                    residual: residual_offer,
                });
            }
        }

        for (bid_id, consumed) in bid_consumed {
            let bid = self.bids.shift_remove(&bid_id).expect("validated above");
            self.posted_tick.remove(&bid_id);
            if consumed < bid.energy {
                let (_, residual_energy, residual_price) =
                    split_residual_energy(bid.energy, bid.price, consumed)
                        .expect("consumed <= bid.energy validated above");
                let residual_bid = Bid::new(
                    OrderId::next_residual(),
                    self.time_slot,
                    residual_price,
                    residual_energy,
                    bid.buyer.clone(),
                    bid.buyer_origin.clone(),
                    residual_price,
                    bid.final_buying_rate,
                    bid.attributes.clone(),
                    bid.requirements.clone(),
                    Some(bid.id.clone()),
                );
                self.posted_tick
                    .insert(residual_bid.id.clone(), self.current_tick);
                self.bids.insert(residual_bid.id.clone(), residual_bid.clone());
                self.notify(MarketEvent::BidChanged {
                    existing: bid,
                    residual: residual_bid,
                });
            }
        }

        Ok(trades)
    }

    pub fn offer(&self, id: &OrderId) -> Option<&Offer> {
        self.offers.get(id)
    }

    pub fn bid(&self, id: &OrderId) -> Option<&Bid> {
        self.bids.get(id)
    }

    pub fn offers(&self) -> impl Iterator<Item = &Offer> {
        self.offers.values()
    }

    pub fn bids(&self) -> impl Iterator<Item = &Bid> {
        self.bids.values()
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn accounting(&self, actor: &ActorId) -> Decimal {
        self.accounting.get(actor).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn iou(&self, buyer: &ActorId, seller: &ActorId) -> Decimal {
        self.ious
            .get(buyer)
            .and_then(|sellers| sellers.get(seller))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// `sorted_offers` ascending by rate; ties broken by largest energy first, then by
    /// insertion order (spec §4.3 partial-fill tie-break, via `sort_by`'s stability).
    pub fn sorted_offers(&self) -> Vec<&Offer> {
        let mut offers: Vec<&Offer> = self.offers.values().collect();
        offers.sort_by(|a, b| a.rate().cmp(&b.rate()).then_with(|| b.energy.cmp(&a.energy)));
        offers
    }

    /// `sorted_bids` descending by rate; ties broken by largest energy first, then by
    /// insertion order.
    pub fn sorted_bids(&self) -> Vec<&Bid> {
        let mut bids: Vec<&Bid> = self.bids.values().collect();
        bids.sort_by(|a, b| b.rate().cmp(&a.rate()).then_with(|| b.energy.cmp(&a.energy)));
        bids
    }

    /// Both `min_offer_price` and `max_offer_price`, rounded to 4 decimals (spec §4.2, §9 Open
    /// Question: the source assigns `min_offer_price` twice via a copy/paste bug so
    /// `max_offer_price` is never actually populated there; we implement both correctly rather
    /// than reproduce the bug).
    pub fn min_max_avg_offer_price(&self) -> (Decimal, Decimal, Decimal) {
        Self::min_max_avg(self.offers.values().map(|o| o.rate()))
    }

    pub fn min_max_avg_trade_price(&self) -> (Decimal, Decimal, Decimal) {
        Self::min_max_avg(self.trades.iter().map(|t| t.clearing_rate()))
    }

    /// `avg = sum(price) / sum(energy)`, per spec §4.2.
    pub fn avg_trade_price(&self) -> Decimal {
        let (total_price, total_energy) = self
            .trades
            .iter()
            .fold((Decimal::ZERO, Decimal::ZERO), |(p, e), t| {
                (p + t.trade_price, e + t.traded_energy)
            });
        if total_energy.is_zero() {
            Decimal::ZERO
        } else {
            (total_price / total_energy).round_dp(4)
        }
    }

    fn min_max_avg(rates: impl Iterator<Item = Decimal>) -> (Decimal, Decimal, Decimal) {
        let rates: Vec<Decimal> = rates.collect();
        if rates.is_empty() {
            return (Decimal::ZERO, Decimal::ZERO, Decimal::ZERO);
        }
        let min = rates.iter().copied().fold(rates[0], Decimal::min).round_dp(4);
        let max = rates.iter().copied().fold(rates[0], Decimal::max).round_dp(4);
        let avg = (rates.iter().copied().sum::<Decimal>() / Decimal::from(rates.len())).round_dp(4);
        (min, max, avg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use myco_model::MarketId;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn market() -> Market {
        Market::new(MarketId::new("m1"), Utc::now(), GridFeePolicy::default())
    }

    #[test]
    fn single_slot_one_sided_clearing() {
        // scenario 1: offer {2 kWh, 20}, buyer requests 2 kWh -> one trade at rate 10
        let mut m = market();
        let offer = m
            .post_offer(
                dec!(2),
                dec!(20),
                ActorId::new("seller"),
                ActorId::new("seller"),
                dec!(20),
                OrderAttributes::default(),
                OrderRequirements::default(),
            )
            .unwrap();
        let trade = m.accept_offer(&offer.id, ActorId::new("buyer"), None, None).unwrap();
        assert_eq!(trade.clearing_rate(), dec!(10));
        assert_eq!(m.accounting(&ActorId::new("seller")), dec!(-2));
        assert_eq!(m.accounting(&ActorId::new("buyer")), dec!(2));
        assert!(m.offers().next().is_none());
    }

    #[test]
    fn partial_fill_emits_offer_changed_before_trade() {
        // scenario 2
        let mut m = market();
        let offer = m
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

        let events: Arc<std::sync::Mutex<Vec<String>>> = Arc::new(std::sync::Mutex::new(Vec::new()));
        let events_clone = events.clone();
        m.add_listener(Box::new(move |event| {
            let label = match event {
                MarketEvent::OfferChanged { .. } => "OFFER_CHANGED",
                MarketEvent::Trade(_) => "TRADE",
                _ => return,
            };
            events_clone.lock().unwrap().push(label.to_string());
        }));

        let trade = m
            .accept_offer(&offer.id, ActorId::new("buyer"), Some(dec!(3)), None)
            .unwrap();
        assert_eq!(trade.traded_energy, dec!(3));
        assert_eq!(trade.trade_price, dec!(30));

        let residual = m.offers().next().unwrap();
        assert_eq!(residual.energy, dec!(1));
        assert_eq!(residual.price, dec!(10));

        let seen = events.lock().unwrap();
        assert_eq!(seen.as_slice(), &["OFFER_CHANGED", "TRADE"]);
    }

    #[test]
    fn readonly_market_rejects_mutators_and_leaves_book_unchanged() {
        let mut m = market();
        m.post_offer(
            dec!(1),
            dec!(10),
            ActorId::new("seller"),
            ActorId::new("seller"),
            dec!(10),
            OrderAttributes::default(),
            OrderRequirements::default(),
        )
        .unwrap();
        m.mark_readonly();

        let before = m.offers().count();
        let err = m.post_offer(
            dec!(1),
            dec!(10),
            ActorId::new("seller2"),
            ActorId::new("seller2"),
            dec!(10),
            OrderAttributes::default(),
            OrderRequirements::default(),
        );
        assert!(matches!(err, Err(MarketError::ReadOnly)));
        assert_eq!(m.offers().count(), before);
    }

    #[test]
    fn accounting_is_zero_sum_after_trade() {
        let mut m = market();
        let offer = m
            .post_offer(
                dec!(5),
                dec!(50),
                ActorId::new("seller"),
                ActorId::new("seller"),
                dec!(50),
                OrderAttributes::default(),
                OrderRequirements::default(),
            )
            .unwrap();
        m.accept_offer(&offer.id, ActorId::new("buyer"), None, None).unwrap();
        let total: Decimal = m.accounting.values().copied().sum();
        assert_eq!(total, Decimal::ZERO);
    }

    #[test]
    fn iou_conservation_matches_trade_price_sum() {
        let mut m = market();
        let offer = m
            .post_offer(
                dec!(5),
                dec!(50),
                ActorId::new("seller"),
                ActorId::new("seller"),
                dec!(50),
                OrderAttributes::default(),
                OrderRequirements::default(),
            )
            .unwrap();
        let trade = m.accept_offer(&offer.id, ActorId::new("buyer"), None, None).unwrap();
        let total_ious: Decimal = m
            .ious
            .values()
            .flat_map(|sellers| sellers.values())
            .copied()
            .sum();
        assert_eq!(total_ious, trade.trade_price);
    }

    #[test]
    fn match_recommendations_aborts_whole_batch_on_any_failure() {
        let mut m = market();
        let offer = m
            .post_offer(
                dec!(3),
                dec!(15),
                ActorId::new("seller"),
                ActorId::new("seller"),
                dec!(15),
                OrderAttributes::default(),
                OrderRequirements::default(),
            )
            .unwrap();
        let bid = m
            .post_bid(
                dec!(3),
                dec!(30),
                ActorId::new("buyer"),
                ActorId::new("buyer"),
                dec!(30),
                dec!(10),
                OrderAttributes::default(),
                OrderRequirements::default(),
            )
            .unwrap();

        let good = MatchRecommendation {
            offer_id: offer.id.clone(),
            bid_id: bid.id.clone(),
            trade_rate: dec!(7),
            selected_energy: dec!(3),
        };
        let bad = MatchRecommendation {
            offer_id: OrderId::new("does-not-exist"),
            bid_id: bid.id.clone(),
            trade_rate: dec!(7),
            selected_energy: dec!(1),
        };

        let result = m.match_recommendations(&[good, bad]);
        assert!(result.is_err());
        // book unchanged: offer and bid both still present
        assert_eq!(m.offers().count(), 1);
        assert_eq!(m.bids().count(), 1);
        assert!(m.trades().is_empty());
    }

    #[test]
    fn order_listener_fires_on_accept() {
        let mut m = market();
        let offer = m
            .post_offer(
                dec!(1),
                dec!(10),
                ActorId::new("seller"),
                ActorId::new("seller"),
                dec!(10),
                OrderAttributes::default(),
                OrderRequirements::default(),
            )
            .unwrap();

        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();
        m.add_order_listener(
            offer.id.clone(),
            Box::new(move |event| {
                if event == OrderEvent::Accepted {
                    fired_clone.fetch_add(1, Ordering::SeqCst);
                }
            }),
        );

        m.accept_offer(&offer.id, ActorId::new("buyer"), None, None).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
