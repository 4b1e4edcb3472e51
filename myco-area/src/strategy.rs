use chrono::{DateTime, Duration, Utc};
use myco_model::{ActorId, OrderAttributes, OrderId, OrderRequirements, Trade};
use myco_market::Market;
use myco_rates::{ClampDirection, RateSource, RateUpdater};
use rand::Rng;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::debug;

/// A per-slot energy forecast: either the same value every slot, or a value looked up per exact
/// slot timestamp (spec §9 "Deep inheritance of strategies" capability set's
/// `produce_forecast(slot)`).
#[derive(Debug, Clone)]
pub enum ForecastSource {
    Constant(Decimal),
    BySlot(BTreeMap<DateTime<Utc>, Decimal>),
}

impl ForecastSource {
    pub fn energy_at(&self, slot: DateTime<Utc>) -> Decimal {
        match self {
            ForecastSource::Constant(energy) => *energy,
            ForecastSource::BySlot(map) => map.get(&slot).copied().unwrap_or(Decimal::ZERO),
        }
    }
}

/// Shared capability set named by spec §9: `{on_activate, on_tick, on_market_cycle, on_trade,
/// on_offer_deleted, produce_forecast(slot)}`, kept as one trait instead of a deep inheritance
/// chain of strategy base classes.
pub trait StrategyBehavior: std::fmt::Debug {
    fn on_activate(&mut self, market: &mut Market, owner: &ActorId);
    fn on_tick(&mut self, market: &mut Market, owner: &ActorId, tick_in_slot: u64, tick_length: Duration);
    fn on_market_cycle(&mut self, new_market: &mut Market, owner: &ActorId);
    fn on_trade(&mut self, trade: &Trade, owner: &ActorId);
    fn on_offer_deleted(&mut self, id: &OrderId);
    fn produce_forecast(&self, slot: DateTime<Utc>) -> Decimal;
}

/// Consumer strategy: posts a single bid per slot at a rate that rises from `initial_rate`
/// towards `final_rate` as the slot progresses, sized to the slot's forecast energy.
#[derive(Debug)]
pub struct LoadStrategy {
    forecast: ForecastSource,
    rate_updater: RateUpdater,
    attributes: OrderAttributes,
    requirements: OrderRequirements,
    current_bid: Option<OrderId>,
}

impl LoadStrategy {
    pub fn new(
        forecast: ForecastSource,
        initial_rate: RateSource,
        final_rate: RateSource,
        update_interval: Duration,
        slot_length: Duration,
    ) -> Self {
        Self {
            forecast,
            rate_updater: RateUpdater::new(
                initial_rate,
                final_rate,
                true,
                None,
                update_interval,
                slot_length,
                ClampDirection::Min,
            ),
            attributes: OrderAttributes::default(),
            requirements: OrderRequirements::default(),
            current_bid: None,
        }
    }

    fn post_current_bid(&mut self, market: &mut Market, owner: &ActorId) {
        let energy = self.forecast.energy_at(market.time_slot);
        if energy <= Decimal::ZERO {
            return;
        }
        let rate = self.rate_updater.rate_at(market.time_slot);
        let price = energy * rate;
        match market.post_bid(
            energy,
            price,
            owner.clone(),
            owner.clone(),
            price,
            rate,
            self.attributes.clone(),
            self.requirements.clone(),
        ) {
            Ok(bid) => self.current_bid = Some(bid.id),
            Err(err) => debug!(%err, "load strategy failed to post bid"),
        }
    }
}

impl StrategyBehavior for LoadStrategy {
    fn on_activate(&mut self, market: &mut Market, owner: &ActorId) {
        self.post_current_bid(market, owner);
    }

    fn on_tick(&mut self, market: &mut Market, owner: &ActorId, tick_in_slot: u64, tick_length: Duration) {
        let slot = market.time_slot;
        let elapsed = tick_length * tick_in_slot as i32;
        if !self.rate_updater.should_update(slot, elapsed) {
            return;
        }
        if let Some(bid_id) = self.current_bid.take() {
            let _ = market.delete_bid(&bid_id);
        }
        self.post_current_bid(market, owner);
    }

    fn on_market_cycle(&mut self, new_market: &mut Market, owner: &ActorId) {
        self.rate_updater.delete_past_state_values(new_market.time_slot);
        self.current_bid = None;
        self.post_current_bid(new_market, owner);
    }

    fn on_trade(&mut self, trade: &Trade, _owner: &ActorId) {
        if self.current_bid.as_ref() == Some(&trade.order_id) {
            self.current_bid = trade.residual.clone();
        }
    }

    fn on_offer_deleted(&mut self, _id: &OrderId) {}

    fn produce_forecast(&self, slot: DateTime<Utc>) -> Decimal {
        self.forecast.energy_at(slot)
    }
}

/// Producer strategy, symmetric to `LoadStrategy`: posts a single offer per slot at a rate that
/// falls from `initial_rate` towards `final_rate`, sized to the slot's forecast energy.
#[derive(Debug)]
pub struct PvStrategy {
    forecast: ForecastSource,
    rate_updater: RateUpdater,
    attributes: OrderAttributes,
    requirements: OrderRequirements,
    current_offer: Option<OrderId>,
}

impl PvStrategy {
    pub fn new(
        forecast: ForecastSource,
        initial_rate: RateSource,
        final_rate: RateSource,
        update_interval: Duration,
        slot_length: Duration,
    ) -> Self {
        let mut attributes = OrderAttributes::default();
        attributes.energy_type = Some("PV".into());
        Self {
            forecast,
            rate_updater: RateUpdater::new(
                initial_rate,
                final_rate,
                true,
                None,
                update_interval,
                slot_length,
                ClampDirection::Max,
            ),
            attributes,
            requirements: OrderRequirements::default(),
            current_offer: None,
        }
    }

    fn post_current_offer(&mut self, market: &mut Market, owner: &ActorId) {
        let energy = self.forecast.energy_at(market.time_slot);
        if energy <= Decimal::ZERO {
            return;
        }
        let rate = self.rate_updater.rate_at(market.time_slot);
        let price = energy * rate;
        match market.post_offer(
            energy,
            price,
            owner.clone(),
            owner.clone(),
            price,
            self.attributes.clone(),
            self.requirements.clone(),
        ) {
            Ok(offer) => self.current_offer = Some(offer.id),
            Err(err) => debug!(%err, "pv strategy failed to post offer"),
        }
    }
}

impl StrategyBehavior for PvStrategy {
    fn on_activate(&mut self, market: &mut Market, owner: &ActorId) {
        self.post_current_offer(market, owner);
    }

    fn on_tick(&mut self, market: &mut Market, owner: &ActorId, tick_in_slot: u64, tick_length: Duration) {
        let slot = market.time_slot;
        let elapsed = tick_length * tick_in_slot as i32;
        if !self.rate_updater.should_update(slot, elapsed) {
            return;
        }
        if let Some(offer_id) = self.current_offer.take() {
            let _ = market.delete_offer(&offer_id);
        }
        self.post_current_offer(market, owner);
    }

    fn on_market_cycle(&mut self, new_market: &mut Market, owner: &ActorId) {
        self.rate_updater.delete_past_state_values(new_market.time_slot);
        self.current_offer = None;
        self.post_current_offer(new_market, owner);
    }

    fn on_trade(&mut self, trade: &Trade, _owner: &ActorId) {
        if self.current_offer.as_ref() == Some(&trade.order_id) {
            self.current_offer = trade.residual.clone();
        }
    }

    fn on_offer_deleted(&mut self, id: &OrderId) {
        if self.current_offer.as_ref() == Some(id) {
            self.current_offer = None;
        }
    }

    fn produce_forecast(&self, slot: DateTime<Utc>) -> Decimal {
        self.forecast.energy_at(slot)
    }
}

/// Infinite-bus-style producer: always has energy to sell at a fixed rate, never running out.
///
/// Grounded directly on `original_source/.../strategy/commercial_producer.py::CommercialStrategy`:
/// `event_activate`/`event_market_cycle` both post a batch of offers sized by a random draw from
/// `energy_range`, and `event_trade` reposts one replacement offer whenever this strategy was the
/// seller.
#[derive(Debug)]
pub struct CommercialProducerStrategy {
    energy_range: (Decimal, Decimal),
    energy_rate: Decimal,
    offers_per_cycle: usize,
    posted: Vec<OrderId>,
}

impl CommercialProducerStrategy {
    pub fn new(energy_range: (Decimal, Decimal), energy_rate: Decimal, offers_per_cycle: usize) -> Self {
        Self { energy_range, energy_rate, offers_per_cycle, posted: Vec::new() }
    }

    fn random_energy(&self) -> Decimal {
        let (low, high) = self.energy_range;
        if low >= high {
            return low;
        }
        let fraction = Decimal::new(rand::rng().random_range(0..=1_000_000), 6);
        low + (high - low) * fraction
    }

    fn post_one(&mut self, market: &mut Market, owner: &ActorId) {
        let energy = self.random_energy();
        let price = energy * self.energy_rate;
        match market.post_offer(
            energy,
            price,
            owner.clone(),
            owner.clone(),
            price,
            OrderAttributes::default(),
            OrderRequirements::default(),
        ) {
            Ok(offer) => self.posted.push(offer.id),
            Err(err) => debug!(%err, "commercial producer failed to post offer"),
        }
    }
}

impl StrategyBehavior for CommercialProducerStrategy {
    fn on_activate(&mut self, market: &mut Market, owner: &ActorId) {
        for _ in 0..self.offers_per_cycle {
            self.post_one(market, owner);
        }
    }

    fn on_tick(&mut self, _market: &mut Market, _owner: &ActorId, _tick_in_slot: u64, _tick_length: Duration) {}

    fn on_market_cycle(&mut self, new_market: &mut Market, owner: &ActorId) {
        self.posted.clear();
        for _ in 0..self.offers_per_cycle {
            self.post_one(new_market, owner);
        }
    }

    fn on_trade(&mut self, trade: &Trade, owner: &ActorId) {
        if &trade.seller == owner {
            self.posted.retain(|id| id != &trade.order_id);
        }
    }

    fn on_offer_deleted(&mut self, id: &OrderId) {
        self.posted.retain(|posted| posted != id);
    }

    fn produce_forecast(&self, _slot: DateTime<Utc>) -> Decimal {
        let (low, high) = self.energy_range;
        (low + high) / Decimal::TWO * Decimal::from(self.offers_per_cycle)
    }
}

/// The concrete strategies an `AreaKind::Leaf` may carry, dispatched without a deep inheritance
/// hierarchy (spec §9).
#[derive(Debug)]
pub enum StrategyKind {
    Load(LoadStrategy),
    Pv(PvStrategy),
    CommercialProducer(CommercialProducerStrategy),
}

impl StrategyKind {
    /// A commercial producer with the source's default shape: 0.02-0.08 kWh per offer, one
    /// offer per cycle, at a placeholder rate meant to be overridden via `market_maker_rate`.
    pub fn commercial_producer_default() -> Self {
        StrategyKind::CommercialProducer(CommercialProducerStrategy::new(
            (Decimal::new(2, 2), Decimal::new(8, 2)),
            Decimal::from(30),
            1,
        ))
    }
}

impl StrategyBehavior for StrategyKind {
    fn on_activate(&mut self, market: &mut Market, owner: &ActorId) {
        match self {
            StrategyKind::Load(s) => s.on_activate(market, owner),
            StrategyKind::Pv(s) => s.on_activate(market, owner),
            StrategyKind::CommercialProducer(s) => s.on_activate(market, owner),
        }
    }

    fn on_tick(&mut self, market: &mut Market, owner: &ActorId, tick_in_slot: u64, tick_length: Duration) {
        match self {
            StrategyKind::Load(s) => s.on_tick(market, owner, tick_in_slot, tick_length),
            StrategyKind::Pv(s) => s.on_tick(market, owner, tick_in_slot, tick_length),
            StrategyKind::CommercialProducer(s) => s.on_tick(market, owner, tick_in_slot, tick_length),
        }
    }

    fn on_market_cycle(&mut self, new_market: &mut Market, owner: &ActorId) {
        match self {
            StrategyKind::Load(s) => s.on_market_cycle(new_market, owner),
            StrategyKind::Pv(s) => s.on_market_cycle(new_market, owner),
            StrategyKind::CommercialProducer(s) => s.on_market_cycle(new_market, owner),
        }
    }

    fn on_trade(&mut self, trade: &Trade, owner: &ActorId) {
        match self {
            StrategyKind::Load(s) => s.on_trade(trade, owner),
            StrategyKind::Pv(s) => s.on_trade(trade, owner),
            StrategyKind::CommercialProducer(s) => s.on_trade(trade, owner),
        }
    }

    fn on_offer_deleted(&mut self, id: &OrderId) {
        match self {
            StrategyKind::Load(s) => s.on_offer_deleted(id),
            StrategyKind::Pv(s) => s.on_offer_deleted(id),
            StrategyKind::CommercialProducer(s) => s.on_offer_deleted(id),
        }
    }

    fn produce_forecast(&self, slot: DateTime<Utc>) -> Decimal {
        match self {
            StrategyKind::Load(s) => s.produce_forecast(slot),
            StrategyKind::Pv(s) => s.produce_forecast(slot),
            StrategyKind::CommercialProducer(s) => s.produce_forecast(slot),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use myco_fees::GridFeePolicy;
    use myco_model::MarketId;
    use rust_decimal_macros::dec;

    fn slot() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()
    }

    fn market() -> Market {
        Market::new(MarketId::new("m"), slot(), GridFeePolicy::default())
    }

    #[test]
    fn load_strategy_posts_bid_sized_to_forecast_on_activate() {
        let mut strategy = LoadStrategy::new(
            ForecastSource::Constant(dec!(2)),
            RateSource::Scalar(dec!(30)),
            RateSource::Scalar(dec!(10)),
            Duration::minutes(15),
            Duration::minutes(60),
        );
        let mut market = market();
        strategy.on_activate(&mut market, &ActorId::new("load-1"));
        assert_eq!(market.bids().count(), 1);
        let bid = market.bids().next().unwrap();
        assert_eq!(bid.energy, dec!(2));
        assert_eq!(bid.rate(), dec!(30));
    }

    #[test]
    fn pv_strategy_produces_no_offer_when_forecast_is_zero() {
        let mut strategy = PvStrategy::new(
            ForecastSource::Constant(Decimal::ZERO),
            RateSource::Scalar(dec!(30)),
            RateSource::Scalar(dec!(10)),
            Duration::minutes(15),
            Duration::minutes(60),
        );
        let mut market = market();
        strategy.on_activate(&mut market, &ActorId::new("pv-1"));
        assert!(market.offers().next().is_none());
    }

    #[test]
    fn commercial_producer_reposts_on_trade_by_itself() {
        let mut strategy =
            CommercialProducerStrategy::new((dec!(1), dec!(1)), dec!(10), 1);
        let owner = ActorId::new("market-maker");
        let mut market = market();
        strategy.on_activate(&mut market, &owner);
        assert_eq!(market.offers().count(), 1);

        let offer_id = market.offers().next().unwrap().id.clone();
        let trade = market.accept_offer(&offer_id, ActorId::new("buyer"), None, None).unwrap();
        strategy.on_trade(&trade, &owner);
        strategy.post_one(&mut market, &owner);
        assert_eq!(market.offers().count(), 1, "replacement offer posted after trade");
    }
}
