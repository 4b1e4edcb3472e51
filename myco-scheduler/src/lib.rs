#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! # Myco-Scheduler
//! The slot/tick loop that drives a simulation (spec component C7): single-threaded
//! cooperative dispatch of `TICK` to the area tree, slot-close matching (internal engine or
//! external matcher, with a bounded-timeout fallback), past-markets ring maintenance, future
//! market rotation, and pause/resume/stop control.
//!
//! Grounded on `barter/src/engine/run.rs`'s `sync_run` loop: an explicit `loop { ... }` over
//! discrete steps that checks for a shutdown condition each iteration, rather than a callback
//! registered with an external executor.

pub mod control;
pub mod error;

use chrono::{DateTime, Utc};
use myco_fees::GridFeePolicy;
use myco_future_market::FutureMarket;
use myco_market::Market;
use myco_matching::{one_sided, pay_as_bid, pay_as_clear};
use myco_model::{MarketId, Trade};
use std::collections::VecDeque;
use std::time::Duration as StdDuration;
use tracing::{debug, info, warn};

pub use control::SchedulerControl;
pub use error::SchedulerError;

/// Tree dispatch order for `TICK`/`MARKET_CYCLE` broadcast (spec §4.7 step 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOrder {
    TopToBottom,
    BottomToTop,
}

/// Which internal clearing engine runs at slot close when no external matcher is configured, or
/// when the external matcher round trip times out (spec §4.3, §5 "bounded timeout ... falls
/// back to the internal engine").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchingMode {
    OneSided,
    PayAsBid,
    PayAsClear,
}

/// Anything the scheduler dispatches `TICK`/`MARKET_CYCLE` to. One implementor per simulation
/// (typically the root of the area tree); the tree itself decides how it fans a tick out to its
/// own descendants, the scheduler only decides *when* and in *what order relative to other
/// top-level listeners*.
pub trait TickListener: std::fmt::Debug {
    fn on_tick(&mut self, tick: u64);
    fn on_market_cycle(&mut self, closed_slot: &Market);
}

/// Out-of-process matching (spec §4.8, C8). `request_recommendations` blocks for at most
/// `timeout`; returning `None` signals a timeout, upon which the scheduler falls back to its
/// configured `MatchingMode`.
pub trait ExternalMatcher: std::fmt::Debug {
    fn request_recommendations(
        &mut self,
        market: &Market,
        timeout: StdDuration,
    ) -> Option<Vec<myco_market::MatchRecommendation>>;
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub slot_length: chrono::Duration,
    pub tick_length: chrono::Duration,
    pub dispatch_order: DispatchOrder,
    pub matching_mode: MatchingMode,
    /// `KEEP_PAST_MARKETS` (spec §4.6): bound on the past-markets ring.
    pub keep_past_markets: usize,
    pub external_matcher_timeout: StdDuration,
    /// Optional sleep at the end of every tick, for human-paced demos (spec §4.7 step 6).
    pub slowdown: Option<StdDuration>,
}

impl SchedulerConfig {
    pub fn ticks_per_slot(&self) -> u64 {
        let ticks = self.slot_length.num_milliseconds() / self.tick_length.num_milliseconds();
        ticks.max(1) as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Paused,
    Advanced,
    SlotClosed,
    Stopped,
}

/// The tick/slot loop itself. Owns the spot market, the past-markets ring, and (optionally) the
/// future-market rotator; everything else (strategies, IAAs) is reached only through the
/// `TickListener`s it was constructed with.
#[derive(Debug)]
pub struct Scheduler {
    config: SchedulerConfig,
    control: SchedulerControl,
    listeners: Vec<Box<dyn TickListener>>,
    external_matcher: Option<Box<dyn ExternalMatcher>>,
    spot_market: Market,
    past_markets: VecDeque<Market>,
    future_market: Option<FutureMarket>,
    grid_fees: GridFeePolicy,
    tick_in_slot: u64,
    total_ticks: u64,
    snapshot_cb: Option<Box<dyn FnMut(&Market)>>,
    final_cb: Option<Box<dyn FnMut(&Market)>>,
}

impl Scheduler {
    pub fn new(
        config: SchedulerConfig,
        spot_market: Market,
        grid_fees: GridFeePolicy,
        listeners: Vec<Box<dyn TickListener>>,
    ) -> Self {
        Self {
            config,
            control: SchedulerControl::new(),
            listeners,
            external_matcher: None,
            spot_market,
            past_markets: VecDeque::new(),
            future_market: None,
            grid_fees,
            tick_in_slot: 0,
            total_ticks: 0,
            snapshot_cb: None,
            final_cb: None,
        }
    }

    pub fn with_external_matcher(mut self, matcher: Box<dyn ExternalMatcher>) -> Self {
        self.external_matcher = Some(matcher);
        self
    }

    pub fn with_future_market(mut self, future_market: FutureMarket) -> Self {
        self.future_market = Some(future_market);
        self
    }

    /// Invoked exactly once per slot close with the newly sealed (readonly) spot market (spec
    /// §4.7 "Intermediate-results emission").
    pub fn on_slot_close(&mut self, cb: impl FnMut(&Market) + 'static) {
        self.snapshot_cb = Some(Box::new(cb));
    }

    /// Invoked exactly once when the scheduler finally returns, after a `STOP` drains any
    /// outstanding matches.
    pub fn on_finish(&mut self, cb: impl FnMut(&Market) + 'static) {
        self.final_cb = Some(Box::new(cb));
    }

    pub fn control(&self) -> SchedulerControl {
        self.control.clone()
    }

    pub fn spot_market(&self) -> &Market {
        &self.spot_market
    }

    pub fn past_markets(&self) -> impl Iterator<Item = &Market> {
        self.past_markets.iter()
    }

    /// Runs ticks until a `STOP` signal is observed, returning after the drain-and-finish
    /// sequence (spec §4.7 "Cancellation").
    pub fn run_until_stopped(&mut self) -> Result<(), SchedulerError> {
        loop {
            match self.run_tick()? {
                TickOutcome::Stopped => return Ok(()),
                _ => continue,
            }
        }
    }

    /// Runs a single tick. Returns `Paused` without advancing state if a pause is in effect.
    pub fn run_tick(&mut self) -> Result<TickOutcome, SchedulerError> {
        if self.control.is_stopped() {
            self.drain_and_finish()?;
            return Ok(TickOutcome::Stopped);
        }

        if self.control.is_paused() {
            return Ok(TickOutcome::Paused);
        }

        self.tick_in_slot += 1;
        self.total_ticks += 1;
        self.spot_market.set_current_tick(self.tick_in_slot);

        match self.config.dispatch_order {
            DispatchOrder::TopToBottom => {
                for listener in self.listeners.iter_mut() {
                    listener.on_tick(self.total_ticks);
                }
            }
            DispatchOrder::BottomToTop => {
                for listener in self.listeners.iter_mut().rev() {
                    listener.on_tick(self.total_ticks);
                }
            }
        }

        if self.tick_in_slot >= self.config.ticks_per_slot() {
            self.close_slot()?;
            return Ok(TickOutcome::SlotClosed);
        }

        if let Some(sleep) = self.config.slowdown {
            spin_sleep::sleep(sleep);
        }

        Ok(TickOutcome::Advanced)
    }

    fn close_slot(&mut self) -> Result<(), SchedulerError> {
        let trades = self.run_matching()?;
        info!(market = %self.spot_market.id, trades = trades.len(), "slot closed");

        self.spot_market.mark_readonly();

        if let Some(cb) = self.snapshot_cb.as_mut() {
            cb(&self.spot_market);
        }

        let next_slot = self.spot_market.time_slot + self.config.slot_length;
        let next_market = Market::new(
            MarketId::new(format!("spot-{next_slot}")),
            next_slot,
            self.grid_fees,
        );
        let closed = std::mem::replace(&mut self.spot_market, next_market);

        match self.config.dispatch_order {
            DispatchOrder::TopToBottom => {
                for listener in self.listeners.iter_mut() {
                    listener.on_market_cycle(&closed);
                }
            }
            DispatchOrder::BottomToTop => {
                for listener in self.listeners.iter_mut().rev() {
                    listener.on_market_cycle(&closed);
                }
            }
        }

        self.past_markets.push_back(closed);
        while self.past_markets.len() > self.config.keep_past_markets {
            self.past_markets.pop_front();
        }

        if let Some(future_market) = self.future_market.as_mut() {
            future_market.rotate_future_markets(next_slot);
        }

        self.tick_in_slot = 0;

        if let Some(sleep) = self.config.slowdown {
            spin_sleep::sleep(sleep);
        }

        Ok(())
    }

    fn run_matching(&mut self) -> Result<Vec<Trade>, SchedulerError> {
        if let Some(matcher) = self.external_matcher.as_mut() {
            if let Some(recommendations) =
                matcher.request_recommendations(&self.spot_market, self.config.external_matcher_timeout)
            {
                debug!("applying external matcher recommendations");
                return Ok(self.spot_market.match_recommendations(&recommendations)?);
            }
            warn!("external matcher round trip timed out, falling back to internal engine");
        }

        match self.config.matching_mode {
            MatchingMode::OneSided => self.run_one_sided_matching(),
            MatchingMode::PayAsBid => {
                let recommendations = pay_as_bid::plan(&self.spot_market, None);
                Ok(self.spot_market.match_recommendations(&recommendations)?)
            }
            MatchingMode::PayAsClear => {
                let plan = pay_as_clear::plan(&self.spot_market, None);
                Ok(self.spot_market.match_recommendations(&plan.recommendations)?)
            }
        }
    }

    fn run_one_sided_matching(&mut self) -> Result<Vec<Trade>, SchedulerError> {
        Ok(one_sided::clear_book(&mut self.spot_market, None)?)
    }

    fn drain_and_finish(&mut self) -> Result<(), SchedulerError> {
        let trades = self.run_matching()?;
        info!(trades = trades.len(), "draining outstanding matches before stop");
        if let Some(cb) = self.final_cb.as_mut() {
            cb(&self.spot_market);
        }
        Ok(())
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.spot_market.time_slot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use myco_model::ActorId;
    use rust_decimal_macros::dec;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Debug)]
    struct RecordingListener {
        ticks: Rc<RefCell<Vec<u64>>>,
        cycles: Rc<RefCell<u64>>,
    }

    impl TickListener for RecordingListener {
        fn on_tick(&mut self, tick: u64) {
            self.ticks.borrow_mut().push(tick);
        }
        fn on_market_cycle(&mut self, _closed_slot: &Market) {
            *self.cycles.borrow_mut() += 1;
        }
    }

    fn config() -> SchedulerConfig {
        SchedulerConfig {
            slot_length: chrono::Duration::minutes(60),
            tick_length: chrono::Duration::minutes(15),
            dispatch_order: DispatchOrder::TopToBottom,
            matching_mode: MatchingMode::PayAsBid,
            keep_past_markets: 2,
            external_matcher_timeout: StdDuration::from_millis(1),
            slowdown: None,
        }
    }

    fn market(time_slot: DateTime<Utc>) -> Market {
        Market::new(MarketId::new("spot-0"), time_slot, GridFeePolicy::default())
    }

    #[test]
    fn four_ticks_close_exactly_one_slot() {
        use chrono::TimeZone;
        let ticks = Rc::new(RefCell::new(Vec::new()));
        let cycles = Rc::new(RefCell::new(0));
        let listener = RecordingListener { ticks: ticks.clone(), cycles: cycles.clone() };

        let slot = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut scheduler = Scheduler::new(
            config(),
            market(slot),
            GridFeePolicy::default(),
            vec![Box::new(listener)],
        );

        let outcomes: Vec<_> = (0..4).map(|_| scheduler.run_tick().unwrap()).collect();
        assert_eq!(
            outcomes,
            vec![TickOutcome::Advanced, TickOutcome::Advanced, TickOutcome::Advanced, TickOutcome::SlotClosed]
        );
        assert_eq!(*ticks.borrow(), vec![1, 2, 3, 4]);
        assert_eq!(*cycles.borrow(), 1);
        assert_eq!(scheduler.spot_market().time_slot, slot + chrono::Duration::minutes(60));
    }

    #[test]
    fn pause_prevents_tick_advance_until_resumed() {
        use chrono::TimeZone;
        let slot = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut scheduler = Scheduler::new(config(), market(slot), GridFeePolicy::default(), vec![]);
        let control = scheduler.control();

        control.pause();
        assert_eq!(scheduler.run_tick().unwrap(), TickOutcome::Paused);
        assert_eq!(scheduler.run_tick().unwrap(), TickOutcome::Paused);

        control.resume();
        assert_eq!(scheduler.run_tick().unwrap(), TickOutcome::Advanced);
    }

    #[test]
    fn stop_drains_and_returns_without_further_advance() {
        use chrono::TimeZone;
        let slot = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut m = market(slot);
        m.post_offer(
            dec!(1),
            dec!(10),
            ActorId::new("seller"),
            ActorId::new("seller"),
            dec!(10),
            Default::default(),
            Default::default(),
        )
        .unwrap();
        let mut scheduler = Scheduler::new(config(), m, GridFeePolicy::default(), vec![]);
        let control = scheduler.control();

        scheduler.run_tick().unwrap();
        control.stop();
        assert_eq!(scheduler.run_tick().unwrap(), TickOutcome::Stopped);
    }

    #[test]
    fn past_markets_ring_is_bounded() {
        use chrono::TimeZone;
        let slot = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut scheduler = Scheduler::new(config(), market(slot), GridFeePolicy::default(), vec![]);

        for _ in 0..(4 * 4) {
            scheduler.run_tick().unwrap();
        }
        assert!(scheduler.past_markets().count() <= 2);
    }
}
