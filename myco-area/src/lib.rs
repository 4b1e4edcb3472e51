#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! # Myco-Area
//! The microgrid tree itself: an arena of `Area` nodes (spec §3, §9 "tree stored as index-based
//! nodes in an arena"), the `RuntimeConfig` bootstrap struct (spec §6), the strategy capability
//! trait and its concrete strategies (spec §9 "deep inheritance of strategies"), and
//! `SimulationTree`, which drives ticks and slot rotation across the whole tree.
//!
//! `SimulationTree` implements `myco_scheduler::TickListener` but owns its root market itself
//! rather than reading it from the `Scheduler`: `TickListener::on_tick` carries only a tick
//! counter, no market reference, which fits a scheduler driving one flat market but not a tree
//! of them. A hierarchical run therefore hands the `Scheduler` a `SimulationTree` listener and
//! otherwise ignores the `Scheduler`'s own (unused) spot market; `on_market_cycle`'s
//! `closed_slot` argument is likewise not needed since `SimulationTree` detects its own slot
//! boundary from the tick counter and rotates every node's market itself. This keeps Market
//! ownership exclusively with `Market`/`Area` (spec §3 Ownership) instead of duplicating state
//! between the scheduler and the tree.

pub mod config;
pub mod error;
pub mod index;
pub mod strategy;

pub use config::{CloudCoverage, ConfigError, RuntimeConfig};
pub use error::SimulationError;
pub use index::{AreaIndex, AreaKind, AreaNode, AreaTree};
pub use strategy::{
    CommercialProducerStrategy, ForecastSource, LoadStrategy, PvStrategy, StrategyBehavior, StrategyKind,
};

use chrono::{DateTime, Duration, Utc};
use fnv::FnvHashMap;
use myco_fees::GridFeePolicy;
use myco_market::Market;
use myco_matching::{one_sided, pay_as_bid, pay_as_clear};
use myco_model::{AcceptedSide, ActorId, MarketId, Trade};
use myco_scheduler::MatchingMode;
use std::collections::VecDeque;
use tracing::{debug, info, warn};

/// Drives `TICK`/`MARKET_CYCLE` across an entire `AreaTree` (spec §4.7 generalized to a
/// hierarchy): every tick, leaf strategies act and child areas forward eligible orders upward
/// through their `InterAreaAgent`; every `ticks_per_slot`-th tick, every internal area clears
/// its own book (pay-as-bid, chaining resulting trades down through any forwarded order),
/// rotates to a fresh market, and notifies its leaf strategies of the new slot.
#[derive(Debug)]
pub struct SimulationTree {
    tree: AreaTree,
    tick_length: Duration,
    slot_length: Duration,
    ticks_per_slot: u64,
    min_forward_age_ticks: Option<u64>,
    keep_past_markets: usize,
    matching_mode: MatchingMode,
    past_markets: FnvHashMap<usize, VecDeque<Market>>,
}

impl SimulationTree {
    pub fn new(
        tree: AreaTree,
        tick_length: Duration,
        slot_length: Duration,
        min_forward_age_ticks: Option<u64>,
        keep_past_markets: usize,
        matching_mode: MatchingMode,
    ) -> Self {
        let ticks_per_slot =
            (slot_length.num_milliseconds() / tick_length.num_milliseconds()).max(1) as u64;
        Self {
            tree,
            tick_length,
            slot_length,
            ticks_per_slot,
            min_forward_age_ticks,
            keep_past_markets,
            matching_mode,
            past_markets: FnvHashMap::default(),
        }
    }

    pub fn tree(&self) -> &AreaTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut AreaTree {
        &mut self.tree
    }

    pub fn market(&self, idx: AreaIndex) -> Result<&Market, SimulationError> {
        self.tree.market(idx)
    }

    pub fn past_markets(&self, idx: AreaIndex) -> impl Iterator<Item = &Market> {
        self.past_markets.get(&idx.0).into_iter().flatten()
    }

    /// Fires every leaf's `on_activate` against its parent market, once, before the first tick.
    /// Mirrors the source's single `event_activate` dispatch at simulation start.
    pub fn activate_all(&mut self) -> Result<(), SimulationError> {
        for idx in 0..self.tree.len() {
            let idx = AreaIndex(idx);
            if matches!(self.tree.node(idx)?.kind, AreaKind::Leaf { .. }) {
                let node_id = self.tree.node(idx)?.id.clone();
                let (strategy, parent_market) = self.tree.leaf_and_parent_market(idx)?;
                strategy.on_activate(parent_market, &node_id);
            }
        }
        Ok(())
    }

    fn tick_in_slot(&self, total_tick: u64) -> u64 {
        ((total_tick.saturating_sub(1)) % self.ticks_per_slot) + 1
    }

    /// Top-down pass: advances every market's tick counter and lets leaf strategies act, then
    /// forwards eligible child orders into their parent bottom-up (children always carry a
    /// higher arena index than their parent, so a descending scan is a valid bottom-up order).
    fn dispatch_tick(&mut self, tick_in_slot: u64) -> Result<(), SimulationError> {
        for idx in 0..self.tree.len() {
            let idx = AreaIndex(idx);
            if matches!(self.tree.node(idx)?.kind, AreaKind::Leaf { .. }) {
                let node_id = self.tree.node(idx)?.id.clone();
                let (strategy, parent_market) = self.tree.leaf_and_parent_market(idx)?;
                strategy.on_tick(parent_market, &node_id, tick_in_slot, self.tick_length);
            } else {
                let AreaKind::Internal { market, .. } = &mut self.tree.node_mut(idx)?.kind else {
                    unreachable!("checked above")
                };
                market.set_current_tick(tick_in_slot);
            }
        }

        for idx in (0..self.tree.len()).rev() {
            let idx = AreaIndex(idx);
            if self.tree.parent(idx)?.is_none() {
                continue;
            }
            if !matches!(self.tree.node(idx)?.kind, AreaKind::Internal { .. }) {
                continue;
            }
            let (child_node, parent_market) = self.tree.child_node_and_parent_market(idx)?;
            if let AreaKind::Internal { market: child_market, iaa: Some(iaa) } = &mut child_node.kind {
                iaa.forward_offers(child_market, parent_market, self.min_forward_age_ticks)?;
                iaa.forward_bids(child_market, parent_market, self.min_forward_age_ticks)?;
            }
        }
        Ok(())
    }

    /// Runs matching top-down (parents before children, so a parent-level trade against a
    /// forwarded order can be chained down into the still-open child market before that child
    /// itself is closed and rotated).
    fn match_and_chain(&mut self) -> Result<(), SimulationError> {
        for idx in 0..self.tree.len() {
            let idx = AreaIndex(idx);
            if !matches!(self.tree.node(idx)?.kind, AreaKind::Internal { .. }) {
                continue;
            }
            let trades = {
                let market = self.tree.market_mut(idx)?;
                match self.matching_mode {
                    MatchingMode::OneSided => one_sided::clear_book(market, self.min_forward_age_ticks)?,
                    MatchingMode::PayAsBid => {
                        let recommendations = pay_as_bid::plan(market, self.min_forward_age_ticks);
                        market.match_recommendations(&recommendations)?
                    }
                    MatchingMode::PayAsClear => {
                        let plan = pay_as_clear::plan(market, self.min_forward_age_ticks);
                        market.match_recommendations(&plan.recommendations)?
                    }
                }
            };
            for trade in trades {
                self.chain_into_children(idx, &trade)?;
            }
        }
        Ok(())
    }

    fn chain_into_children(&mut self, idx: AreaIndex, trade: &Trade) -> Result<(), SimulationError> {
        let children = self.tree.children(idx)?.to_vec();
        for child_idx in children {
            let forwarded = match &self.tree.node(child_idx)?.kind {
                AreaKind::Internal { iaa: Some(iaa), .. } => match trade.offer_or_bid {
                    AcceptedSide::Offer => iaa.is_forwarded_offer(&trade.order_id),
                    AcceptedSide::Bid => iaa.is_forwarded_bid(&trade.order_id),
                },
                _ => false,
            };
            if !forwarded {
                continue;
            }

            let (child_node, parent_market) = self.tree.child_node_and_parent_market(child_idx)?;
            let AreaKind::Internal { market: child_market, iaa: Some(iaa) } = &mut child_node.kind
            else {
                unreachable!("checked forwarded above");
            };
            let result = match trade.offer_or_bid {
                AcceptedSide::Offer => iaa.chain_offer_trade(
                    parent_market,
                    child_market,
                    trade,
                    trade.buyer.clone(),
                    Some(trade.time),
                ),
                AcceptedSide::Bid => iaa.chain_bid_trade(
                    parent_market,
                    child_market,
                    trade,
                    trade.seller.clone(),
                    Some(trade.time),
                ),
            };
            match result {
                Ok(child_trade) => debug!(
                    parent_trade = %trade.id,
                    child_trade = %child_trade.id,
                    "trade chained into child area"
                ),
                Err(err) => warn!(%err, "chaining trade into child area failed"),
            }
            return Ok(());
        }
        Ok(())
    }

    /// Bottom-up pass: seals every internal area's market, snapshots it into that area's
    /// past-markets ring, swaps in a fresh market for the next slot, clears stale forwarding
    /// state, and notifies leaf strategies of the new slot.
    fn rotate_all(&mut self, next_slot: DateTime<Utc>) -> Result<(), SimulationError> {
        for idx_val in (0..self.tree.len()).rev() {
            let idx = AreaIndex(idx_val);
            let (grid_fees, node_id) = {
                let node = self.tree.node(idx)?;
                match &node.kind {
                    AreaKind::Internal { market, .. } => (market.grid_fees, node.id.clone()),
                    AreaKind::Leaf { .. } => continue,
                }
            };

            let node = self.tree.node_mut(idx)?;
            let AreaKind::Internal { market, iaa } = &mut node.kind else {
                unreachable!("checked above")
            };
            market.mark_readonly();
            let fresh = Market::new(MarketId::new(format!("{node_id}-{next_slot}")), next_slot, grid_fees);
            let closed = std::mem::replace(market, fresh);
            if let Some(iaa) = iaa.as_mut() {
                iaa.clear_pipes();
            }

            let ring = self.past_markets.entry(idx_val).or_default();
            ring.push_back(closed);
            while ring.len() > self.keep_past_markets {
                ring.pop_front();
            }
        }

        for idx in 0..self.tree.len() {
            let idx = AreaIndex(idx);
            if matches!(self.tree.node(idx)?.kind, AreaKind::Leaf { .. }) {
                let node_id = self.tree.node(idx)?.id.clone();
                let (strategy, parent_market) = self.tree.leaf_and_parent_market(idx)?;
                strategy.on_market_cycle(parent_market, &node_id);
            }
        }
        Ok(())
    }

    pub fn current_slot(&self) -> Result<DateTime<Utc>, SimulationError> {
        Ok(self.tree.market(self.tree.root())?.time_slot)
    }
}

impl myco_scheduler::TickListener for SimulationTree {
    fn on_tick(&mut self, tick: u64) {
        let tick_in_slot = self.tick_in_slot(tick);
        if let Err(err) = self.dispatch_tick(tick_in_slot) {
            warn!(%err, "tick dispatch failed");
            return;
        }

        if tick_in_slot == self.ticks_per_slot {
            let current_slot = match self.current_slot() {
                Ok(slot) => slot,
                Err(err) => {
                    warn!(%err, "could not read current slot");
                    return;
                }
            };
            if let Err(err) = self.match_and_chain() {
                warn!(%err, "slot-close matching failed");
                return;
            }
            info!(slot = %current_slot, "area tree slot closed");
            let next_slot = current_slot + self.slot_length;
            if let Err(err) = self.rotate_all(next_slot) {
                warn!(%err, "slot rotation failed");
            }
        }
    }

    fn on_market_cycle(&mut self, _closed_slot: &Market) {
        // Rotation already happened in `on_tick`; the scheduler's own market is unused by a
        // tree-driven simulation (see module docs).
    }
}

/// Convenience constructor for a leaf device area, used by wiring code and tests.
pub fn new_leaf_area(
    tree: &mut AreaTree,
    parent: AreaIndex,
    id: ActorId,
    strategy: StrategyKind,
) -> Result<AreaIndex, SimulationError> {
    tree.add_leaf(parent, id, strategy)
}

/// Convenience constructor for an internal (non-leaf) area with a freshly built
/// `InterAreaAgent` forwarding it into `parent`.
pub fn new_internal_area(
    tree: &mut AreaTree,
    parent: AreaIndex,
    id: ActorId,
    time_slot: DateTime<Utc>,
    grid_fees: GridFeePolicy,
) -> Result<AreaIndex, SimulationError> {
    let market = Market::new(MarketId::new(format!("{id}-{time_slot}")), time_slot, grid_fees);
    let iaa = myco_iaa::InterAreaAgent::new(grid_fees, id.clone());
    tree.add_internal(parent, id, market, iaa)
}
