//! Top-level harness wiring a `myco_area::SimulationTree` into a `myco_scheduler::Scheduler`
//! (spec §6 "construction flow"). Analogous to `barter::system`'s `System`/`SystemBuilder`,
//! scaled down to this crate's single-process, single-threaded scope.

use crate::error::MycoError;
use crate::scenario::{build_tree, ScenarioNode};
use fnv::FnvHashMap;
use myco_area::{AreaIndex, RuntimeConfig, SimulationTree};
use myco_fees::GridFeePolicy;
use myco_market::Market;
use myco_model::{ActorId, MarketId};
use myco_scheduler::{
    DispatchOrder, ExternalMatcher, Scheduler, SchedulerConfig, SchedulerControl, TickListener,
    TickOutcome,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration as StdDuration;

const KEEP_PAST_MARKETS: usize = 24;
const EXTERNAL_MATCHER_TIMEOUT: StdDuration = StdDuration::from_millis(250);

/// Adapts a shared `SimulationTree` handle to `TickListener`, the way
/// `myco_scheduler`'s own `RecordingListener` test fixture shares observable state with its
/// owning test via `Rc<RefCell<_>>`.
#[derive(Debug, Clone)]
struct SharedTree(Rc<RefCell<SimulationTree>>);

impl TickListener for SharedTree {
    fn on_tick(&mut self, tick: u64) {
        self.0.borrow_mut().on_tick(tick);
    }

    fn on_market_cycle(&mut self, closed_slot: &Market) {
        self.0.borrow_mut().on_market_cycle(closed_slot);
    }
}

/// A fully wired simulation: a `SimulationTree` driven by a `Scheduler`. The scheduler's own
/// spot market is never read for a hierarchical run (see `myco_area` crate docs); it exists
/// only because `Scheduler::new` always needs one.
#[derive(Debug)]
pub struct System {
    scheduler: Scheduler,
    tree: Rc<RefCell<SimulationTree>>,
    index: FnvHashMap<ActorId, AreaIndex>,
}

impl System {
    /// Builds a `System` from a `RuntimeConfig` and a scenario tree rooted at `root_id`.
    pub fn new(
        config: RuntimeConfig,
        root_id: ActorId,
        children: Vec<ScenarioNode>,
    ) -> Result<Self, MycoError> {
        config.validate()?;
        let (area_tree, index) = build_tree(root_id, children, &config)?;

        let simulation = SimulationTree::new(
            area_tree,
            config.tick_length,
            config.slot_length,
            None,
            KEEP_PAST_MARKETS,
            config.matching_mode,
        );
        let tree = Rc::new(RefCell::new(simulation));
        tree.borrow_mut().activate_all()?;
        let listener = SharedTree(tree.clone());

        let scheduler_config = SchedulerConfig {
            slot_length: config.slot_length,
            tick_length: config.tick_length,
            dispatch_order: DispatchOrder::TopToBottom,
            matching_mode: config.matching_mode,
            keep_past_markets: KEEP_PAST_MARKETS,
            external_matcher_timeout: EXTERNAL_MATCHER_TIMEOUT,
            slowdown: None,
        };
        let unused_spot_market = Market::new(
            MarketId::new("scheduler-unused"),
            config.start_date,
            config.grid_fee,
        );
        let scheduler = Scheduler::new(
            scheduler_config,
            unused_spot_market,
            config.grid_fee,
            vec![Box::new(listener)],
        );

        Ok(Self { scheduler, tree, index })
    }

    /// Registers an out-of-process matcher for the root-level spot market fallback path. Note
    /// this only affects the scheduler's own (unused) spot market for a hierarchical run; wiring
    /// an external matcher into a specific area's market is not yet exposed here.
    pub fn with_external_matcher(mut self, matcher: Box<dyn ExternalMatcher>) -> Self {
        self.scheduler = self.scheduler.with_external_matcher(matcher);
        self
    }

    pub fn control(&self) -> SchedulerControl {
        self.scheduler.control()
    }

    pub fn run_tick(&mut self) -> Result<TickOutcome, MycoError> {
        Ok(self.scheduler.run_tick()?)
    }

    pub fn run_until_stopped(&mut self) -> Result<(), MycoError> {
        Ok(self.scheduler.run_until_stopped()?)
    }

    /// Looks up the `AreaIndex` of an area or device registered by id at construction time.
    pub fn area(&self, id: &ActorId) -> Option<AreaIndex> {
        self.index.get(id).copied()
    }

    pub fn current_slot(&self) -> Result<chrono::DateTime<chrono::Utc>, MycoError> {
        Ok(self.tree.borrow().current_slot()?)
    }

    /// Runs `f` against the live market of `idx`, without exposing a borrow that outlives the
    /// `RefCell` guard.
    pub fn with_market<R>(
        &self,
        idx: AreaIndex,
        f: impl FnOnce(&Market) -> R,
    ) -> Result<R, MycoError> {
        let tree = self.tree.borrow();
        Ok(f(tree.market(idx)?))
    }

    /// Number of sealed past markets retained for `idx` (bounded by `KEEP_PAST_MARKETS`).
    pub fn past_market_count(&self, idx: AreaIndex) -> usize {
        self.tree.borrow().past_markets(idx).count()
    }

    /// Total trades settled across every retained past market for `idx`.
    pub fn past_trade_count(&self, idx: AreaIndex) -> usize {
        self.tree.borrow().past_markets(idx).map(|m| m.trades().len()).sum()
    }
}
