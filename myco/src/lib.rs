#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! # Myco
//! Discrete-event energy market simulator for hierarchical microgrids: a tree of areas, each
//! owning its own per-slot market, trading energy up and down the hierarchy through inter-area
//! agents and settling via pay-as-bid or pay-as-clear matching on a tick/slot schedule.
//!
//! This crate is the thin top-level assembly, analogous to the teacher workspace's own
//! top-level `barter` crate that wires `barter-execution`/`barter-data`/`barter-instrument`
//! together behind one public surface:
//! * [`system::System`] builds a runnable simulation from a [`myco_area::RuntimeConfig`] and a
//!   [`scenario::ScenarioNode`] tree, and drives it tick by tick.
//! * [`scenario`] describes that tree as a plain struct literal — no scenario file format or
//!   loader is implemented (out of scope).
//! * [`logging`] provides the same two `tracing-subscriber` initialisers the teacher ships.
//! * [`error::MycoError`] is the error type every public entry point in this crate returns.
//!
//! The lower-level crates (`myco-model`, `myco-market`, `myco-matching`, `myco-fees`,
//! `myco-iaa`, `myco-future-market`, `myco-rates`, `myco-scheduler`,
//! `myco-external-matcher`, `myco-area`) are re-exported so a consumer never needs to add them
//! as direct dependencies.

/// Errors returned by this crate's public API.
pub mod error;

/// Default `tracing-subscriber` initialisers for binaries and test harnesses.
pub mod logging;

/// In-memory scenario-tree description, walked into a live `myco_area::AreaTree`.
pub mod scenario;

/// The runnable `System`: a `SimulationTree` wired into a `Scheduler`.
pub mod system;

pub use error::MycoError;
pub use scenario::ScenarioNode;
pub use system::System;

pub use myco_area as area;
pub use myco_external_matcher as external_matcher;
pub use myco_fees as fees;
pub use myco_future_market as future_market;
pub use myco_iaa as iaa;
pub use myco_market as market;
pub use myco_matching as matching;
pub use myco_model as model;
pub use myco_rates as rates;
pub use myco_scheduler as scheduler;
