#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! # Myco-Matching
//! The three pluggable clearing engines (spec component C3): one-sided pay-as-offer
//! (`one_sided`), two-sided pay-as-bid (`pay_as_bid`), and two-sided pay-as-clear / uniform
//! pricing (`pay_as_clear`). Each engine only reads a `Market`'s book and returns a plan; the
//! actual mutation goes through `Market::accept_offer` or `Market::match_recommendations` so the
//! accounting/event invariants stay owned by `myco-market`.

mod common;
pub mod one_sided;
pub mod pay_as_bid;
pub mod pay_as_clear;

pub use common::DEFAULT_MIN_ORDER_AGE_TICKS;
pub use pay_as_clear::ClearingPlan;
