#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! # Myco-Rates
//! Periodic rate updater for template strategies (spec component C9): linearly interpolates a
//! posted offer/bid rate from an initial value towards a final value over the course of a market
//! slot, at most once per configured update interval, with optional weekday+time-of-day profile
//! lookup in place of a flat scalar rate.

pub mod profile;
pub mod updater;

pub use profile::{RateProfile, RateSource};
pub use updater::{ClampDirection, RateUpdater};
