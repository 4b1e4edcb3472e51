#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! # Myco-Future-Market
//! Future and settlement markets (spec component C6): `FutureMarket` holds per-slot sub-books
//! for one look-ahead horizon and rotates them forward every spot-market cycle; `SettlementMarket`
//! trues up the difference between a strategy's forecast and realized energy for a past slot.

pub mod error;
pub mod future_market;
pub mod horizon;
pub mod settlement;

pub use error::FutureMarketError;
pub use future_market::FutureMarket;
pub use horizon::Horizon;
pub use settlement::SettlementMarket;
