#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! # Myco-Market
//! Per-slot order book (spec component C2): `post_offer`/`post_bid`, `delete_offer`/
//! `delete_bid`, `accept_offer`/`accept_bid`, and the bulk `match_recommendations` used by the
//! pay-as-clear engine and the external matcher. Owns its order maps and trade list exclusively;
//! callers hold only ids and must re-resolve through a `Market` to act (spec §3 Ownership).

pub mod error;
pub mod event;
pub mod market;

pub use error::MarketError;
pub use event::{Listener, MarketEvent, OrderEvent, OrderListener};
pub use market::{MatchRecommendation, Market};
