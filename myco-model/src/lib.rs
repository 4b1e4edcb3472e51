#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! # Myco-Model
//! Immutable-value order book primitives for the Myco microgrid energy market simulator:
//! `Offer`, `Bid`, `Trade`, their ids, and the residual-splitting arithmetic used whenever an
//! order is partially accepted.
//!
//! Equality on `Offer`/`Bid` is by `id`; rate is always computed from `price`/`energy`, never
//! stored independently.

pub mod attributes;
pub mod error;
pub mod id;
pub mod order;
pub mod trade;

pub use attributes::{OrderAttributes, OrderRequirements};
pub use error::InvalidOrder;
pub use id::{ActorId, MarketId, OrderId, TradeId};
pub use order::{split_residual_energy, Bid, Offer};
pub use trade::{AcceptedSide, Trade};
