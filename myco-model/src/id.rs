use derive_more::{Constructor, Display, From};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies an `Offer` or `Bid` within a single `Market`.
///
/// Grounded on `barter-execution::order::OrderId`: a `SmolStr`-backed newtype that avoids
/// heap allocation for the common case of short, generated ids.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display, From)]
pub struct OrderId(pub SmolStr);

impl OrderId {
    pub fn new<S: AsRef<str>>(id: S) -> Self {
        Self(SmolStr::new(id))
    }

    /// Generates a fresh id for a residual order.
    ///
    /// The simulator is single-threaded and deterministic, so ids are drawn from a
    /// monotonically increasing counter rather than a random UUID: this keeps
    /// `Scheduler determinism` (spec Testable Properties) trivially true across runs with an
    /// identical order of operations, without needing to thread an RNG through every `post`.
    pub fn next_residual() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(SmolStr::new(format!("residual-{n}")))
    }
}

#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display, From, Constructor)]
pub struct TradeId(pub SmolStr);

impl TradeId {
    pub fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        Self(SmolStr::new(format!("trade-{n}")))
    }
}

/// Identifies an actor (strategy / area) that can buy or sell energy.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display, From)]
pub struct ActorId(pub SmolStr);

impl ActorId {
    pub fn new<S: AsRef<str>>(id: S) -> Self {
        Self(SmolStr::new(id))
    }
}

/// Identifies a `Market` (one per `Area` per `time_slot`).
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Deserialize, Serialize, Display, From)]
pub struct MarketId(pub SmolStr);

impl MarketId {
    pub fn new<S: AsRef<str>>(id: S) -> Self {
        Self(SmolStr::new(id))
    }
}
