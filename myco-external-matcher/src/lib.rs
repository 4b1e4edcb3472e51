#![forbid(unsafe_code)]
#![warn(
    unused,
    clippy::cognitive_complexity,
    missing_debug_implementations,
    rust_2018_idioms
)]

//! # Myco-External-Matcher
//! Pub/sub protocol for out-of-process matching (spec component C8): `matching-data/`,
//! `recommendations/`, and `events/` channels, request/response wire shapes, and the
//! scheduler-side `ExternalMatcher` implementation with its bounded-timeout fallback.
//!
//! Grounded on `original_source/.../myco_matcher/external_matcher.py` for the protocol shape
//! and on `barter-integration::channel`'s `Tx`-trait-over-`tokio::sync::mpsc` idiom for the
//! transport (spec §9 redesign flag: "coroutine-style pub/sub -> a bounded channel per topic").

pub mod channel;
pub mod error;
pub mod matching_data;
pub mod protocol;
pub mod validate;

pub use channel::{channel_pair, ExternalMatcherClient, ExternalMatcherServer};
pub use error::MatcherError;
