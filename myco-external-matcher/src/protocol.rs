use indexmap::IndexMap;
use myco_model::{MarketId, OrderId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Restricts a `matching-data/` request to a subset of markets and/or one energy type (spec
/// §4.8). Both fields absent means "everything open".
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct MatchingDataFilter {
    pub markets: Option<Vec<MarketId>>,
    pub energy_type: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct MatchingDataRequest {
    pub filters: Option<MatchingDataFilter>,
}

/// Per-market open book, using each order's `serializable_dict()` representation so that field
/// order (and therefore any hash computed over it) is stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MarketOrders {
    pub bids: Vec<IndexMap<&'static str, Value>>,
    pub offers: Vec<IndexMap<&'static str, Value>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchingDataResponse {
    pub event: &'static str,
    pub matching_data: IndexMap<MarketId, MarketOrders>,
}

impl MatchingDataResponse {
    pub fn new(matching_data: IndexMap<MarketId, MarketOrders>) -> Self {
        Self { event: "matching_data_response", matching_data }
    }
}

/// One proposed match within a `recommendations/` request. `bids`/`offers` may each name more
/// than one id (spec §4.2, §4.8 many-to-many); `validate::validate` splits the recommendation
/// into the single-offer/single-bid `MatchRecommendation`s the market applies.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RecommendedMatch {
    pub market_id: MarketId,
    pub bids: Vec<OrderId>,
    pub offers: Vec<OrderId>,
    pub trade_rate: Decimal,
    pub selected_energy: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RecommendationsRequest {
    pub recommended_matches: Vec<RecommendedMatch>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Success,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationsResponse {
    pub event: &'static str,
    pub status: MatchStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl RecommendationsResponse {
    pub fn success() -> Self {
        Self { event: "match", status: MatchStatus::Success, message: None }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self { event: "match", status: MatchStatus::Fail, message: Some(message.into()) }
    }
}

/// `events/` is server-to-client only; these are the three event kinds the scheduler broadcasts
/// (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SchedulerEvent {
    Tick { tick: u64 },
    MarketCycle,
    Finish,
}
