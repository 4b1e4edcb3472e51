use crate::protocol::{MarketOrders, MatchingDataFilter, MatchingDataResponse};
use indexmap::IndexMap;
use myco_market::Market;

/// Builds the `matching-data/response/` payload for one market, applying an optional
/// `energy_type` filter to the offer side (spec §4.8, grounded on
/// `original_source/.../external_matcher.py::_get_bids_offers`).
pub fn build_response(market: &Market, filter: Option<&MatchingDataFilter>) -> MatchingDataResponse {
    let mut matching_data = IndexMap::new();

    if let Some(markets) = filter.and_then(|f| f.markets.as_ref()) {
        if !markets.contains(&market.id) {
            return MatchingDataResponse::new(matching_data);
        }
    }

    let energy_type_filter = filter.and_then(|f| f.energy_type.as_ref());
    let bids = market.bids().map(|bid| bid.serializable_dict()).collect();
    let offers = market
        .offers()
        .filter(|offer| match energy_type_filter {
            Some(wanted) => offer.attributes.energy_type.as_deref() == Some(wanted.as_str()),
            None => true,
        })
        .map(|offer| offer.serializable_dict())
        .collect();

    matching_data.insert(market.id.clone(), MarketOrders { bids, offers });
    MatchingDataResponse::new(matching_data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use myco_fees::GridFeePolicy;
    use myco_model::{ActorId, MarketId, OrderAttributes};
    use rust_decimal_macros::dec;

    #[test]
    fn energy_type_filter_restricts_offers_only() {
        let mut market = Market::new(MarketId::new("m1"), Utc::now(), GridFeePolicy::default());
        market
            .post_offer(
                dec!(1), dec!(10), ActorId::new("pv"), ActorId::new("pv"), dec!(10),
                OrderAttributes { energy_type: Some("PV".into()), ..Default::default() },
                Default::default(),
            )
            .unwrap();
        market
            .post_offer(dec!(1), dec!(10), ActorId::new("battery"), ActorId::new("battery"), dec!(10), Default::default(), Default::default())
            .unwrap();
        market
            .post_bid(dec!(1), dec!(12), ActorId::new("buyer"), ActorId::new("buyer"), dec!(12), dec!(12), Default::default(), Default::default())
            .unwrap();

        let filter = MatchingDataFilter { markets: None, energy_type: Some("PV".into()) };
        let response = build_response(&market, Some(&filter));
        let orders = &response.matching_data[&market.id];
        assert_eq!(orders.offers.len(), 1);
        assert_eq!(orders.bids.len(), 1, "the bid side is not filtered by energy_type");
    }

    #[test]
    fn market_not_in_filter_yields_empty_payload() {
        let market = Market::new(MarketId::new("m1"), Utc::now(), GridFeePolicy::default());
        let filter = MatchingDataFilter { markets: Some(vec![MarketId::new("other")]), energy_type: None };
        let response = build_response(&market, Some(&filter));
        assert!(response.matching_data.is_empty());
    }
}
