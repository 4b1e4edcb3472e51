use crate::attributes::{OrderAttributes, OrderRequirements};
use crate::error::InvalidOrder;
use crate::id::{ActorId, OrderId};
use chrono::{DateTime, Utc};
use derive_more::Constructor;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An immutable-value sell order posted into a `Market` for a given `time_slot`.
///
/// Grounded on `barter-execution::order::{Open, RequestOpen}`, collapsed into a single
/// value type since the spec's order book has no exchange round-trip / in-flight states:
/// an `Offer` simply exists in a market's book or it doesn't.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct Offer {
    pub id: OrderId,
    pub time_slot: DateTime<Utc>,
    pub price: Decimal,
    pub energy: Decimal,
    pub seller: ActorId,
    pub seller_origin: ActorId,
    pub original_price: Decimal,
    pub attributes: OrderAttributes,
    pub requirements: OrderRequirements,
    pub residual_of: Option<OrderId>,
}

impl Offer {
    /// Rate is always computed from `price`/`energy`, never stored independently.
    pub fn rate(&self) -> Decimal {
        self.price / self.energy
    }

    pub fn validate(energy: Decimal, price: Decimal) -> Result<(), InvalidOrder> {
        if energy <= Decimal::ZERO {
            return Err(InvalidOrder::NonPositiveEnergy(energy));
        }
        if price < Decimal::ZERO {
            return Err(InvalidOrder::NegativePrice(price));
        }
        Ok(())
    }

    /// Stable, field-ordered dictionary used by the external-matcher wire protocol (spec
    /// §6: "Field order in `serializable_dict` is fixed so that hashes are stable across
    /// runs"). Grounded on `original_source`'s `Offer`/`Bid` dataclasses serialized for the
    /// myco matcher.
    pub fn serializable_dict(&self) -> IndexMap<&'static str, Value> {
        let mut map = IndexMap::new();
        map.insert("id", Value::from(self.id.0.as_str()));
        map.insert("energy", Value::from(self.energy.to_string()));
        map.insert("price", Value::from(self.price.to_string()));
        map.insert("original_price", Value::from(self.original_price.to_string()));
        map.insert("seller", Value::from(self.seller.0.as_str()));
        map.insert("seller_origin", Value::from(self.seller_origin.0.as_str()));
        map.insert(
            "energy_type",
            self.attributes
                .energy_type
                .as_ref()
                .map(|s| Value::from(s.as_str()))
                .unwrap_or(Value::Null),
        );
        map
    }
}

/// A buy order, symmetric to `Offer`, carrying a `final_buying_rate` ceiling enforced by the
/// posting strategy (not re-validated here; the market accepts whatever rate it is given).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, Constructor)]
pub struct Bid {
    pub id: OrderId,
    pub time_slot: DateTime<Utc>,
    pub price: Decimal,
    pub energy: Decimal,
    pub buyer: ActorId,
    pub buyer_origin: ActorId,
    pub original_price: Decimal,
    pub final_buying_rate: Decimal,
    pub attributes: OrderAttributes,
    pub requirements: OrderRequirements,
    pub residual_of: Option<OrderId>,
}

impl Bid {
    pub fn rate(&self) -> Decimal {
        self.price / self.energy
    }

    pub fn validate(energy: Decimal, price: Decimal) -> Result<(), InvalidOrder> {
        Offer::validate(energy, price)
    }

    pub fn serializable_dict(&self) -> IndexMap<&'static str, Value> {
        let mut map = IndexMap::new();
        map.insert("id", Value::from(self.id.0.as_str()));
        map.insert("energy", Value::from(self.energy.to_string()));
        map.insert("price", Value::from(self.price.to_string()));
        map.insert("original_price", Value::from(self.original_price.to_string()));
        map.insert("buyer", Value::from(self.buyer.0.as_str()));
        map.insert("buyer_origin", Value::from(self.buyer_origin.0.as_str()));
        map.insert(
            "energy_type",
            self.attributes
                .energy_type
                .as_ref()
                .map(|s| Value::from(s.as_str()))
                .unwrap_or(Value::Null),
        );
        map
    }
}

/// Splits an `Offer`/`Bid` of `original_energy`/`original_price` into an accepted portion of
/// `accepted_energy` and a residual re-inserted under a fresh id.
///
/// Grounded on `original_source/.../market.py::accept_offer`'s partial-trade branch. The
/// residual price invariant (`accepted.price + residual.price == original.price` exactly) is
/// preserved by deriving the residual price as `original_price - accepted_price`, rather than
/// recomputing `rate * residual_energy` independently and risking rounding drift.
pub fn split_residual_energy(
    original_energy: Decimal,
    original_price: Decimal,
    accepted_energy: Decimal,
) -> Result<(Decimal, Decimal, Decimal), InvalidOrder> {
    if accepted_energy <= Decimal::ZERO {
        return Err(InvalidOrder::ZeroTradeEnergy(accepted_energy));
    }
    if accepted_energy > original_energy {
        return Err(InvalidOrder::InvalidTrade {
            id: OrderId::new("n/a"),
            requested: accepted_energy,
            available: original_energy,
        });
    }

    let rate = original_price / original_energy;
    let accepted_price = rate * accepted_energy;
    let residual_energy = original_energy - accepted_energy;
    let residual_price = original_price - accepted_price;
    Ok((accepted_price, residual_energy, residual_price))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rate_is_computed_not_stored() {
        let offer = Offer::new(
            OrderId::new("o1"),
            Utc::now(),
            dec!(40),
            dec!(4),
            ActorId::new("seller"),
            ActorId::new("seller"),
            dec!(40),
            OrderAttributes::default(),
            OrderRequirements::default(),
            None,
        );
        assert_eq!(offer.rate(), dec!(10));
    }

    #[test]
    fn validate_rejects_non_positive_energy() {
        assert!(Offer::validate(dec!(0), dec!(1)).is_err());
        assert!(Offer::validate(dec!(-1), dec!(1)).is_err());
    }

    #[test]
    fn validate_rejects_negative_price() {
        assert!(Offer::validate(dec!(1), dec!(-1)).is_err());
    }

    #[test]
    fn residual_mass_invariant_holds() {
        // scenario 2: offer {4 kWh, 40}, accept 3 kWh -> trade {3, 30}, residual {1, 10}
        let (accepted_price, residual_energy, residual_price) =
            split_residual_energy(dec!(4), dec!(40), dec!(3)).unwrap();
        assert_eq!(accepted_price, dec!(30));
        assert_eq!(residual_energy, dec!(1));
        assert_eq!(residual_price, dec!(10));
        assert_eq!(accepted_price + residual_price, dec!(40));
    }

    #[test]
    fn residual_split_rejects_energy_larger_than_original() {
        assert!(split_residual_energy(dec!(2), dec!(20), dec!(3)).is_err());
    }
}
