use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Optional, filterable metadata carried by an `Offer`.
///
/// `energy_type` is the only attribute named by the spec (e.g. `"PV"`); kept as a free-form
/// `SmolStr` rather than a closed enum since new device types are expected to be added without
/// touching the matching engines.
#[derive(Debug, Clone, Default, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub struct OrderAttributes {
    pub energy_type: Option<SmolStr>,
}

/// Requirements a counter-order must satisfy to be eligible for matching against this order.
///
/// `max_seller_count` bounds how many distinct sellers may jointly fill one bid in an
/// external-matcher many-to-many recommendation; `energy_type` restricts matching to
/// offers/bids that share the attribute.
#[derive(Debug, Clone, Default, Eq, PartialEq, Hash, Deserialize, Serialize)]
pub struct OrderRequirements {
    pub energy_type: Option<SmolStr>,
    pub max_seller_count: Option<u32>,
}

impl OrderRequirements {
    pub fn is_satisfied_by(&self, attributes: &OrderAttributes) -> bool {
        match (&self.energy_type, &attributes.energy_type) {
            (Some(required), Some(actual)) => required == actual,
            (Some(_), None) => false,
            (None, _) => true,
        }
    }
}
