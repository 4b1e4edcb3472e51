#![forbid(unsafe_code)]
#![warn(unused, missing_debug_implementations, rust_2018_idioms)]

//! # Myco-Fees
//! Grid fee calculator (spec component C4): a per-hop surcharge applied by an `Area`'s
//! inter-area agent as it forwards an offer from a child market into its parent, either a
//! flat currency-per-kWh `Constant` fee or a multiplicative `Percentage` fee.
//!
//! Grounded on `barter_execution::trade::AssetFees`'s "fees applied to a trade" shape, with
//! the stacking rule taken from spec §4.4.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single area's grid fee configuration. An area may in principle carry both a constant and
/// a percentage fee; `GridFeePolicy` keeps them as two independent, optional knobs rather than
/// an enum, since the spec's `grid_fee_type` selects which one a simulation run uses but does
/// not forbid an area from carrying the unused one at zero.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Default, Deserialize, Serialize)]
pub struct GridFeePolicy {
    pub constant: Option<Decimal>,
    pub percentage: Option<Decimal>,
}

impl GridFeePolicy {
    pub fn constant(fee: Decimal) -> Self {
        Self {
            constant: Some(fee),
            percentage: None,
        }
    }

    pub fn percentage(fee: Decimal) -> Self {
        Self {
            constant: None,
            percentage: Some(fee),
        }
    }

    /// Applies this area's hop fee to a seller-side rate, producing the rate the buyer on the
    /// other side of this hop sees.
    pub fn apply(&self, seller_rate: Decimal) -> Decimal {
        let mut rate = seller_rate;
        if let Some(constant) = self.constant {
            rate += constant;
        }
        if let Some(percentage) = self.percentage {
            rate *= Decimal::ONE + percentage;
        }
        rate
    }

    /// Inverts `apply`: given the rate a buyer sees on the far side of this hop, recovers the
    /// rate the seller on the near side posted. Used when forwarding a bid upward, where the
    /// forwarded price must already have this hop's markup backed out so that applying the fee
    /// again on the way back down reproduces the child buyer's original rate.
    pub fn invert(&self, buyer_rate: Decimal) -> Decimal {
        let mut rate = buyer_rate;
        if let Some(percentage) = self.percentage {
            rate /= Decimal::ONE + percentage;
        }
        if let Some(constant) = self.constant {
            rate -= constant;
        }
        rate
    }
}

/// Composes an ordered chain of per-hop fee policies (root-most hop first) into the rate the
/// final buyer sees, starting from the rate the original seller posted.
///
/// Spec §4.4: for constant fees, `rate_buyer = rate_seller + sum(fee_const_i)`; for percentage
/// fees, `rate_buyer = rate_seller * product(1 + pct_i)`. Composing hop-by-hop via `apply`
/// gives both rules simultaneously, matching a chain that mixes fee types across hops.
pub fn compose_buyer_rate(seller_rate: Decimal, hops: &[GridFeePolicy]) -> Decimal {
    hops.iter().fold(seller_rate, |rate, hop| hop.apply(rate))
}

/// `fee_price` for a trade that traversed `hops`: the per-kWh markup accumulated across those
/// hops, multiplied by the traded energy (spec §4.4).
pub fn fee_price(seller_rate: Decimal, hops: &[GridFeePolicy], traded_energy: Decimal) -> Decimal {
    let buyer_rate = compose_buyer_rate(seller_rate, hops);
    (buyer_rate - seller_rate) * traded_energy
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn two_hop_constant_fee_matches_scenario_4() {
        // fees {parent:1, child:2}; child offer rate 5 -> buyer sees 8; fee_price = energy * 3
        let hops = [GridFeePolicy::constant(dec!(2)), GridFeePolicy::constant(dec!(1))];
        let buyer_rate = compose_buyer_rate(dec!(5), &hops);
        assert_eq!(buyer_rate, dec!(8));
        assert_eq!(fee_price(dec!(5), &hops, dec!(10)), dec!(30));
    }

    #[test]
    fn percentage_fee_composition_within_tolerance() {
        let hops = [
            GridFeePolicy::percentage(dec!(0.1)),
            GridFeePolicy::percentage(dec!(0.05)),
        ];
        let buyer_rate = compose_buyer_rate(dec!(10), &hops);
        let expected = dec!(10) * (Decimal::ONE + dec!(0.1)) * (Decimal::ONE + dec!(0.05));
        assert!((buyer_rate - expected).abs() < dec!(0.0000000001));
    }

    #[test]
    fn no_hops_leaves_rate_unchanged() {
        assert_eq!(compose_buyer_rate(dec!(7), &[]), dec!(7));
    }

    #[test]
    fn invert_undoes_apply() {
        let fee = GridFeePolicy { constant: Some(dec!(2)), percentage: Some(dec!(0.1)) };
        let seller_rate = dec!(5);
        let buyer_rate = fee.apply(seller_rate);
        assert_eq!(fee.invert(buyer_rate), seller_rate);
    }
}
