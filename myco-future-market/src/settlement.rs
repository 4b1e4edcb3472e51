use chrono::{DateTime, Utc};
use myco_fees::GridFeePolicy;
use myco_market::{Market, MarketError};
use myco_model::{ActorId, MarketId, OrderAttributes, OrderRequirements, Trade};
use rust_decimal::Decimal;
use tracing::info;

/// Opened retroactively for a past slot to true-up the gap between a strategy's forecast energy
/// and what it actually metered (spec §4.6). Carries its own fee profile, independent of the
/// spot market the slot originally cleared in.
///
/// The only way to post into a `SettlementMarket` is through its own methods, which is what
/// makes every order in it a "settlement order": there is no path for an ordinary spot-market
/// order to end up in this book.
#[derive(Debug)]
pub struct SettlementMarket {
    market: Market,
}

impl SettlementMarket {
    pub fn new(time_slot: DateTime<Utc>, grid_fees: GridFeePolicy) -> Self {
        let id = MarketId::new(format!("settlement-{time_slot}"));
        Self { market: Market::new(id, time_slot, grid_fees) }
    }

    pub fn market(&self) -> &Market {
        &self.market
    }

    /// Settles the deviation between `forecast_energy` and `realized_energy` at `rate`: if the
    /// actor produced/consumed more than forecast, it sells the surplus to `counterparty`;
    /// if less, it buys the shortfall from `counterparty`. Returns `None` when forecast and
    /// realized energy match exactly (no true-up needed).
    pub fn true_up(
        &mut self,
        actor: ActorId,
        counterparty: ActorId,
        forecast_energy: Decimal,
        realized_energy: Decimal,
        rate: Decimal,
    ) -> Result<Option<Trade>, MarketError> {
        let deviation = realized_energy - forecast_energy;
        if deviation.is_zero() {
            return Ok(None);
        }

        if deviation > Decimal::ZERO {
            let price = deviation * rate;
            let offer = self.market.post_offer(
                deviation,
                price,
                actor.clone(),
                actor,
                price,
                OrderAttributes::default(),
                OrderRequirements::default(),
            )?;
            info!(energy = %deviation, "settlement surplus sold");
            self.market.accept_offer(&offer.id, counterparty, None, None).map(Some)
        } else {
            let shortfall = -deviation;
            let price = shortfall * rate;
            let bid = self.market.post_bid(
                shortfall,
                price,
                actor.clone(),
                actor,
                price,
                rate,
                OrderAttributes::default(),
                OrderRequirements::default(),
            )?;
            info!(energy = %shortfall, "settlement shortfall bought");
            self.market.accept_bid(&bid.id, counterparty, None, None).map(Some)
        }
    }
}
