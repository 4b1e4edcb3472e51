use crate::profile::RateSource;
use chrono::{DateTime, Duration, Utc};
use fnv::FnvHashMap;
use rust_decimal::Decimal;

/// Which direction a rate is allowed to drift during interpolation: a seller's rate only ever
/// rises towards its final (ceiling) value, a buyer's only ever falls towards its final (floor)
/// value. Grounded on the source's `rate_limit_object=min`/`max` parameter to `get_updated_rate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClampDirection {
    Max,
    Min,
}

impl ClampDirection {
    fn clamp(self, candidate: Decimal, final_rate: Decimal) -> Decimal {
        match self {
            ClampDirection::Max => candidate.max(final_rate),
            ClampDirection::Min => candidate.min(final_rate),
        }
    }
}

/// Linear interpolation of a rate between `initial_rate` and `final_rate` over the course of a
/// market slot, updating at most once per `update_interval` (spec §4.9 rate updater).
///
/// Grounded on `original_source/.../strategy/update_frequency.py::TemplateStrategyUpdaterBase`.
#[derive(Debug, Clone)]
pub struct RateUpdater {
    initial_rate: RateSource,
    final_rate: RateSource,
    fit_to_limit: bool,
    rate_change_per_update: Option<Decimal>,
    update_interval: Duration,
    slot_length: Duration,
    clamp: ClampDirection,
    update_counter: FnvHashMap<DateTime<Utc>, u64>,
}

impl RateUpdater {
    pub fn new(
        initial_rate: RateSource,
        final_rate: RateSource,
        fit_to_limit: bool,
        rate_change_per_update: Option<Decimal>,
        update_interval: Duration,
        slot_length: Duration,
        clamp: ClampDirection,
    ) -> Self {
        Self {
            initial_rate,
            final_rate,
            fit_to_limit,
            rate_change_per_update,
            update_interval,
            slot_length,
            clamp,
            update_counter: FnvHashMap::default(),
        }
    }

    /// `max(floor(slot_length / update_interval) - 1, 1)`, grounded on
    /// `_calculate_number_of_available_updates_per_slot`.
    pub fn available_updates_per_slot(&self) -> u64 {
        let slots = self.slot_length.num_seconds() / self.update_interval.num_seconds();
        (slots - 1).max(1) as u64
    }

    fn rate_change_per_update(&self, slot: DateTime<Utc>) -> Decimal {
        if let Some(fixed) = self.rate_change_per_update {
            return fixed;
        }
        let initial = self.initial_rate.rate_at(slot);
        let final_ = self.final_rate.rate_at(slot);
        if self.fit_to_limit {
            (initial - final_) / Decimal::from(self.available_updates_per_slot())
        } else {
            Decimal::ZERO
        }
    }

    /// Increments and returns whether this call crosses the next update boundary for `slot`.
    /// Grounded on `time_for_price_update`: `elapsed_seconds >= update_interval_seconds * counter`.
    pub fn should_update(&mut self, slot: DateTime<Utc>, elapsed: Duration) -> bool {
        let counter = self.update_counter.entry(slot).or_insert(0);
        let threshold = self.update_interval.num_seconds() * (*counter as i64);
        if elapsed.num_seconds() >= threshold {
            *counter += 1;
            true
        } else {
            false
        }
    }

    /// `clamp_towards_final(initial - step * counter)`, grounded on `get_updated_rate`.
    pub fn rate_at(&self, slot: DateTime<Utc>) -> Decimal {
        let counter = *self.update_counter.get(&slot).unwrap_or(&0);
        let initial = self.initial_rate.rate_at(slot);
        let final_ = self.final_rate.rate_at(slot);
        let step = self.rate_change_per_update(slot);
        let candidate = initial - step * Decimal::from(counter);
        self.clamp.clamp(candidate, final_)
    }

    pub fn current_update_count(&self, slot: DateTime<Utc>) -> u64 {
        *self.update_counter.get(&slot).unwrap_or(&0)
    }

    /// Prunes tracked update counters for slots strictly before `current_slot`, grounded on
    /// `delete_past_state_values`.
    pub fn delete_past_state_values(&mut self, current_slot: DateTime<Utc>) {
        self.update_counter.retain(|slot, _| *slot >= current_slot);
    }

}
