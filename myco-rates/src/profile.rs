use chrono::{DateTime, NaiveTime, Utc, Weekday};
use rust_decimal::Decimal;
use std::collections::BTreeMap;

/// A rate that is either a single scalar applied to every slot, or a profile keyed by
/// weekday + time-of-day so that a multi-day run can repeat the same daily/weekly shape
/// (spec §4.9 "Rate profiles are looked up by weekday + time-of-day").
#[derive(Debug, Clone)]
pub enum RateSource {
    Scalar(Decimal),
    Profile(RateProfile),
}

impl RateSource {
    pub fn rate_at(&self, slot: DateTime<Utc>) -> Decimal {
        match self {
            RateSource::Scalar(rate) => *rate,
            RateSource::Profile(profile) => profile.rate_at(slot).unwrap_or(Decimal::ZERO),
        }
    }
}

/// Grounded on `original_source/.../update_frequency.py`'s
/// `find_object_of_same_weekday_and_time`: a profile is populated once per weekday+time-of-day
/// key and then looked up by that key for every slot sharing it, regardless of calendar date.
#[derive(Debug, Clone, Default)]
pub struct RateProfile(BTreeMap<(Weekday, NaiveTime), Decimal>);

impl RateProfile {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn set(&mut self, weekday: Weekday, time: NaiveTime, rate: Decimal) -> &mut Self {
        self.0.insert((weekday, time), rate);
        self
    }

    /// Every-day-the-same profile: one entry per hour-of-day, applied to all seven weekdays.
    pub fn daily(hourly_rates: &[(NaiveTime, Decimal)]) -> Self {
        let mut profile = BTreeMap::new();
        for weekday in [
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ] {
            for (time, rate) in hourly_rates {
                profile.insert((weekday, *time), *rate);
            }
        }
        Self(profile)
    }

    pub fn rate_at(&self, slot: DateTime<Utc>) -> Option<Decimal> {
        self.0.get(&(slot.weekday(), slot.time())).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    #[test]
    fn daily_profile_repeats_across_weekdays() {
        let profile = RateProfile::daily(&[(NaiveTime::from_hms_opt(8, 0, 0).unwrap(), dec!(20))]);
        let monday = Utc.with_ymd_and_hms(2026, 1, 5, 8, 0, 0).unwrap();
        let tuesday = Utc.with_ymd_and_hms(2026, 1, 6, 8, 0, 0).unwrap();
        assert_eq!(profile.rate_at(monday), Some(dec!(20)));
        assert_eq!(profile.rate_at(tuesday), Some(dec!(20)));
    }

    #[test]
    fn unset_time_of_day_returns_none() {
        let profile = RateProfile::new();
        let now = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        assert_eq!(profile.rate_at(now), None);
    }
}
