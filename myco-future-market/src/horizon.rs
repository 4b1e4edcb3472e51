use chrono::{DateTime, Datelike, Duration, TimeZone, Timelike, Utc};

/// The four forward look-ahead windows a future market can be configured with (spec §4.6).
/// Each has a slot cadence and a fixed number of slots kept open at once.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Horizon {
    /// Next 7×24 hourly slots.
    Day,
    /// Next 52 weekly slots, aligned to Monday 00:00.
    Week,
    /// Next 24 monthly slots, aligned to day 1 00:00.
    Month,
    /// Next 5 yearly slots, aligned to Jan 1 00:00.
    Year,
}

impl Horizon {
    pub fn slot_count(&self) -> usize {
        match self {
            Horizon::Day => 7 * 24,
            Horizon::Week => 52,
            Horizon::Month => 24,
            Horizon::Year => 5,
        }
    }

    /// The earliest aligned slot at or after `now`.
    pub fn first_slot_at_or_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Horizon::Day => {
                let hour_start = now
                    .date_naive()
                    .and_hms_opt(now.hour(), 0, 0)
                    .expect("valid hour");
                let hour_start = Utc.from_utc_datetime(&hour_start);
                if hour_start >= now {
                    hour_start
                } else {
                    hour_start + Duration::hours(1)
                }
            }
            Horizon::Week => {
                let days_until_monday =
                    (7 - now.weekday().num_days_from_monday() as i64) % 7;
                let candidate_date = now.date_naive() + Duration::days(days_until_monday);
                let candidate =
                    Utc.from_utc_datetime(&candidate_date.and_hms_opt(0, 0, 0).expect("midnight"));
                if candidate >= now {
                    candidate
                } else {
                    candidate + Duration::days(7)
                }
            }
            Horizon::Month => {
                let candidate = Utc
                    .with_ymd_and_hms(now.year(), now.month(), 1, 0, 0, 0)
                    .single()
                    .expect("valid first-of-month");
                if candidate >= now {
                    candidate
                } else {
                    add_months(candidate, 1)
                }
            }
            Horizon::Year => {
                let candidate = Utc
                    .with_ymd_and_hms(now.year(), 1, 1, 0, 0, 0)
                    .single()
                    .expect("valid Jan 1");
                if candidate >= now {
                    candidate
                } else {
                    Utc.with_ymd_and_hms(now.year() + 1, 1, 1, 0, 0, 0)
                        .single()
                        .expect("valid Jan 1")
                }
            }
        }
    }

    /// The next aligned slot after `prev`.
    pub fn step(&self, prev: DateTime<Utc>) -> DateTime<Utc> {
        match self {
            Horizon::Day => prev + Duration::hours(1),
            Horizon::Week => prev + Duration::days(7),
            Horizon::Month => add_months(prev, 1),
            Horizon::Year => add_months(prev, 12),
        }
    }
}

fn add_months(dt: DateTime<Utc>, months: i32) -> DateTime<Utc> {
    let total = dt.year() * 12 + (dt.month() as i32 - 1) + months;
    let year = total.div_euclid(12);
    let month = (total.rem_euclid(12) + 1) as u32;
    Utc.with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .expect("valid year/month")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn day_horizon_aligns_to_next_hour_boundary() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 10, 30, 0).unwrap();
        let slot = Horizon::Day.first_slot_at_or_after(now);
        assert_eq!(slot, Utc.with_ymd_and_hms(2026, 1, 1, 11, 0, 0).unwrap());
    }

    #[test]
    fn week_horizon_aligns_to_next_monday() {
        // 2026-01-01 is a Thursday.
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 10, 0, 0).unwrap();
        let slot = Horizon::Week.first_slot_at_or_after(now);
        assert_eq!(slot, Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).unwrap());
        assert_eq!(slot.weekday(), chrono::Weekday::Mon);
    }

    #[test]
    fn month_horizon_steps_across_year_boundary() {
        let dec = Utc.with_ymd_and_hms(2026, 12, 1, 0, 0, 0).unwrap();
        assert_eq!(
            Horizon::Month.step(dec),
            Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap()
        );
    }
}
