use chrono::{DateTime, Duration, Utc};
use myco_fees::GridFeePolicy;
use myco_rates::RateSource;
use myco_scheduler::MatchingMode;
use rust_decimal::Decimal;

/// Cloud coverage model selector (spec §6 `cloud_coverage in {0,1,2,3}`): how a PV strategy's
/// forecast is shaped against its nameplate capacity. Device physics themselves are out of
/// scope (spec.md Non-goals); this only records which shaping mode a run was configured with so
/// a `PvStrategy`'s caller can pick the matching forecast curve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloudCoverage {
    Clear,
    PartlyCloudy,
    Cloudy,
    Custom,
}

impl CloudCoverage {
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            0 => Some(CloudCoverage::Clear),
            1 => Some(CloudCoverage::PartlyCloudy),
            2 => Some(CloudCoverage::Cloudy),
            3 => Some(CloudCoverage::Custom),
            _ => None,
        }
    }
}

/// Single immutable bootstrap configuration (spec §6, §9 "a single immutable `RuntimeConfig`
/// threaded through construction; only the scheduler may swap it between runs").
///
/// Device physics, scenario/setup *loading*, and CSV/JSON export remain out of scope (spec.md
/// Non-goals); this struct only captures the construction inputs spec §6 names.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub sim_duration: Duration,
    pub slot_length: Duration,
    pub tick_length: Duration,
    /// Spot-market look-ahead window (how many future slots stay open at once).
    pub market_count: usize,
    pub cloud_coverage: CloudCoverage,
    pub market_maker_rate: RateSource,
    pub start_date: DateTime<Utc>,
    pub grid_fee: GridFeePolicy,
    pub pv_user_profile: Option<String>,
    pub capacity_kw: Option<Decimal>,
    pub external_connection_enabled: bool,
    /// Clearing mode applied uniformly across every internal area's market and the scheduler's
    /// own spot market (spec §4.2's three clearing modes are a single run-wide setting, not
    /// per-market).
    pub matching_mode: MatchingMode,
}

/// Raised when a `RuntimeConfig` fails validation during bootstrap (spec §7
/// "configuration/setup errors are fatal during bootstrap").
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("sim_duration must be a positive multiple of slot_length")]
    DurationNotMultipleOfSlot,
    #[error("slot_length must be a positive multiple of tick_length")]
    SlotNotMultipleOfTick,
    #[error("market_count must be at least 1")]
    ZeroMarketCount,
}

impl RuntimeConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.slot_length.num_milliseconds() <= 0 || self.tick_length.num_milliseconds() <= 0 {
            return Err(ConfigError::SlotNotMultipleOfTick);
        }
        if self.slot_length.num_milliseconds() % self.tick_length.num_milliseconds() != 0 {
            return Err(ConfigError::SlotNotMultipleOfTick);
        }
        if self.sim_duration.num_milliseconds() <= 0
            || self.sim_duration.num_milliseconds() % self.slot_length.num_milliseconds() != 0
        {
            return Err(ConfigError::DurationNotMultipleOfSlot);
        }
        if self.market_count == 0 {
            return Err(ConfigError::ZeroMarketCount);
        }
        Ok(())
    }

    pub fn ticks_per_slot(&self) -> u64 {
        (self.slot_length.num_milliseconds() / self.tick_length.num_milliseconds()).max(1) as u64
    }

    pub fn slots_in_sim(&self) -> u64 {
        (self.sim_duration.num_milliseconds() / self.slot_length.num_milliseconds()).max(0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn base_config() -> RuntimeConfig {
        RuntimeConfig {
            sim_duration: Duration::hours(24),
            slot_length: Duration::minutes(60),
            tick_length: Duration::minutes(15),
            market_count: 24,
            cloud_coverage: CloudCoverage::Clear,
            market_maker_rate: RateSource::Scalar(dec!(30)),
            start_date: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            grid_fee: GridFeePolicy::default(),
            pv_user_profile: None,
            capacity_kw: None,
            external_connection_enabled: false,
            matching_mode: MatchingMode::PayAsBid,
        }
    }

    #[test]
    fn valid_config_passes_and_derives_tick_counts() {
        let config = base_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.ticks_per_slot(), 4);
        assert_eq!(config.slots_in_sim(), 24);
    }

    #[test]
    fn non_divisible_slot_length_is_rejected() {
        let mut config = base_config();
        config.tick_length = Duration::minutes(13);
        assert!(matches!(config.validate(), Err(ConfigError::SlotNotMultipleOfTick)));
    }

    #[test]
    fn zero_market_count_is_rejected() {
        let mut config = base_config();
        config.market_count = 0;
        assert!(matches!(config.validate(), Err(ConfigError::ZeroMarketCount)));
    }

    #[test]
    fn cloud_coverage_levels_map_to_the_four_documented_values() {
        assert_eq!(CloudCoverage::from_level(0), Some(CloudCoverage::Clear));
        assert_eq!(CloudCoverage::from_level(3), Some(CloudCoverage::Custom));
        assert_eq!(CloudCoverage::from_level(4), None);
    }
}
