use chrono::{Duration, TimeZone, Utc};
use myco::area::{CommercialProducerStrategy, ForecastSource, LoadStrategy, PvStrategy, RuntimeConfig, StrategyKind};
use myco::model::ActorId;
use myco::rates::RateSource;
use myco::{ScenarioNode, System};
use myco_fees::GridFeePolicy;
use rust_decimal_macros::dec;

fn config() -> RuntimeConfig {
    RuntimeConfig {
        sim_duration: Duration::hours(4),
        slot_length: Duration::minutes(60),
        tick_length: Duration::minutes(15),
        market_count: 1,
        cloud_coverage: myco::area::CloudCoverage::Clear,
        market_maker_rate: RateSource::Scalar(dec!(30)),
        start_date: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
        grid_fee: GridFeePolicy::constant(dec!(1)),
        pv_user_profile: None,
        capacity_kw: None,
        external_connection_enabled: false,
        matching_mode: myco::scheduler::MatchingMode::PayAsBid,
    }
}

/// A two-level microgrid: the house's own PV/load devices trade directly, and a nested
/// "garden" area with an always-available commercial producer forwards any leftover demand
/// up to the house market through its `InterAreaAgent`.
fn scenario() -> Vec<ScenarioNode> {
    vec![
        ScenarioNode::Device {
            id: ActorId::new("pv-1"),
            strategy: StrategyKind::Pv(PvStrategy::new(
                ForecastSource::Constant(dec!(1)),
                RateSource::Scalar(dec!(20)),
                RateSource::Scalar(dec!(5)),
                Duration::minutes(15),
                Duration::minutes(60),
            )),
        },
        ScenarioNode::Device {
            id: ActorId::new("load-1"),
            strategy: StrategyKind::Load(LoadStrategy::new(
                ForecastSource::Constant(dec!(3)),
                RateSource::Scalar(dec!(10)),
                RateSource::Scalar(dec!(25)),
                Duration::minutes(15),
                Duration::minutes(60),
            )),
        },
        ScenarioNode::Area {
            id: ActorId::new("garden"),
            grid_fee: Some(GridFeePolicy::constant(dec!(2))),
            children: vec![ScenarioNode::Device {
                id: ActorId::new("commercial-1"),
                strategy: StrategyKind::CommercialProducer(CommercialProducerStrategy::new(
                    (dec!(5), dec!(5)),
                    dec!(12),
                    1,
                )),
            }],
        },
    ]
}

#[test]
fn four_slot_run_settles_trades_at_every_level_of_the_tree() {
    let cfg = config();
    let ticks_per_slot = cfg.ticks_per_slot();
    let slots = cfg.slots_in_sim();

    let mut system = System::new(cfg, ActorId::new("house"), scenario()).unwrap();
    let house = system.area(&ActorId::new("house")).unwrap();
    let garden = system.area(&ActorId::new("garden")).unwrap();

    for _ in 0..(ticks_per_slot * slots) {
        system.run_tick().unwrap();
    }

    assert_eq!(system.past_market_count(house), slots as usize);
    assert!(system.past_trade_count(house) > 0, "load demand should clear against pv + forwarded commercial supply");
    assert_eq!(system.past_market_count(garden), slots as usize);
}

#[test]
fn pause_halts_progress_until_resumed() {
    let cfg = config();
    let mut system = System::new(cfg, ActorId::new("house"), scenario()).unwrap();
    let control = system.control();

    control.pause();
    let before = system.current_slot().unwrap();
    for _ in 0..3 {
        system.run_tick().unwrap();
    }
    assert_eq!(system.current_slot().unwrap(), before, "paused scheduler must not advance ticks");

    control.resume();
    system.run_tick().unwrap();
}
