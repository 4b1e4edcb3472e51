//! In-memory scenario-tree wiring: a `ScenarioNode` struct literal describes the shape of an
//! area tree without any file format or parser behind it. Loading a scenario from disk (CSV/
//! JSON/YAML) is out of scope; this module only walks an already-constructed `ScenarioNode`
//! tree into a live `myco_area::AreaTree`.

use crate::error::MycoError;
use fnv::FnvHashMap;
use myco_area::{new_internal_area, new_leaf_area, AreaIndex, AreaTree, RuntimeConfig, StrategyKind};
use myco_fees::GridFeePolicy;
use myco_market::Market;
use myco_model::{ActorId, MarketId};

/// One node of a scenario tree, built directly as a struct literal by the caller (no loader).
#[derive(Debug)]
pub enum ScenarioNode {
    /// An inner area with its own market, forwarding into its parent. `grid_fee` overrides
    /// `RuntimeConfig::grid_fee` for just this hop when set.
    Area {
        id: ActorId,
        grid_fee: Option<GridFeePolicy>,
        children: Vec<ScenarioNode>,
    },
    /// A leaf device posting directly into its parent's market.
    Device { id: ActorId, strategy: StrategyKind },
}

/// Walks a `ScenarioNode` forest into a fresh `AreaTree` rooted at `root_id`, returning the tree
/// alongside a lookup of every area's `AreaIndex` by id (including the root and every leaf).
pub fn build_tree(
    root_id: ActorId,
    children: Vec<ScenarioNode>,
    config: &RuntimeConfig,
) -> Result<(AreaTree, FnvHashMap<ActorId, AreaIndex>), MycoError> {
    let root_market = Market::new(MarketId::new(root_id.to_string()), config.start_date, config.grid_fee);
    let mut tree = AreaTree::new_root(root_id.clone(), root_market);
    let root = tree.root();

    let mut index = FnvHashMap::default();
    index.insert(root_id, root);

    for child in children {
        attach(&mut tree, root, child, config, &mut index)?;
    }
    Ok((tree, index))
}

fn attach(
    tree: &mut AreaTree,
    parent: AreaIndex,
    node: ScenarioNode,
    config: &RuntimeConfig,
    index: &mut FnvHashMap<ActorId, AreaIndex>,
) -> Result<(), MycoError> {
    match node {
        ScenarioNode::Area { id, grid_fee, children } => {
            let idx = new_internal_area(
                tree,
                parent,
                id.clone(),
                config.start_date,
                grid_fee.unwrap_or(config.grid_fee),
            )?;
            index.insert(id, idx);
            for child in children {
                attach(tree, idx, child, config, index)?;
            }
        }
        ScenarioNode::Device { id, strategy } => {
            let idx = new_leaf_area(tree, parent, id.clone(), strategy)?;
            index.insert(id, idx);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use myco_rates::RateSource;
    use rust_decimal_macros::dec;

    fn config() -> RuntimeConfig {
        RuntimeConfig {
            sim_duration: Duration::hours(1),
            slot_length: Duration::minutes(60),
            tick_length: Duration::minutes(15),
            market_count: 1,
            cloud_coverage: myco_area::CloudCoverage::Clear,
            market_maker_rate: RateSource::Scalar(dec!(30)),
            start_date: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            grid_fee: GridFeePolicy::constant(dec!(1)),
            pv_user_profile: None,
            capacity_kw: None,
            external_connection_enabled: false,
            matching_mode: myco_scheduler::MatchingMode::PayAsBid,
        }
    }

    #[test]
    fn nested_scenario_tree_indexes_every_area_and_device() {
        let cfg = config();
        let (tree, index) = build_tree(
            ActorId::new("house"),
            vec![ScenarioNode::Area {
                id: ActorId::new("garden"),
                grid_fee: None,
                children: vec![ScenarioNode::Device {
                    id: ActorId::new("pv-1"),
                    strategy: StrategyKind::commercial_producer_default(),
                }],
            }],
            &cfg,
        )
        .unwrap();

        assert_eq!(tree.len(), 3);
        assert!(index.contains_key(&ActorId::new("house")));
        assert!(index.contains_key(&ActorId::new("garden")));
        assert!(index.contains_key(&ActorId::new("pv-1")));

        let garden = index[&ActorId::new("garden")];
        assert!(tree.market(garden).is_ok());
        let pv = index[&ActorId::new("pv-1")];
        assert!(tree.market(pv).is_err(), "a device leaf has no market of its own");
    }
}
