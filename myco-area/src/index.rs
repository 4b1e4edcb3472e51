use crate::error::SimulationError;
use crate::strategy::StrategyKind;
use myco_iaa::InterAreaAgent;
use myco_market::Market;
use myco_model::ActorId;

/// Index of an `AreaNode` within an `AreaTree`'s arena.
///
/// Grounded on `barter-instrument::index::IndexedInstruments`'s `ExchangeIndex`/`AssetIndex`
/// pattern: the tree is stored as a flat `Vec<AreaNode>` and cross-references are plain indices
/// rather than `Rc`/`Weak` back-pointers, so a cyclic parent/child relationship (spec §9 "Cyclic
/// parent/child area references") is simply unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AreaIndex(pub usize);

/// Either an inner node owning a market and the agent that forwards it to its parent, or a leaf
/// device posting directly into its parent's market via a `StrategyKind`.
#[derive(Debug)]
pub enum AreaKind {
    Internal {
        market: Market,
        /// `None` only for the tree root, which has no parent to forward into.
        iaa: Option<InterAreaAgent>,
    },
    Leaf {
        strategy: StrategyKind,
    },
}

#[derive(Debug)]
pub struct AreaNode {
    pub id: ActorId,
    pub parent: Option<AreaIndex>,
    pub children: Vec<AreaIndex>,
    pub kind: AreaKind,
}

/// Arena-of-nodes microgrid tree (spec §3 "Area -- tree node", §9 "tree stored as index-based
/// nodes in an arena").
#[derive(Debug)]
pub struct AreaTree {
    nodes: Vec<AreaNode>,
    root: AreaIndex,
}

impl AreaTree {
    pub fn new_root(id: ActorId, market: Market) -> Self {
        let root_node = AreaNode {
            id,
            parent: None,
            children: Vec::new(),
            kind: AreaKind::Internal { market, iaa: None },
        };
        Self { nodes: vec![root_node], root: AreaIndex(0) }
    }

    pub fn root(&self) -> AreaIndex {
        self.root
    }

    pub fn node(&self, idx: AreaIndex) -> Result<&AreaNode, SimulationError> {
        self.nodes
            .get(idx.0)
            .ok_or_else(|| SimulationError::UnknownArea(idx.0.to_string()))
    }

    pub fn node_mut(&mut self, idx: AreaIndex) -> Result<&mut AreaNode, SimulationError> {
        self.nodes
            .get_mut(idx.0)
            .ok_or_else(|| SimulationError::UnknownArea(idx.0.to_string()))
    }

    pub fn children(&self, idx: AreaIndex) -> Result<&[AreaIndex], SimulationError> {
        Ok(&self.node(idx)?.children)
    }

    pub fn parent(&self, idx: AreaIndex) -> Result<Option<AreaIndex>, SimulationError> {
        Ok(self.node(idx)?.parent)
    }

    /// Adds an inner node (owns its own market and the agent forwarding it to `parent`).
    pub fn add_internal(
        &mut self,
        parent: AreaIndex,
        id: ActorId,
        market: Market,
        iaa: InterAreaAgent,
    ) -> Result<AreaIndex, SimulationError> {
        self.node(parent)?;
        let idx = AreaIndex(self.nodes.len());
        self.nodes.push(AreaNode {
            id,
            parent: Some(parent),
            children: Vec::new(),
            kind: AreaKind::Internal { market, iaa: Some(iaa) },
        });
        self.node_mut(parent)?.children.push(idx);
        Ok(idx)
    }

    /// Adds a leaf device posting directly into `parent`'s market via `strategy`.
    pub fn add_leaf(
        &mut self,
        parent: AreaIndex,
        id: ActorId,
        strategy: StrategyKind,
    ) -> Result<AreaIndex, SimulationError> {
        self.node(parent)?;
        let idx = AreaIndex(self.nodes.len());
        self.nodes.push(AreaNode {
            id,
            parent: Some(parent),
            children: Vec::new(),
            kind: AreaKind::Leaf { strategy },
        });
        self.node_mut(parent)?.children.push(idx);
        Ok(idx)
    }

    pub fn market(&self, idx: AreaIndex) -> Result<&Market, SimulationError> {
        match &self.node(idx)?.kind {
            AreaKind::Internal { market, .. } => Ok(market),
            AreaKind::Leaf { .. } => Err(SimulationError::NotAnInternalArea(idx.0.to_string())),
        }
    }

    pub fn market_mut(&mut self, idx: AreaIndex) -> Result<&mut Market, SimulationError> {
        match &mut self.node_mut(idx)?.kind {
            AreaKind::Internal { market, .. } => Ok(market),
            AreaKind::Leaf { .. } => Err(SimulationError::NotAnInternalArea(idx.0.to_string())),
        }
    }

    /// Both the market of `idx` and its parent's market, borrowed simultaneously, for forwarding
    /// and trade-chaining. Errors if `idx` is the root (no parent) or isn't internal.
    pub fn child_and_parent_markets(
        &mut self,
        idx: AreaIndex,
    ) -> Result<(&mut Market, &mut Market), SimulationError> {
        let parent_idx = self
            .parent(idx)?
            .ok_or_else(|| SimulationError::NotAnInternalArea(idx.0.to_string()))?;
        if idx.0 == parent_idx.0 {
            return Err(SimulationError::Configuration("area cannot be its own parent".into()));
        }
        let (lo, hi) = if idx.0 < parent_idx.0 { (idx.0, parent_idx.0) } else { (parent_idx.0, idx.0) };
        let (left, right) = self.nodes.split_at_mut(hi);
        let (child_node, parent_node) = if idx.0 < parent_idx.0 {
            (&mut left[lo], &mut right[0])
        } else {
            (&mut right[0], &mut left[lo])
        };
        let child_market = match &mut child_node.kind {
            AreaKind::Internal { market, .. } => market,
            AreaKind::Leaf { .. } => {
                return Err(SimulationError::NotAnInternalArea(idx.0.to_string()))
            }
        };
        let parent_market = match &mut parent_node.kind {
            AreaKind::Internal { market, .. } => market,
            AreaKind::Leaf { .. } => {
                return Err(SimulationError::NotAnInternalArea(parent_idx.0.to_string()))
            }
        };
        Ok((child_market, parent_market))
    }

    /// Both a child's whole node (for its market *and* its `InterAreaAgent`) and its parent's
    /// market, borrowed simultaneously via `split_at_mut` so the borrow checker sees them as
    /// disjoint. Used for upward forwarding and downward trade chaining.
    pub fn child_node_and_parent_market(
        &mut self,
        idx: AreaIndex,
    ) -> Result<(&mut AreaNode, &mut Market), SimulationError> {
        let parent_idx = self
            .parent(idx)?
            .ok_or_else(|| SimulationError::NotAnInternalArea(idx.0.to_string()))?;
        if idx.0 == parent_idx.0 {
            return Err(SimulationError::Configuration("area cannot be its own parent".into()));
        }
        let (lo, hi) = if idx.0 < parent_idx.0 { (idx.0, parent_idx.0) } else { (parent_idx.0, idx.0) };
        let (left, right) = self.nodes.split_at_mut(hi);
        let (child_node, parent_node) = if idx.0 < parent_idx.0 {
            (&mut left[lo], &mut right[0])
        } else {
            (&mut right[0], &mut left[lo])
        };
        let parent_market = match &mut parent_node.kind {
            AreaKind::Internal { market, .. } => market,
            AreaKind::Leaf { .. } => {
                return Err(SimulationError::NotAnInternalArea(parent_idx.0.to_string()))
            }
        };
        Ok((child_node, parent_market))
    }

    /// A leaf's `StrategyKind` and its parent's market, borrowed simultaneously, for dispatching
    /// `on_tick`/`on_market_cycle` without posting through a re-resolved id.
    pub fn leaf_and_parent_market(
        &mut self,
        idx: AreaIndex,
    ) -> Result<(&mut StrategyKind, &mut Market), SimulationError> {
        let parent_idx = self
            .parent(idx)?
            .ok_or_else(|| SimulationError::NotAnInternalArea(idx.0.to_string()))?;
        if idx.0 == parent_idx.0 {
            return Err(SimulationError::Configuration("area cannot be its own parent".into()));
        }
        let (lo, hi) = if idx.0 < parent_idx.0 { (idx.0, parent_idx.0) } else { (parent_idx.0, idx.0) };
        let (left, right) = self.nodes.split_at_mut(hi);
        let (leaf_node, parent_node) = if idx.0 < parent_idx.0 {
            (&mut left[lo], &mut right[0])
        } else {
            (&mut right[0], &mut left[lo])
        };
        let strategy = match &mut leaf_node.kind {
            AreaKind::Leaf { strategy } => strategy,
            AreaKind::Internal { .. } => {
                return Err(SimulationError::Configuration(format!("area {} is not a leaf", idx.0)))
            }
        };
        let parent_market = match &mut parent_node.kind {
            AreaKind::Internal { market, .. } => market,
            AreaKind::Leaf { .. } => {
                return Err(SimulationError::NotAnInternalArea(parent_idx.0.to_string()))
            }
        };
        Ok((strategy, parent_market))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use myco_fees::GridFeePolicy;
    use myco_model::MarketId;

    fn market(name: &str) -> Market {
        Market::new(MarketId::new(name), Utc::now(), GridFeePolicy::default())
    }

    #[test]
    fn add_internal_and_leaf_register_parent_child_links() {
        let mut tree = AreaTree::new_root(ActorId::new("house"), market("house"));
        let root = tree.root();

        let child = tree
            .add_internal(
                root,
                ActorId::new("garden"),
                market("garden"),
                InterAreaAgent::new(GridFeePolicy::default(), ActorId::new("garden-iaa")),
            )
            .unwrap();
        assert_eq!(tree.children(root).unwrap(), &[child]);
        assert_eq!(tree.parent(child).unwrap(), Some(root));

        let leaf = tree
            .add_leaf(
                child,
                ActorId::new("pv-1"),
                StrategyKind::commercial_producer_default(),
            )
            .unwrap();
        assert_eq!(tree.children(child).unwrap(), &[leaf]);
        assert!(tree.market(leaf).is_err());
    }

    #[test]
    fn child_and_parent_markets_borrow_independently_of_arena_order() {
        let mut tree = AreaTree::new_root(ActorId::new("house"), market("house"));
        let root = tree.root();
        let child = tree
            .add_internal(
                root,
                ActorId::new("garden"),
                market("garden"),
                InterAreaAgent::new(GridFeePolicy::default(), ActorId::new("garden-iaa")),
            )
            .unwrap();

        let (child_market, parent_market) = tree.child_and_parent_markets(child).unwrap();
        assert_eq!(child_market.id, MarketId::new("garden"));
        assert_eq!(parent_market.id, MarketId::new("house"));
    }

    #[test]
    fn root_has_no_parent_and_cannot_forward() {
        let mut tree = AreaTree::new_root(ActorId::new("house"), market("house"));
        let root = tree.root();
        assert!(tree.child_and_parent_markets(root).is_err());
    }
}
