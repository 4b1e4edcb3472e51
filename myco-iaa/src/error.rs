use myco_market::MarketError;
use myco_model::OrderId;
use thiserror::Error;

/// Errors raised while forwarding orders or chaining a trade across one parent/child hop
/// (spec §4.5).
#[derive(Debug, Clone, Error)]
pub enum IaaError {
    #[error("forwarding offer failed: {0}")]
    Forward(#[from] MarketError),

    #[error("order {0} is not a forwarded order known to this agent")]
    NotForwarded(OrderId),

    #[error("chaining trade down to child market failed: {0}")]
    Chain(MarketError),

    #[error("rollback of parent trade {parent_trade} failed after a chain failure: {source}")]
    RollbackFailed {
        parent_trade: myco_model::TradeId,
        source: MarketError,
    },
}
