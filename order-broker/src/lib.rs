//! Live order execution: submission over REST, reconciliation of
//! asynchronous fill/status events from the user stream, and the position
//! ledger.

pub mod broker;
pub mod ledger;
pub mod router;

pub use broker::LiveBroker;
pub use ledger::PositionLedger;
pub use router::OrderRouter;
