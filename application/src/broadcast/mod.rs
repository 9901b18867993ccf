//! Broadcast fan-out: broker publish on the producing side, local delivery
//! with catch-up on every replica.

pub mod hub;
pub mod relay;

pub use hub::{BroadcastHub, FanoutReport, Subscription, ViewerConnection};
pub use relay::{BrokerBatchSender, run_consumer};
