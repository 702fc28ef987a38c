//! Cross-rate price feed over two Chainlink-style aggregators
//!
//! Features:
//! - Staleness and positivity validation of both upstream readings
//! - Full-precision fixed-point cross rate
//! - JSON-RPC backed aggregators and a typed handle to deployed feeds
//! - Background polling with observation tracking

pub mod source;
pub mod feed;
pub mod mock;
pub mod rpc;
pub mod state;
pub mod poller;

pub use feed::PriceFeed;
pub use source::{Clock, PriceSource, SourceResolver, SystemClock};
pub use mock::{ManualClock, SourceRegistry, StaticAggregator};
pub use rpc::{JsonRpcClient, RemotePriceFeed, RpcAggregator};
pub use state::FeedState;
pub use poller::{FeedPoller, PollerConfig};
