//! Upstream collaborators: aggregators, address resolution and time

use std::sync::Arc;

use alloy_primitives::{Address, U256};
use oracle_core::{RoundData, SourceResult};

/// Base trait for upstream price sources
#[async_trait::async_trait]
pub trait PriceSource: Send + Sync {
    /// Identifier reported in errors
    fn address(&self) -> Address;

    /// Precision of reported answers. Queried once per feed.
    async fn decimals(&self) -> SourceResult<u8>;

    async fn latest_round_data(&self) -> SourceResult<RoundData>;
}

/// Turns an aggregator address into a handle that can be read
pub trait SourceResolver: Send + Sync {
    fn resolve(&self, address: Address) -> SourceResult<Arc<dyn PriceSource>>;
}

/// Source of the current unix time in seconds
pub trait Clock: Send + Sync {
    fn now(&self) -> U256;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> U256 {
        // pre-epoch clocks read as zero
        U256::from(chrono::Utc::now().timestamp().max(0) as u64)
    }
}
