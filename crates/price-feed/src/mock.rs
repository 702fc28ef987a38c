//! In-memory sources and clocks for tests and dry runs

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use alloy_primitives::{Address, I256, U256};
use parking_lot::RwLock;

use oracle_core::{RoundData, SourceError, SourceResult};

use crate::source::{Clock, PriceSource, SourceResolver};

/// Aggregator whose latest round is set by hand
#[derive(Debug)]
pub struct StaticAggregator {
    address: Address,
    decimals: u8,
    round: RwLock<RoundData>,
    failure: RwLock<Option<SourceError>>,
    reads: AtomicUsize,
    decimals_reads: AtomicUsize,
}

impl StaticAggregator {
    pub fn new(address: Address, decimals: u8, answer: I256, updated_at: u64) -> Self {
        Self {
            address,
            decimals,
            round: RwLock::new(RoundData::new(answer, U256::from(updated_at))),
            failure: RwLock::new(None),
            reads: AtomicUsize::new(0),
            decimals_reads: AtomicUsize::new(0),
        }
    }

    /// Publish a new round
    pub fn set_answer(&self, answer: I256, updated_at: u64) {
        let mut round = self.round.write();
        round.round_id += U256::from(1u64);
        round.answered_in_round = round.round_id;
        round.answer = answer;
        round.started_at = U256::from(updated_at);
        round.updated_at = U256::from(updated_at);
    }

    /// Make every subsequent read fail with `err`, or clear it with `None`
    pub fn set_failure(&self, err: Option<SourceError>) {
        *self.failure.write() = err;
    }

    /// Number of `latest_round_data` calls served
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    /// Number of `decimals` calls served
    pub fn decimals_reads(&self) -> usize {
        self.decimals_reads.load(Ordering::Relaxed)
    }

    fn check_failure(&self) -> SourceResult<()> {
        match self.failure.read().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

#[async_trait::async_trait]
impl PriceSource for StaticAggregator {
    fn address(&self) -> Address {
        self.address
    }

    async fn decimals(&self) -> SourceResult<u8> {
        self.check_failure()?;
        self.decimals_reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.decimals)
    }

    async fn latest_round_data(&self) -> SourceResult<RoundData> {
        self.check_failure()?;
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(*self.round.read())
    }
}

/// Address book of in-memory aggregators
#[derive(Default)]
pub struct SourceRegistry {
    sources: HashMap<Address, Arc<dyn PriceSource>>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, source: Arc<dyn PriceSource>) {
        self.sources.insert(source.address(), source);
    }

    pub fn with(mut self, source: Arc<dyn PriceSource>) -> Self {
        self.register(source);
        self
    }
}

impl SourceResolver for SourceRegistry {
    fn resolve(&self, address: Address) -> SourceResult<Arc<dyn PriceSource>> {
        self.sources
            .get(&address)
            .cloned()
            .ok_or(SourceError::NotFound(address))
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(now: u64) -> Self {
        Self {
            now: AtomicU64::new(now),
        }
    }

    pub fn set(&self, now: u64) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, secs: u64) {
        self.now.fetch_add(secs, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> U256 {
        U256::from(self.now.load(Ordering::SeqCst))
    }
}
