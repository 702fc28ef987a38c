//! Observation tracking for polled feeds
//!
//! Written by the poller, read by anyone. Never consulted by the feed itself.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use oracle_core::{FeedPrice, PriceFeedError};

/// Timestamped successful evaluation
#[derive(Debug, Clone)]
pub struct PriceEntry {
    pub price: FeedPrice,
    pub observed_at: Instant,
    pub observed_at_utc: DateTime<Utc>,
}

impl PriceEntry {
    pub fn age(&self) -> Duration {
        self.observed_at.elapsed()
    }
}

/// Last observation and counters of one feed
#[derive(Debug)]
pub struct FeedState {
    last_price: RwLock<Option<PriceEntry>>,
    last_error: RwLock<Option<PriceFeedError>>,
    success_count: AtomicU64,
    failure_count: AtomicU64,
}

impl FeedState {
    pub fn new() -> Self {
        Self {
            last_price: RwLock::new(None),
            last_error: RwLock::new(None),
            success_count: AtomicU64::new(0),
            failure_count: AtomicU64::new(0),
        }
    }

    pub fn record_price(&self, price: FeedPrice) {
        *self.last_price.write() = Some(PriceEntry {
            price,
            observed_at: Instant::now(),
            observed_at_utc: Utc::now(),
        });
        self.success_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self, err: PriceFeedError) {
        *self.last_error.write() = Some(err);
        self.failure_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn last_price(&self) -> Option<PriceEntry> {
        self.last_price.read().clone()
    }

    pub fn last_error(&self) -> Option<PriceFeedError> {
        self.last_error.read().clone()
    }

    pub fn stats(&self) -> FeedStateStats {
        FeedStateStats {
            success_count: self.success_count.load(Ordering::Relaxed),
            failure_count: self.failure_count.load(Ordering::Relaxed),
            last_price_age: self.last_price.read().as_ref().map(PriceEntry::age),
        }
    }
}

impl Default for FeedState {
    fn default() -> Self {
        Self::new()
    }
}

/// Statistics about a polled feed
#[derive(Debug, Clone)]
pub struct FeedStateStats {
    pub success_count: u64,
    pub failure_count: u64,
    pub last_price_age: Option<Duration>,
}
