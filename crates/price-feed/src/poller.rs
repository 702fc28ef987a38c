//! Periodic feed evaluation

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::feed::PriceFeed;
use crate::state::{FeedState, FeedStateStats};

/// Poller configuration
#[derive(Debug, Clone)]
pub struct PollerConfig {
    pub interval: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
        }
    }
}

/// Evaluates a feed on a fixed interval and records the outcome
pub struct FeedPoller {
    config: PollerConfig,
    feed: Arc<PriceFeed>,
    state: Arc<FeedState>,
    handle: Option<JoinHandle<()>>,
    running: Arc<RwLock<bool>>,
}

impl FeedPoller {
    pub fn new(config: PollerConfig, feed: Arc<PriceFeed>) -> Self {
        Self {
            config,
            feed,
            state: Arc::new(FeedState::new()),
            handle: None,
            running: Arc::new(RwLock::new(false)),
        }
    }

    /// Get shared state reference
    pub fn state(&self) -> Arc<FeedState> {
        Arc::clone(&self.state)
    }

    /// Evaluate the feed once and record the outcome
    pub async fn poll_once(&self) {
        evaluate(&self.feed, &self.state).await;
    }

    /// Start polling in the background
    pub async fn start(&mut self) {
        if self.handle.is_some() {
            return;
        }

        info!(
            "Starting feed poller for {}/{} every {:?}",
            self.feed.base(),
            self.feed.quote(),
            self.config.interval
        );
        *self.running.write().await = true;

        let feed = Arc::clone(&self.feed);
        let state = Arc::clone(&self.state);
        let running = Arc::clone(&self.running);
        let period = self.config.interval;

        self.handle = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);

            loop {
                interval.tick().await;

                if !*running.read().await {
                    break;
                }

                evaluate(&feed, &state).await;
            }
        }));
    }

    /// Stop polling
    pub async fn stop(&mut self) {
        info!("Stopping feed poller");
        *self.running.write().await = false;

        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    /// Check if running
    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    pub fn stats(&self) -> FeedStateStats {
        self.state.stats()
    }
}

async fn evaluate(feed: &PriceFeed, state: &FeedState) {
    match feed.latest().await {
        Ok(price) => {
            info!("Price {} ({} raw)", price, price.raw);
            state.record_price(price);
        }
        Err(e) => {
            warn!("Price unavailable: {}", e);
            state.record_failure(e);
        }
    }
}
