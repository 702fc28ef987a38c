//! Monitor service implementation

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::U256;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use oracle_core::{FeedPrice, FeedSettings, PriceFeedResult};
use oracle_price_feed::{
    FeedPoller, FeedState, JsonRpcClient, PollerConfig, PriceFeed, RemotePriceFeed,
    SourceResolver,
};

/// Local feed plus an optional deployed instance to cross-check
pub struct MonitorService {
    feed: Arc<PriceFeed>,
    poller: FeedPoller,
    deployed: Option<Arc<RemotePriceFeed>>,
    cross_check_handle: Option<JoinHandle<()>>,
    poll_interval: Duration,
}

impl MonitorService {
    /// Build from settings, resolving aggregators through `resolver`
    pub async fn with_resolver<R>(
        settings: &FeedSettings,
        resolver: &R,
        deployed: Option<RemotePriceFeed>,
    ) -> PriceFeedResult<Self>
    where
        R: SourceResolver + ?Sized,
    {
        let feed = Arc::new(PriceFeed::deploy(settings.feed.params(), resolver).await?);
        let poller = FeedPoller::new(
            PollerConfig {
                interval: settings.monitor.poll_interval(),
            },
            Arc::clone(&feed),
        );

        Ok(Self {
            feed,
            poller,
            deployed: deployed.map(Arc::new),
            cross_check_handle: None,
            poll_interval: settings.monitor.poll_interval(),
        })
    }

    /// Build against the configured JSON-RPC endpoint
    pub async fn connect(settings: &FeedSettings) -> anyhow::Result<Self> {
        let client = Arc::new(JsonRpcClient::new(
            settings.rpc.http_url.clone(),
            settings.rpc.request_timeout(),
        )?);
        info!("Using RPC endpoint {}", client.url());

        let deployed = settings
            .feed
            .deployed
            .map(|address| RemotePriceFeed::new(Arc::clone(&client), address));

        Ok(Self::with_resolver(settings, &client, deployed).await?)
    }

    pub fn feed(&self) -> &PriceFeed {
        &self.feed
    }

    pub fn state(&self) -> Arc<FeedState> {
        self.poller.state()
    }

    /// Start all background services
    pub async fn start(&mut self) {
        self.poller.start().await;

        if let Some(deployed) = &self.deployed {
            if self.cross_check_handle.is_none() {
                let feed = Arc::clone(&self.feed);
                let deployed = Arc::clone(deployed);
                let period = self.poll_interval;

                self.cross_check_handle = Some(tokio::spawn(async move {
                    let mut interval = tokio::time::interval(period);
                    loop {
                        interval.tick().await;
                        compare(&feed, &deployed).await;
                    }
                }));
                info!("Cross-checking deployed feed every {:?}", period);
            }
        }
    }

    pub fn is_cross_checking(&self) -> bool {
        self.cross_check_handle.is_some()
    }

    /// Stop all services
    pub async fn stop(&mut self) {
        if let Some(handle) = self.cross_check_handle.take() {
            handle.abort();
        }
        self.poller.stop().await;

        let stats = self.poller.stats();
        info!(
            "Monitor stopped: {} prices, {} failures",
            stats.success_count, stats.failure_count
        );
    }

    /// Compare the local evaluation against the deployed contract, if any
    pub async fn cross_check(&self) -> Option<(U256, U256)> {
        let deployed = self.deployed.as_ref()?;
        compare(&self.feed, deployed).await
    }
}

async fn compare(feed: &PriceFeed, deployed: &RemotePriceFeed) -> Option<(U256, U256)> {
    let local = match feed.get_price().await {
        Ok(p) => p,
        Err(e) => {
            warn!("Local price unavailable: {}", e);
            return None;
        }
    };
    let remote = match deployed.get_price().await {
        Ok(p) => p,
        Err(e) => {
            warn!("Deployed feed {} unavailable: {}", deployed.address(), e);
            return None;
        }
    };

    let decimals = feed.decimals();
    if local == remote {
        info!("Deployed feed agrees: {}", FeedPrice::new(local, decimals));
    } else {
        warn!(
            "Deployed feed {} reports {}, local {}",
            deployed.address(),
            FeedPrice::new(remote, decimals),
            FeedPrice::new(local, decimals)
        );
    }
    Some((local, remote))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{hex, Address, I256};
    use oracle_price_feed::{PriceSource, SourceRegistry, StaticAggregator};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn settings() -> FeedSettings {
        FeedSettings::from_toml(
            r#"
            [rpc]
            http_url = "http://127.0.0.1:8545"

            [feed]
            decimals = 8

            [feed.base]
            aggregator = "0x0101010101010101010101010101010101010101"
            stale_after_secs = 4000000000

            [feed.quote]
            aggregator = "0x0202020202020202020202020202020202020202"
            stale_after_secs = 4000000000

            [monitor]
            poll_interval_ms = 50
            "#,
        )
        .unwrap()
    }

    fn registry() -> SourceRegistry {
        let base = StaticAggregator::new(
            Address::repeat_byte(1),
            8,
            I256::try_from(6_00000000i64).unwrap(),
            0,
        );
        let quote = StaticAggregator::new(
            Address::repeat_byte(2),
            18,
            I256::try_from(2_000_000_000_000_000_000i128).unwrap(),
            0,
        );
        SourceRegistry::new()
            .with(Arc::new(base) as Arc<dyn PriceSource>)
            .with(Arc::new(quote) as Arc<dyn PriceSource>)
    }

    #[tokio::test]
    async fn test_service_from_settings() {
        let service = MonitorService::with_resolver(&settings(), &registry(), None)
            .await
            .unwrap();

        assert_eq!(service.feed().decimals(), 8);
        assert_eq!(service.feed().quote_decimals(), 18);
        assert_eq!(service.feed().get_price().await.unwrap(), U256::from(3_00000000u64));
        assert_eq!(service.cross_check().await, None);
    }

    /// Answers every `eth_call` with `price` ABI-encoded as a uint256
    async fn spawn_node(price: U256) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let body = format!(
            r#"{{"jsonrpc":"2.0","id":1,"result":"0x{}"}}"#,
            hex::encode(price.to_be_bytes::<32>())
        );

        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                tokio::spawn(respond(stream, body.clone()));
            }
        });
        url
    }

    async fn respond(mut stream: TcpStream, body: String) {
        let mut request = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&chunk[..n]);

            if let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                let headers = String::from_utf8_lossy(&request[..end]).to_ascii_lowercase();
                let length = headers
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if request.len() >= end + 4 + length {
                    break;
                }
            }
        }

        let response = format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        stream.write_all(response.as_bytes()).await.unwrap();
        stream.shutdown().await.unwrap();
    }

    async fn service_with_deployed(deployed_price: U256) -> MonitorService {
        let url = spawn_node(deployed_price).await;
        let client = Arc::new(JsonRpcClient::new(url, Duration::from_secs(5)).unwrap());
        let deployed = RemotePriceFeed::new(client, Address::repeat_byte(9));

        MonitorService::with_resolver(&settings(), &registry(), Some(deployed))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_cross_check_agreement() {
        let service = service_with_deployed(U256::from(3_00000000u64)).await;

        assert_eq!(
            service.cross_check().await,
            Some((U256::from(3_00000000u64), U256::from(3_00000000u64)))
        );
    }

    #[tokio::test]
    async fn test_cross_check_reports_disagreement() {
        let service = service_with_deployed(U256::from(4_00000000u64)).await;

        assert_eq!(
            service.cross_check().await,
            Some((U256::from(3_00000000u64), U256::from(4_00000000u64)))
        );
    }

    #[tokio::test]
    async fn test_cross_check_runs_with_poller() {
        let mut service = service_with_deployed(U256::from(3_00000000u64)).await;
        service.start().await;
        assert!(service.is_cross_checking());

        tokio::time::sleep(Duration::from_millis(120)).await;
        service.stop().await;

        assert!(!service.is_cross_checking());
        assert!(service.state().stats().success_count >= 1);
    }

    #[tokio::test]
    async fn test_no_cross_check_without_deployed_feed() {
        let mut service = MonitorService::with_resolver(&settings(), &registry(), None)
            .await
            .unwrap();
        service.start().await;
        assert!(!service.is_cross_checking());
        service.stop().await;
    }
}
