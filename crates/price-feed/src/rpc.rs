//! JSON-RPC backed aggregators and deployed feed contracts
//!
//! Read-only: every operation is an `eth_call` against the latest block.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use serde::Deserialize;
use tracing::{debug, trace};

use oracle_core::abi::{self, AggregatorV3Interface, IPriceFeed};
use oracle_core::{PriceFeedError, PriceFeedResult, RoundData, SourceError, SourceResult};

use crate::source::{PriceSource, SourceResolver};

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Bytes>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<serde_json::Value>,
}

impl RpcErrorObject {
    /// Revert payload, when the node attached one
    fn revert_data(&self) -> Option<Bytes> {
        let data = match self.data.as_ref()? {
            serde_json::Value::String(s) => s.as_str(),
            // some nodes nest it as { "data": "0x..." }
            serde_json::Value::Object(map) => map.get("data")?.as_str()?,
            _ => return None,
        };
        data.parse::<Bytes>().ok()
    }
}

/// Minimal HTTP JSON-RPC client
#[derive(Debug)]
pub struct JsonRpcClient {
    http: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

impl JsonRpcClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> SourceResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// `eth_call` at `latest`
    pub async fn eth_call(&self, to: Address, calldata: Vec<u8>) -> SourceResult<Bytes> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "eth_call",
            "params": [
                { "to": to, "data": Bytes::from(calldata) },
                "latest"
            ]
        });

        trace!("eth_call #{} to {}", id, to);

        let response = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| SourceError::Decode(e.to_string()))?;

        parse_response(body)
    }

    /// Encode `call`, send it to `to` and decode the return value
    pub async fn call<C: SolCall>(&self, to: Address, call: &C) -> SourceResult<C::Return> {
        let data = self.eth_call(to, call.abi_encode()).await?;
        abi::decode_returns::<C>(&data)
    }
}

fn parse_response(body: RpcResponse) -> SourceResult<Bytes> {
    if let Some(err) = body.error {
        if let Some(data) = err.revert_data() {
            return Err(SourceError::Reverted(data));
        }
        return Err(SourceError::Rpc {
            code: err.code,
            message: err.message,
        });
    }

    body.result
        .ok_or_else(|| SourceError::Decode("response has neither result nor error".into()))
}

/// Aggregator contract read over JSON-RPC
#[derive(Debug, Clone)]
pub struct RpcAggregator {
    client: Arc<JsonRpcClient>,
    address: Address,
}

impl RpcAggregator {
    pub fn new(client: Arc<JsonRpcClient>, address: Address) -> Self {
        Self { client, address }
    }
}

#[async_trait::async_trait]
impl PriceSource for RpcAggregator {
    fn address(&self) -> Address {
        self.address
    }

    async fn decimals(&self) -> SourceResult<u8> {
        let ret = self
            .client
            .call(self.address, &AggregatorV3Interface::decimalsCall {})
            .await?;
        Ok(ret._0)
    }

    async fn latest_round_data(&self) -> SourceResult<RoundData> {
        let calldata = AggregatorV3Interface::latestRoundDataCall {}.abi_encode();
        let data = self.client.eth_call(self.address, calldata).await?;
        let round = abi::decode_round_data(&data)?;

        debug!(
            "Aggregator {} round {}: answer {} at {}",
            self.address, round.round_id, round.answer, round.updated_at
        );
        Ok(round)
    }
}

/// Every address resolves to an aggregator on the same endpoint
impl SourceResolver for Arc<JsonRpcClient> {
    fn resolve(&self, address: Address) -> SourceResult<Arc<dyn PriceSource>> {
        Ok(Arc::new(RpcAggregator::new(Arc::clone(self), address)))
    }
}

/// Typed read-only handle to a deployed feed contract
#[derive(Debug, Clone)]
pub struct RemotePriceFeed {
    client: Arc<JsonRpcClient>,
    address: Address,
}

impl RemotePriceFeed {
    pub fn new(client: Arc<JsonRpcClient>, address: Address) -> Self {
        Self { client, address }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// Contract reverts surface as the matching [`PriceFeedError`]
    pub async fn get_price(&self) -> PriceFeedResult<U256> {
        Ok(self.view(&IPriceFeed::getPriceCall {}).await?._0)
    }

    pub async fn base(&self) -> PriceFeedResult<Address> {
        Ok(self.view(&IPriceFeed::baseCall {}).await?._0)
    }

    pub async fn quote(&self) -> PriceFeedResult<Address> {
        Ok(self.view(&IPriceFeed::quoteCall {}).await?._0)
    }

    pub async fn base_decimals(&self) -> PriceFeedResult<u8> {
        Ok(self.view(&IPriceFeed::baseDecimalsCall {}).await?._0)
    }

    pub async fn quote_decimals(&self) -> PriceFeedResult<u8> {
        Ok(self.view(&IPriceFeed::quoteDecimalsCall {}).await?._0)
    }

    pub async fn decimals(&self) -> PriceFeedResult<u8> {
        Ok(self.view(&IPriceFeed::decimalsCall {}).await?._0)
    }

    pub async fn base_stale_after(&self) -> PriceFeedResult<U256> {
        Ok(self.view(&IPriceFeed::baseStalePriceCall {}).await?._0)
    }

    pub async fn quote_stale_after(&self) -> PriceFeedResult<U256> {
        Ok(self.view(&IPriceFeed::quoteStalePriceCall {}).await?._0)
    }

    async fn view<C: SolCall>(&self, call: &C) -> PriceFeedResult<C::Return> {
        self.client
            .call(self.address, call)
            .await
            .map_err(|err| revert_to_feed_error(self.address, err))
    }
}

fn revert_to_feed_error(address: Address, err: SourceError) -> PriceFeedError {
    if let SourceError::Reverted(data) = &err {
        if let Some(decoded) = PriceFeedError::decode_revert(data) {
            return decoded;
        }
    }
    PriceFeedError::Source {
        aggregator: address,
        source: err,
    }
}
