//! Solidity bindings for the upstream aggregator and the deployed feed contract
//!
//! One binding covers every deployment of the feed contract; the interface has
//! not changed between deployments.

use alloy_primitives::U256;
use alloy_sol_types::{sol, SolCall, SolError, SolInterface};

use crate::{PriceFeedError, RoundData, SourceError, SourceResult};

sol! {
    /// Chainlink-compatible aggregator
    interface AggregatorV3Interface {
        function decimals() external view returns (uint8);
        function description() external view returns (string memory);
        function version() external view returns (uint256);
        function latestRoundData()
            external
            view
            returns (
                uint80 roundId,
                int256 answer,
                uint256 startedAt,
                uint256 updatedAt,
                uint80 answeredInRound
            );
    }
}

sol! {
    /// Cross-rate feed contract
    interface IPriceFeed {
        error NULL_ADDRESS();
        error INVALID_DECIMALS(uint8 decimals);
        error NULL_STALE_PRICE();
        error INVALID_PRICE(address aggregator, int256 price);
        error STALE_PRICE(address aggregator, uint256 updatedAt);

        function base() external view returns (address);
        function quote() external view returns (address);
        function baseDecimals() external view returns (uint8);
        function quoteDecimals() external view returns (uint8);
        function decimals() external view returns (uint8);
        function baseStalePrice() external view returns (uint256);
        function quoteStalePrice() external view returns (uint256);
        function getPrice() external view returns (uint256);
    }
}

use IPriceFeed::IPriceFeedErrors;

/// Decode the return data of `latestRoundData()`
pub fn decode_round_data(data: &[u8]) -> SourceResult<RoundData> {
    let ret = AggregatorV3Interface::latestRoundDataCall::abi_decode_returns(data, true)
        .map_err(|e| SourceError::Decode(e.to_string()))?;

    Ok(RoundData {
        round_id: U256::from(ret.roundId),
        answer: ret.answer,
        started_at: ret.startedAt,
        updated_at: ret.updatedAt,
        answered_in_round: U256::from(ret.answeredInRound),
    })
}

/// Decode the return data of any call `C`
pub fn decode_returns<C: SolCall>(data: &[u8]) -> SourceResult<C::Return> {
    C::abi_decode_returns(data, true).map_err(|e| SourceError::Decode(e.to_string()))
}

impl PriceFeedError {
    /// Revert payload the contract emits for this error.
    ///
    /// `None` for failures that have no on-chain counterpart.
    pub fn abi_encode(&self) -> Option<Vec<u8>> {
        let data = match self {
            PriceFeedError::NullAddress => IPriceFeed::NULL_ADDRESS {}.abi_encode(),
            PriceFeedError::InvalidDecimals(decimals) => {
                IPriceFeed::INVALID_DECIMALS { decimals: *decimals }.abi_encode()
            }
            PriceFeedError::NullStalePrice => IPriceFeed::NULL_STALE_PRICE {}.abi_encode(),
            PriceFeedError::InvalidPrice { aggregator, price } => IPriceFeed::INVALID_PRICE {
                aggregator: *aggregator,
                price: *price,
            }
            .abi_encode(),
            PriceFeedError::StalePrice {
                aggregator,
                updated_at,
            } => IPriceFeed::STALE_PRICE {
                aggregator: *aggregator,
                updatedAt: *updated_at,
            }
            .abi_encode(),
            _ => return None,
        };
        Some(data)
    }

    /// Map a revert payload from the feed contract back into an error
    pub fn decode_revert(data: &[u8]) -> Option<Self> {
        IPriceFeedErrors::abi_decode(data, true).ok().map(Into::into)
    }
}

impl From<IPriceFeedErrors> for PriceFeedError {
    fn from(err: IPriceFeedErrors) -> Self {
        match err {
            IPriceFeedErrors::NULL_ADDRESS(_) => PriceFeedError::NullAddress,
            IPriceFeedErrors::INVALID_DECIMALS(e) => PriceFeedError::InvalidDecimals(e.decimals),
            IPriceFeedErrors::NULL_STALE_PRICE(_) => PriceFeedError::NullStalePrice,
            IPriceFeedErrors::INVALID_PRICE(e) => PriceFeedError::InvalidPrice {
                aggregator: e.aggregator,
                price: e.price,
            },
            IPriceFeedErrors::STALE_PRICE(e) => PriceFeedError::StalePrice {
                aggregator: e.aggregator,
                updated_at: e.updatedAt,
            },
        }
    }
}
