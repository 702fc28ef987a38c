//! Error types

use alloy_primitives::{Address, Bytes, I256, U256};
use thiserror::Error;

/// Price feed errors
///
/// The first five variants mirror the custom errors of the on-chain contract
/// and encode to identical revert payloads (see [`crate::abi`]).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PriceFeedError {
    #[error("NULL_ADDRESS: base and quote aggregators must be set")]
    NullAddress,

    #[error("INVALID_DECIMALS: {0} is outside 1..=18")]
    InvalidDecimals(u8),

    #[error("NULL_STALE_PRICE: staleness thresholds must be non-zero")]
    NullStalePrice,

    #[error("INVALID_PRICE: aggregator {aggregator} reported {price}")]
    InvalidPrice { aggregator: Address, price: I256 },

    #[error("STALE_PRICE: aggregator {aggregator} last updated at {updated_at}")]
    StalePrice { aggregator: Address, updated_at: U256 },

    #[error("Arithmetic overflow in fixed-point conversion")]
    ArithmeticOverflow,

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Aggregator {aggregator} unavailable: {source}")]
    Source {
        aggregator: Address,
        source: SourceError,
    },
}

impl PriceFeedError {
    /// Aggregator the failure is attributed to, if any
    pub fn aggregator(&self) -> Option<Address> {
        match self {
            PriceFeedError::InvalidPrice { aggregator, .. }
            | PriceFeedError::StalePrice { aggregator, .. }
            | PriceFeedError::Source { aggregator, .. } => Some(*aggregator),
            _ => None,
        }
    }

    pub fn is_construction_error(&self) -> bool {
        matches!(
            self,
            PriceFeedError::NullAddress
                | PriceFeedError::InvalidDecimals(_)
                | PriceFeedError::NullStalePrice
        )
    }
}

/// Upstream read errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Call reverted: {0}")]
    Reverted(Bytes),

    #[error("Invalid return data: {0}")]
    Decode(String),

    #[error("No aggregator registered at {0}")]
    NotFound(Address),
}

/// Result type alias
pub type PriceFeedResult<T> = Result<T, PriceFeedError>;
pub type SourceResult<T> = Result<T, SourceError>;
