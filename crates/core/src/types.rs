//! Core type definitions

use alloy_primitives::{Address, I256, U256};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{PriceFeedError, PriceFeedResult};

/// Largest supported output precision
pub const MAX_DECIMALS: u8 = 18;

/// Which side of the cross rate a source provides
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceRole {
    Base,
    Quote,
}

impl SourceRole {
    pub fn name(&self) -> &'static str {
        match self {
            SourceRole::Base => "base",
            SourceRole::Quote => "quote",
        }
    }
}

impl fmt::Display for SourceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Full `latestRoundData` tuple as reported by an aggregator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundData {
    pub round_id: U256,
    pub answer: I256,
    pub started_at: U256,
    pub updated_at: U256,
    pub answered_in_round: U256,
}

impl RoundData {
    /// Round with only the fields the feed consumes populated
    pub fn new(answer: I256, updated_at: U256) -> Self {
        Self {
            round_id: U256::ZERO,
            answer,
            started_at: updated_at,
            updated_at,
            answered_in_round: U256::ZERO,
        }
    }

    pub fn reading(&self) -> PriceReading {
        PriceReading {
            price: self.answer,
            updated_at: self.updated_at,
        }
    }
}

/// A single `(price, updatedAt)` observation. Never cached across queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceReading {
    pub price: I256,
    pub updated_at: U256,
}

impl PriceReading {
    /// Age relative to `now`; readings from the future have age zero
    pub fn age(&self, now: U256) -> U256 {
        now.saturating_sub(self.updated_at)
    }

    pub fn is_stale(&self, stale_after: U256, now: U256) -> bool {
        self.age(now) > stale_after
    }

    pub fn is_positive(&self) -> bool {
        self.price.is_positive()
    }

    /// Wall-clock form of `updated_at`, if it is a representable timestamp
    pub fn updated_at_datetime(&self) -> Option<DateTime<Utc>> {
        let secs = i64::try_from(self.updated_at).ok()?;
        DateTime::from_timestamp(secs, 0)
    }
}

/// Immutable snapshot of one upstream source, taken at construction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSnapshot {
    pub address: Address,
    pub decimals: u8,
    pub stale_after: U256,
}

/// Construction-time state of a feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceFeedConfig {
    pub base: SourceSnapshot,
    pub quote: SourceSnapshot,
    pub decimals: u8,
}

impl PriceFeedConfig {
    pub fn source(&self, role: SourceRole) -> &SourceSnapshot {
        match role {
            SourceRole::Base => &self.base,
            SourceRole::Quote => &self.quote,
        }
    }
}

/// Constructor arguments of a feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedParams {
    pub base: Address,
    pub quote: Address,
    pub decimals: u8,
    pub base_stale_after: U256,
    pub quote_stale_after: U256,
}

impl FeedParams {
    pub fn new(base: Address, quote: Address, decimals: u8) -> Self {
        Self {
            base,
            quote,
            decimals,
            base_stale_after: U256::ZERO,
            quote_stale_after: U256::ZERO,
        }
    }

    pub fn with_stale_after(mut self, base_secs: u64, quote_secs: u64) -> Self {
        self.base_stale_after = U256::from(base_secs);
        self.quote_stale_after = U256::from(quote_secs);
        self
    }

    /// Checks run before any upstream source is touched, in revert order
    pub fn validate(&self) -> PriceFeedResult<()> {
        if self.base == Address::ZERO || self.quote == Address::ZERO {
            return Err(PriceFeedError::NullAddress);
        }
        // output precision must be in 1..=18
        if self.decimals == 0 || self.decimals > MAX_DECIMALS {
            return Err(PriceFeedError::InvalidDecimals(self.decimals));
        }
        if self.base_stale_after.is_zero() || self.quote_stale_after.is_zero() {
            return Err(PriceFeedError::NullStalePrice);
        }
        Ok(())
    }

    pub fn address(&self, role: SourceRole) -> Address {
        match role {
            SourceRole::Base => self.base,
            SourceRole::Quote => self.quote,
        }
    }

    pub fn stale_after(&self, role: SourceRole) -> U256 {
        match role {
            SourceRole::Base => self.base_stale_after,
            SourceRole::Quote => self.quote_stale_after,
        }
    }
}

/// Fixed-point feed output with its precision attached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedPrice {
    pub raw: U256,
    pub decimals: u8,
}

impl FeedPrice {
    pub fn new(raw: U256, decimals: u8) -> Self {
        Self { raw, decimals }
    }

    /// Exact decimal form, if the raw value fits in 96 bits
    pub fn to_decimal(&self) -> Option<Decimal> {
        let raw = i128::try_from(self.raw).ok()?;
        Decimal::try_from_i128_with_scale(raw, u32::from(self.decimals)).ok()
    }
}

impl fmt::Display for FeedPrice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_decimal() {
            Some(d) => write!(f, "{}", d.normalize()),
            None => write!(f, "{}e-{}", self.raw, self.decimals),
        }
    }
}
