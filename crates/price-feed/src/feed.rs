//! Cross-rate price feed
//!
//! Combines a base and a quote aggregator into `base / quote`, scaled to a
//! fixed output precision. Configuration, including each aggregator's
//! precision, is captured once at construction and never re-read; readings
//! are fetched fresh on every [`PriceFeed::get_price`] call.

use std::fmt;
use std::sync::Arc;

use alloy_primitives::{Address, U256};
use tracing::{debug, info, warn};

use oracle_core::{
    cross_rate, FeedParams, FeedPrice, PriceFeedConfig, PriceFeedError, PriceFeedResult,
    SourceRole, SourceSnapshot,
};

use crate::source::{Clock, PriceSource, SourceResolver, SystemClock};

pub struct PriceFeed {
    config: PriceFeedConfig,
    base: Arc<dyn PriceSource>,
    quote: Arc<dyn PriceSource>,
    clock: Arc<dyn Clock>,
}

impl PriceFeed {
    /// Validate `params`, resolve both aggregators and snapshot their decimals.
    ///
    /// Fails with the first violated rule: null address, output decimals,
    /// zero staleness threshold, then any upstream `decimals()` failure.
    pub async fn deploy<R>(params: FeedParams, resolver: &R) -> PriceFeedResult<Self>
    where
        R: SourceResolver + ?Sized,
    {
        params.validate()?;

        let base = resolve(resolver, params.base)?;
        let quote = resolve(resolver, params.quote)?;

        let base_decimals = read_decimals(base.as_ref()).await?;
        let quote_decimals = read_decimals(quote.as_ref()).await?;

        let config = PriceFeedConfig {
            base: SourceSnapshot {
                address: params.base,
                decimals: base_decimals,
                stale_after: params.base_stale_after,
            },
            quote: SourceSnapshot {
                address: params.quote,
                decimals: quote_decimals,
                stale_after: params.quote_stale_after,
            },
            decimals: params.decimals,
        };

        info!(
            "Price feed ready: base {} ({} decimals), quote {} ({} decimals), output {} decimals",
            params.base, base_decimals, params.quote, quote_decimals, params.decimals
        );

        Ok(Self {
            config,
            base,
            quote,
            clock: Arc::new(SystemClock),
        })
    }

    /// Replace the wall clock, e.g. with block time
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Price of base in quote, scaled to [`Self::decimals`]
    pub async fn get_price(&self) -> PriceFeedResult<U256> {
        let now = self.clock.now();

        // both reads go out together; base is reported first if both fail
        let (base, quote) = futures::join!(
            self.validated_price(SourceRole::Base, now),
            self.validated_price(SourceRole::Quote, now),
        );
        let base = base?;
        let quote = quote?;

        let rate = cross_rate(
            base,
            self.config.base.decimals,
            quote,
            self.config.quote.decimals,
            self.config.decimals,
        )?;

        debug!(
            "Cross rate {} (base {}, quote {})",
            FeedPrice::new(rate, self.config.decimals),
            base,
            quote
        );

        Ok(rate)
    }

    /// [`Self::get_price`] with its precision attached
    pub async fn latest(&self) -> PriceFeedResult<FeedPrice> {
        let raw = self.get_price().await?;
        Ok(FeedPrice::new(raw, self.config.decimals))
    }

    async fn validated_price(&self, role: SourceRole, now: U256) -> PriceFeedResult<U256> {
        let snapshot = self.config.source(role);
        let source = match role {
            SourceRole::Base => &self.base,
            SourceRole::Quote => &self.quote,
        };

        let round = source
            .latest_round_data()
            .await
            .map_err(|source| PriceFeedError::Source {
                aggregator: snapshot.address,
                source,
            })?;
        let reading = round.reading();

        if !reading.is_positive() {
            warn!("{} aggregator {} reported {}", role, snapshot.address, reading.price);
            return Err(PriceFeedError::InvalidPrice {
                aggregator: snapshot.address,
                price: reading.price,
            });
        }

        if reading.is_stale(snapshot.stale_after, now) {
            match reading.updated_at_datetime() {
                Some(at) => warn!(
                    "{} aggregator {} is stale: updated at {} ({}), now {}, threshold {}s",
                    role, snapshot.address, reading.updated_at, at, now, snapshot.stale_after
                ),
                None => warn!(
                    "{} aggregator {} is stale: updated at {}, now {}, threshold {}s",
                    role, snapshot.address, reading.updated_at, now, snapshot.stale_after
                ),
            }
            return Err(PriceFeedError::StalePrice {
                aggregator: snapshot.address,
                updated_at: reading.updated_at,
            });
        }

        // positive, so the two's complement bits are the magnitude
        Ok(reading.price.into_raw())
    }

    pub fn config(&self) -> &PriceFeedConfig {
        &self.config
    }

    pub fn base(&self) -> Address {
        self.config.base.address
    }

    pub fn quote(&self) -> Address {
        self.config.quote.address
    }

    pub fn base_decimals(&self) -> u8 {
        self.config.base.decimals
    }

    pub fn quote_decimals(&self) -> u8 {
        self.config.quote.decimals
    }

    /// Output precision
    pub fn decimals(&self) -> u8 {
        self.config.decimals
    }

    pub fn base_stale_after(&self) -> U256 {
        self.config.base.stale_after
    }

    pub fn quote_stale_after(&self) -> U256 {
        self.config.quote.stale_after
    }
}

impl fmt::Debug for PriceFeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PriceFeed")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn resolve<R>(resolver: &R, address: Address) -> PriceFeedResult<Arc<dyn PriceSource>>
where
    R: SourceResolver + ?Sized,
{
    resolver
        .resolve(address)
        .map_err(|source| PriceFeedError::Source {
            aggregator: address,
            source,
        })
}

async fn read_decimals(source: &dyn PriceSource) -> PriceFeedResult<u8> {
    source
        .decimals()
        .await
        .map_err(|err| PriceFeedError::Source {
            aggregator: source.address(),
            source: err,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{ManualClock, SourceRegistry, StaticAggregator};
    use alloy_primitives::I256;
    use oracle_core::SourceError;
    use proptest::prelude::*;

    const NOW: u64 = 1_700_000_000;
    const BASE_STALE: u64 = 3_600;
    const QUOTE_STALE: u64 = 86_400;

    struct Harness {
        base: Arc<StaticAggregator>,
        quote: Arc<StaticAggregator>,
        clock: Arc<ManualClock>,
        registry: SourceRegistry,
    }

    fn base_addr() -> Address {
        Address::repeat_byte(0xba)
    }

    fn quote_addr() -> Address {
        Address::repeat_byte(0x9e)
    }

    fn price(v: i128) -> I256 {
        I256::try_from(v).unwrap()
    }

    fn e18() -> U256 {
        U256::from(10u64).pow(U256::from(18u64))
    }

    fn harness(base_decimals: u8, base_answer: i128, quote_decimals: u8, quote_answer: i128) -> Harness {
        let base = Arc::new(StaticAggregator::new(base_addr(), base_decimals, price(base_answer), NOW));
        let quote = Arc::new(StaticAggregator::new(quote_addr(), quote_decimals, price(quote_answer), NOW));
        let registry = SourceRegistry::new()
            .with(base.clone() as Arc<dyn PriceSource>)
            .with(quote.clone() as Arc<dyn PriceSource>);

        Harness {
            base,
            quote,
            clock: Arc::new(ManualClock::new(NOW)),
            registry,
        }
    }

    fn params(decimals: u8) -> FeedParams {
        FeedParams::new(base_addr(), quote_addr(), decimals).with_stale_after(BASE_STALE, QUOTE_STALE)
    }

    async fn deploy(h: &Harness, decimals: u8) -> PriceFeed {
        PriceFeed::deploy(params(decimals), &h.registry)
            .await
            .unwrap()
            .with_clock(h.clock.clone())
    }

    #[tokio::test]
    async fn test_same_decimals_scenario() {
        let h = harness(8, 2_000_00000000, 8, 1_00000000);
        let feed = deploy(&h, 18).await;

        assert_eq!(feed.get_price().await.unwrap(), U256::from(2_000u64) * e18());
    }

    #[tokio::test]
    async fn test_cross_decimal_scenario() {
        let h = harness(8, 2_000_00000000, 6, 1_000000);
        let feed = deploy(&h, 18).await;

        assert_eq!(feed.get_price().await.unwrap(), U256::from(2_000u64) * e18());
        assert_eq!(feed.latest().await.unwrap().to_string(), "2000");
    }

    #[tokio::test]
    async fn test_accessors_reflect_construction() {
        let h = harness(8, 1, 6, 1);
        let feed = deploy(&h, 10).await;

        assert_eq!(feed.base(), base_addr());
        assert_eq!(feed.quote(), quote_addr());
        assert_eq!(feed.base_decimals(), 8);
        assert_eq!(feed.quote_decimals(), 6);
        assert_eq!(feed.decimals(), 10);
        assert_eq!(feed.base_stale_after(), U256::from(BASE_STALE));
        assert_eq!(feed.quote_stale_after(), U256::from(QUOTE_STALE));
    }

    #[tokio::test]
    async fn test_construction_rejects_bad_params() {
        let h = harness(8, 1, 8, 1);

        let err = PriceFeed::deploy(params(19), &h.registry).await.unwrap_err();
        assert_eq!(err, PriceFeedError::InvalidDecimals(19));
        assert!(PriceFeed::deploy(params(18), &h.registry).await.is_ok());

        let zero_stale = params(18).with_stale_after(0, QUOTE_STALE);
        let err = PriceFeed::deploy(zero_stale, &h.registry).await.unwrap_err();
        assert_eq!(err, PriceFeedError::NullStalePrice);

        let mut null_base = params(18);
        null_base.base = Address::ZERO;
        let err = PriceFeed::deploy(null_base, &h.registry).await.unwrap_err();
        assert_eq!(err, PriceFeedError::NullAddress);
    }

    #[tokio::test]
    async fn test_construction_fails_when_decimals_unreadable() {
        let h = harness(8, 1, 8, 1);
        h.quote.set_failure(Some(SourceError::Transport("timeout".into())));

        let err = PriceFeed::deploy(params(18), &h.registry).await.unwrap_err();
        assert_eq!(err.aggregator(), Some(quote_addr()));
    }

    #[tokio::test]
    async fn test_unknown_aggregator() {
        let h = harness(8, 1, 8, 1);
        let mut p = params(18);
        p.quote = Address::repeat_byte(0x01);

        let err = PriceFeed::deploy(p, &h.registry).await.unwrap_err();
        assert_eq!(
            err,
            PriceFeedError::Source {
                aggregator: Address::repeat_byte(0x01),
                source: SourceError::NotFound(Address::repeat_byte(0x01)),
            }
        );
    }

    #[tokio::test]
    async fn test_decimals_are_not_reread() {
        let h = harness(8, 2_000_00000000, 8, 1_00000000);
        let feed = deploy(&h, 18).await;

        feed.get_price().await.unwrap();
        feed.get_price().await.unwrap();

        assert_eq!(h.base.decimals_reads(), 1);
        assert_eq!(h.quote.decimals_reads(), 1);
        assert_eq!(h.base.reads(), 2);
    }

    #[tokio::test]
    async fn test_non_positive_price_rejected() {
        let h = harness(8, 0, 8, 1_00000000);
        let feed = deploy(&h, 18).await;

        assert_eq!(
            feed.get_price().await.unwrap_err(),
            PriceFeedError::InvalidPrice {
                aggregator: base_addr(),
                price: I256::ZERO,
            }
        );

        h.base.set_answer(price(1), NOW);
        h.quote.set_answer(price(-5), NOW);
        assert_eq!(
            feed.get_price().await.unwrap_err(),
            PriceFeedError::InvalidPrice {
                aggregator: quote_addr(),
                price: price(-5),
            }
        );
    }

    #[tokio::test]
    async fn test_base_error_reported_first() {
        let h = harness(8, -1, 8, -2);
        let feed = deploy(&h, 18).await;

        let err = feed.get_price().await.unwrap_err();
        assert_eq!(err.aggregator(), Some(base_addr()));
    }

    #[tokio::test]
    async fn test_staleness_threshold_boundary() {
        let h = harness(8, 1_00000000, 8, 1_00000000);
        let feed = deploy(&h, 8).await;

        h.clock.set(NOW + BASE_STALE);
        assert!(feed.get_price().await.is_ok());

        h.clock.set(NOW + BASE_STALE + 1);
        assert_eq!(
            feed.get_price().await.unwrap_err(),
            PriceFeedError::StalePrice {
                aggregator: base_addr(),
                updated_at: U256::from(NOW),
            }
        );

        // quote has its own, longer threshold
        h.base.set_answer(price(1_00000000), NOW + QUOTE_STALE);
        h.clock.set(NOW + QUOTE_STALE + 1);
        assert_eq!(
            feed.get_price().await.unwrap_err(),
            PriceFeedError::StalePrice {
                aggregator: quote_addr(),
                updated_at: U256::from(NOW),
            }
        );
    }

    #[tokio::test]
    async fn test_future_timestamp_is_not_stale() {
        let h = harness(8, 3_00000000, 8, 2_00000000);
        let feed = deploy(&h, 2).await;

        h.base.set_answer(price(3_00000000), NOW + 600);
        assert_eq!(feed.get_price().await.unwrap(), U256::from(150u64));
    }

    #[tokio::test]
    async fn test_each_query_reads_fresh_data() {
        let h = harness(8, 2_000_00000000, 8, 1_00000000);
        let feed = deploy(&h, 18).await;

        let first = feed.get_price().await.unwrap();
        assert_eq!(feed.get_price().await.unwrap(), first);

        h.base.set_answer(price(4_000_00000000), NOW);
        assert_eq!(feed.get_price().await.unwrap(), first * U256::from(2u64));
        assert_eq!(h.base.reads(), 3);
        assert_eq!(h.quote.reads(), 3);
    }

    #[tokio::test]
    async fn test_upstream_read_failure_propagates() {
        let h = harness(8, 1, 8, 1);
        let feed = deploy(&h, 18).await;
        h.quote.set_failure(Some(SourceError::Rpc {
            code: -32000,
            message: "header not found".into(),
        }));

        assert!(matches!(
            feed.get_price().await.unwrap_err(),
            PriceFeedError::Source { aggregator, .. } if aggregator == quote_addr()
        ));
    }

    proptest! {
        #[test]
        fn prop_non_positive_base_always_rejected(p in i64::MIN..=0i64) {
            let h = harness(8, i128::from(p), 8, 1_00000000);
            let result = tokio_test::block_on(async {
                deploy(&h, 18).await.get_price().await
            });
            prop_assert_eq!(
                result,
                Err(PriceFeedError::InvalidPrice { aggregator: base_addr(), price: price(i128::from(p)) })
            );
        }

        #[test]
        fn prop_stale_quote_always_rejected(age in (QUOTE_STALE + 1)..(QUOTE_STALE * 365)) {
            let h = harness(8, 1_00000000, 8, 1_00000000);
            h.base.set_answer(price(1_00000000), NOW + age);
            h.clock.set(NOW + age);
            let result = tokio_test::block_on(async {
                deploy(&h, 18).await.get_price().await
            });
            prop_assert_eq!(
                result,
                Err(PriceFeedError::StalePrice { aggregator: quote_addr(), updated_at: U256::from(NOW) })
            );
        }
    }
}
