//! Batched quoting: many amounts, multi-hop paths, and several paths at once.
//!
//! Every cell of a batch is independent. Amounts, paths and the sources
//! inside one optimizer pass are all quoted concurrently; only the hops of a
//! single path run in sequence because each consumes the previous output.

use futures::future::{join_all, try_join_all};
use router_optimizer::{check_parts, DistributionOptimizer};
use router_types::{
	Asset, EventBus, PathReturn, QuoteEvent, QuoteResult, RouterEvent, SourceId, SwapPath,
	SwapQuery, SwapReturn, U256,
};
use std::sync::Arc;
use tracing::{debug, info};

use crate::RouterError;

pub struct QuoteAggregator {
	optimizer: Arc<DistributionOptimizer>,
	events: EventBus,
}

/// Sources resolved once per hop and shared by every amount.
struct ResolvedHop<'a> {
	from: Asset,
	query: &'a SwapQuery,
	active: Vec<SourceId>,
}

impl QuoteAggregator {
	pub fn new(optimizer: Arc<DistributionOptimizer>, events: EventBus) -> Self {
		Self { optimizer, events }
	}

	pub fn optimizer(&self) -> &Arc<DistributionOptimizer> {
		&self.optimizer
	}

	fn check_request(amounts: &[U256], parts: u64) -> Result<(), RouterError> {
		check_parts(parts)?;
		if amounts.is_empty() {
			return Err(RouterError::InvalidRequest("no amounts to quote".into()));
		}
		Ok(())
	}

	fn resolve<'a>(
		&self,
		from: Asset,
		path: &'a SwapPath,
	) -> Result<Vec<ResolvedHop<'a>>, RouterError> {
		if path.hops.is_empty() {
			return Err(RouterError::InvalidRequest("path has no hops".into()));
		}
		let registry = self.optimizer.registry();
		path.legs(from)
			.into_iter()
			.zip(&path.hops)
			.map(|((from, _), query)| -> Result<ResolvedHop<'a>, RouterError> {
				Ok(ResolvedHop {
					from,
					query,
					active: registry.active_for(from, query)?,
				})
			})
			.collect()
	}

	fn publish(&self, from: Asset, dest: Asset, amount: U256, result: &QuoteResult) {
		self.events.publish(RouterEvent::Quote(QuoteEvent::QuoteComputed {
			from,
			dest,
			amount,
			return_amount: result.return_amount,
		}));
	}

	async fn quote_hop(
		&self,
		hop: &ResolvedHop<'_>,
		amount: U256,
		parts: u64,
	) -> Result<QuoteResult, RouterError> {
		Ok(self
			.optimizer
			.optimize(
				hop.from,
				hop.query.dest,
				amount,
				parts,
				&hop.active,
				hop.query.gas_price_in_dest,
			)
			.await?)
	}

	/// Quotes each amount for one hop. Active sources are resolved once;
	/// each amount is optimized on its own.
	pub async fn get_swap_return(
		&self,
		from: Asset,
		amounts: &[U256],
		query: &SwapQuery,
		parts: u64,
	) -> Result<SwapReturn, RouterError> {
		Self::check_request(amounts, parts)?;
		let path = SwapPath::single(query.clone());
		let hops = self.resolve(from, &path)?;
		let hop = &hops[0];

		let results =
			try_join_all(amounts.iter().map(|amount| self.quote_hop(hop, *amount, parts))).await?;
		for (amount, result) in amounts.iter().zip(&results) {
			self.publish(from, query.dest, *amount, result);
		}

		info!(
			"Quoted {} amount(s) {} -> {} over {} active source(s)",
			amounts.len(),
			from,
			query.dest,
			hop.active.len()
		);
		Ok(SwapReturn::from_results(results))
	}

	/// Feeds each hop's return into the next hop for every amount. The
	/// reported distribution is the final hop's; `hops` keeps them all.
	///
	/// A hop whose pair no source supports fails the whole call. A hop
	/// whose sources are all masked returns zero for that amount, and the
	/// remaining hops then quote zero without contacting any source.
	pub async fn get_path_return(
		&self,
		from: Asset,
		amounts: &[U256],
		path: &SwapPath,
		parts: u64,
	) -> Result<PathReturn, RouterError> {
		Self::check_request(amounts, parts)?;
		let hops = self.resolve(from, path)?;

		let chains = try_join_all(
			amounts
				.iter()
				.map(|amount| self.quote_chain(&hops, *amount, parts)),
		)
		.await?;

		if let Some(dest) = path.dest() {
			for (amount, chain) in amounts.iter().zip(&chains) {
				if let Some(result) = chain.last() {
					self.publish(from, dest, *amount, result);
				}
			}
		}

		Ok(PathReturn::from_hop_chains(
			chains,
			self.optimizer.registry().len(),
		))
	}

	async fn quote_chain(
		&self,
		hops: &[ResolvedHop<'_>],
		amount: U256,
		parts: u64,
	) -> Result<Vec<QuoteResult>, RouterError> {
		let mut chain = Vec::with_capacity(hops.len());
		let mut carried = amount;
		for (i, hop) in hops.iter().enumerate() {
			let result = self.quote_hop(hop, carried, parts).await?;
			debug!(
				"Hop {} {} -> {}: {} in, {} out",
				i, hop.from, hop.query.dest, carried, result.return_amount
			);
			carried = result.return_amount;
			chain.push(result);
		}
		Ok(chain)
	}

	/// Evaluates every path against every amount.
	pub async fn get_multi_path_return(
		&self,
		from: Asset,
		amounts: &[U256],
		paths: &[SwapPath],
		parts: u64,
	) -> Result<Vec<PathReturn>, RouterError> {
		Self::check_request(amounts, parts)?;
		if paths.is_empty() {
			return Err(RouterError::InvalidRequest("no paths to quote".into()));
		}

		join_all(
			paths
				.iter()
				.map(|path| self.get_path_return(from, amounts, path, parts)),
		)
		.await
		.into_iter()
		.collect()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use router_sources::mock::{asset, MockSource};
	use router_sources::SourceRegistry;
	use router_types::{Distribution, SourceMask};
	use std::time::Duration;

	const ETH: u8 = 0xee;
	const DAI: u8 = 0xda;
	const USDC: u8 = 0xcc;

	struct Fixture {
		aggregator: QuoteAggregator,
		sources: Vec<Arc<MockSource>>,
	}

	fn fixture() -> Fixture {
		let eth = asset(ETH);
		let dai = asset(DAI);
		let usdc = asset(USDC);
		let sources = vec![
			Arc::new(MockSource::product("v1", eth, dai, 1_000, 2_000_000, 60_000)),
			Arc::new(MockSource::product("v2", eth, dai, 2_000, 4_000_000, 50_000)),
			Arc::new(MockSource::linear("curve", dai, usdc, 1, 720_000)),
			Arc::new(MockSource::linear("kyber", eth, usdc, 1_900, 100_000)),
		];
		let mut registry = SourceRegistry::new();
		for (i, source) in sources.iter().enumerate() {
			registry.register(SourceId(i as u32), source.clone()).unwrap();
		}
		let optimizer = DistributionOptimizer::new(Arc::new(registry), Duration::from_secs(1));
		Fixture {
			aggregator: QuoteAggregator::new(Arc::new(optimizer), EventBus::new(64)),
			sources,
		}
	}

	fn calls(f: &Fixture) -> usize {
		f.sources.iter().map(|s| s.quote_calls()).sum()
	}

	fn amounts(values: &[u64]) -> Vec<U256> {
		values.iter().map(|v| U256::from(*v)).collect()
	}

	#[tokio::test]
	async fn test_swap_return_per_amount() {
		let f = fixture();
		let out = f
			.aggregator
			.get_swap_return(asset(ETH), &amounts(&[0, 10, 100]), &SwapQuery::new(asset(DAI)), 4)
			.await
			.unwrap();

		assert_eq!(out.return_amounts.len(), 3);
		assert_eq!(out.return_amounts[0], U256::ZERO);
		assert!(out.distributions[0].is_zero());
		assert_eq!(out.estimate_gas_amounts[0], U256::ZERO);
		assert!(out.return_amounts[2] > out.return_amounts[1]);
		for dist in &out.distributions[1..] {
			assert_eq!(dist.parts(), 4);
			assert_eq!(dist.len(), 4);
			assert_eq!(dist.weight(SourceId(2)) + dist.weight(SourceId(3)), 0);
		}
	}

	#[tokio::test]
	async fn test_swap_return_is_deterministic() {
		let f = fixture();
		let query = SwapQuery::new(asset(DAI)).with_gas_price(U256::from(1));
		let a = f
			.aggregator
			.get_swap_return(asset(ETH), &amounts(&[500, 5_000]), &query, 10)
			.await
			.unwrap();
		let b = f
			.aggregator
			.get_swap_return(asset(ETH), &amounts(&[500, 5_000]), &query, 10)
			.await
			.unwrap();
		assert_eq!(a, b);
	}

	#[tokio::test]
	async fn test_request_errors() {
		let f = fixture();
		let query = SwapQuery::new(asset(DAI));
		assert!(matches!(
			f.aggregator.get_swap_return(asset(ETH), &[], &query, 4).await,
			Err(RouterError::InvalidRequest(_))
		));
		assert!(matches!(
			f.aggregator
				.get_swap_return(asset(ETH), &amounts(&[1]), &query, 0)
				.await,
			Err(RouterError::InvalidParts(0))
		));
		assert!(matches!(
			f.aggregator
				.get_path_return(asset(ETH), &amounts(&[1]), &SwapPath::new(vec![]), 4)
				.await,
			Err(RouterError::InvalidRequest(_))
		));
		assert!(matches!(
			f.aggregator
				.get_multi_path_return(asset(ETH), &amounts(&[1]), &[], 4)
				.await,
			Err(RouterError::InvalidRequest(_))
		));
		assert_eq!(calls(&f), 0);
	}

	#[tokio::test]
	async fn test_path_chains_hops() {
		let f = fixture();
		let path = SwapPath::new(vec![SwapQuery::new(asset(DAI)), SwapQuery::new(asset(USDC))]);
		let out = f
			.aggregator
			.get_path_return(asset(ETH), &amounts(&[100]), &path, 2)
			.await
			.unwrap();

		let hops = &out.hops[0];
		assert_eq!(hops.len(), 2);
		// The curve hop is linear at rate 1.
		assert_eq!(hops[1].return_amount, hops[0].return_amount);
		assert_eq!(out.return_amounts[0], hops[1].return_amount);
		assert_eq!(out.distributions[0], Distribution(vec![0, 0, 2, 0]));
		assert_eq!(
			out.estimate_gas_amounts[0],
			hops[0].estimate_gas() + U256::from(720_000)
		);
	}

	#[tokio::test]
	async fn test_masked_hop_zeroes_amount_without_later_calls() {
		let f = fixture();
		let path = SwapPath::new(vec![
			SwapQuery::new(asset(DAI)).with_flags(SourceMask::all()),
			SwapQuery::new(asset(USDC)),
		]);
		let out = f
			.aggregator
			.get_path_return(asset(ETH), &amounts(&[100, 200]), &path, 4)
			.await
			.unwrap();
		assert_eq!(out.return_amounts, vec![U256::ZERO, U256::ZERO]);
		assert_eq!(calls(&f), 0);
	}

	#[tokio::test]
	async fn test_unsupported_hop_is_caller_error() {
		let f = fixture();
		let path = SwapPath::new(vec![SwapQuery::new(asset(USDC)), SwapQuery::new(asset(DAI))]);
		let err = f
			.aggregator
			.get_path_return(asset(ETH), &amounts(&[100]), &path, 4)
			.await
			.unwrap_err();
		assert!(matches!(
			err,
			RouterError::UnsupportedAsset { from, dest }
				if from == asset(USDC) && dest == asset(DAI)
		));
		assert!(err.is_caller_error());
		assert_eq!(calls(&f), 0);
	}

	#[tokio::test]
	async fn test_multi_path_compares_routes() {
		let f = fixture();
		let direct = SwapPath::single(SwapQuery::new(asset(USDC)));
		let via_dai = SwapPath::new(vec![SwapQuery::new(asset(DAI)), SwapQuery::new(asset(USDC))]);
		let batch = amounts(&[10, 100, 1_000]);

		let out = f
			.aggregator
			.get_multi_path_return(asset(ETH), &batch, &[direct.clone(), via_dai.clone()], 4)
			.await
			.unwrap();
		assert_eq!(out.len(), 2);
		assert_eq!(out[0].return_amounts.len(), 3);

		// Each cell matches the same path quoted on its own.
		let alone = f
			.aggregator
			.get_path_return(asset(ETH), &batch, &via_dai, 4)
			.await
			.unwrap();
		assert_eq!(out[1], alone);
		assert_eq!(out[0].return_amounts[1], U256::from(190_000));
	}

	#[tokio::test]
	async fn test_quote_events_published() {
		let f = fixture();
		let mut rx = f.aggregator.events.subscribe();
		f.aggregator
			.get_swap_return(asset(ETH), &amounts(&[7]), &SwapQuery::new(asset(DAI)), 1)
			.await
			.unwrap();
		match rx.recv().await.unwrap() {
			RouterEvent::Quote(QuoteEvent::QuoteComputed { amount, .. }) => {
				assert_eq!(amount, U256::from(7))
			}
			other => panic!("unexpected event {:?}", other),
		}
	}
}
