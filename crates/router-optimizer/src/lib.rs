//! Optimal split of a trade across liquidity sources.
//!
//! Optimization runs in two stages: [`CurveSampler`] quotes every active
//! source at `parts` evenly spaced sub-amounts, then [`optimize_curves`]
//! allocates parts over the sampled curves. [`DistributionOptimizer`] ties the
//! two together for callers that just want a [`QuoteResult`].

use router_sources::{RegistryError, SourceRegistry};
use router_types::{Asset, QuoteResult, SourceId, SwapQuery, U256};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

pub mod dp;
pub mod sampler;

pub use dp::{allocate, optimize_curves};
pub use sampler::{CurveSampler, SampledCurve};

/// Upper bound on `parts`; each part costs one quote per active source.
pub const MAX_PARTS: u64 = 1_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptimizerError {
	/// Part count outside `1..=MAX_PARTS`.
	#[error("Invalid parts {0}: must be between 1 and {max}", max = MAX_PARTS)]
	InvalidParts(u64),
	/// Active sources could not be resolved.
	#[error(transparent)]
	Registry(#[from] RegistryError),
}

/// Rejects a part count before any source is contacted.
pub fn check_parts(parts: u64) -> Result<(), OptimizerError> {
	if parts == 0 || parts > MAX_PARTS {
		return Err(OptimizerError::InvalidParts(parts));
	}
	Ok(())
}

/// Samples the active sources and runs the allocation over their curves.
pub struct DistributionOptimizer {
	registry: Arc<SourceRegistry>,
	sampler: CurveSampler,
}

impl DistributionOptimizer {
	/// Creates an optimizer that gives each source `quote_timeout` to price
	/// all of its sample points.
	pub fn new(registry: Arc<SourceRegistry>, quote_timeout: Duration) -> Self {
		Self {
			sampler: CurveSampler::new(registry.clone(), quote_timeout),
			registry,
		}
	}

	pub fn registry(&self) -> &Arc<SourceRegistry> {
		&self.registry
	}

	/// Best allocation of `amount` over `active`, net of gas priced in the
	/// destination asset.
	///
	/// A zero amount or an empty active set yields the zero result without
	/// quoting anything.
	pub async fn optimize(
		&self,
		from: Asset,
		dest: Asset,
		amount: U256,
		parts: u64,
		active: &[SourceId],
		gas_price_in_dest: U256,
	) -> Result<QuoteResult, OptimizerError> {
		check_parts(parts)?;
		if amount.is_zero() || active.is_empty() {
			return Ok(QuoteResult::empty(self.registry.len()));
		}

		let curves = self
			.sampler
			.sample(from, dest, amount, parts, active)
			.await;
		let result = optimize_curves(&curves, parts, gas_price_in_dest, self.registry.len());
		debug!(
			"Optimized {} {} -> {}: return {} over {:?}",
			amount, from, dest, result.return_amount, result.distribution.0
		);
		Ok(result)
	}

	/// Resolves the active sources for one hop and optimizes over them.
	pub async fn quote(
		&self,
		from: Asset,
		amount: U256,
		query: &SwapQuery,
		parts: u64,
	) -> Result<QuoteResult, OptimizerError> {
		check_parts(parts)?;
		let active = self.registry.active_for(from, query)?;
		self.optimize(
			from,
			query.dest,
			amount,
			parts,
			&active,
			query.gas_price_in_dest,
		)
		.await
	}
}
