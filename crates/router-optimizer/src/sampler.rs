//! Concurrent sampling of source return curves.

use futures::future::join_all;
use router_sources::{SourceQuote, SourceRegistry};
use router_types::{mul_div_floor, Asset, SourceId, U256};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Returns of one source at `amount * k / parts` for `k = 1..=parts`.
/// `samples[k - 1]` holds the quote for `k` parts, or `None` when the source
/// failed to quote that amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampledCurve {
	pub source: SourceId,
	pub samples: Vec<Option<SourceQuote>>,
}

impl SampledCurve {
	/// Curve whose every sample point is available.
	pub fn from_quotes(source: SourceId, quotes: Vec<SourceQuote>) -> Self {
		Self {
			source,
			samples: quotes.into_iter().map(Some).collect(),
		}
	}

	/// Quote for `k` parts. Zero parts is always free and returns nothing;
	/// `None` means the source cannot be given `k` parts.
	pub fn at(&self, k: usize) -> Option<SourceQuote> {
		if k == 0 {
			return Some(SourceQuote::default());
		}
		self.samples.get(k - 1).copied().flatten()
	}

	/// True when at least one non-empty share can be allocated.
	pub fn is_available(&self) -> bool {
		self.samples.iter().any(Option::is_some)
	}
}

/// Quotes every active source at every sample point, bounding each source by
/// a timeout.
#[derive(Clone)]
pub struct CurveSampler {
	registry: Arc<SourceRegistry>,
	timeout: Duration,
}

impl CurveSampler {
	/// Creates a sampler bounding each source by `timeout`.
	pub fn new(registry: Arc<SourceRegistry>, timeout: Duration) -> Self {
		Self { registry, timeout }
	}

	pub fn timeout(&self) -> Duration {
		self.timeout
	}

	/// Samples each source in `active` concurrently. Never fails: a failed
	/// sample is marked unavailable, and a source that misses the timeout or
	/// fails every sample is left out of the returned curves.
	pub async fn sample(
		&self,
		from: Asset,
		dest: Asset,
		amount: U256,
		parts: u64,
		active: &[SourceId],
	) -> Vec<SampledCurve> {
		let curves = active
			.iter()
			.map(|id| self.sample_source(*id, from, dest, amount, parts));
		join_all(curves)
			.await
			.into_iter()
			.flatten()
			.filter(SampledCurve::is_available)
			.collect()
	}

	async fn sample_source(
		&self,
		id: SourceId,
		from: Asset,
		dest: Asset,
		amount: U256,
		parts: u64,
	) -> Option<SampledCurve> {
		let Some(source) = self.registry.get(id) else {
			warn!("Source {} vanished from the registry", id);
			return None;
		};

		let points = (1..=parts).map(|k| {
			let amount_in = mul_div_floor(amount, k, parts);
			let source = source.clone();
			async move {
				match source.quote(from, dest, amount_in).await {
					Ok(quote) => Some(quote),
					Err(e) => {
						warn!(
							"Source {} ({}) failed to quote {}: {}",
							id,
							source.info().name,
							amount_in,
							e
						);
						None
					}
				}
			}
		});

		match tokio::time::timeout(self.timeout, join_all(points)).await {
			Ok(samples) => Some(SampledCurve {
				source: id,
				samples,
			}),
			Err(_) => {
				warn!(
					"Source {} ({}) timed out after {:?}, excluded from this quote",
					id,
					source.info().name,
					self.timeout
				);
				None
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use router_sources::mock::{asset, MockSource};

	#[tokio::test]
	async fn test_samples_at_each_fraction() {
		let source = Arc::new(MockSource::linear("lin", asset(1), asset(2), 3, 7));
		let registry = Arc::new(
			SourceRegistry::new()
				.with_source(SourceId(0), source.clone())
				.unwrap(),
		);
		let sampler = CurveSampler::new(registry, Duration::from_secs(1));

		let curves = sampler
			.sample(asset(1), asset(2), U256::from(10), 4, &[SourceId(0)])
			.await;
		assert_eq!(curves.len(), 1);
		// 10 * k / 4 truncated: 2, 5, 7, 10
		let outs: Vec<U256> = curves[0]
			.samples
			.iter()
			.flatten()
			.map(|q| q.amount_out)
			.collect();
		assert_eq!(
			outs,
			vec![U256::from(6), U256::from(15), U256::from(21), U256::from(30)]
		);
		assert_eq!(curves[0].at(0), Some(SourceQuote::default()));
		assert_eq!(curves[0].at(2).map(|q| q.gas), Some(U256::from(7)));
		assert_eq!(curves[0].at(5), None);
		assert_eq!(source.quote_calls(), 4);
	}

	#[tokio::test]
	async fn test_failed_and_slow_sources_are_left_out() {
		let registry = Arc::new(
			SourceRegistry::new()
				.with_source(
					SourceId(0),
					Arc::new(MockSource::linear("down", asset(1), asset(2), 2, 1).failing_quotes()),
				)
				.unwrap()
				.with_source(
					SourceId(1),
					Arc::new(
						MockSource::linear("slow", asset(1), asset(2), 2, 1)
							.with_delay(Duration::from_secs(5)),
					),
				)
				.unwrap()
				.with_source(
					SourceId(2),
					Arc::new(MockSource::linear("up", asset(1), asset(2), 2, 1)),
				)
				.unwrap(),
		);
		let sampler = CurveSampler::new(registry, Duration::from_millis(20));

		let curves = sampler
			.sample(
				asset(1),
				asset(2),
				U256::from(100),
				2,
				&[SourceId(0), SourceId(1), SourceId(2)],
			)
			.await;
		assert_eq!(curves.len(), 1);
		assert_eq!(curves[0].source, SourceId(2));
		assert!(curves[0].samples.iter().all(Option::is_some));
	}
}
