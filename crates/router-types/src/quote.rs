//! Quote results: per-source allocations and the returns they yield.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::SourceId;

/// Per-source allocation in parts, indexed by [`SourceId`]. Sources that are
/// disabled or unused read zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Distribution(pub Vec<u64>);

impl Distribution {
	/// All-zero distribution over `len` sources.
	pub fn zeros(len: usize) -> Self {
		Self(vec![0; len])
	}

	pub fn from_weights(weights: Vec<u64>) -> Self {
		Self(weights)
	}

	pub fn weights(&self) -> &[u64] {
		&self.0
	}

	pub fn len(&self) -> usize {
		self.0.len()
	}

	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// Parts allocated to `id`; zero past the end.
	pub fn weight(&self, id: SourceId) -> u64 {
		self.0.get(id.index()).copied().unwrap_or(0)
	}

	/// Total number of parts allocated, saturating at `u64::MAX`.
	pub fn parts(&self) -> u64 {
		self.0.iter().fold(0u64, |acc, w| acc.saturating_add(*w))
	}

	/// Total number of parts, or `None` when the weights overflow `u64`.
	pub fn checked_parts(&self) -> Option<u64> {
		self.0.iter().try_fold(0u64, |acc, w| acc.checked_add(*w))
	}

	pub fn is_zero(&self) -> bool {
		self.0.iter().all(|w| *w == 0)
	}

	/// Sources with a non-zero weight, in id order.
	pub fn selected(&self) -> impl Iterator<Item = (SourceId, u64)> + '_ {
		self.0
			.iter()
			.enumerate()
			.filter(|(_, w)| **w > 0)
			.map(|(i, w)| (SourceId(i as u32), *w))
	}
}

/// Outcome of optimizing one amount over one hop.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteResult {
	/// Gross output of the chosen allocation, before any gas penalty.
	pub return_amount: U256,
	pub distribution: Distribution,
	/// Gas estimate of each source at its chosen share; zero when unused.
	pub gas_estimates: Vec<U256>,
}

impl QuoteResult {
	/// Zero return over an all-zero distribution of `len` sources.
	pub fn empty(len: usize) -> Self {
		Self {
			return_amount: U256::ZERO,
			distribution: Distribution::zeros(len),
			gas_estimates: vec![U256::ZERO; len],
		}
	}

	/// Total gas across the selected sources.
	pub fn estimate_gas(&self) -> U256 {
		self.gas_estimates
			.iter()
			.fold(U256::ZERO, |acc, gas| acc.saturating_add(*gas))
	}
}

/// Batched single-hop result, one entry per input amount.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapReturn {
	pub return_amounts: Vec<U256>,
	pub distributions: Vec<Distribution>,
	pub estimate_gas_amounts: Vec<U256>,
}

impl SwapReturn {
	pub fn from_results(results: Vec<QuoteResult>) -> Self {
		let mut out = Self::default();
		for result in results {
			out.estimate_gas_amounts.push(result.estimate_gas());
			out.return_amounts.push(result.return_amount);
			out.distributions.push(result.distribution);
		}
		out
	}
}

/// Batched multi-hop result. The three flat vectors describe the end-to-end
/// return with the final hop's distribution; `hops` keeps every hop's
/// result per amount.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathReturn {
	pub return_amounts: Vec<U256>,
	pub distributions: Vec<Distribution>,
	pub estimate_gas_amounts: Vec<U256>,
	pub hops: Vec<Vec<QuoteResult>>,
}

impl PathReturn {
	/// Builds the result from each amount's per-hop chain.
	pub fn from_hop_chains(chains: Vec<Vec<QuoteResult>>, registry_len: usize) -> Self {
		let mut out = Self::default();
		for chain in chains {
			let gas = chain
				.iter()
				.fold(U256::ZERO, |acc, hop| acc.saturating_add(hop.estimate_gas()));
			let last = chain
				.last()
				.cloned()
				.unwrap_or_else(|| QuoteResult::empty(registry_len));
			out.return_amounts.push(last.return_amount);
			out.distributions.push(last.distribution);
			out.estimate_gas_amounts.push(gas);
			out.hops.push(chain);
		}
		out
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn result(ret: u64, weights: Vec<u64>, gas: Vec<u64>) -> QuoteResult {
		QuoteResult {
			return_amount: U256::from(ret),
			distribution: Distribution(weights),
			gas_estimates: gas.into_iter().map(U256::from).collect(),
		}
	}

	#[test]
	fn test_distribution_helpers() {
		let dist = Distribution(vec![0, 7, 0, 3]);
		assert_eq!(dist.parts(), 10);
		assert_eq!(dist.weight(SourceId(1)), 7);
		assert_eq!(dist.weight(SourceId(9)), 0);
		assert_eq!(
			dist.selected().collect::<Vec<_>>(),
			vec![(SourceId(1), 7), (SourceId(3), 3)]
		);
		assert!(Distribution::zeros(4).is_zero());

		let huge = Distribution(vec![u64::MAX, 1]);
		assert_eq!(huge.checked_parts(), None);
		assert_eq!(huge.parts(), u64::MAX);
		assert_eq!(dist.checked_parts(), Some(10));
	}

	#[test]
	fn test_swap_return_flattens_results() {
		let out = SwapReturn::from_results(vec![
			result(100, vec![1, 0], vec![60_000, 0]),
			result(250, vec![1, 1], vec![60_000, 50_000]),
		]);
		assert_eq!(out.return_amounts, vec![U256::from(100), U256::from(250)]);
		assert_eq!(
			out.estimate_gas_amounts,
			vec![U256::from(60_000), U256::from(110_000)]
		);
		assert_eq!(out.distributions[1], Distribution(vec![1, 1]));
	}

	#[test]
	fn test_path_return_uses_last_hop() {
		let chain = vec![
			result(500, vec![2, 0], vec![100_000, 0]),
			result(42, vec![0, 2], vec![0, 720_000]),
		];
		let out = PathReturn::from_hop_chains(vec![chain, vec![]], 2);
		assert_eq!(out.return_amounts, vec![U256::from(42), U256::ZERO]);
		assert_eq!(out.distributions[0], Distribution(vec![0, 2]));
		assert_eq!(out.estimate_gas_amounts[0], U256::from(820_000));
		assert_eq!(out.distributions[1], Distribution::zeros(2));
		assert_eq!(out.hops[0].len(), 2);
	}
}
