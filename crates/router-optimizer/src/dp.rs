//! Resource-allocation DP over sampled curves.
//!
//! `best[i][j]` is the best net value using the first `i` curves with exactly
//! `j` parts allocated. Rows are built one curve at a time; only the chosen
//! share per cell is kept for every row so the allocation can be recovered by
//! walking back from `best[n][parts]`.

use router_types::{Distribution, QuoteResult, U256};

use crate::SampledCurve;

/// Net value kept as `gross - penalty` without ever materialising a negative
/// number.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Net {
	gross: U256,
	penalty: U256,
}

impl Net {
	fn plus(self, other: Net) -> Net {
		Net {
			gross: self.gross.saturating_add(other.gross),
			penalty: self.penalty.saturating_add(other.penalty),
		}
	}

	/// `self.gross - self.penalty > other.gross - other.penalty`
	fn beats(&self, other: &Net) -> bool {
		self.gross.saturating_add(other.penalty) > other.gross.saturating_add(self.penalty)
	}
}

/// Picks the allocation of `parts` across `curves` that maximizes total
/// return net of `gas * gas_price` for every used source. Shares whose
/// sample is missing are never allocated; when no full allocation exists the
/// zero result is returned.
///
/// Curves are evaluated in the given order. When several shares for a curve
/// give the same net value the smallest is kept, so earlier curves end up
/// with the larger share. The reported `return_amount` is the gross output
/// of the chosen allocation.
pub fn optimize_curves(
	curves: &[SampledCurve],
	parts: u64,
	gas_price: U256,
	registry_len: usize,
) -> QuoteResult {
	let mut result = QuoteResult::empty(registry_len);
	let parts = parts as usize;
	if curves.is_empty() || parts == 0 {
		return result;
	}

	let mut best: Vec<Option<Net>> = vec![None; parts + 1];
	best[0] = Some(Net::default());
	let mut choice = vec![vec![0usize; parts + 1]; curves.len()];

	for (i, curve) in curves.iter().enumerate() {
		// `None` marks a share the source could not quote.
		let values: Vec<Option<Net>> = (0..=parts)
			.map(|k| {
				curve.at(k).map(|quote| Net {
					gross: quote.amount_out,
					penalty: if k == 0 {
						U256::ZERO
					} else {
						quote.gas.saturating_mul(gas_price)
					},
				})
			})
			.collect();

		let mut row: Vec<Option<Net>> = vec![None; parts + 1];
		for j in 0..=parts {
			for (k, value) in values.iter().enumerate().take(j + 1) {
				let (Some(base), Some(value)) = (best[j - k], value) else {
					continue;
				};
				let candidate = base.plus(*value);
				let replace = match &row[j] {
					Some(incumbent) => candidate.beats(incumbent),
					None => true,
				};
				if replace {
					row[j] = Some(candidate);
					choice[i][j] = k;
				}
			}
		}
		best = row;
	}

	// No combination of quotable shares adds up to `parts`.
	if best[parts].is_none() {
		return result;
	}

	let mut remaining = parts;
	for (i, curve) in curves.iter().enumerate().rev() {
		let k = choice[i][remaining];
		remaining -= k;
		if k == 0 {
			continue;
		}
		let Some(quote) = curve.at(k) else {
			continue;
		};
		result.return_amount = result.return_amount.saturating_add(quote.amount_out);
		let index = curve.source.index();
		if let (Some(weight), Some(gas)) = (
			result.distribution.0.get_mut(index),
			result.gas_estimates.get_mut(index),
		) {
			*weight = k as u64;
			*gas = quote.gas;
		}
	}

	result
}

/// Convenience for tests and callers that only need the weights.
pub fn allocate(
	curves: &[SampledCurve],
	parts: u64,
	gas_price: U256,
	len: usize,
) -> Distribution {
	optimize_curves(curves, parts, gas_price, len).distribution
}

#[cfg(test)]
mod tests {
	use super::*;
	use router_sources::SourceQuote;
	use router_types::SourceId;

	fn curve(id: u32, outs: &[u64], gas: u64) -> SampledCurve {
		SampledCurve::from_quotes(
			SourceId(id),
			outs.iter()
				.map(|o| SourceQuote {
					amount_out: U256::from(*o),
					gas: U256::from(gas),
				})
				.collect(),
		)
	}

	#[test]
	fn test_concave_curves_split() {
		// Marginal returns: a = 10, 6, 2; b = 8, 7, 1
		let curves = [curve(0, &[10, 16, 18], 0), curve(1, &[8, 15, 16], 0)];
		let result = optimize_curves(&curves, 3, U256::ZERO, 2);
		assert_eq!(result.distribution, Distribution(vec![1, 2]));
		assert_eq!(result.return_amount, U256::from(25));
	}

	#[test]
	fn test_gas_penalty_favours_single_source() {
		// Splitting yields 20 gross but pays both gas charges.
		let curves = [curve(0, &[11, 19], 1), curve(1, &[9, 15], 1)];
		let cheap = optimize_curves(&curves, 2, U256::ZERO, 2);
		assert_eq!(cheap.distribution, Distribution(vec![1, 1]));

		let costly = optimize_curves(&curves, 2, U256::from(5), 2);
		assert_eq!(costly.distribution, Distribution(vec![2, 0]));
		assert_eq!(costly.return_amount, U256::from(19));
		assert_eq!(costly.gas_estimates, vec![U256::from(1), U256::ZERO]);
	}

	#[test]
	fn test_ties_favour_lower_index() {
		let curves = [curve(0, &[5, 10, 15, 20], 0), curve(2, &[5, 10, 15, 20], 0)];
		let result = optimize_curves(&curves, 4, U256::ZERO, 3);
		assert_eq!(result.distribution, Distribution(vec![4, 0, 0]));
	}

	#[test]
	fn test_penalty_may_exceed_return() {
		// Every option loses money; the least bad one is still chosen.
		let curves = [curve(0, &[1, 2], 100), curve(1, &[1, 2], 50)];
		let result = optimize_curves(&curves, 2, U256::from(1), 2);
		assert_eq!(result.distribution, Distribution(vec![0, 2]));
		assert_eq!(result.return_amount, U256::from(2));
		assert_eq!(result.distribution.parts(), 2);
	}

	#[test]
	fn test_single_part_picks_best_net() {
		let curves = [
			curve(0, &[100], 60_000),
			curve(1, &[130], 100_000),
			curve(2, &[120], 50_000),
		];
		let result = optimize_curves(&curves, 1, U256::from(0), 3);
		assert_eq!(result.distribution, Distribution(vec![0, 1, 0]));

		// Once gas is priced the cheapest source wins despite its lower output.
		let priced = optimize_curves(&curves, 1, U256::from(1), 3);
		assert_eq!(priced.distribution, Distribution(vec![0, 0, 1]));
		assert_eq!(priced.estimate_gas(), U256::from(50_000));
	}

	#[test]
	fn test_no_curves_is_zero() {
		let result = optimize_curves(&[], 10, U256::ZERO, 4);
		assert_eq!(result, QuoteResult::empty(4));
		assert!(allocate(&[curve(0, &[1], 0)], 0, U256::ZERO, 1).is_zero());
	}

	#[test]
	fn test_missing_samples_are_never_allocated() {
		// Source 1 only quoted one part; at that share it beats source 0.
		let mut partial = curve(1, &[50, 0, 0], 0);
		partial.samples[1] = None;
		partial.samples[2] = None;
		let curves = [curve(0, &[10, 20, 30], 0), partial];
		let result = optimize_curves(&curves, 3, U256::ZERO, 2);
		assert_eq!(result.distribution, Distribution(vec![2, 1]));
		assert_eq!(result.return_amount, U256::from(70));
	}

	#[test]
	fn test_unquotable_source_loses_to_costly_one() {
		// Net of gas the working source is negative, the dead one costs nothing.
		let mut dead = curve(1, &[0, 0], 0);
		dead.samples = vec![None, None];
		let curves = [curve(0, &[2, 4], 100), dead];
		let result = optimize_curves(&curves, 2, U256::from(10), 2);
		assert_eq!(result.distribution, Distribution(vec![2, 0]));
		assert_eq!(result.return_amount, U256::from(4));

		let result = optimize_curves(&curves[1..], 2, U256::from(10), 2);
		assert_eq!(result, QuoteResult::empty(2));
	}
}
