//! Quote queries: one hop, and ordered chains of hops.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::{Asset, SourceId, SourceMask};

/// Input for evaluating a single hop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapQuery {
	/// Asset the hop converts into.
	pub dest: Asset,
	/// Source enablement mask.
	#[serde(default)]
	pub flags: SourceMask,
	/// Gas price expressed in units of `dest`; multiplies each source's gas
	/// estimate into a penalty on its return.
	#[serde(default)]
	pub gas_price_in_dest: U256,
	/// Pair-specific exclusions on top of `flags`.
	#[serde(default)]
	pub disabled_sources: BTreeSet<SourceId>,
}

impl SwapQuery {
	/// Query into `dest` with every source enabled and no gas price.
	pub fn new(dest: Asset) -> Self {
		Self {
			dest,
			flags: SourceMask::none(),
			gas_price_in_dest: U256::ZERO,
			disabled_sources: BTreeSet::new(),
		}
	}

	pub fn with_flags(mut self, flags: SourceMask) -> Self {
		self.flags = flags;
		self
	}

	pub fn with_gas_price(mut self, gas_price_in_dest: U256) -> Self {
		self.gas_price_in_dest = gas_price_in_dest;
		self
	}

	/// Adds ids to the explicit disable list.
	pub fn with_disabled<I: IntoIterator<Item = SourceId>>(mut self, ids: I) -> Self {
		self.disabled_sources.extend(ids);
		self
	}

	/// Whether the mask and the disable list both leave `id` enabled. Pair
	/// support is checked separately by the registry.
	pub fn allows(&self, id: SourceId) -> bool {
		!self.flags.is_disabled(id) && !self.disabled_sources.contains(&id)
	}
}

/// Ordered chain of hops. The origin asset is supplied once by the caller;
/// hop `i + 1` consumes what hop `i` produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapPath {
	pub hops: Vec<SwapQuery>,
}

impl SwapPath {
	pub fn new(hops: Vec<SwapQuery>) -> Self {
		Self { hops }
	}

	pub fn single(query: SwapQuery) -> Self {
		Self { hops: vec![query] }
	}

	/// `(from, dest)` for every hop, starting at `origin`.
	pub fn legs(&self, origin: Asset) -> Vec<(Asset, Asset)> {
		let mut from = origin;
		self.hops
			.iter()
			.map(|hop| {
				let leg = (from, hop.dest);
				from = hop.dest;
				leg
			})
			.collect()
	}

	/// Asset produced by the final hop.
	pub fn dest(&self) -> Option<Asset> {
		self.hops.last().map(|hop| hop.dest)
	}
}
