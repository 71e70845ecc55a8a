//! Asset identifiers.
//!
//! Core arithmetic works on raw integer units, so an asset is nothing more
//! than its on-chain address. Decimals and symbols only matter for display
//! and live in [`AssetInfo`].

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Opaque identifier of a fungible asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Asset(pub Address);

impl Asset {
	/// Sentinel for the chain's native asset (`0xEeee...EEeE`).
	pub const NATIVE: Asset = Asset(Address::repeat_byte(0xee));

	pub const fn new(address: Address) -> Self {
		Self(address)
	}

	pub fn is_native(&self) -> bool {
		*self == Self::NATIVE
	}

	pub fn address(&self) -> Address {
		self.0
	}
}

impl fmt::Display for Asset {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

impl FromStr for Asset {
	type Err = alloy_primitives::hex::FromHexError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Address::from_str(s).map(Asset)
	}
}

impl From<Address> for Asset {
	fn from(address: Address) -> Self {
		Asset(address)
	}
}

/// Display metadata for an asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetInfo {
	pub symbol: String,
	pub address: Asset,
	pub decimals: u8,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_native_sentinel() {
		let parsed: Asset = "0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE".parse().unwrap();
		assert!(parsed.is_native());
		assert_eq!(parsed, Asset::NATIVE);

		let dai: Asset = "0x6B175474E89094C44Da98b954EedeAC495271d0F".parse().unwrap();
		assert!(!dai.is_native());
	}

	#[test]
	fn test_serde_is_plain_address() {
		let json = serde_json::to_string(&Asset::NATIVE).unwrap();
		assert_eq!(json.to_lowercase(), "\"0xeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee\"");
		let back: Asset = serde_json::from_str(&json).unwrap();
		assert_eq!(back, Asset::NATIVE);
	}
}
