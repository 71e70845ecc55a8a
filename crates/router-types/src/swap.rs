//! Swap execution inputs and outcomes.

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::Asset;

/// Basis points in 100%.
pub const BIPS_DENOMINATOR: u32 = 10_000;

/// Largest referral fee accepted, in basis points.
pub const MAX_REFERRAL_FEE_BIPS: u32 = BIPS_DENOMINATOR;

/// Ledger account identifier (user, router escrow, or a source's account).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl AccountId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for AccountId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl From<&str> for AccountId {
	fn from(id: &str) -> Self {
		Self(id.to_string())
	}
}

/// Computes `amount * numerator / denominator` without overflowing the
/// intermediate product, as long as `numerator <= denominator`.
pub fn mul_div_floor(amount: U256, numerator: u64, denominator: u64) -> U256 {
	let num = U256::from(numerator);
	let den = U256::from(denominator);
	let whole = amount / den;
	let rem = amount % den;
	whole * num + rem * num / den
}

/// Referral fee taken from the gross output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Referral {
	pub recipient: AccountId,
	pub fee_bips: u32,
}

impl Referral {
	pub fn new(recipient: impl Into<String>, fee_bips: u32) -> Self {
		Self {
			recipient: AccountId::new(recipient),
			fee_bips,
		}
	}

	/// No referral: empty recipient, zero fee.
	pub fn none() -> Self {
		Self::new("", 0)
	}

	/// Whether the fee is at most 100%.
	pub fn is_valid(&self) -> bool {
		self.fee_bips <= MAX_REFERRAL_FEE_BIPS
	}

	/// Fee owed on `gross`, truncated toward zero.
	pub fn fee_on(&self, gross: U256) -> U256 {
		mul_div_floor(gross, self.fee_bips as u64, BIPS_DENOMINATOR as u64)
	}
}

/// Everything the caller supplies to execute one swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapInput {
	pub from: Asset,
	pub dest: Asset,
	pub amount: U256,
	/// Slippage guard on the post-fee return.
	pub min_return: U256,
	pub referral: Referral,
	/// Account the input is pulled from.
	pub payer: AccountId,
	/// Account the post-fee return is delivered to.
	pub recipient: AccountId,
}

/// Result of a completed swap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
	pub execution_id: String,
	/// Sum of all source outputs.
	pub gross_return: U256,
	pub referral_fee: U256,
	/// What the recipient received.
	pub actual_return: U256,
}
