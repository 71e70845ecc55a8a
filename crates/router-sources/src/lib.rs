//! Liquidity source adapters for the split router.
//!
//! A source is any venue that can price and perform a conversion between two
//! assets: constant-product pools, stable-swap pools, order books, other
//! aggregators. The router treats them uniformly through
//! [`SourceInterface`] and only ever reaches them through the
//! [`SourceRegistry`].

use async_trait::async_trait;
use router_types::{Asset, ConfigSchema, SourceKind, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod registry;

pub use registry::{RegistryError, SourceRegistry};

/// Re-export implementations
pub mod implementations {
	pub mod tabulated;
}

#[cfg(any(test, feature = "testing"))]
pub mod mock;

/// Errors raised by an individual source.
#[derive(Debug, Error)]
pub enum SourceError {
	/// The source could not price the requested amount.
	#[error("Quote failed: {0}")]
	QuoteFailed(String),
	/// The source refused or failed to perform the conversion.
	#[error("Execution failed: {0}")]
	ExecutionFailed(String),
	/// Reversing a completed execution failed.
	#[error("Compensation failed: {0}")]
	CompensationFailed(String),
	/// The execution is not held by this source.
	#[error("Unknown execution {0}")]
	UnknownExecution(String),
	/// The source has no liquidity for the direction.
	#[error("Pair {from} -> {dest} not supported")]
	UnsupportedPair { from: Asset, dest: Asset },
	/// The source configuration failed validation.
	#[error("Invalid source configuration: {0}")]
	InvalidConfig(String),
}

/// Static description of a source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceInfo {
	pub name: String,
	pub kind: SourceKind,
}

/// Price and gas of converting one amount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceQuote {
	pub amount_out: U256,
	pub gas: U256,
}

/// Receipt of a completed conversion, kept so it can be compensated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceExecution {
	pub from: Asset,
	pub dest: Asset,
	pub amount_in: U256,
	pub amount_out: U256,
	/// Source-specific handle identifying this execution.
	pub reference: String,
}

/// Capability every liquidity source exposes.
#[async_trait]
pub trait SourceInterface: Send + Sync {
	/// Returns the configuration schema for this source implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Name and protocol family.
	fn info(&self) -> &SourceInfo;

	/// Whether the source has liquidity for `from -> dest` at all.
	fn supports_pair(&self, from: Asset, dest: Asset) -> bool;

	/// Prices `amount_in` without side effects.
	async fn quote(&self, from: Asset, dest: Asset, amount_in: U256)
		-> Result<SourceQuote, SourceError>;

	/// Performs the conversion.
	async fn execute(
		&self,
		from: Asset,
		dest: Asset,
		amount_in: U256,
	) -> Result<SourceExecution, SourceError>;

	/// Reverses a prior [`execute`](SourceInterface::execute).
	async fn compensate(&self, execution: &SourceExecution) -> Result<(), SourceError>;

	/// Releases a completed execution. It can no longer be compensated.
	async fn settle(&self, execution: &SourceExecution) -> Result<(), SourceError>;
}
