use router_optimizer::OptimizerError;
use router_settlement::SettlementError;
use router_sources::RegistryError;
use router_storage::StorageError;
use router_types::{Asset, SourceId, U256};
use thiserror::Error;

/// Everything a router caller can see go wrong.
///
/// Request-shape errors (`InvalidParts` through `UnsupportedAsset`) are raised
/// before any source or ledger is touched.
#[derive(Debug, Error)]
pub enum RouterError {
	/// Part count of zero or above the configured bound.
	#[error("Invalid parts {0}")]
	InvalidParts(u64),

	/// Inconsistent swap input, such as a query for another asset.
	#[error("Invalid request: {0}")]
	InvalidRequest(String),

	/// Distribution that cannot be executed against this registry.
	#[error("Invalid distribution: {0}")]
	InvalidDistribution(String),

	/// Referral fee above 100%.
	#[error("Referral fee of {fee_bips} bips exceeds the {max} bips limit")]
	ReferralFeeOverflow { fee_bips: u32, max: u32 },

	/// No registered source trades the pair at all.
	#[error("No registered source supports {from} -> {dest}")]
	UnsupportedAsset { from: Asset, dest: Asset },

	/// A source refused or failed to execute its share.
	#[error("Source {id} failed: {reason}")]
	SourceFailed { id: SourceId, reason: String },

	/// Post-fee return fell below the caller's minimum.
	#[error("Return {actual} is below the minimum {expected_min}")]
	Slippage { expected_min: U256, actual: U256 },

	/// Rollback itself failed; the journal record needs manual attention.
	#[error(
		"Execution {execution_id} left partially applied after {cause}; failed compensations: {}",
		.failed_compensations.join("; ")
	)]
	UnrecoverablePartialExecution {
		execution_id: String,
		cause: String,
		failed_compensations: Vec<String>,
	},

	/// Ledger transfer failed.
	#[error("Settlement error: {0}")]
	Settlement(#[from] SettlementError),

	/// Journal persistence failed.
	#[error("Storage error: {0}")]
	Storage(#[from] StorageError),

	/// The engine could not be built from its configuration.
	#[error("Configuration error: {0}")]
	Configuration(String),
}

impl From<RegistryError> for RouterError {
	fn from(e: RegistryError) -> Self {
		match e {
			RegistryError::UnsupportedAsset { from, dest } => {
				RouterError::UnsupportedAsset { from, dest }
			}
			RegistryError::DuplicateSource(id) => {
				RouterError::Configuration(format!("source {} registered twice", id))
			}
			e @ RegistryError::IdOutOfRange(_) => RouterError::Configuration(e.to_string()),
		}
	}
}

impl From<OptimizerError> for RouterError {
	fn from(e: OptimizerError) -> Self {
		match e {
			OptimizerError::InvalidParts(parts) => RouterError::InvalidParts(parts),
			OptimizerError::Registry(e) => e.into(),
		}
	}
}

impl RouterError {
	/// Whether the request itself was at fault, as opposed to a source, the
	/// market or the ledger.
	pub fn is_caller_error(&self) -> bool {
		matches!(
			self,
			RouterError::InvalidParts(_)
				| RouterError::InvalidRequest(_)
				| RouterError::InvalidDistribution(_)
				| RouterError::ReferralFeeOverflow { .. }
				| RouterError::UnsupportedAsset { .. }
		)
	}
}
