//! Step-by-step record of every swap execution.
//!
//! A record is written before the first side effect and rewritten after each
//! step, so after a crash or a failed rollback the record lists exactly what
//! still has to be undone.

use router_settlement::TransferReceipt;
use router_sources::SourceExecution;
use router_storage::{StorageError, StorageService};
use router_types::{Distribution, SourceId, SwapInput};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub const EXECUTIONS_NAMESPACE: &str = "executions";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
	/// Steps are still being applied.
	InProgress,
	/// Delivered and settled.
	Completed,
	/// Every applied step was undone.
	RolledBack,
	/// Some compensation failed; needs an operator.
	RollbackFailed,
}

/// One completed side effect, with what is needed to undo it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum JournalStep {
	/// Input moved from the payer into escrow.
	InputPulled {
		receipt: TransferReceipt,
	},
	/// A share moved from escrow to the source's account.
	SourceFunded {
		source: SourceId,
		receipt: TransferReceipt,
	},
	/// The source converted its share.
	SourceExecuted {
		source: SourceId,
		execution: SourceExecution,
	},
	/// The source's output moved back into escrow.
	OutputCollected {
		source: SourceId,
		receipt: TransferReceipt,
	},
	/// Referral fee paid out of escrow.
	ReferralPaid {
		receipt: TransferReceipt,
	},
	/// Post-fee return paid to the recipient.
	Delivered {
		receipt: TransferReceipt,
	},
}

/// Journal entry for one swap, rewritten after every step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRecord {
	pub id: String,
	pub input: SwapInput,
	pub distribution: Distribution,
	pub status: ExecutionStatus,
	pub steps: Vec<JournalStep>,
	/// Why the swap was abandoned, when it was.
	#[serde(default)]
	pub failure: Option<String>,
	#[serde(default)]
	pub failed_compensations: Vec<String>,
}

impl ExecutionRecord {
	pub fn new(id: String, input: SwapInput, distribution: Distribution) -> Self {
		Self {
			id,
			input,
			distribution,
			status: ExecutionStatus::InProgress,
			steps: Vec::new(),
			failure: None,
			failed_compensations: Vec::new(),
		}
	}
}

/// Execution records persisted through the storage service.
#[derive(Clone)]
pub struct Journal {
	storage: Arc<StorageService>,
}

impl Journal {
	pub fn new(storage: Arc<StorageService>) -> Self {
		Self { storage }
	}

	pub async fn save(&self, record: &ExecutionRecord) -> Result<(), StorageError> {
		self.storage
			.store(EXECUTIONS_NAMESPACE, &record.id, record)
			.await
	}

	pub async fn load(&self, id: &str) -> Result<ExecutionRecord, StorageError> {
		self.storage.retrieve(EXECUTIONS_NAMESPACE, id).await
	}

	pub async fn ids(&self) -> Result<Vec<String>, StorageError> {
		self.storage.list(EXECUTIONS_NAMESPACE).await
	}

	/// Records left in progress or with a failed rollback.
	pub async fn unresolved(&self) -> Result<Vec<ExecutionRecord>, StorageError> {
		let mut out = Vec::new();
		for id in self.ids().await? {
			let record = self.load(&id).await?;
			if matches!(
				record.status,
				ExecutionStatus::InProgress | ExecutionStatus::RollbackFailed
			) {
				out.push(record);
			}
		}
		Ok(out)
	}
}
