//! Value movement between accounts.
//!
//! The coordinator never touches balances directly: every movement of an
//! asset goes through [`SettlementInterface::transfer`], which hands back a
//! [`TransferReceipt`] that can later be undone with
//! [`SettlementInterface::reverse`].

use async_trait::async_trait;
use router_types::{AccountId, Asset, ConfigSchema, U256};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Re-export implementations
pub mod implementations {
	pub mod memory;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SettlementError {
	/// The payer cannot cover the transfer.
	#[error("Account {account} holds {available} of {asset}, needs {needed}")]
	InsufficientBalance {
		account: AccountId,
		asset: Asset,
		needed: U256,
		available: U256,
	},
	/// The receipt is not open, so it cannot be reversed or settled.
	#[error("Unknown, reversed or settled transfer {0}")]
	UnknownReceipt(String),
	/// The backend configuration failed validation.
	#[error("Invalid settlement configuration: {0}")]
	InvalidConfig(String),
	/// Any other backend failure.
	#[error("Settlement backend error: {0}")]
	Backend(String),
}

/// Proof of one completed transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
	pub id: String,
	pub asset: Asset,
	pub from: AccountId,
	pub to: AccountId,
	pub amount: U256,
}

/// Ledger the coordinator moves value through.
#[async_trait]
pub trait SettlementInterface: Send + Sync {
	/// Returns the configuration schema for this implementation.
	fn config_schema(&self) -> Box<dyn ConfigSchema>;

	/// Moves `amount` of `asset` from one account to another.
	async fn transfer(
		&self,
		asset: Asset,
		from: &AccountId,
		to: &AccountId,
		amount: U256,
	) -> Result<TransferReceipt, SettlementError>;

	/// Undoes a transfer. Each receipt can be reversed once.
	async fn reverse(&self, receipt: &TransferReceipt) -> Result<(), SettlementError>;

	/// Finalizes a transfer. A settled receipt can no longer be reversed.
	async fn settle(&self, receipt: &TransferReceipt) -> Result<(), SettlementError>;

	/// Current holding of `asset` by `account`; zero for unknown accounts.
	async fn balance(&self, asset: Asset, account: &AccountId) -> Result<U256, SettlementError>;
}
