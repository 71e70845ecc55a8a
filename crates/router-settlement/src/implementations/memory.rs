//! In-memory ledger.

use async_trait::async_trait;
use dashmap::DashMap;
use router_types::{
	parse_amount, AccountId, Asset, ConfigSchema, Field, FieldType, Schema, ValidationError, U256,
};
use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::{SettlementError, SettlementInterface, TransferReceipt};

/// Balances keyed by `(account, asset)`. Transfers fail rather than overdraw.
#[derive(Default)]
pub struct MemoryLedger {
	balances: DashMap<(AccountId, Asset), U256>,
	open: DashMap<String, TransferReceipt>,
	sequence: AtomicU64,
}

impl MemoryLedger {
	/// Creates an empty ledger.
	pub fn new() -> Self {
		Self::default()
	}

	/// Credits an account out of thin air; used to seed balances.
	pub fn deposit(&self, account: &AccountId, asset: Asset, amount: U256) {
		let mut balance = self.balances.entry((account.clone(), asset)).or_default();
		*balance = balance.saturating_add(amount);
	}

	/// Transfers that can still be reversed.
	pub fn open_receipts(&self) -> usize {
		self.open.len()
	}

	/// Every non-zero balance.
	pub fn snapshot(&self) -> BTreeMap<(AccountId, Asset), U256> {
		self.balances
			.iter()
			.filter(|entry| !entry.value().is_zero())
			.map(|entry| (entry.key().clone(), *entry.value()))
			.collect()
	}

	fn debit(
		&self,
		account: &AccountId,
		asset: Asset,
		amount: U256,
	) -> Result<(), SettlementError> {
		let key = (account.clone(), asset);
		let insufficient = |available: U256| SettlementError::InsufficientBalance {
			account: account.clone(),
			asset,
			needed: amount,
			available,
		};
		match self.balances.get_mut(&key) {
			Some(mut balance) => {
				if *balance < amount {
					return Err(insufficient(*balance));
				}
				*balance -= amount;
				Ok(())
			}
			None if amount.is_zero() => Ok(()),
			None => Err(insufficient(U256::ZERO)),
		}
	}

	fn move_funds(
		&self,
		asset: Asset,
		from: &AccountId,
		to: &AccountId,
		amount: U256,
	) -> Result<(), SettlementError> {
		// The debit guard is dropped before crediting; holding two shard
		// locks at once can deadlock.
		self.debit(from, asset, amount)?;
		self.deposit(to, asset, amount);
		Ok(())
	}
}

pub struct MemoryLedgerSchema;

impl ConfigSchema for MemoryLedgerSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![Field::new("balances", FieldType::Table(Schema::new(vec![], vec![])))
				.with_validator(|value| read_balances(value).map(|_| ()))],
		);
		schema.validate(config)
	}
}

/// Parses `{ account = { asset = amount, ... }, ... }`.
fn read_balances(value: &toml::Value) -> Result<Vec<(AccountId, Asset, U256)>, String> {
	let accounts = value
		.as_table()
		.ok_or_else(|| "balances must be a table".to_string())?;

	let mut out = Vec::new();
	for (account, holdings) in accounts {
		let holdings = holdings
			.as_table()
			.ok_or_else(|| format!("balances of '{}' must be a table", account))?;
		for (asset, amount) in holdings {
			let asset = Asset::from_str(asset)
				.map_err(|e| format!("'{}' of '{}': {}", asset, account, e))?;
			let amount = parse_amount(amount).map_err(|e| format!("'{}': {}", account, e))?;
			out.push((AccountId::new(account.as_str()), asset, amount));
		}
	}
	Ok(out)
}

#[async_trait]
impl SettlementInterface for MemoryLedger {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MemoryLedgerSchema)
	}

	async fn transfer(
		&self,
		asset: Asset,
		from: &AccountId,
		to: &AccountId,
		amount: U256,
	) -> Result<TransferReceipt, SettlementError> {
		self.move_funds(asset, from, to, amount)?;

		let receipt = TransferReceipt {
			id: format!("tx-{}", self.sequence.fetch_add(1, Ordering::SeqCst)),
			asset,
			from: from.clone(),
			to: to.clone(),
			amount,
		};
		debug!("{}: {} {} {} -> {}", receipt.id, amount, asset, from, to);
		self.open.insert(receipt.id.clone(), receipt.clone());
		Ok(receipt)
	}

	async fn reverse(&self, receipt: &TransferReceipt) -> Result<(), SettlementError> {
		let (_, original) = self
			.open
			.remove(&receipt.id)
			.ok_or_else(|| SettlementError::UnknownReceipt(receipt.id.clone()))?;

		if let Err(e) =
			self.move_funds(original.asset, &original.to, &original.from, original.amount)
		{
			// Still reversible once the funds come back.
			self.open.insert(original.id.clone(), original);
			return Err(e);
		}
		debug!("Reversed {}", receipt.id);
		Ok(())
	}

	async fn settle(&self, receipt: &TransferReceipt) -> Result<(), SettlementError> {
		self.open
			.remove(&receipt.id)
			.map(|_| ())
			.ok_or_else(|| SettlementError::UnknownReceipt(receipt.id.clone()))
	}

	async fn balance(&self, asset: Asset, account: &AccountId) -> Result<U256, SettlementError> {
		Ok(self
			.balances
			.get(&(account.clone(), asset))
			.map(|b| *b)
			.unwrap_or_default())
	}
}

/// Factory function to create an in-memory ledger from configuration.
///
/// Configuration parameters:
/// - `balances`: optional opening balances, `{ account = { asset = amount } }`
pub fn create_settlement(
	config: &toml::Value,
) -> Result<Box<dyn SettlementInterface>, SettlementError> {
	MemoryLedgerSchema
		.validate(config)
		.map_err(|e| SettlementError::InvalidConfig(e.to_string()))?;

	let ledger = MemoryLedger::new();
	if let Some(balances) = config.get("balances") {
		for (account, asset, amount) in
			read_balances(balances).map_err(SettlementError::InvalidConfig)?
		{
			ledger.deposit(&account, asset, amount);
		}
	}
	Ok(Box::new(ledger))
}

#[cfg(test)]
mod tests {
	use super::*;
	use router_types::Address;

	fn eth() -> Asset {
		Asset::NATIVE
	}

	fn dai() -> Asset {
		Asset(Address::repeat_byte(0xda))
	}

	fn alice() -> AccountId {
		AccountId::new("alice")
	}

	fn bob() -> AccountId {
		AccountId::new("bob")
	}

	#[tokio::test]
	async fn test_transfer_and_reverse() {
		let ledger = MemoryLedger::new();
		ledger.deposit(&alice(), eth(), U256::from(100));
		let before = ledger.snapshot();

		let receipt = ledger
			.transfer(eth(), &alice(), &bob(), U256::from(30))
			.await
			.unwrap();
		assert_eq!(ledger.balance(eth(), &alice()).await.unwrap(), U256::from(70));
		assert_eq!(ledger.balance(eth(), &bob()).await.unwrap(), U256::from(30));

		ledger.reverse(&receipt).await.unwrap();
		assert_eq!(ledger.snapshot(), before);
		assert_eq!(
			ledger.reverse(&receipt).await,
			Err(SettlementError::UnknownReceipt(receipt.id.clone()))
		);
	}

	#[tokio::test]
	async fn test_settled_transfer_is_final() {
		let ledger = MemoryLedger::new();
		ledger.deposit(&alice(), eth(), U256::from(100));
		let receipt = ledger
			.transfer(eth(), &alice(), &bob(), U256::from(30))
			.await
			.unwrap();
		assert_eq!(ledger.open_receipts(), 1);

		ledger.settle(&receipt).await.unwrap();
		assert_eq!(ledger.open_receipts(), 0);
		assert_eq!(
			ledger.reverse(&receipt).await,
			Err(SettlementError::UnknownReceipt(receipt.id.clone()))
		);
		assert_eq!(ledger.balance(eth(), &bob()).await.unwrap(), U256::from(30));
	}

	#[tokio::test]
	async fn test_overdraw_rejected() {
		let ledger = MemoryLedger::new();
		ledger.deposit(&alice(), eth(), U256::from(5));
		let err = ledger
			.transfer(eth(), &alice(), &bob(), U256::from(6))
			.await
			.unwrap_err();
		assert!(matches!(
			err,
			SettlementError::InsufficientBalance { available, .. } if available == U256::from(5)
		));
		assert!(ledger
			.transfer(dai(), &bob(), &alice(), U256::from(1))
			.await
			.is_err());
		// Zero transfers from empty accounts are fine.
		assert!(ledger
			.transfer(dai(), &bob(), &alice(), U256::ZERO)
			.await
			.is_ok());
	}

	#[tokio::test]
	async fn test_reverse_waits_for_funds() {
		let ledger = MemoryLedger::new();
		ledger.deposit(&alice(), eth(), U256::from(10));
		let receipt = ledger
			.transfer(eth(), &alice(), &bob(), U256::from(10))
			.await
			.unwrap();
		ledger
			.transfer(eth(), &bob(), &AccountId::new("carol"), U256::from(10))
			.await
			.unwrap();

		assert!(ledger.reverse(&receipt).await.is_err());
		ledger.deposit(&bob(), eth(), U256::from(10));
		assert!(ledger.reverse(&receipt).await.is_ok());
	}

	#[tokio::test]
	async fn test_factory_seeds_balances() {
		let config: toml::Value = toml::from_str(&format!(
			r#"
[balances.alice]
"{}" = "1000000000000000000"
"{}" = 42
"#,
			eth(),
			dai()
		))
		.unwrap();
		let ledger = create_settlement(&config).unwrap();
		assert_eq!(
			ledger.balance(eth(), &alice()).await.unwrap(),
			U256::from(10u64).pow(U256::from(18))
		);
		assert_eq!(ledger.balance(dai(), &alice()).await.unwrap(), U256::from(42));

		let bad: toml::Value = toml::from_str("[balances.alice]\nnot-an-asset = 1").unwrap();
		assert!(create_settlement(&bad).is_err());
	}
}
