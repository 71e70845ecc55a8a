//! All-or-nothing execution of a distribution.
//!
//! A swap is a saga over the settlement ledger and the selected sources:
//!
//! 1. pull the input from the payer into escrow;
//! 2. for each weighted source in id order, fund its account, execute, and
//!    collect the output back into escrow;
//! 3. pay the referral fee;
//! 4. check the post-fee return against `min_return`;
//! 5. deliver the return to the recipient.
//!
//! Every completed step is journaled. Any failure undoes the completed steps
//! in reverse order; if an undo fails the swap is reported as an
//! unrecoverable partial execution and the journal keeps what is left.

use router_optimizer::MAX_PARTS;
use router_settlement::{SettlementInterface, TransferReceipt};
use router_sources::SourceRegistry;
use router_types::{
	mul_div_floor, AccountId, Asset, Distribution, EventBus, ExecutionEvent, ExecutionOutcome,
	RouterEvent, SourceId, SwapInput, SwapQuery, MAX_REFERRAL_FEE_BIPS, U256,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::journal::{ExecutionRecord, ExecutionStatus, Journal, JournalStep};
use crate::RouterError;

/// How a journaled step is closed out.
#[derive(Clone, Copy)]
enum Closing {
	/// Undo it as part of a rollback.
	Compensate,
	/// Make it final after the swap completed.
	Settle,
}

pub struct ExecutionCoordinator {
	registry: Arc<SourceRegistry>,
	settlement: Arc<dyn SettlementInterface>,
	journal: Journal,
	escrow: AccountId,
	events: EventBus,
}

/// Ledger account holding a source's inventory.
pub fn source_account(id: SourceId) -> AccountId {
	AccountId::new(format!("source:{}", id.0))
}

/// Splits `amount` by `distribution`. Each weighted source gets
/// `amount * weight / parts`; the truncation remainder goes to the first
/// weighted source so the shares add up to `amount`.
pub fn split_amount(amount: U256, distribution: &Distribution) -> Vec<(SourceId, U256)> {
	let parts = distribution.parts();
	if parts == 0 {
		return Vec::new();
	}

	let mut shares: Vec<(SourceId, U256)> = distribution
		.selected()
		.map(|(id, weight)| (id, mul_div_floor(amount, weight, parts)))
		.collect();
	let assigned = shares
		.iter()
		.fold(U256::ZERO, |acc, (_, share)| acc + *share);
	if let Some((_, first)) = shares.first_mut() {
		*first += amount - assigned;
	}
	shares
}

impl ExecutionCoordinator {
	pub fn new(
		registry: Arc<SourceRegistry>,
		settlement: Arc<dyn SettlementInterface>,
		journal: Journal,
		escrow: AccountId,
		events: EventBus,
	) -> Self {
		Self {
			registry,
			settlement,
			journal,
			escrow,
			events,
		}
	}

	pub fn journal(&self) -> &Journal {
		&self.journal
	}

	/// Rejects malformed requests before anything is touched.
	fn validate(
		&self,
		input: &SwapInput,
		query: &SwapQuery,
		distribution: &Distribution,
	) -> Result<(), RouterError> {
		if !input.referral.is_valid() {
			return Err(RouterError::ReferralFeeOverflow {
				fee_bips: input.referral.fee_bips,
				max: MAX_REFERRAL_FEE_BIPS,
			});
		}
		if query.dest != input.dest {
			return Err(RouterError::InvalidRequest(format!(
				"query converts into {} but the swap wants {}",
				query.dest, input.dest
			)));
		}
		if distribution.len() != self.registry.len() {
			return Err(RouterError::InvalidDistribution(format!(
				"expected {} weights, got {}",
				self.registry.len(),
				distribution.len()
			)));
		}
		if distribution.is_zero() {
			return Err(RouterError::InvalidDistribution("all weights are zero".into()));
		}
		match distribution.checked_parts() {
			Some(parts) if parts <= MAX_PARTS => {}
			_ => {
				return Err(RouterError::InvalidDistribution(format!(
					"weights must add up to at most {} parts",
					MAX_PARTS
				)))
			}
		}

		for (id, _) in distribution.selected() {
			let source = self.registry.get(id).ok_or_else(|| {
				RouterError::InvalidDistribution(format!("no source registered at {}", id))
			})?;
			if !source.supports_pair(input.from, input.dest) {
				return Err(RouterError::UnsupportedAsset {
					from: input.from,
					dest: input.dest,
				});
			}
			if !query.allows(id) {
				return Err(RouterError::InvalidDistribution(format!(
					"source {} is disabled by the query",
					id
				)));
			}
		}
		Ok(())
	}

	/// Executes `distribution` for `input`, or leaves every balance and
	/// source as it found them.
	pub async fn make_swap(
		&self,
		input: SwapInput,
		query: &SwapQuery,
		distribution: &Distribution,
	) -> Result<ExecutionOutcome, RouterError> {
		self.validate(&input, query, distribution)?;

		let mut record = ExecutionRecord::new(
			Uuid::new_v4().to_string(),
			input.clone(),
			distribution.clone(),
		);
		self.journal.save(&record).await?;
		info!(
			"Execution {}: {} {} -> {} over {:?}",
			record.id, input.amount, input.from, input.dest, distribution.0
		);

		match self.run(&input, distribution, &mut record).await {
			Ok(outcome) => {
				record.status = ExecutionStatus::Completed;
				if let Err(e) = self.journal.save(&record).await {
					warn!("Execution {} completed but journal update failed: {}", record.id, e);
				}
				self.settle(&record).await;
				info!(
					"Execution {} delivered {} (gross {}, referral {})",
					record.id, outcome.actual_return, outcome.gross_return, outcome.referral_fee
				);
				self.events
					.publish(RouterEvent::Execution(ExecutionEvent::SwapExecuted {
						execution_id: record.id.clone(),
						actual_return: outcome.actual_return,
					}));
				Ok(outcome)
			}
			Err(cause) => Err(self.rollback(&mut record, cause).await),
		}
	}

	async fn step(
		&self,
		record: &mut ExecutionRecord,
		step: JournalStep,
	) -> Result<(), RouterError> {
		debug!("Execution {}: {:?}", record.id, step);
		record.steps.push(step);
		self.journal.save(record).await?;
		Ok(())
	}

	async fn transfer(
		&self,
		asset: Asset,
		from: &AccountId,
		to: &AccountId,
		amount: U256,
	) -> Result<TransferReceipt, RouterError> {
		Ok(self.settlement.transfer(asset, from, to, amount).await?)
	}

	async fn run(
		&self,
		input: &SwapInput,
		distribution: &Distribution,
		record: &mut ExecutionRecord,
	) -> Result<ExecutionOutcome, RouterError> {
		if !input.amount.is_zero() {
			let receipt = self
				.transfer(input.from, &input.payer, &self.escrow, input.amount)
				.await?;
			self.step(record, JournalStep::InputPulled { receipt }).await?;
		}

		let mut gross = U256::ZERO;
		for (id, share) in split_amount(input.amount, distribution) {
			if share.is_zero() {
				continue;
			}
			let source = self.registry.get(id).ok_or_else(|| {
				RouterError::InvalidDistribution(format!("no source registered at {}", id))
			})?;
			let account = source_account(id);

			let receipt = self
				.transfer(input.from, &self.escrow, &account, share)
				.await?;
			self.step(record, JournalStep::SourceFunded { source: id, receipt })
				.await?;

			let execution = source
				.execute(input.from, input.dest, share)
				.await
				.map_err(|e| RouterError::SourceFailed {
					id,
					reason: e.to_string(),
				})?;
			let amount_out = execution.amount_out;
			self.step(
				record,
				JournalStep::SourceExecuted {
					source: id,
					execution,
				},
			)
			.await?;

			if !amount_out.is_zero() {
				let receipt = self
					.transfer(input.dest, &account, &self.escrow, amount_out)
					.await?;
				self.step(record, JournalStep::OutputCollected { source: id, receipt })
					.await?;
			}
			gross = gross.saturating_add(amount_out);
		}

		let referral_fee = input.referral.fee_on(gross);
		if !referral_fee.is_zero() {
			let receipt = self
				.transfer(input.dest, &self.escrow, &input.referral.recipient, referral_fee)
				.await?;
			self.step(record, JournalStep::ReferralPaid { receipt }).await?;
		}

		let actual_return = gross - referral_fee;
		if actual_return < input.min_return {
			return Err(RouterError::Slippage {
				expected_min: input.min_return,
				actual: actual_return,
			});
		}

		if !actual_return.is_zero() {
			let receipt = self
				.transfer(input.dest, &self.escrow, &input.recipient, actual_return)
				.await?;
			self.step(record, JournalStep::Delivered { receipt }).await?;
		}

		Ok(ExecutionOutcome {
			execution_id: record.id.clone(),
			gross_return: gross,
			referral_fee,
			actual_return,
		})
	}

	/// Releases the receipts and executions of a completed swap. They are
	/// final once the journal says so; a release failure is only logged.
	async fn settle(&self, record: &ExecutionRecord) {
		for step in &record.steps {
			if let Err(failure) = self.close_step(step, Closing::Settle).await {
				warn!("Execution {}: release failed: {}", record.id, failure);
			}
		}
	}

	async fn close_step(&self, step: &JournalStep, closing: Closing) -> Result<(), String> {
		match step {
			JournalStep::SourceExecuted { source, execution } => {
				let adapter = self
					.registry
					.get(*source)
					.ok_or_else(|| format!("source {} is no longer registered", source))?;
				let result = match closing {
					Closing::Compensate => adapter.compensate(execution).await,
					Closing::Settle => adapter.settle(execution).await,
				};
				result.map_err(|e| format!("source {}: {}", source, e))
			}
			JournalStep::InputPulled { receipt }
			| JournalStep::SourceFunded { receipt, .. }
			| JournalStep::OutputCollected { receipt, .. }
			| JournalStep::ReferralPaid { receipt }
			| JournalStep::Delivered { receipt } => {
				let result = match closing {
					Closing::Compensate => self.settlement.reverse(receipt).await,
					Closing::Settle => self.settlement.settle(receipt).await,
				};
				result.map_err(|e| format!("transfer {}: {}", receipt.id, e))
			}
		}
	}

	/// Undoes every journaled step, newest first, and returns the error the
	/// caller should see.
	async fn rollback(&self, record: &mut ExecutionRecord, cause: RouterError) -> RouterError {
		warn!("Execution {} failed, rolling back: {}", record.id, cause);

		let mut failures = Vec::new();
		for step in record.steps.iter().rev() {
			if let Err(failure) = self.close_step(step, Closing::Compensate).await {
				error!("Execution {}: compensation failed: {}", record.id, failure);
				failures.push(failure);
			}
		}

		record.failure = Some(cause.to_string());
		record.failed_compensations = failures.clone();
		record.status = if failures.is_empty() {
			ExecutionStatus::RolledBack
		} else {
			ExecutionStatus::RollbackFailed
		};
		if let Err(e) = self.journal.save(record).await {
			error!("Execution {}: journal update failed: {}", record.id, e);
		}

		if failures.is_empty() {
			info!("Execution {} rolled back", record.id);
			self.events
				.publish(RouterEvent::Execution(ExecutionEvent::SwapRolledBack {
					execution_id: record.id.clone(),
					reason: cause.to_string(),
				}));
			return cause;
		}

		error!(
			"Execution {} is partially applied; {} compensation(s) failed",
			record.id,
			failures.len()
		);
		self.events
			.publish(RouterEvent::Execution(ExecutionEvent::RollbackFailed {
				execution_id: record.id.clone(),
				reason: failures.join("; "),
			}));
		RouterError::UnrecoverablePartialExecution {
			execution_id: record.id.clone(),
			cause: cause.to_string(),
			failed_compensations: failures,
		}
	}
}
