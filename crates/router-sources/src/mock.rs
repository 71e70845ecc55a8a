//! Instrumented in-memory sources for tests.
//!
//! Each mock counts its calls so tests can assert that a code path did or
//! did not reach the adapters, and can be told to fail or stall on demand.

use async_trait::async_trait;
use dashmap::DashMap;
use router_types::{Address, Asset, ConfigSchema, Schema, SourceKind, U256, ValidationError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use crate::{SourceError, SourceExecution, SourceInfo, SourceInterface, SourceQuote};

/// Deterministic test asset whose address is `byte` repeated.
pub fn asset(byte: u8) -> Asset {
	Asset(Address::repeat_byte(byte))
}

/// Output curve of a mock source.
#[derive(Debug, Clone)]
pub enum Curve {
	/// `amount * rate`.
	Linear { rate: U256 },
	/// `min(amount * rate, cap)`: linear until liquidity runs out.
	Capped { rate: U256, cap: U256 },
	/// `reserve_out * amount / (reserve_in + amount)`.
	Product { reserve_in: U256, reserve_out: U256 },
}

impl Curve {
	pub fn output(&self, amount: U256) -> U256 {
		match self {
			Curve::Linear { rate } => amount.saturating_mul(*rate),
			Curve::Capped { rate, cap } => amount.saturating_mul(*rate).min(*cap),
			Curve::Product {
				reserve_in,
				reserve_out,
			} => {
				if amount.is_zero() {
					return U256::ZERO;
				}
				reserve_out.saturating_mul(amount) / reserve_in.saturating_add(amount)
			}
		}
	}
}

pub struct MockSchema;

impl ConfigSchema for MockSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		Schema::new(vec![], vec![]).validate(config)
	}
}

pub struct MockSource {
	info: SourceInfo,
	from: Asset,
	dest: Asset,
	curve: Curve,
	gas: U256,
	delay: Option<Duration>,
	fail_quote: AtomicBool,
	fail_execute: AtomicBool,
	fail_compensate: AtomicBool,
	quote_calls: AtomicUsize,
	execute_calls: AtomicUsize,
	compensate_calls: AtomicUsize,
	live: DashMap<String, SourceExecution>,
}

impl MockSource {
	pub fn new(name: &str, from: Asset, dest: Asset, curve: Curve, gas: u64) -> Self {
		Self {
			info: SourceInfo {
				name: name.to_string(),
				kind: SourceKind::Tabulated,
			},
			from,
			dest,
			curve,
			gas: U256::from(gas),
			delay: None,
			fail_quote: AtomicBool::new(false),
			fail_execute: AtomicBool::new(false),
			fail_compensate: AtomicBool::new(false),
			quote_calls: AtomicUsize::new(0),
			execute_calls: AtomicUsize::new(0),
			compensate_calls: AtomicUsize::new(0),
			live: DashMap::new(),
		}
	}

	pub fn linear(name: &str, from: Asset, dest: Asset, rate: u64, gas: u64) -> Self {
		Self::new(
			name,
			from,
			dest,
			Curve::Linear {
				rate: U256::from(rate),
			},
			gas,
		)
	}

	pub fn capped(name: &str, from: Asset, dest: Asset, rate: u64, cap: u64, gas: u64) -> Self {
		Self::new(
			name,
			from,
			dest,
			Curve::Capped {
				rate: U256::from(rate),
				cap: U256::from(cap),
			},
			gas,
		)
	}

	pub fn product(
		name: &str,
		from: Asset,
		dest: Asset,
		reserve_in: u64,
		reserve_out: u64,
		gas: u64,
	) -> Self {
		Self::new(
			name,
			from,
			dest,
			Curve::Product {
				reserve_in: U256::from(reserve_in),
				reserve_out: U256::from(reserve_out),
			},
			gas,
		)
		.with_kind(SourceKind::ConstantProduct)
	}

	pub fn with_kind(mut self, kind: SourceKind) -> Self {
		self.info.kind = kind;
		self
	}

	pub fn with_delay(mut self, delay: Duration) -> Self {
		self.delay = Some(delay);
		self
	}

	pub fn failing_quotes(self) -> Self {
		self.fail_quote.store(true, Ordering::SeqCst);
		self
	}

	pub fn failing_execute(self) -> Self {
		self.fail_execute.store(true, Ordering::SeqCst);
		self
	}

	pub fn failing_compensate(self) -> Self {
		self.fail_compensate.store(true, Ordering::SeqCst);
		self
	}

	pub fn set_fail_execute(&self, fail: bool) {
		self.fail_execute.store(fail, Ordering::SeqCst);
	}

	pub fn quote_calls(&self) -> usize {
		self.quote_calls.load(Ordering::SeqCst)
	}

	pub fn execute_calls(&self) -> usize {
		self.execute_calls.load(Ordering::SeqCst)
	}

	pub fn compensate_calls(&self) -> usize {
		self.compensate_calls.load(Ordering::SeqCst)
	}

	/// Executions that have been neither compensated nor settled.
	pub fn live_executions(&self) -> usize {
		self.live.len()
	}
}

#[async_trait]
impl SourceInterface for MockSource {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(MockSchema)
	}

	fn info(&self) -> &SourceInfo {
		&self.info
	}

	fn supports_pair(&self, from: Asset, dest: Asset) -> bool {
		from == self.from && dest == self.dest
	}

	async fn quote(
		&self,
		from: Asset,
		dest: Asset,
		amount_in: U256,
	) -> Result<SourceQuote, SourceError> {
		self.quote_calls.fetch_add(1, Ordering::SeqCst);
		if let Some(delay) = self.delay {
			tokio::time::sleep(delay).await;
		}
		if self.fail_quote.load(Ordering::SeqCst) {
			return Err(SourceError::QuoteFailed(format!("{} is down", self.info.name)));
		}
		if !self.supports_pair(from, dest) {
			return Err(SourceError::UnsupportedPair { from, dest });
		}
		Ok(SourceQuote {
			amount_out: self.curve.output(amount_in),
			gas: self.gas,
		})
	}

	async fn execute(
		&self,
		from: Asset,
		dest: Asset,
		amount_in: U256,
	) -> Result<SourceExecution, SourceError> {
		let n = self.execute_calls.fetch_add(1, Ordering::SeqCst);
		if self.fail_execute.load(Ordering::SeqCst) {
			return Err(SourceError::ExecutionFailed(format!(
				"{} rejected the trade",
				self.info.name
			)));
		}
		if !self.supports_pair(from, dest) {
			return Err(SourceError::UnsupportedPair { from, dest });
		}
		let execution = SourceExecution {
			from,
			dest,
			amount_in,
			amount_out: self.curve.output(amount_in),
			reference: format!("{}-{}", self.info.name, n),
		};
		self.live
			.insert(execution.reference.clone(), execution.clone());
		Ok(execution)
	}

	async fn compensate(&self, execution: &SourceExecution) -> Result<(), SourceError> {
		self.compensate_calls.fetch_add(1, Ordering::SeqCst);
		if self.fail_compensate.load(Ordering::SeqCst) {
			return Err(SourceError::CompensationFailed(format!(
				"{} cannot undo {}",
				self.info.name, execution.reference
			)));
		}
		self.live
			.remove(&execution.reference)
			.map(|_| ())
			.ok_or_else(|| {
				SourceError::CompensationFailed(format!(
					"unknown execution {}",
					execution.reference
				))
			})
	}

	async fn settle(&self, execution: &SourceExecution) -> Result<(), SourceError> {
		self.live
			.remove(&execution.reference)
			.map(|_| ())
			.ok_or_else(|| SourceError::UnknownExecution(execution.reference.clone()))
	}
}
