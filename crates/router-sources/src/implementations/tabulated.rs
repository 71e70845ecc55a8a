//! Source whose price curve is a configured table of points.
//!
//! Each supported direction carries a list of `(amount_in, amount_out)`
//! points. Amounts between points are interpolated linearly from an implicit
//! `(0, 0)` origin; amounts past the last point return the last output, as if
//! the venue's liquidity were exhausted. Used to replay recorded curves and to
//! run the router without live venues.

use async_trait::async_trait;
use dashmap::DashMap;
use router_types::{
	parse_amount, Asset, ConfigSchema, Field, FieldType, Schema, SourceKind, ValidationError, U256,
};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::{SourceError, SourceExecution, SourceInfo, SourceInterface, SourceQuote};

/// Piecewise-linear curve for one direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceTable {
	points: Vec<(U256, U256)>,
}

impl PriceTable {
	/// Points must be strictly increasing in input and non-decreasing in output.
	pub fn new(points: Vec<(U256, U256)>) -> Result<Self, SourceError> {
		if points.is_empty() {
			return Err(SourceError::InvalidConfig("price table has no points".into()));
		}
		let mut prev = (U256::ZERO, U256::ZERO);
		for (i, &(amount_in, amount_out)) in points.iter().enumerate() {
			if amount_in <= prev.0 {
				return Err(SourceError::InvalidConfig(format!(
					"point {} input {} is not above {}",
					i, amount_in, prev.0
				)));
			}
			if amount_out < prev.1 {
				return Err(SourceError::InvalidConfig(format!(
					"point {} output {} decreases from {}",
					i, amount_out, prev.1
				)));
			}
			prev = (amount_in, amount_out);
		}
		Ok(Self { points })
	}

	pub fn output(&self, amount: U256) -> U256 {
		let mut lower = (U256::ZERO, U256::ZERO);
		for &(x, y) in &self.points {
			if amount == x {
				return y;
			}
			if amount < x {
				let span_in = x - lower.0;
				let span_out = y - lower.1;
				let offset = amount - lower.0;
				return lower.1 + span_out.saturating_mul(offset) / span_in;
			}
			lower = (x, y);
		}
		lower.1
	}
}

pub struct TabulatedSource {
	info: SourceInfo,
	gas: U256,
	tables: Vec<((Asset, Asset), PriceTable)>,
	executed: DashMap<(Asset, Asset), U256>,
	live: DashMap<String, SourceExecution>,
	sequence: AtomicU64,
}

impl TabulatedSource {
	pub fn new(name: impl Into<String>, kind: SourceKind, gas: U256) -> Self {
		Self {
			info: SourceInfo {
				name: name.into(),
				kind,
			},
			gas,
			tables: Vec::new(),
			executed: DashMap::new(),
			live: DashMap::new(),
			sequence: AtomicU64::new(0),
		}
	}

	/// Adds the curve for `from -> dest`, replacing any previous one.
	pub fn with_table(mut self, from: Asset, dest: Asset, table: PriceTable) -> Self {
		self.tables.retain(|(pair, _)| *pair != (from, dest));
		self.tables.push(((from, dest), table));
		self
	}

	fn table(&self, from: Asset, dest: Asset) -> Option<&PriceTable> {
		self.tables
			.iter()
			.find(|(pair, _)| *pair == (from, dest))
			.map(|(_, table)| table)
	}

	/// Net input volume executed and not compensated for a direction.
	pub fn executed_volume(&self, from: Asset, dest: Asset) -> U256 {
		self.executed
			.get(&(from, dest))
			.map(|v| *v)
			.unwrap_or_default()
	}

	/// Executions that can still be compensated.
	pub fn live_executions(&self) -> usize {
		self.live.len()
	}
}

/// Configuration schema for TabulatedSource.
pub struct TabulatedSchema;

impl ConfigSchema for TabulatedSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let pair = Schema::new(
			vec![
				Field::new("from", FieldType::Address),
				Field::new("dest", FieldType::Address),
				Field::new(
					"points",
					FieldType::Array(Box::new(FieldType::Array(Box::new(FieldType::Amount)))),
				)
				.with_validator(|value| {
					let points = value.as_array().map(Vec::as_slice).unwrap_or_default();
					if points.is_empty() {
						return Err("at least one point is required".to_string());
					}
					match points
						.iter()
						.position(|p| p.as_array().map(Vec::len) != Some(2))
					{
						Some(i) => Err(format!("point {} must be [amount_in, amount_out]", i)),
						None => Ok(()),
					}
				}),
			],
			vec![],
		);

		let schema = Schema::new(
			vec![
				Field::new(
					"gas",
					FieldType::Integer {
						min: Some(0),
						max: None,
					},
				),
				Field::new("pairs", FieldType::Array(Box::new(FieldType::Table(pair)))),
			],
			vec![Field::new("kind", FieldType::String)
				.with_validator(|value| parse_kind(value).map(|_| ()))],
		);

		schema.validate(config)
	}
}

fn parse_kind(value: &toml::Value) -> Result<SourceKind, String> {
	value
		.clone()
		.try_into::<SourceKind>()
		.map_err(|_| format!("unknown source kind {}", value))
}

#[async_trait]
impl SourceInterface for TabulatedSource {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(TabulatedSchema)
	}

	fn info(&self) -> &SourceInfo {
		&self.info
	}

	fn supports_pair(&self, from: Asset, dest: Asset) -> bool {
		self.table(from, dest).is_some()
	}

	async fn quote(
		&self,
		from: Asset,
		dest: Asset,
		amount_in: U256,
	) -> Result<SourceQuote, SourceError> {
		let table = self
			.table(from, dest)
			.ok_or(SourceError::UnsupportedPair { from, dest })?;
		Ok(SourceQuote {
			amount_out: table.output(amount_in),
			gas: self.gas,
		})
	}

	async fn execute(
		&self,
		from: Asset,
		dest: Asset,
		amount_in: U256,
	) -> Result<SourceExecution, SourceError> {
		let table = self
			.table(from, dest)
			.ok_or(SourceError::UnsupportedPair { from, dest })?;
		let amount_out = table.output(amount_in);
		let reference = format!(
			"{}:{}",
			self.info.name,
			self.sequence.fetch_add(1, Ordering::SeqCst)
		);
		*self.executed.entry((from, dest)).or_default() += amount_in;

		let execution = SourceExecution {
			from,
			dest,
			amount_in,
			amount_out,
			reference: reference.clone(),
		};
		self.live.insert(reference, execution.clone());
		debug!(
			"{} executed {} {} -> {} {}",
			self.info.name, amount_in, from, amount_out, dest
		);
		Ok(execution)
	}

	async fn compensate(&self, execution: &SourceExecution) -> Result<(), SourceError> {
		let (_, recorded) = self.live.remove(&execution.reference).ok_or_else(|| {
			SourceError::CompensationFailed(format!(
				"{} has no live execution {}",
				self.info.name, execution.reference
			))
		})?;
		if let Some(mut volume) = self.executed.get_mut(&(recorded.from, recorded.dest)) {
			*volume = volume.saturating_sub(recorded.amount_in);
		}
		debug!("{} compensated {}", self.info.name, execution.reference);
		Ok(())
	}

	async fn settle(&self, execution: &SourceExecution) -> Result<(), SourceError> {
		self.live
			.remove(&execution.reference)
			.ok_or_else(|| SourceError::UnknownExecution(execution.reference.clone()))?;
		Ok(())
	}
}

fn config_error(e: impl std::fmt::Display) -> SourceError {
	SourceError::InvalidConfig(e.to_string())
}

fn read_asset(table: &toml::Value, key: &str) -> Result<Asset, SourceError> {
	let text = table
		.get(key)
		.and_then(|v| v.as_str())
		.ok_or_else(|| config_error(format!("missing '{}'", key)))?;
	Asset::from_str(text).map_err(config_error)
}

/// Factory function to create a tabulated source from configuration.
///
/// Configuration parameters:
/// - `name`: label used in logs (defaults to "tabulated")
/// - `kind`: protocol family label (defaults to "tabulated")
/// - `gas`: fixed gas estimate per quote
/// - `pairs`: list of `{ from, dest, points = [[in, out], ...] }`
pub fn create_source(config: &toml::Value) -> Result<Box<dyn SourceInterface>, SourceError> {
	TabulatedSchema.validate(config).map_err(config_error)?;

	let name = config
		.get("name")
		.and_then(|v| v.as_str())
		.unwrap_or("tabulated");
	let kind = match config.get("kind") {
		Some(value) => parse_kind(value).map_err(config_error)?,
		None => SourceKind::Tabulated,
	};
	let gas = config
		.get("gas")
		.and_then(|v| v.as_integer())
		.map(|g| U256::from(g.max(0) as u64))
		.unwrap_or_default();

	let mut source = TabulatedSource::new(name, kind, gas);
	let pairs = config
		.get("pairs")
		.and_then(|v| v.as_array())
		.cloned()
		.unwrap_or_default();
	for pair in &pairs {
		let from = read_asset(pair, "from")?;
		let dest = read_asset(pair, "dest")?;
		let points = pair
			.get("points")
			.and_then(|v| v.as_array())
			.ok_or_else(|| config_error("missing 'points'"))?
			.iter()
			.map(|point| match point.as_array().map(Vec::as_slice) {
				Some([amount_in, amount_out]) => Ok((
					parse_amount(amount_in).map_err(config_error)?,
					parse_amount(amount_out).map_err(config_error)?,
				)),
				_ => Err(config_error("point must be [amount_in, amount_out]")),
			})
			.collect::<Result<Vec<_>, _>>()?;
		source = source.with_table(from, dest, PriceTable::new(points)?);
	}

	Ok(Box::new(source))
}
