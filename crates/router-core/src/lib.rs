//! Router engine: quoting, execution and the builder that wires them from
//! configuration.

use router_config::Config;
use router_optimizer::DistributionOptimizer;
use router_settlement::{SettlementError, SettlementInterface};
use router_sources::{SourceError, SourceInterface, SourceRegistry};
use router_storage::{StorageError, StorageInterface, StorageService};
use router_types::{
	AccountId, Asset, Distribution, EventBus, ExecutionOutcome, PathReturn, QuoteResult, SourceId,
	SwapInput, SwapPath, SwapQuery, SwapReturn, U256,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

pub mod aggregator;
pub mod coordinator;
pub mod error;
pub mod journal;

pub use aggregator::QuoteAggregator;
pub use coordinator::{source_account, split_amount, ExecutionCoordinator};
pub use error::RouterError;
pub use journal::{ExecutionRecord, ExecutionStatus, Journal, JournalStep};

pub struct RouterEngine {
	config: Config,
	registry: Arc<SourceRegistry>,
	aggregator: QuoteAggregator,
	coordinator: ExecutionCoordinator,
	settlement: Arc<dyn SettlementInterface>,
	event_bus: EventBus,
}

impl RouterEngine {
	pub fn config(&self) -> &Config {
		&self.config
	}

	pub fn event_bus(&self) -> &EventBus {
		&self.event_bus
	}

	pub fn registry(&self) -> &Arc<SourceRegistry> {
		&self.registry
	}

	pub fn settlement(&self) -> &Arc<dyn SettlementInterface> {
		&self.settlement
	}

	pub fn journal(&self) -> &Journal {
		self.coordinator.journal()
	}

	fn parts_or_default(&self, parts: Option<u64>) -> u64 {
		parts.unwrap_or(self.config.router.default_parts)
	}

	/// Best split of one amount for one hop.
	pub async fn get_expected_return(
		&self,
		from: Asset,
		amount: U256,
		query: &SwapQuery,
		parts: Option<u64>,
	) -> Result<QuoteResult, RouterError> {
		let parts = self.parts_or_default(parts);
		Ok(self
			.aggregator
			.optimizer()
			.quote(from, amount, query, parts)
			.await?)
	}

	pub async fn get_swap_return(
		&self,
		from: Asset,
		amounts: &[U256],
		query: &SwapQuery,
		parts: Option<u64>,
	) -> Result<SwapReturn, RouterError> {
		self.aggregator
			.get_swap_return(from, amounts, query, self.parts_or_default(parts))
			.await
	}

	pub async fn get_path_return(
		&self,
		from: Asset,
		amounts: &[U256],
		path: &SwapPath,
		parts: Option<u64>,
	) -> Result<PathReturn, RouterError> {
		self.aggregator
			.get_path_return(from, amounts, path, self.parts_or_default(parts))
			.await
	}

	pub async fn get_multi_path_return(
		&self,
		from: Asset,
		amounts: &[U256],
		paths: &[SwapPath],
		parts: Option<u64>,
	) -> Result<Vec<PathReturn>, RouterError> {
		self.aggregator
			.get_multi_path_return(from, amounts, paths, self.parts_or_default(parts))
			.await
	}

	/// Executes a distribution chosen earlier, possibly by someone else.
	pub async fn make_swap(
		&self,
		input: SwapInput,
		query: &SwapQuery,
		distribution: &Distribution,
	) -> Result<ExecutionOutcome, RouterError> {
		self.coordinator.make_swap(input, query, distribution).await
	}

	/// Quotes `input.amount` and executes the resulting split.
	pub async fn swap(
		&self,
		input: SwapInput,
		query: &SwapQuery,
		parts: Option<u64>,
	) -> Result<ExecutionOutcome, RouterError> {
		let quote = self
			.get_expected_return(input.from, input.amount, query, parts)
			.await?;
		if !input.amount.is_zero() && quote.distribution.is_zero() {
			return Err(RouterError::InvalidRequest(format!(
				"no enabled source can convert {} -> {}",
				input.from, input.dest
			)));
		}
		let distribution = if input.amount.is_zero() {
			first_supported(&self.registry, input.from, query)?
		} else {
			quote.distribution
		};
		self.make_swap(input, query, &distribution).await
	}

	/// Executions an operator still has to look at.
	pub async fn unresolved_executions(&self) -> Result<Vec<ExecutionRecord>, RouterError> {
		Ok(self.journal().unresolved().await?)
	}
}

/// Single-part distribution on the first active source, used for zero
/// amounts where every split is equally good.
fn first_supported(
	registry: &SourceRegistry,
	from: Asset,
	query: &SwapQuery,
) -> Result<Distribution, RouterError> {
	let active = registry.active_for(from, query)?;
	let first = active.first().ok_or_else(|| {
		RouterError::InvalidRequest(format!("no enabled source for {} -> {}", from, query.dest))
	})?;
	let mut weights = vec![0; registry.len()];
	weights[first.index()] = 1;
	Ok(Distribution(weights))
}

// Type aliases for factory functions
type SourceFactory =
	Box<dyn Fn(&toml::Value) -> Result<Box<dyn SourceInterface>, SourceError> + Send>;
type StorageFactory =
	Box<dyn Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> + Send>;
type SettlementFactory =
	Box<dyn Fn(&toml::Value) -> Result<Box<dyn SettlementInterface>, SettlementError> + Send>;

/// Builds a [`RouterEngine`] from configuration and named factories.
pub struct RouterBuilder {
	config: Config,
	source_factories: HashMap<String, SourceFactory>,
	storage_factories: HashMap<String, StorageFactory>,
	settlement_factories: HashMap<String, SettlementFactory>,
	source_instances: HashMap<SourceId, Arc<dyn SourceInterface>>,
	settlement_instance: Option<Arc<dyn SettlementInterface>>,
}

impl RouterBuilder {
	pub fn new(config: Config) -> Self {
		Self {
			config,
			source_factories: HashMap::new(),
			storage_factories: HashMap::new(),
			settlement_factories: HashMap::new(),
			source_instances: HashMap::new(),
			settlement_instance: None,
		}
	}

	pub fn with_source_factory<F>(mut self, name: &str, factory: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<Box<dyn SourceInterface>, SourceError> + Send + 'static,
	{
		self.source_factories
			.insert(name.to_string(), Box::new(factory));
		self
	}

	pub fn with_storage_factory<F>(mut self, name: &str, factory: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> + Send + 'static,
	{
		self.storage_factories
			.insert(name.to_string(), Box::new(factory));
		self
	}

	pub fn with_settlement_factory<F>(mut self, name: &str, factory: F) -> Self
	where
		F: Fn(&toml::Value) -> Result<Box<dyn SettlementInterface>, SettlementError>
			+ Send
			+ 'static,
	{
		self.settlement_factories
			.insert(name.to_string(), Box::new(factory));
		self
	}

	/// Registers a ready-made source at `id`, alongside the configured ones.
	pub fn with_source(mut self, id: SourceId, source: Arc<dyn SourceInterface>) -> Self {
		self.source_instances.insert(id, source);
		self
	}

	/// Uses `settlement` instead of building one from configuration.
	pub fn with_settlement_instance(mut self, settlement: Arc<dyn SettlementInterface>) -> Self {
		self.settlement_instance = Some(settlement);
		self
	}

	fn build_source(
		&self,
		entry: &router_config::SourceConfig,
	) -> Result<Arc<dyn SourceInterface>, RouterError> {
		let factory = self
			.source_factories
			.get(&entry.implementation)
			.ok_or_else(|| {
				RouterError::Configuration(format!(
					"No factory for source implementation '{}'",
					entry.implementation
				))
			})?;

		let mut config = entry.config.clone();
		if let Some(table) = config.as_table_mut() {
			table
				.entry("name")
				.or_insert_with(|| toml::Value::String(entry.name.clone()));
		}

		let source = factory(&config).map_err(|e| {
			RouterError::Configuration(format!("Source '{}': {}", entry.name, e))
		})?;
		source.config_schema().validate(&config).map_err(|e| {
			RouterError::Configuration(format!("Source '{}': {}", entry.name, e))
		})?;
		Ok(Arc::from(source))
	}

	pub fn build(self) -> Result<RouterEngine, RouterError> {
		// Sources
		let mut registry = SourceRegistry::new();
		for entry in &self.config.sources {
			let source = self.build_source(entry)?;
			registry.register(entry.source_id(), source)?;
		}
		for (id, source) in &self.source_instances {
			registry.register(*id, source.clone())?;
		}
		if registry.is_empty() {
			return Err(RouterError::Configuration("No sources configured".into()));
		}
		let registry = Arc::new(registry);

		// Journal storage
		let storage_factory = self
			.storage_factories
			.get(&self.config.storage.backend)
			.ok_or_else(|| {
				RouterError::Configuration(format!(
					"No factory for storage backend '{}'",
					self.config.storage.backend
				))
			})?;
		let storage = Arc::new(StorageService::new(storage_factory(
			&self.config.storage.config,
		)?));

		// Settlement
		let settlement = match &self.settlement_instance {
			Some(settlement) => settlement.clone(),
			None => {
				let factory = self
					.settlement_factories
					.get(&self.config.settlement.implementation)
					.ok_or_else(|| {
						RouterError::Configuration(format!(
							"No factory for settlement implementation '{}'",
							self.config.settlement.implementation
						))
					})?;
				Arc::from(factory(&self.config.settlement.config)?)
			}
		};

		let event_bus = EventBus::new(1000);
		let optimizer = Arc::new(DistributionOptimizer::new(
			registry.clone(),
			self.config.router.quote_timeout(),
		));
		let aggregator = QuoteAggregator::new(optimizer, event_bus.clone());
		let coordinator = ExecutionCoordinator::new(
			registry.clone(),
			settlement.clone(),
			Journal::new(storage),
			AccountId::new(self.config.router.escrow_account.clone()),
			event_bus.clone(),
		);

		info!(
			"Router '{}' built with {} source slot(s)",
			self.config.router.name,
			registry.len()
		);

		Ok(RouterEngine {
			config: self.config,
			registry,
			aggregator,
			coordinator,
			settlement,
			event_bus,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use router_config::ConfigLoader;
	use router_settlement::implementations::memory::{self as ledger, MemoryLedger};
	use router_sources::implementations::tabulated;
	use router_sources::mock::MockSource;
	use router_storage::implementations::memory as storage;
	use router_types::Referral;

	const CONFIG: &str = r#"
[router]
name = "test-router"
default_parts = 4

[settlement.config.balances.alice]
"0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE" = 1000

[settlement.config.balances."source:0"]
"0x6B175474E89094C44Da98b954EedeAC495271d0F" = 1000000

[[sources]]
id = 0
name = "uniswap-v1"
implementation = "tabulated"
[sources.config]
gas = 60000
[[sources.config.pairs]]
from = "0xEeeeeEeeeEeEeeEeEeEeeEEEeeeeEeeeeeeeEEeE"
dest = "0x6B175474E89094C44Da98b954EedeAC495271d0F"
points = [[100, 200], [1000, 1500]]
"#;

	fn eth() -> Asset {
		Asset::NATIVE
	}

	fn dai() -> Asset {
		"0x6B175474E89094C44Da98b954EedeAC495271d0F"
			.parse()
			.unwrap()
	}

	fn config() -> Config {
		ConfigLoader::new()
			.with_env_prefix("ROUTER_CORE_TEST_")
			.load_str(CONFIG)
			.unwrap()
	}

	fn builder(config: Config) -> RouterBuilder {
		RouterBuilder::new(config)
			.with_source_factory("tabulated", tabulated::create_source)
			.with_storage_factory("memory", storage::create_storage)
			.with_settlement_factory("memory", ledger::create_settlement)
	}

	fn input(amount: u64, min_return: u64) -> SwapInput {
		SwapInput {
			from: eth(),
			dest: dai(),
			amount: U256::from(amount),
			min_return: U256::from(min_return),
			referral: Referral::none(),
			payer: AccountId::new("alice"),
			recipient: AccountId::new("bob"),
		}
	}

	#[tokio::test]
	async fn test_build_from_config_and_swap() {
		let engine = builder(config()).build().unwrap();
		assert_eq!(engine.registry().len(), 1);
		assert_eq!(
			engine.registry().get(SourceId(0)).unwrap().info().name,
			"uniswap-v1"
		);

		let query = SwapQuery::new(dai());
		let quote = engine
			.get_expected_return(eth(), U256::from(100), &query, None)
			.await
			.unwrap();
		assert_eq!(quote.return_amount, U256::from(200));
		assert_eq!(quote.distribution, Distribution(vec![4]));

		let outcome = engine.swap(input(100, 200), &query, None).await.unwrap();
		assert_eq!(outcome.actual_return, U256::from(200));
		assert_eq!(
			engine
				.settlement()
				.balance(dai(), &AccountId::new("bob"))
				.await
				.unwrap(),
			U256::from(200)
		);
		assert!(engine.unresolved_executions().await.unwrap().is_empty());
	}

	#[tokio::test]
	async fn test_missing_factories_are_configuration_errors() {
		let no_sources = RouterBuilder::new(config())
			.with_storage_factory("memory", storage::create_storage)
			.with_settlement_factory("memory", ledger::create_settlement)
			.build();
		assert!(matches!(no_sources, Err(RouterError::Configuration(_))));

		let no_storage = RouterBuilder::new(config())
			.with_source_factory("tabulated", tabulated::create_source)
			.with_settlement_factory("memory", ledger::create_settlement)
			.build();
		assert!(matches!(no_storage, Err(RouterError::Configuration(_))));
	}

	#[tokio::test]
	async fn test_duplicate_instance_id_rejected() {
		let duplicate = builder(config())
			.with_source(
				SourceId(0),
				Arc::new(MockSource::linear("dup", eth(), dai(), 1, 1)),
			)
			.build();
		assert!(matches!(duplicate, Err(RouterError::Configuration(_))));
	}

	#[tokio::test]
	async fn test_injected_instances() {
		let ledger = Arc::new(MemoryLedger::new());
		ledger.deposit(&AccountId::new("alice"), eth(), U256::from(10));
		ledger.deposit(&source_account(SourceId(2)), dai(), U256::from(100));

		let engine = builder(config())
			.with_source(
				SourceId(2),
				Arc::new(MockSource::linear("flat", eth(), dai(), 3, 0)),
			)
			.with_settlement_instance(ledger.clone())
			.build()
			.unwrap();
		assert_eq!(engine.registry().len(), 3);

		let outcome = engine
			.make_swap(input(10, 30), &SwapQuery::new(dai()), &Distribution(vec![0, 0, 1]))
			.await
			.unwrap();
		assert_eq!(outcome.actual_return, U256::from(30));
		assert_eq!(
			ledger.balance(dai(), &AccountId::new("bob")).await.unwrap(),
			U256::from(30)
		);
	}

	#[tokio::test]
	async fn test_swap_with_nothing_enabled() {
		let engine = builder(config()).build().unwrap();
		let query = SwapQuery::new(dai()).with_disabled([SourceId(0)]);
		let err = engine.swap(input(100, 0), &query, None).await.unwrap_err();
		assert!(err.is_caller_error());
	}

	#[tokio::test]
	async fn test_swap_skips_sources_that_cannot_quote() {
		let down = Arc::new(MockSource::linear("down", eth(), dai(), 5, 0).failing_quotes());
		let engine = builder(config())
			.with_source(SourceId(1), down.clone())
			.build()
			.unwrap();

		// Priced gas makes the working source net negative; the broken one
		// must still not be picked.
		let query = SwapQuery::new(dai()).with_gas_price(U256::from(1));
		let outcome = engine.swap(input(100, 200), &query, None).await.unwrap();
		assert_eq!(outcome.actual_return, U256::from(200));
		assert_eq!(down.execute_calls(), 0);
	}
}

