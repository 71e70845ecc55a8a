//! Wires the bundled implementations into the loader and the builder.

use router_config::{Config, ConfigLoader};
use router_core::RouterBuilder;
use router_settlement::implementations::memory as memory_ledger;
use router_sources::implementations::tabulated::{self, TabulatedSchema};
use router_storage::implementations::{file, memory};
use std::path::Path;

pub fn config_loader(path: &Path) -> ConfigLoader {
	ConfigLoader::new()
		.with_file(path)
		.with_source_schema("tabulated", Box::new(TabulatedSchema))
}

pub fn router_builder(config: Config) -> RouterBuilder {
	RouterBuilder::new(config)
		.with_source_factory("tabulated", tabulated::create_source)
		.with_storage_factory("memory", memory::create_storage)
		.with_storage_factory("file", file::create_storage)
		.with_settlement_factory("memory", memory_ledger::create_settlement)
}

#[cfg(test)]
mod tests {
	use super::*;
	use router_types::{AccountId, Referral, SourceId, SourceMask, SwapInput, SwapQuery, U256};
	use std::path::PathBuf;

	fn example_path() -> PathBuf {
		PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../config/example.toml")
	}

	async fn example() -> Config {
		config_loader(&example_path())
			.with_env_prefix("ROUTER_SERVICE_TEST_")
			.load()
			.await
			.unwrap()
	}

	#[tokio::test]
	async fn test_example_config_builds() {
		let engine = router_builder(example().await).build().unwrap();
		assert_eq!(engine.registry().len(), 4);
		assert_eq!(
			engine.registry().get(SourceId(0)).unwrap().info().name,
			"uniswap-v1"
		);
	}

	#[tokio::test]
	async fn test_example_single_source_gas() {
		let config = example().await;
		let eth = config.resolve_asset("ETH").unwrap();
		let dai = config.resolve_asset("DAI").unwrap();
		let engine = router_builder(config).build().unwrap();

		// Only uniswap-v1 enabled: every part goes to it and so does the gas.
		let one_eth = U256::from(10u64).pow(U256::from(18));
		let query = SwapQuery::new(dai).with_flags(SourceMask::only([SourceId(0)]));
		let quote = engine
			.get_expected_return(eth, one_eth, &query, Some(10))
			.await
			.unwrap();
		assert_eq!(quote.distribution.0, vec![10, 0, 0, 0]);
		assert_eq!(quote.estimate_gas(), U256::from(60_000));

		let single = engine
			.get_expected_return(eth, one_eth, &query, Some(1))
			.await
			.unwrap();
		assert_eq!(single.distribution.0, vec![1, 0, 0, 0]);
		assert_eq!(single.return_amount, quote.return_amount);
	}

	#[tokio::test]
	async fn test_example_swap_against_seeded_ledger() {
		let config = example().await;
		let eth = config.resolve_asset("ETH").unwrap();
		let dai = config.resolve_asset("DAI").unwrap();
		let engine = router_builder(config).build().unwrap();

		let amount = U256::from(10u64).pow(U256::from(18)) * U256::from(5);
		let outcome = engine
			.swap(
				SwapInput {
					from: eth,
					dest: dai,
					amount,
					min_return: U256::from(1),
					referral: Referral::new("treasury", 30),
					payer: AccountId::new("alice"),
					recipient: AccountId::new("alice"),
				},
				&SwapQuery::new(dai),
				Some(10),
			)
			.await
			.unwrap();
		assert!(outcome.referral_fee > U256::ZERO);
		assert_eq!(
			engine
				.settlement()
				.balance(dai, &AccountId::new("alice"))
				.await
				.unwrap(),
			outcome.actual_return
		);
	}
}
