use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use router_config::Config;
use router_core::RouterEngine;
use router_types::{
	AccountId, Asset, Referral, SourceId, SourceMask, SwapInput, SwapPath, SwapQuery, U256,
};
use serde_json::json;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod cli;
mod factories;

use cli::{Args, Command, Selection};

#[tokio::main]
async fn main() -> Result<()> {
	let args = Args::parse();

	let config = factories::config_loader(&args.config)
		.load()
		.await
		.with_context(|| format!("Failed to load configuration from {}", args.config.display()))?;

	let log_level = args
		.log_level
		.clone()
		.unwrap_or_else(|| config.router.log_level.clone());
	setup_tracing(&log_level)?;
	info!("Loaded configuration '{}' from {:?}", config.router.name, args.config);

	match args.command {
		Command::Validate => validate(&config),
		command => {
			let engine = factories::router_builder(config)
				.build()
				.context("Failed to build router")?;
			run(&engine, command).await
		}
	}
}

fn validate(config: &Config) -> Result<()> {
	info!("Configuration is valid");
	info!("Router name: {}", config.router.name);
	info!(
		"Storage: {}, settlement: {}",
		config.storage.backend, config.settlement.implementation
	);
	for source in &config.sources {
		info!("  Source {}: {} ({})", source.id, source.name, source.implementation);
	}
	Ok(())
}

async fn run(engine: &RouterEngine, command: Command) -> Result<()> {
	let config = engine.config();
	match command {
		Command::Validate => validate(config),

		Command::Sources => {
			let mut rows = Vec::new();
			for (id, source) in engine.registry().iter() {
				let mut pairs = Vec::new();
				for from in &config.assets {
					for dest in &config.assets {
						if from.address != dest.address
							&& source.supports_pair(from.address, dest.address)
						{
							pairs.push(format!("{}->{}", from.symbol, dest.symbol));
						}
					}
				}
				rows.push(json!({
					"id": id.0,
					"name": source.info().name,
					"kind": source.info().kind,
					"pairs": pairs,
				}));
			}
			print_json(&rows)
		}

		Command::Quote {
			from,
			to,
			amounts,
			selection,
		} => {
			let from = asset(config, &from)?;
			let query = query(config, &to, &selection)?;
			let amounts = parse_amounts(&amounts)?;
			let result = engine
				.get_swap_return(from, &amounts, &query, selection.parts)
				.await?;
			print_json(&result)
		}

		Command::Path {
			from,
			paths,
			amounts,
			selection,
		} => {
			let from = asset(config, &from)?;
			let amounts = parse_amounts(&amounts)?;
			let paths = paths
				.iter()
				.map(|hops| {
					hops.split(',')
						.map(|hop| query(config, hop.trim(), &selection))
						.collect::<Result<Vec<_>>>()
						.map(SwapPath::new)
				})
				.collect::<Result<Vec<_>>>()?;

			if let [path] = paths.as_slice() {
				let result = engine
					.get_path_return(from, &amounts, path, selection.parts)
					.await?;
				print_json(&result)
			} else {
				let results = engine
					.get_multi_path_return(from, &amounts, &paths, selection.parts)
					.await?;
				print_json(&results)
			}
		}

		Command::Swap {
			from,
			to,
			amount,
			min_return,
			payer,
			recipient,
			referrer,
			fee_bips,
			selection,
		} => {
			let referral = match referrer {
				Some(account) => Referral::new(account, fee_bips),
				None if fee_bips > 0 => bail!("--fee-bips needs --referrer"),
				None => Referral::none(),
			};
			let input = SwapInput {
				from: asset(config, &from)?,
				dest: asset(config, &to)?,
				amount: parse_amount(&amount)?,
				min_return: parse_amount(&min_return)?,
				referral,
				recipient: AccountId::new(recipient.unwrap_or_else(|| payer.clone())),
				payer: AccountId::new(payer),
			};
			let query = query(config, &to, &selection)?;
			let outcome = engine.swap(input, &query, selection.parts).await?;
			print_json(&outcome)
		}

		Command::Executions => {
			let records = engine.unresolved_executions().await?;
			info!("{} unresolved execution(s)", records.len());
			print_json(&records)
		}
	}
}

fn asset(config: &Config, text: &str) -> Result<Asset> {
	config
		.resolve_asset(text)
		.ok_or_else(|| anyhow!("Unknown asset '{}'", text))
}

fn query(config: &Config, dest: &str, selection: &Selection) -> Result<SwapQuery> {
	let mut query = SwapQuery::new(asset(config, dest)?)
		.with_gas_price(parse_amount(&selection.gas_price)?)
		.with_disabled(selection.disable.iter().map(|id| SourceId(*id)));
	if let Some(flags) = &selection.flags {
		query = query.with_flags(parse_mask(flags)?);
	}
	Ok(query)
}

fn parse_mask(text: &str) -> Result<SourceMask> {
	match text.strip_prefix('!') {
		Some(bits) => Ok(bits.parse::<SourceMask>()?.inverted()),
		None => Ok(text.parse()?),
	}
}

fn parse_amount(text: &str) -> Result<U256> {
	text.parse::<U256>()
		.map_err(|e| anyhow!("Invalid amount '{}': {}", text, e))
}

fn parse_amounts(texts: &[String]) -> Result<Vec<U256>> {
	texts.iter().map(|t| parse_amount(t)).collect()
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}

fn setup_tracing(log_level: &str) -> Result<()> {
	let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

	tracing_subscriber::registry()
		.with(env_filter)
		.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
		.init();

	Ok(())
}
