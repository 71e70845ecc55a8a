//! Command-line interface definitions.

use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "split-router")]
#[command(about = "Multi-source split router", long_about = None)]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Args {
	/// Path to configuration file
	#[arg(short, long, env = "ROUTER_CONFIG", default_value = "config/example.toml")]
	pub config: PathBuf,

	/// Log level override (trace, debug, info, warn, error)
	#[arg(short, long)]
	pub log_level: Option<String>,

	#[command(subcommand)]
	pub command: Command,
}

/// Source selection shared by every quoting command.
#[derive(ClapArgs, Debug, Clone)]
pub struct Selection {
	/// Number of parts the amount is split into
	#[arg(short, long)]
	pub parts: Option<u64>,

	/// Source mask, hex or decimal; a leading '!' enables only the listed bits
	#[arg(long)]
	pub flags: Option<String>,

	/// Source ids to exclude for this pair
	#[arg(long, value_delimiter = ',')]
	pub disable: Vec<u32>,

	/// Gas price in units of the destination asset
	#[arg(long, default_value = "0")]
	pub gas_price: String,
}

#[derive(Subcommand, Debug)]
pub enum Command {
	/// Validate the configuration file
	Validate,

	/// List registered sources and the configured pairs they support
	Sources,

	/// Best split for one or more amounts over a single hop
	Quote {
		/// Asset symbol or address to convert from
		#[arg(long)]
		from: String,
		/// Asset symbol or address to convert into
		#[arg(long)]
		to: String,
		/// Amounts in raw units; repeat for a batch
		#[arg(long = "amount", required = true)]
		amounts: Vec<String>,
		#[command(flatten)]
		selection: Selection,
	},

	/// Returns along one or more multi-hop paths
	Path {
		#[arg(long)]
		from: String,
		/// Comma-separated hop assets; repeat to compare paths
		#[arg(long = "path", required = true)]
		paths: Vec<String>,
		#[arg(long = "amount", required = true)]
		amounts: Vec<String>,
		#[command(flatten)]
		selection: Selection,
	},

	/// Quote and execute a swap against the configured ledger
	Swap {
		#[arg(long)]
		from: String,
		#[arg(long)]
		to: String,
		#[arg(long)]
		amount: String,
		/// Smallest acceptable post-fee return
		#[arg(long, default_value = "0")]
		min_return: String,
		#[arg(long)]
		payer: String,
		/// Defaults to the payer
		#[arg(long)]
		recipient: Option<String>,
		/// Account receiving the referral fee
		#[arg(long)]
		referrer: Option<String>,
		#[arg(long, default_value_t = 0)]
		fee_bips: u32,
		#[command(flatten)]
		selection: Selection,
	},

	/// List journaled executions that were not cleanly finished
	Executions,
}
