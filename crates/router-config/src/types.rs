//! Configuration types for the router.

use router_types::{Asset, AssetInfo, SourceId};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Complete router configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
	pub router: RouterSettings,
	#[serde(default)]
	pub storage: StorageConfig,
	#[serde(default)]
	pub settlement: SettlementConfig,
	#[serde(default)]
	pub assets: Vec<AssetInfo>,
	#[serde(default)]
	pub sources: Vec<SourceConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouterSettings {
	pub name: String,
	/// Part count used when a caller does not pick one.
	#[serde(default = "default_parts")]
	pub default_parts: u64,
	/// Per-source latency bound while quoting.
	#[serde(default = "default_quote_timeout_ms")]
	pub quote_timeout_ms: u64,
	/// Account holding funds while a swap is in flight.
	#[serde(default = "default_escrow_account")]
	pub escrow_account: String,
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

impl RouterSettings {
	pub fn quote_timeout(&self) -> Duration {
		Duration::from_millis(self.quote_timeout_ms)
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
	/// "memory" or "file"
	#[serde(default = "default_memory")]
	pub backend: String,
	#[serde(default = "empty_table")]
	pub config: toml::Value,
}

impl Default for StorageConfig {
	fn default() -> Self {
		Self {
			backend: default_memory(),
			config: empty_table(),
		}
	}
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SettlementConfig {
	#[serde(default = "default_memory")]
	pub implementation: String,
	#[serde(default = "empty_table")]
	pub config: toml::Value,
}

impl Default for SettlementConfig {
	fn default() -> Self {
		Self {
			implementation: default_memory(),
			config: empty_table(),
		}
	}
}

/// One liquidity source. `id` is its permanent bit position.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SourceConfig {
	pub id: u32,
	pub name: String,
	pub implementation: String,
	#[serde(default = "empty_table")]
	pub config: toml::Value,
}

impl SourceConfig {
	pub fn source_id(&self) -> SourceId {
		SourceId(self.id)
	}
}

impl Config {
	pub fn asset_by_symbol(&self, symbol: &str) -> Option<&AssetInfo> {
		self.assets
			.iter()
			.find(|a| a.symbol.eq_ignore_ascii_case(symbol))
	}

	/// Resolves a configured symbol or a raw address.
	pub fn resolve_asset(&self, text: &str) -> Option<Asset> {
		self.asset_by_symbol(text)
			.map(|info| info.address)
			.or_else(|| Asset::from_str(text).ok())
	}

	/// Symbol for display, falling back to the address.
	pub fn asset_label(&self, asset: Asset) -> String {
		self.assets
			.iter()
			.find(|a| a.address == asset)
			.map(|a| a.symbol.clone())
			.unwrap_or_else(|| asset.to_string())
	}
}

fn default_parts() -> u64 {
	10
}

fn default_quote_timeout_ms() -> u64 {
	2_000
}

fn default_escrow_account() -> String {
	"router".to_string()
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_memory() -> String {
	"memory".to_string()
}

fn empty_table() -> toml::Value {
	toml::Value::Table(toml::Table::new())
}
