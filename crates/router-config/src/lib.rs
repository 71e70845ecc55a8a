//! Configuration loading for the router.
//!
//! A TOML file is read, `${VAR}` placeholders are filled from the environment,
//! a few well-known settings can be overridden by `ROUTER_*` variables, and the
//! result is validated before anything is built from it.

use regex::Regex;
use router_types::{ConfigSchema, MAX_SOURCE_ID};
use std::collections::{HashMap, HashSet};
use std::env;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

mod types;

pub use types::*;

/// Storage backends the router knows how to build.
pub const STORAGE_BACKENDS: &[&str] = &["memory", "file"];

/// Settlement implementations the router knows how to build.
pub const SETTLEMENT_IMPLEMENTATIONS: &[&str] = &["memory"];

#[derive(Error, Debug)]
pub enum ConfigError {
	#[error("File not found: {0}")]
	FileNotFound(String),

	#[error("Parse error: {0}")]
	ParseError(String),

	#[error("Validation error: {0}")]
	ValidationError(String),

	#[error("Environment variable not found: {0}")]
	EnvVarNotFound(String),

	#[error("IO error: {0}")]
	IoError(#[from] std::io::Error),
}

/// Configuration loader with environment variable substitution.
pub struct ConfigLoader {
	file_path: Option<PathBuf>,
	env_prefix: String,
	source_schemas: HashMap<String, Box<dyn ConfigSchema>>,
}

impl Default for ConfigLoader {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigLoader {
	pub fn new() -> Self {
		Self {
			file_path: None,
			env_prefix: "ROUTER_".to_string(),
			source_schemas: HashMap::new(),
		}
	}

	pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
		self.file_path = Some(path.as_ref().to_path_buf());
		self
	}

	pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.env_prefix = prefix.into();
		self
	}

	/// Validates every `[[sources]]` entry using `implementation` against
	/// `schema`. Once any schema is registered, unknown implementations are
	/// rejected.
	pub fn with_source_schema(
		mut self,
		implementation: &str,
		schema: Box<dyn ConfigSchema>,
	) -> Self {
		self.source_schemas
			.insert(implementation.to_string(), schema);
		self
	}

	pub async fn load(&self) -> Result<Config, ConfigError> {
		let file_path = self
			.file_path
			.as_ref()
			.ok_or_else(|| {
				ConfigError::FileNotFound("No configuration file specified".to_string())
			})?;

		let content = match tokio::fs::read_to_string(file_path).await {
			Ok(content) => content,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				return Err(ConfigError::FileNotFound(file_path.display().to_string()))
			}
			Err(e) => return Err(e.into()),
		};
		debug!("Loaded configuration from {}", file_path.display());

		self.load_str(&content)
	}

	/// Same pipeline as [`load`](Self::load) for configuration already in
	/// memory.
	pub fn load_str(&self, content: &str) -> Result<Config, ConfigError> {
		let substituted = substitute_env_vars(content)?;
		let mut config: Config =
			toml::from_str(&substituted).map_err(|e| ConfigError::ParseError(e.to_string()))?;

		self.apply_env_overrides(&mut config)?;
		self.validate_config(&config)?;
		Ok(config)
	}

	fn apply_env_overrides(&self, config: &mut Config) -> Result<(), ConfigError> {
		if let Ok(log_level) = env::var(format!("{}LOG_LEVEL", self.env_prefix)) {
			config.router.log_level = log_level;
		}

		if let Ok(parts) = env::var(format!("{}DEFAULT_PARTS", self.env_prefix)) {
			config.router.default_parts = parts.parse().map_err(|e| {
				ConfigError::ValidationError(format!("Invalid default parts: {}", e))
			})?;
		}

		if let Ok(timeout) = env::var(format!("{}QUOTE_TIMEOUT_MS", self.env_prefix)) {
			config.router.quote_timeout_ms = timeout.parse().map_err(|e| {
				ConfigError::ValidationError(format!("Invalid quote timeout: {}", e))
			})?;
		}

		Ok(())
	}

	fn validate_config(&self, config: &Config) -> Result<(), ConfigError> {
		let invalid =
			|msg: String| -> Result<(), ConfigError> { Err(ConfigError::ValidationError(msg)) };

		if config.router.name.trim().is_empty() {
			return invalid("router.name must not be empty".into());
		}
		if config.router.default_parts == 0 {
			return invalid("router.default_parts must be at least 1".into());
		}
		if config.router.quote_timeout_ms == 0 {
			return invalid("router.quote_timeout_ms must be at least 1".into());
		}
		if config.router.escrow_account.is_empty() {
			return invalid("router.escrow_account must not be empty".into());
		}

		if !STORAGE_BACKENDS.contains(&config.storage.backend.as_str()) {
			return invalid(format!(
				"Unknown storage backend '{}', expected one of {:?}",
				config.storage.backend, STORAGE_BACKENDS
			));
		}
		if !SETTLEMENT_IMPLEMENTATIONS.contains(&config.settlement.implementation.as_str()) {
			return invalid(format!(
				"Unknown settlement implementation '{}', expected one of {:?}",
				config.settlement.implementation, SETTLEMENT_IMPLEMENTATIONS
			));
		}

		let mut symbols = HashSet::new();
		let mut addresses = HashSet::new();
		for asset in &config.assets {
			if !symbols.insert(asset.symbol.to_ascii_uppercase()) {
				return invalid(format!("Duplicate asset symbol '{}'", asset.symbol));
			}
			if !addresses.insert(asset.address) {
				return invalid(format!("Duplicate asset address {}", asset.address));
			}
		}

		let mut ids = HashSet::new();
		for source in &config.sources {
			if source.id > MAX_SOURCE_ID {
				return invalid(format!(
					"Source '{}' id {} exceeds the maximum of {}",
					source.name, source.id, MAX_SOURCE_ID
				));
			}
			if !ids.insert(source.id) {
				return invalid(format!("Duplicate source id {}", source.id));
			}
			if self.source_schemas.is_empty() {
				continue;
			}
			let schema = self
				.source_schemas
				.get(&source.implementation)
				.ok_or_else(|| {
					ConfigError::ValidationError(format!(
						"Source '{}' uses unknown implementation '{}'",
						source.name, source.implementation
					))
				})?;
			schema.validate(&source.config).map_err(|e| {
				ConfigError::ValidationError(format!("Source '{}': {}", source.name, e))
			})?;
		}

		Ok(())
	}
}

/// Replaces every `${VAR_NAME}` with the variable's value.
fn substitute_env_vars(content: &str) -> Result<String, ConfigError> {
	let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| ConfigError::ParseError(e.to_string()))?;

	let mut values = HashMap::new();
	for cap in re.captures_iter(content) {
		let var_name = &cap[1];
		let value =
			env::var(var_name).map_err(|_| ConfigError::EnvVarNotFound(var_name.to_string()))?;
		values.insert(var_name.to_string(), value);
	}

	Ok(re
		.replace_all(content, |cap: &regex::Captures| {
			values.get(&cap[1]).cloned().unwrap_or_default()
		})
		.into_owned())
}
