//! File-based storage backend: one file per key under a base directory.

use crate::{StorageError, StorageInterface};
use async_trait::async_trait;
use router_types::{ConfigSchema, Field, FieldType, Schema, ValidationError};
use std::path::PathBuf;
use tokio::fs;
use tracing::debug;

const EXTENSION: &str = "json";

pub struct FileStorage {
	base_path: PathBuf,
}

impl FileStorage {
	pub fn new(base_path: PathBuf) -> Self {
		Self { base_path }
	}

	/// Maps a key to its file. Characters outside `[A-Za-z0-9_-]` are written
	/// as `%XX` so the key can be recovered from the file name.
	fn file_path(&self, key: &str) -> PathBuf {
		self.base_path.join(format!("{}.{}", encode_key(key), EXTENSION))
	}
}

fn encode_key(key: &str) -> String {
	let mut out = String::with_capacity(key.len());
	for byte in key.bytes() {
		if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
			out.push(byte as char);
		} else {
			out.push_str(&format!("%{:02X}", byte));
		}
	}
	out
}

fn decode_key(name: &str) -> Option<String> {
	let mut bytes = Vec::with_capacity(name.len());
	let mut iter = name.bytes();
	while let Some(byte) = iter.next() {
		if byte == b'%' {
			let hi = iter.next()?;
			let lo = iter.next()?;
			let pair = [hi, lo];
			let text = std::str::from_utf8(&pair).ok()?;
			bytes.push(u8::from_str_radix(text, 16).ok()?);
		} else {
			bytes.push(byte);
		}
	}
	String::from_utf8(bytes).ok()
}

fn backend(e: std::io::Error) -> StorageError {
	StorageError::Backend(e.to_string())
}

pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let schema = Schema::new(
			vec![],
			vec![Field::new("storage_path", FieldType::String).with_validator(|v| {
				match v.as_str() {
					Some("") => Err("storage_path must not be empty".to_string()),
					_ => Ok(()),
				}
			})],
		);
		schema.validate(config)
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}

	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		match fs::read(self.file_path(key)).await {
			Ok(data) => Ok(data),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				Err(StorageError::NotFound(key.to_string()))
			}
			Err(e) => Err(backend(e)),
		}
	}

	async fn set_bytes(&self, key: &str, value: Vec<u8>) -> Result<(), StorageError> {
		let path = self.file_path(key);
		fs::create_dir_all(&self.base_path).await.map_err(backend)?;

		// Write to a temp file then rename so readers never see a torn record.
		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, value).await.map_err(backend)?;
		fs::rename(&temp_path, &path).await.map_err(backend)?;

		debug!("Stored {} at {}", key, path.display());
		Ok(())
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		match fs::remove_file(self.file_path(key)).await {
			Ok(_) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(backend(e)),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		fs::try_exists(self.file_path(key)).await.map_err(backend)
	}

	async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		let mut dir = match fs::read_dir(&self.base_path).await {
			Ok(dir) => dir,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
			Err(e) => return Err(backend(e)),
		};

		let suffix = format!(".{}", EXTENSION);
		let mut keys = Vec::new();
		while let Some(entry) = dir.next_entry().await.map_err(backend)? {
			let name = entry.file_name();
			let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(&suffix)) else {
				continue;
			};
			if let Some(key) = decode_key(stem) {
				if key.starts_with(prefix) {
					keys.push(key);
				}
			}
		}
		keys.sort();
		Ok(keys)
	}
}

/// Factory function to create a file backend from configuration.
///
/// Configuration parameters:
/// - `storage_path`: Base directory for stored records (default: "./data/journal")
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::InvalidConfig(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/journal");

	Ok(Box::new(FileStorage::new(PathBuf::from(storage_path))))
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[test]
	fn test_key_encoding_is_reversible() {
		for key in ["executions:1b4e-28ba", "a/b c", "plain_key", "ünï"] {
			let encoded = encode_key(key);
			assert!(!encoded.contains(['/', ':', ' ']));
			assert_eq!(decode_key(&encoded).as_deref(), Some(key));
		}
	}

	#[tokio::test]
	async fn test_file_round_trip() {
		let dir = TempDir::new().unwrap();
		let storage = FileStorage::new(dir.path().join("journal"));

		assert!(matches!(
			storage.get_bytes("executions:x").await,
			Err(StorageError::NotFound(_))
		));
		assert!(storage.keys("executions:").await.unwrap().is_empty());

		storage.set_bytes("executions:x", b"one".to_vec()).await.unwrap();
		storage.set_bytes("executions:x", b"two".to_vec()).await.unwrap();
		storage.set_bytes("other:y", b"3".to_vec()).await.unwrap();

		assert_eq!(storage.get_bytes("executions:x").await.unwrap(), b"two");
		assert!(storage.exists("executions:x").await.unwrap());
		assert_eq!(
			storage.keys("executions:").await.unwrap(),
			vec!["executions:x".to_string()]
		);

		storage.delete("executions:x").await.unwrap();
		storage.delete("executions:x").await.unwrap();
		assert!(!storage.exists("executions:x").await.unwrap());
	}

	#[test]
	fn test_factory_validates() {
		let bad: toml::Value = toml::from_str("storage_path = 5").unwrap();
		assert!(create_storage(&bad).is_err());
		let empty: toml::Value = toml::from_str("storage_path = \"\"").unwrap();
		assert!(create_storage(&empty).is_err());
		let ok: toml::Value = toml::from_str("storage_path = \"/tmp/x\"").unwrap();
		assert!(create_storage(&ok).is_ok());
	}
}
