//! File-backed storage.
//!
//! Each key becomes one `.bin` file holding a fixed header followed by the
//! JSON payload. The header carries an optional expiry, which is how the
//! retention policy for a collection (`ttl_<collection>` in the
//! configuration) is enforced.

use crate::{StorageError, StorageFactory, StorageInterface, StorageRegistry};
use async_trait::async_trait;
use cart_types::{
	ConfigSchema, Field, FieldType, ImplementationRegistry, Schema, StorageKey, ValidationError,
};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::fs;

fn now_secs() -> u64 {
	SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.map(|d| d.as_secs())
		.unwrap_or(0)
}

#[allow(clippy::doc_nested_refdefs)]
/// Fixed-size file header.
///
/// Binary layout (32 bytes total):
/// - [0-3]: Magic bytes "CART"
/// - [4-5]: Version (u16, little-endian)
/// - [6-13]: Expiration timestamp (u64, little-endian, Unix seconds, 0 = never)
/// - [14-31]: Reserved
#[derive(Debug, Clone, Copy)]
struct FileHeader {
	version: u16,
	expires_at: u64,
}

impl FileHeader {
	const MAGIC: &'static [u8; 4] = b"CART";
	const VERSION: u16 = 1;
	const SIZE: usize = 32;

	fn new(ttl: Duration) -> Self {
		let expires_at = if ttl.is_zero() {
			0
		} else {
			now_secs().saturating_add(ttl.as_secs())
		};
		Self {
			version: Self::VERSION,
			expires_at,
		}
	}

	fn serialize(&self) -> [u8; Self::SIZE] {
		let mut bytes = [0u8; Self::SIZE];
		bytes[0..4].copy_from_slice(Self::MAGIC);
		bytes[4..6].copy_from_slice(&self.version.to_le_bytes());
		bytes[6..14].copy_from_slice(&self.expires_at.to_le_bytes());
		bytes
	}

	fn deserialize(bytes: &[u8]) -> Result<Self, StorageError> {
		if bytes.len() < Self::SIZE || &bytes[0..4] != Self::MAGIC {
			return Err(StorageError::Backend("Missing file header".into()));
		}

		let version = u16::from_le_bytes([bytes[4], bytes[5]]);
		if version > Self::VERSION {
			return Err(StorageError::Backend(format!(
				"Unsupported file version: {}",
				version
			)));
		}

		let mut expires_bytes = [0u8; 8];
		expires_bytes.copy_from_slice(&bytes[6..14]);

		Ok(Self {
			version,
			expires_at: u64::from_le_bytes(expires_bytes),
		})
	}

	fn is_expired(&self) -> bool {
		self.expires_at != 0 && now_secs() >= self.expires_at
	}
}

/// Retention per collection. Collections without an entry never expire.
#[derive(Debug, Clone, Default)]
pub struct TtlConfig {
	ttls: HashMap<StorageKey, Duration>,
}

impl TtlConfig {
	fn from_config(config: &toml::Value) -> Self {
		let ttls = StorageKey::all()
			.filter_map(|storage_key| {
				config
					.get(format!("ttl_{}", storage_key.as_str()))
					.and_then(|v| v.as_integer())
					.filter(|secs| *secs > 0)
					.map(|secs| (storage_key, Duration::from_secs(secs as u64)))
			})
			.collect();
		Self { ttls }
	}

	fn get_ttl(&self, storage_key: StorageKey) -> Duration {
		self.ttls
			.get(&storage_key)
			.copied()
			.unwrap_or(Duration::ZERO)
	}
}

pub struct FileStorage {
	base_path: PathBuf,
	ttl_config: TtlConfig,
}

impl FileStorage {
	pub fn new(base_path: PathBuf, ttl_config: TtlConfig) -> Self {
		Self {
			base_path,
			ttl_config,
		}
	}

	fn file_name(key: &str) -> String {
		format!("{}.bin", key.replace(['/', ':'], "_"))
	}

	fn get_file_path(&self, key: &str) -> PathBuf {
		self.base_path.join(Self::file_name(key))
	}

	fn get_ttl_for_key(&self, key: &str) -> Duration {
		key.split(':')
			.next()
			.and_then(|namespace| namespace.parse::<StorageKey>().ok())
			.map(|sk| self.ttl_config.get_ttl(sk))
			.unwrap_or(Duration::ZERO)
	}

	/// Reads a file, returning `None` when it is missing or expired.
	async fn read_live(&self, path: &Path) -> Result<Option<Vec<u8>>, StorageError> {
		let data = match fs::read(path).await {
			Ok(data) => data,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		let header = FileHeader::deserialize(&data)?;
		if header.is_expired() {
			return Ok(None);
		}
		Ok(Some(data[FileHeader::SIZE..].to_vec()))
	}

	async fn list_files(&self) -> Result<Vec<(String, PathBuf)>, StorageError> {
		let mut files = Vec::new();
		let mut entries = match fs::read_dir(&self.base_path).await {
			Ok(entries) => entries,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
			Err(e) => return Err(StorageError::Backend(e.to_string())),
		};

		while let Some(entry) = entries
			.next_entry()
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?
		{
			let path = entry.path();
			if path.extension() != Some(std::ffi::OsStr::new("bin")) {
				continue;
			}
			if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
				files.push((name.to_string(), path.clone()));
			}
		}
		Ok(files)
	}
}

#[async_trait]
impl StorageInterface for FileStorage {
	async fn get_bytes(&self, key: &str) -> Result<Vec<u8>, StorageError> {
		self.read_live(&self.get_file_path(key))
			.await?
			.ok_or(StorageError::NotFound)
	}

	async fn set_bytes(
		&self,
		key: &str,
		value: Vec<u8>,
		ttl: Option<Duration>,
	) -> Result<(), StorageError> {
		let path = self.get_file_path(key);

		fs::create_dir_all(&self.base_path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;

		let ttl = ttl.unwrap_or_else(|| self.get_ttl_for_key(key));
		let header = FileHeader::new(ttl).serialize();

		let mut file_data = Vec::with_capacity(FileHeader::SIZE + value.len());
		file_data.extend_from_slice(&header);
		file_data.extend_from_slice(&value);

		// Write to a temp file, then rename over the target
		let temp_path = path.with_extension("tmp");
		fs::write(&temp_path, file_data)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))?;
		fs::rename(&temp_path, &path)
			.await
			.map_err(|e| StorageError::Backend(e.to_string()))
	}

	async fn delete(&self, key: &str) -> Result<(), StorageError> {
		match fs::remove_file(self.get_file_path(key)).await {
			Ok(_) => Ok(()),
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(StorageError::Backend(e.to_string())),
		}
	}

	async fn exists(&self, key: &str) -> Result<bool, StorageError> {
		Ok(self.read_live(&self.get_file_path(key)).await?.is_some())
	}

	async fn keys(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
		let file_prefix = prefix.replace(['/', ':'], "_");
		let mut keys = Vec::new();
		for (name, path) in self.list_files().await? {
			let Some(id) = name
				.strip_prefix(&file_prefix)
				.and_then(|rest| rest.strip_suffix(".bin"))
			else {
				continue;
			};
			if self.read_live(&path).await?.is_some() {
				keys.push(format!("{}{}", prefix, id));
			}
		}
		Ok(keys)
	}

	fn config_schema(&self) -> Box<dyn ConfigSchema> {
		Box::new(FileStorageSchema)
	}

	async fn cleanup_expired(&self) -> Result<usize, StorageError> {
		let mut removed = 0;
		for (_, path) in self.list_files().await? {
			let data = match fs::read(&path).await {
				Ok(data) => data,
				Err(e) => {
					tracing::debug!("Skipping file {:?}: could not be read: {}", path, e);
					continue;
				},
			};
			let expired = FileHeader::deserialize(&data)
				.map(|header| header.is_expired())
				.unwrap_or(false);
			if !expired {
				continue;
			}
			match fs::remove_file(&path).await {
				Ok(_) => removed += 1,
				Err(e) => tracing::warn!("Failed to remove expired file {:?}: {}", path, e),
			}
		}
		Ok(removed)
	}
}

/// Options: `storage_path` plus one `ttl_<collection>` per collection.
pub struct FileStorageSchema;

impl ConfigSchema for FileStorageSchema {
	fn validate(&self, config: &toml::Value) -> Result<(), ValidationError> {
		let mut optional_fields = vec![Field::new("storage_path", FieldType::String)];
		optional_fields.extend(StorageKey::all().map(|storage_key| {
			Field::new(
				format!("ttl_{}", storage_key.as_str()),
				FieldType::Integer {
					min: Some(0),
					max: None,
				},
			)
		}));

		Schema::new(vec![], optional_fields).validate(config)
	}
}

/// Builds a file backend.
///
/// - `storage_path`: base directory (default: "./data/storage")
/// - `ttl_<collection>`: retention in seconds, 0 keeps records forever
pub fn create_storage(config: &toml::Value) -> Result<Box<dyn StorageInterface>, StorageError> {
	FileStorageSchema
		.validate(config)
		.map_err(|e| StorageError::Configuration(e.to_string()))?;

	let storage_path = config
		.get("storage_path")
		.and_then(|v| v.as_str())
		.unwrap_or("./data/storage");

	Ok(Box::new(FileStorage::new(
		PathBuf::from(storage_path),
		TtlConfig::from_config(config),
	)))
}

pub struct Registry;

impl ImplementationRegistry for Registry {
	const NAME: &'static str = "file";
	type Factory = StorageFactory;

	fn factory() -> Self::Factory {
		create_storage
	}
}

impl StorageRegistry for Registry {}
