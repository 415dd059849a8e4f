//! Loads a configuration file together with the files it includes.
//!
//! Included files are merged section by section. A section may be defined
//! in only one file, and a file may be loaded only once. Environment
//! references are substituted per file as it is read and never again.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

pub struct ConfigLoader {
	/// Directory that relative includes are resolved against.
	base_path: PathBuf,
	/// Canonical paths already read, to stop include cycles.
	visited: HashSet<PathBuf>,
	/// Which file defined each top-level section.
	section_owners: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	pub fn new(base_path: impl AsRef<Path>) -> Self {
		Self {
			base_path: base_path.as_ref().to_path_buf(),
			visited: HashSet::new(),
			section_owners: HashMap::new(),
		}
	}

	/// Reads `config_path`, merges its includes and parses the result.
	pub async fn load_config(
		&mut self,
		config_path: impl AsRef<Path>,
	) -> Result<Config, ConfigError> {
		let config_path = self.resolve_path(config_path)?;
		let root_text = self.load_file(&config_path).await?;
		let root: toml::Value = toml::from_str(&root_text)?;

		let includes = self.extract_includes(&root)?;
		if includes.is_empty() {
			return Config::parse_resolved(&root_text);
		}

		let combined = self.combine(root, includes, config_path).await?;
		let combined = toml::to_string(&combined).map_err(|e| {
			ConfigError::Parse(format!("Cannot re-encode merged configuration: {}", e))
		})?;
		Config::parse_resolved(&combined)
	}

	async fn load_file(&mut self, path: &Path) -> Result<String, ConfigError> {
		let canonical = tokio::fs::canonicalize(path).await.map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Unable to canonicalize {}: {}", path.display(), e),
			))
		})?;

		if !self.visited.insert(canonical.clone()) {
			return Err(ConfigError::Validation(format!(
				"Include cycle: {} was already loaded",
				canonical.display()
			)));
		}

		let content = tokio::fs::read_to_string(path).await?;
		resolve_env_vars(&content)
	}

	fn extract_includes(&self, toml: &toml::Value) -> Result<Vec<PathBuf>, ConfigError> {
		match toml.get("include") {
			None => Ok(Vec::new()),
			Some(toml::Value::String(path)) => Ok(vec![PathBuf::from(path)]),
			Some(toml::Value::Array(items)) => items
				.iter()
				.map(|item| {
					item.as_str().map(PathBuf::from).ok_or_else(|| {
						ConfigError::Validation("Include array must contain only strings".into())
					})
				})
				.collect(),
			Some(_) => Err(ConfigError::Validation(
				"Include must be a string or array of strings".into(),
			)),
		}
	}

	async fn combine(
		&mut self,
		mut root: toml::Value,
		includes: Vec<PathBuf>,
		root_path: PathBuf,
	) -> Result<toml::Value, ConfigError> {
		let main_table = root
			.as_table_mut()
			.ok_or_else(|| ConfigError::Validation("Configuration root must be a table".into()))?;
		main_table.remove("include");
		for key in main_table.keys() {
			self.section_owners
				.insert(key.clone(), root_path.clone());
		}

		for include_path in includes {
			let resolved_path = self.resolve_path(&include_path)?;
			let included_text = self.load_file(&resolved_path).await?;
			let included: toml::Value = toml::from_str(&included_text)?;

			let Some(included_table) = included.as_table() else {
				continue;
			};
			for (key, value) in included_table {
				if let Some(owner) = self.section_owners.get(key) {
					return Err(ConfigError::Validation(format!(
						"Duplicate section '{}' found in {} and {}. \
						Each top-level section must be unique across all configuration files.",
						key,
						owner.display(),
						resolved_path.display()
					)));
				}
				self.section_owners
					.insert(key.clone(), resolved_path.clone());
				main_table.insert(key.clone(), value.clone());
			}
		}

		Ok(root)
	}

	fn resolve_path(&self, path: impl AsRef<Path>) -> Result<PathBuf, ConfigError> {
		let path = path.as_ref();
		let resolved = if path.is_absolute() {
			path.to_path_buf()
		} else {
			self.base_path.join(path)
		};

		if !resolved.exists() {
			return Err(ConfigError::Io(std::io::Error::new(
				std::io::ErrorKind::NotFound,
				format!("Configuration file not found: {}", resolved.display()),
			)));
		}

		Ok(resolved)
	}
}
