use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tether_lifecycle::CleanerConfig;
use thiserror::Error;

/// Smallest remaining size a splittable cursor can be split at.
pub const MIN_SPLITTABLE_SIZE: u64 = 2;

/// Settings of a [`crate::Database`] and everything opened through it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
	/// Diagnostics settings of scope cleaners.
	pub cleaner: CleanerConfig,
	pub cursor: CursorConfig,
}

/// Cursor settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CursorConfig {
	/// Remaining size below which a splittable cursor refuses to split.
	pub min_splittable_size: u64,
}

impl Default for CursorConfig {
	fn default() -> Self {
		Self {
			min_splittable_size: MIN_SPLITTABLE_SIZE,
		}
	}
}

/// Errors raised while loading a [`StorageConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("TOML parse error: {0}")]
	Toml(#[from] toml::de::Error),
	#[error("I/O error reading {path}: {error}")]
	Io { path: PathBuf, error: std::io::Error },
	#[error("invalid value for {field}: {reason}")]
	Invalid { field: &'static str, reason: String },
}

impl StorageConfig {
	/// Parses a configuration document. Missing fields take their defaults.
	pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
		let config: Self = toml::from_str(source)?;
		config.validate()?;
		Ok(config)
	}

	/// Reads and parses the configuration file at `path`.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
		let path = path.as_ref();
		let source = std::fs::read_to_string(path).map_err(|error| ConfigError::Io {
			path: path.to_path_buf(),
			error,
		})?;
		Self::from_toml_str(&source)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.cursor.min_splittable_size < MIN_SPLITTABLE_SIZE {
			return Err(ConfigError::Invalid {
				field: "cursor.min_splittable_size",
				reason: format!("must be at least {MIN_SPLITTABLE_SIZE}, got {}", self.cursor.min_splittable_size),
			});
		}
		if self.cleaner.warn_frequency == 0 {
			return Err(ConfigError::Invalid {
				field: "cleaner.warn_frequency",
				reason: "must be positive".to_owned(),
			});
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use std::io::Write;

	use pretty_assertions::assert_eq;

	use super::*;

	#[test]
	fn empty_document_yields_defaults() {
		assert_eq!(StorageConfig::from_toml_str("").unwrap(), StorageConfig::default());
	}

	#[test]
	fn partial_tables_keep_other_defaults() {
		let config = StorageConfig::from_toml_str(
			r#"
			[cleaner]
			warn_threshold = 10

			[cursor]
			min_splittable_size = 64
			"#,
		)
		.unwrap();
		assert_eq!(config.cleaner.warn_threshold, 10);
		assert_eq!(config.cleaner.warn_frequency, 100);
		assert_eq!(config.cursor.min_splittable_size, 64);
	}

	#[test]
	fn unsplittable_threshold_is_rejected() {
		let err = StorageConfig::from_toml_str("[cursor]\nmin_splittable_size = 1\n").unwrap_err();
		assert!(matches!(
			err,
			ConfigError::Invalid {
				field: "cursor.min_splittable_size",
				..
			}
		));
	}

	#[test]
	fn malformed_document_is_a_parse_error() {
		assert!(matches!(StorageConfig::from_toml_str("[cursor"), Err(ConfigError::Toml(_))));
	}

	#[test]
	fn load_reads_file() {
		let mut file = tempfile::NamedTempFile::new().unwrap();
		writeln!(file, "[cleaner]\nwarn_frequency = 7").unwrap();
		let config = StorageConfig::load(file.path()).unwrap();
		assert_eq!(config.cleaner.warn_frequency, 7);
	}

	#[test]
	fn load_reports_missing_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("missing.toml");
		assert!(matches!(StorageConfig::load(&path), Err(ConfigError::Io { path: p, .. }) if p == path));
	}
}
