//! Source locations and reference figures, loaded from TOML.
//!
//! The default configuration (`sources.toml`) is baked into the binary at
//! compile time via [`include_str!`]. Setting `CRIMES_FRANCE_CONFIG` points
//! the loader at a different file; setting `CRIMES_FRANCE_DATA_DIR` makes
//! every table resolve to a local file instead of its download URL.

use std::{collections::BTreeMap, path::PathBuf};

use crimes_france_source_models::TableId;
use serde::Deserialize;

use crate::SourceError;

/// Configuration embedded at compile time.
const EMBEDDED_TOML: &str = include_str!("../sources.toml");

/// Environment variable naming an alternate configuration file.
pub const CONFIG_ENV: &str = "CRIMES_FRANCE_CONFIG";

/// Environment variable naming a directory holding local copies of the
/// tables.
pub const DATA_DIR_ENV: &str = "CRIMES_FRANCE_DATA_DIR";

/// Payload format of a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableFormat {
    /// Delimited text, optionally gzip-compressed.
    Csv,
    /// Excel workbook.
    Xlsx,
}

/// Compression applied to a CSV payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compression {
    /// Always gunzip.
    Gzip,
    /// Never gunzip.
    #[serde(rename = "none")]
    Plain,
}

/// Where and how to read one table.
#[derive(Debug, Clone, Deserialize)]
pub struct TableSource {
    /// Download URL.
    pub url: String,
    /// File name used when reading from a local data directory. Defaults to
    /// the last path segment of `url`.
    #[serde(default)]
    pub file: Option<String>,
    /// Payload format.
    pub format: TableFormat,
    /// CSV field delimiter. Defaults to `;`.
    #[serde(default)]
    pub delimiter: Option<char>,
    /// CSV compression. When absent, gzip is detected from the payload.
    #[serde(default)]
    pub compression: Option<Compression>,
    /// Sheet holding the rows of an xlsx payload.
    #[serde(default)]
    pub sheet: Option<String>,
}

impl TableSource {
    /// Name of the local copy of this table.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.file.as_deref().unwrap_or_else(|| {
            self.url
                .trim_end_matches('/')
                .rsplit('/')
                .next()
                .unwrap_or(&self.url)
        })
    }

    /// Location handed to the fetcher: the local file name when reading
    /// from a data directory, the URL otherwise.
    #[must_use]
    pub fn location(&self, local: bool) -> &str {
        if local { self.file_name() } else { &self.url }
    }

    /// The CSV delimiter as a byte.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] if the configured delimiter is not a
    /// single ASCII character.
    pub fn delimiter_byte(&self) -> Result<u8, SourceError> {
        let delimiter = self.delimiter.unwrap_or(';');
        u8::try_from(delimiter)
            .ok()
            .filter(u8::is_ascii)
            .ok_or_else(|| SourceError::Config {
                message: format!("delimiter {delimiter:?} is not an ASCII character"),
            })
    }
}

/// Locations of the three tables.
#[derive(Debug, Clone, Deserialize)]
pub struct TablesConfig {
    /// Per-commune table.
    pub main: TableSource,
    /// Per-department table.
    pub department: TableSource,
    /// Commune metadata workbook.
    pub commune_metadata: TableSource,
}

/// External population reference figures.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PopulationConfig {
    /// National population keyed by four-digit year.
    #[serde(default)]
    pub national: BTreeMap<String, u64>,
}

/// Full source configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    /// Table locations.
    pub tables: TablesConfig,
    /// Population reference figures.
    #[serde(default)]
    pub population: PopulationConfig,
    /// Legacy commune codes mapped to their 2023 successor.
    #[serde(default)]
    pub crosswalk: BTreeMap<String, String>,
}

impl SourcesConfig {
    /// Returns the configuration compiled into the binary.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML is malformed (a build-time bug).
    #[must_use]
    pub fn embedded() -> Self {
        Self::from_toml(EMBEDDED_TOML)
            .unwrap_or_else(|e| panic!("Failed to parse embedded sources.toml: {e}"))
    }

    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] if the TOML is malformed, a field is
    /// missing, or a population year is not a number.
    pub fn from_toml(text: &str) -> Result<Self, SourceError> {
        let config: Self = toml::from_str(text).map_err(|e| SourceError::Config {
            message: e.to_string(),
        })?;
        config.national_reference()?;
        for id in [TableId::Main, TableId::Department] {
            config.table(id).delimiter_byte()?;
        }
        Ok(config)
    }

    /// Reads the file named by `CRIMES_FRANCE_CONFIG`, or falls back to the
    /// embedded configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError`] if the named file cannot be read or parsed.
    pub fn from_env() -> Result<Self, SourceError> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.is_empty() => {
                log::info!("Loading source configuration from {path}");
                let text = std::fs::read_to_string(&path)?;
                Self::from_toml(&text)
            }
            _ => Ok(Self::embedded()),
        }
    }

    /// Returns the source of one table.
    #[must_use]
    pub const fn table(&self, id: TableId) -> &TableSource {
        match id {
            TableId::Main => &self.tables.main,
            TableId::Department => &self.tables.department,
            TableId::CommuneMetadata => &self.tables.commune_metadata,
        }
    }

    /// National population reference keyed by four-digit year.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Config`] if a key is not a year.
    pub fn national_reference(&self) -> Result<BTreeMap<i32, u64>, SourceError> {
        self.population
            .national
            .iter()
            .map(|(year, population)| {
                year.trim()
                    .parse::<i32>()
                    .map(|year| (year, *population))
                    .map_err(|e| SourceError::Config {
                        message: format!("population year {year:?}: {e}"),
                    })
            })
            .collect()
    }
}

/// Returns the local data directory named by `CRIMES_FRANCE_DATA_DIR`, if
/// any.
#[must_use]
pub fn data_dir_from_env() -> Option<PathBuf> {
    std::env::var_os(DATA_DIR_ENV)
        .filter(|dir| !dir.is_empty())
        .map(PathBuf::from)
}
