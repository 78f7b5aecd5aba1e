use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::Regex;
use serde::Deserialize;

use crate::batch::{default_concurrency, BatchOptions, CodeFields, CoordSystem, IncludeCode};
use crate::error::{Error, Result};

/// Settings for a batch resolution run. Every field is optional so a file
/// and command-line flags can be layered with [`ResolveConfig::merge`].
#[derive(Debug, Deserialize, Clone, Default, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ResolveConfig {
    pub tile_root: Option<PathBuf>,
    pub input: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub include_code: Option<String>,
    pub include_pattern: Option<String>,
    pub center_point: Option<bool>,
    pub latlng_field: Option<String>,
    pub latlng_type: Option<CoordSystem>,
    pub province_code_field: Option<String>,
    pub city_code_field: Option<String>,
    pub county_code_field: Option<String>,
    pub town_code_field: Option<String>,
    pub village_code_field: Option<String>,
    pub concurrency: Option<usize>,
    /// Zero disables the per-record timeout
    pub record_timeout_secs: Option<u64>,
    pub cache_tiles: Option<bool>,
}

impl ResolveConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| Error::io(path, e))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Layer `overrides` on top of `self`; set fields in `overrides` win.
    pub fn merge(self, overrides: ResolveConfig) -> ResolveConfig {
        macro_rules! pick {
            ($($field:ident),* $(,)?) => {
                ResolveConfig { $($field: overrides.$field.or(self.$field)),* }
            };
        }
        pick!(
            tile_root,
            input,
            output,
            include_code,
            include_pattern,
            center_point,
            latlng_field,
            latlng_type,
            province_code_field,
            city_code_field,
            county_code_field,
            town_code_field,
            village_code_field,
            concurrency,
            record_timeout_secs,
            cache_tiles,
        )
    }

    pub fn require_path(field: &'static str, value: &Option<PathBuf>) -> Result<PathBuf> {
        value
            .clone()
            .ok_or_else(|| Error::Config(format!("'{field}' is required")))
    }

    pub fn include(&self) -> Result<IncludeCode> {
        match (&self.include_code, &self.include_pattern) {
            (Some(_), Some(_)) => Err(Error::Config(
                "set either include_code or include_pattern, not both".to_string(),
            )),
            (_, Some(pattern)) => Ok(IncludeCode::Pattern(Regex::new(pattern)?)),
            (Some(code), None) => Ok(IncludeCode::Code(code.trim().to_string())),
            (None, None) => Ok(IncludeCode::default()),
        }
    }

    pub fn batch_options(&self) -> Result<BatchOptions> {
        let latlng_field = self
            .latlng_field
            .clone()
            .ok_or_else(|| Error::Config("'latlng_field' is required".to_string()))?;

        Ok(BatchOptions {
            include: self.include()?,
            center_point: self.center_point.unwrap_or(false),
            latlng_field,
            latlng_type: self.latlng_type.unwrap_or_default(),
            code_fields: CodeFields {
                province: self.province_code_field.clone(),
                city: self.city_code_field.clone(),
                county: self.county_code_field.clone(),
                town: self.town_code_field.clone(),
                village: self.village_code_field.clone(),
            },
            concurrency: self.concurrency.unwrap_or_else(default_concurrency),
            record_timeout: match self.record_timeout_secs.unwrap_or(30) {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        })
    }

    pub fn cache_tiles(&self) -> bool {
        self.cache_tiles.unwrap_or(true)
    }
}
