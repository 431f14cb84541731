// Site profiles: everything that differs between deployments of the crawler

use crate::schema::SchemaMapping;
use floorwalk_scanner::{Pacing, RecordPolicy, SiteSelectors};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_EXPORT_FILE: &str = "floorwalk_brands.csv";

const DIRECTORY_URL: &str = "https://www.ssgdfs.com/kr/customer/initCtStor";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read profile {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid profile: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to render profile: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("Unknown profile '{0}' (expected t1, t2 or a .toml file)")]
    UnknownProfile(String),

    #[error("Profile '{name}' has no {field}")]
    Missing { name: String, field: &'static str },
}

/// Selectors, pacing, record policy and destination schema for one site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    pub name: String,
    pub start_url: String,
    pub export_file: String,
    pub record_policy: RecordPolicy,
    pub selectors: SiteSelectors,
    pub pacing: Pacing,
    pub schema: SchemaMapping,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self::t1()
    }
}

fn directory_url(store_tab: &str) -> String {
    format!("{}?tab_no=2&tab_stor_no={}", DIRECTORY_URL, store_tab)
}

impl SiteProfile {
    pub const PRESETS: [&'static str; 2] = ["t1", "t2"];

    /// Store tab 10, Korean column names, every item kept.
    pub fn t1() -> Self {
        Self {
            name: "t1".to_string(),
            start_url: directory_url("10"),
            export_file: DEFAULT_EXPORT_FILE.to_string(),
            record_policy: RecordPolicy::Always,
            selectors: SiteSelectors::default(),
            pacing: Pacing::default(),
            schema: SchemaMapping::korean("brands"),
        }
    }

    /// Store tab 07, English column names, unnamed items dropped.
    pub fn t2() -> Self {
        Self {
            name: "t2".to_string(),
            start_url: directory_url("07"),
            record_policy: RecordPolicy::RequireBrandName,
            schema: SchemaMapping::english("brand2"),
            ..Self::t1()
        }
    }

    pub fn preset(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "t1" => Some(Self::t1()),
            "t2" => Some(Self::t2()),
            _ => None,
        }
    }

    /// Parse a TOML profile. Keys left out fall back to `t1`; a `base`
    /// key picks another preset to fall back to.
    pub fn from_toml(source: &str) -> Result<Self, ConfigError> {
        #[derive(Deserialize)]
        struct Base {
            base: Option<String>,
        }

        let base = toml::from_str::<Base>(source)?.base;
        let profile: SiteProfile = match base {
            Some(name) => {
                let preset = Self::preset(&name).ok_or(ConfigError::UnknownProfile(name))?;
                let mut merged = toml::Table::try_from(&preset)?;
                let overrides: toml::Table = toml::from_str(source)?;
                merge_tables(&mut merged, overrides);
                merged.remove("base");
                merged.try_into()?
            }
            None => toml::from_str(source)?,
        };
        profile.validate()
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut profile = Self::from_toml(&source)?;
        if profile.name.is_empty() || Self::PRESETS.contains(&profile.name.as_str()) {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                profile.name = stem.to_string();
            }
        }
        Ok(profile)
    }

    /// A preset name or a path to a TOML profile.
    pub fn resolve(spec: &str) -> Result<Self, ConfigError> {
        if let Some(profile) = Self::preset(spec) {
            return Ok(profile);
        }
        let path = Path::new(spec);
        if path.extension().is_some_and(|ext| ext == "toml") || path.exists() {
            return Self::load(path);
        }
        Err(ConfigError::UnknownProfile(spec.to_string()))
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    fn validate(self) -> Result<Self, ConfigError> {
        let missing = |field| ConfigError::Missing {
            name: self.name.clone(),
            field,
        };
        if self.start_url.trim().is_empty() {
            return Err(missing("start_url"));
        }
        if self.schema.table.trim().is_empty() {
            return Err(missing("schema.table"));
        }
        if self.schema.id_column.trim().is_empty() {
            return Err(missing("schema.id_column"));
        }
        Ok(self)
    }
}

fn merge_tables(base: &mut toml::Table, overrides: toml::Table) {
    for (key, value) in overrides {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(existing)), toml::Value::Table(nested)) => {
                merge_tables(existing, nested);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}
