use std::path::PathBuf;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::adapter::ephemeris::Observer;
use crate::adapter::meteocat::Meteocat;
use crate::runner::RefreshSettings;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub meteocat: Meteocat,
    pub observer: Observer,
    pub storage: StorageSettings,
    #[serde(default)]
    pub refresh: RefreshSettings,
    /// Seeds the quota ledger on first start; ignored once a ledger exists.
    #[serde(default)]
    pub quota_plans: Vec<QuotaPlanSeed>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct QuotaPlanSeed {
    pub name: String,
    #[serde(default)]
    pub period: String,
    pub max_calls: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageSettings {
    pub snapshot_dir: PathBuf,
    pub quota_ledger_file: PathBuf,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let builder = Config::builder()
            .add_source(File::with_name("config.toml"))
            .add_source(Environment::default().separator("_").list_separator(","));

        let s = builder.build()?;
        s.try_deserialize()
    }
}
