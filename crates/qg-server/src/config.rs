use std::path::Path;

use serde::Deserialize;

/// Server configuration (§6 ambient stack), loaded the way `control`
/// loads its settings: a base file, an environment-specific overlay, then
/// environment variables — but through the modern `config` builder API.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub application: ApplicationSettings,
    pub metadata: MetadataSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApplicationSettings {
    pub host: String,
    pub port: u16,
}

impl ApplicationSettings {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetadataSettings {
    pub catalog_path: String,
    pub roles_path: String,
    #[serde(default)]
    pub trino_enabled: bool,
}

pub fn app_env() -> String {
    std::env::var("APP_ENV").unwrap_or_else(|_| "development".into())
}

/// Loads settings from `<config_dir>/base.{yaml,toml,json}`, an optional
/// `<config_dir>/<app_env>` overlay, and `QG__`-prefixed environment
/// variables, in that order.
pub fn load_settings(config_dir: impl AsRef<Path>) -> Result<Settings, config::ConfigError> {
    let config_dir = config_dir.as_ref();
    config::Config::builder()
        .add_source(config::File::from(config_dir.join("base")).required(true))
        .add_source(config::File::from(config_dir.join(app_env())).required(false))
        .add_source(config::Environment::with_prefix("QG").separator("__"))
        .build()?
        .try_deserialize()
}
