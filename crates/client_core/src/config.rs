//! Deployment parameters handed to the view controller at construction.
//!
//! Values come from an optional `hub.toml` and are overridden by `APP__`
//! prefixed environment variables, e.g. `APP__STORE__DATABASE_URL` or
//! `APP__DEPLOYMENT_SCOPE`.

use std::path::Path;

use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::Deserialize;
use shared::domain::DeploymentScope;

use crate::error::HubError;

pub const DEFAULT_CONFIG_FILE: &str = "hub";
const ENV_PREFIX: &str = "APP";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub database_url: String,
    /// Shared secret used to verify pre-issued sign-in tokens.
    pub token_secret: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HubConfig {
    pub store: StoreConfig,
    pub deployment_scope: DeploymentScope,
    pub auth_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawStoreSettings {
    database_url: Option<String>,
    token_secret: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSettings {
    store: RawStoreSettings,
    deployment_scope: Option<String>,
    auth_token: Option<String>,
}

/// Loads settings from `file` (or `hub.*` in the working directory when
/// `None`), layering environment overrides on top.
pub fn load_settings_from(file: Option<&Path>) -> Result<HubConfig, HubError> {
    let builder = match file {
        Some(path) => Config::builder().add_source(File::from(path).required(true)),
        None => Config::builder().add_source(File::with_name(DEFAULT_CONFIG_FILE).required(false)),
    };
    let built = builder
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator(ENV_SEPARATOR)
                .separator(ENV_SEPARATOR),
        )
        .build();
    from_config(built)
}

pub fn from_toml_str(raw: &str) -> Result<HubConfig, HubError> {
    from_config(
        Config::builder()
            .add_source(File::from_str(raw, FileFormat::Toml))
            .build(),
    )
}

fn from_config(built: Result<Config, ConfigError>) -> Result<HubConfig, HubError> {
    let raw = built
        .and_then(|config| config.try_deserialize::<RawSettings>())
        .map_err(|err| HubError::Configuration(err.to_string()))?;
    HubConfig::try_from(raw)
}

impl TryFrom<RawSettings> for HubConfig {
    type Error = HubError;

    fn try_from(raw: RawSettings) -> Result<Self, Self::Error> {
        let database_url =
            non_blank(raw.store.database_url).ok_or(HubError::MissingSetting("store.database_url"))?;
        let deployment_scope =
            non_blank(raw.deployment_scope).ok_or(HubError::MissingSetting("deployment_scope"))?;

        Ok(Self {
            store: StoreConfig {
                database_url,
                token_secret: non_blank(raw.store.token_secret),
            },
            deployment_scope: DeploymentScope::new(deployment_scope),
            auth_token: non_blank(raw.auth_token),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
