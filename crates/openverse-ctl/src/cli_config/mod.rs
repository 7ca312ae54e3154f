//! `openverse-ctl` configuration file.
//!
//! Every value is optional. Command-line flags and environment variables
//! take precedence over the file; built-in defaults apply last.

pub(crate) mod loader;

pub(crate) use loader::load_cli_config;

use serde::Deserialize;

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct CliConfig {
    #[serde(default)]
    pub generate: GenerateConfig,

    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

/// `[generate]` table.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct GenerateConfig {
    pub openverse_api_url: Option<String>,
    pub output_dir: Option<String>,
    pub models: Option<Vec<String>>,
}

/// `[maintenance]` table.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub(crate) struct MaintenanceConfig {
    pub orchestrator_url: Option<String>,
    pub orchestrator_username: Option<String>,
    pub poll_interval_seconds: Option<u64>,
    pub table: Option<String>,
}
