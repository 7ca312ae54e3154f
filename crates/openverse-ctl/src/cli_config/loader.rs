//! Config file discovery and loading for `.openverse-ctl.toml`.
//!
//! Checks two locations in precedence order:
//! 1. `./.openverse-ctl.toml` (project-local)
//! 2. `~/.config/openverse-ctl.toml` (user-global)

use std::path::{Path, PathBuf};

use super::CliConfig;

const CONFIG_FILENAME: &str = ".openverse-ctl.toml";
const GLOBAL_CONFIG_DIR: &str = ".config";
const GLOBAL_CONFIG_FILENAME: &str = "openverse-ctl.toml";

/// Load config from the first discovered location, or return defaults.
pub(crate) fn load_cli_config() -> CliConfig {
    find_config_file(Path::new("."), home_dir().as_deref())
        .and_then(|path| load_from(&path))
        .unwrap_or_default()
}

fn load_from(path: &Path) -> Option<CliConfig> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) => {
            tracing::warn!(?path, error = %e, "Failed to read CLI config, using defaults");
            return None;
        }
    };
    match toml::from_str(&contents) {
        Ok(config) => {
            tracing::debug!(?path, "Loaded CLI config");
            Some(config)
        }
        Err(e) => {
            tracing::warn!(?path, error = %e, "Failed to parse CLI config, using defaults");
            None
        }
    }
}

fn find_config_file(work_dir: &Path, home: Option<&Path>) -> Option<PathBuf> {
    let local = work_dir.join(CONFIG_FILENAME);
    if local.is_file() {
        return Some(local);
    }

    let global = home?.join(GLOBAL_CONFIG_DIR).join(GLOBAL_CONFIG_FILENAME);
    global.is_file().then_some(global)
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CliConfig::default();
        assert!(config.generate.openverse_api_url.is_none());
        assert!(config.generate.models.is_none());
        assert!(config.maintenance.orchestrator_url.is_none());
    }

    #[test]
    fn test_parse_config_toml() {
        let toml_str = r#"
[generate]
openverse-api-url = "http://localhost:50280"
output-dir = "./packages/js/api-client/src/generated"
models = ["Tag", "Image"]

[maintenance]
orchestrator-url = "http://localhost:9090"
orchestrator-username = "airflow"
poll-interval-seconds = 30
"#;
        let config: CliConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.generate.openverse_api_url.as_deref(),
            Some("http://localhost:50280")
        );
        assert_eq!(config.generate.models.unwrap(), vec!["Tag", "Image"]);
        assert_eq!(config.maintenance.poll_interval_seconds, Some(30));
        assert!(config.maintenance.table.is_none());
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: CliConfig = toml::from_str("[generate]\noutput-dir = \"gen\"\n").unwrap();
        assert_eq!(config.generate.output_dir.as_deref(), Some("gen"));
        assert!(config.maintenance.orchestrator_url.is_none());
    }

    #[test]
    fn test_local_config_wins() {
        let work = tempfile::tempdir().unwrap();
        let home = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(home.path().join(GLOBAL_CONFIG_DIR)).unwrap();
        std::fs::write(
            home.path().join(GLOBAL_CONFIG_DIR).join(GLOBAL_CONFIG_FILENAME),
            "",
        )
        .unwrap();

        let found = find_config_file(work.path(), Some(home.path())).unwrap();
        assert!(found.ends_with("openverse-ctl.toml"));
        assert!(found.starts_with(home.path()));

        std::fs::write(work.path().join(CONFIG_FILENAME), "").unwrap();
        let found = find_config_file(work.path(), Some(home.path())).unwrap();
        assert_eq!(found, work.path().join(CONFIG_FILENAME));
    }

    #[test]
    fn test_no_config_file() {
        let work = tempfile::tempdir().unwrap();
        assert!(find_config_file(work.path(), None).is_none());
    }

    #[test]
    fn test_unparsable_config_falls_back() {
        let work = tempfile::tempdir().unwrap();
        let path = work.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "[generate\n").unwrap();
        assert!(load_from(&path).is_none());
    }
}
