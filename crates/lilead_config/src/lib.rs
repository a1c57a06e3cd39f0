//! Configuration for the Lilead backend.
//!
//! Values are layered in this order, later sources winning:
//!
//! 1. `config/default.{toml,yaml,json}`
//! 2. `config/{RUN_ENV}.{toml,yaml,json}` (`RUN_ENV` defaults to `debug`)
//! 3. `LILEAD__SECTION__KEY` environment variables
//! 4. the flat `FIREBASE_*` / `DATABASE_URL` variables (see [`env_vars`])
//!
//! A `.env` file is loaded into the process environment before any of this.

use config::{Config, ConfigError, Environment, File};
use once_cell::sync::OnceCell;
use std::env;
use std::path::PathBuf;
use tracing::debug;

pub mod env_vars;
pub mod models;

pub use models::*;

/// Directory holding `default.*` and `{RUN_ENV}.*` files, overridable with `CONFIG_DIR`.
pub fn config_dir() -> PathBuf {
    env::var("CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config"))
}

/// Loads the application configuration from files and the environment.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    ensure_dotenv_loaded();

    let run_env = env::var("RUN_ENV").unwrap_or_else(|_| "debug".to_string());
    let prefix = env_vars::get_config_prefix();
    load_config_from(&config_dir(), &run_env, &prefix)
}

/// Loads the configuration from an explicit directory and environment name.
pub fn load_config_from(
    dir: &std::path::Path,
    run_env: &str,
    prefix: &str,
) -> Result<AppConfig, ConfigError> {
    let default_path = dir.join("default");
    let env_path = dir.join(run_env);

    debug!(
        "Loading configuration from {} and {}",
        default_path.display(),
        env_path.display()
    );

    let builder = Config::builder()
        .add_source(File::with_name(&default_path.to_string_lossy()).required(false))
        .add_source(File::with_name(&env_path.to_string_lossy()).required(false))
        .add_source(
            Environment::with_prefix(prefix)
                .prefix_separator(env_vars::CONFIG_SEPARATOR)
                .separator(env_vars::CONFIG_SEPARATOR)
                .try_parsing(true),
        );

    let raw_config: AppConfig = builder.build()?.try_deserialize()?;
    Ok(env_vars::apply_legacy_env_overrides(raw_config))
}

static INIT_DOTENV: OnceCell<()> = OnceCell::new();

/// Ensures that the dotenv file is loaded into the environment variables.
///
/// The file defaults to `.env` and can be redirected with `DOTENV_OVERRIDE`.
/// Loading happens at most once per process; the path that was requested is
/// returned either way.
pub fn ensure_dotenv_loaded() -> String {
    let dotenv_path = std::env::var("DOTENV_OVERRIDE").unwrap_or_else(|_| ".env".to_string());

    INIT_DOTENV.get_or_init(|| {
        dotenv::from_filename(&dotenv_path).ok();
    });

    dotenv_path
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_load_config_from_layers_files() {
        let dir = env::temp_dir().join(format!("lilead-config-test-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("default.toml"),
            r#"
[server]
host = "0.0.0.0"
port = 9000

[scheduler]
tick_interval_secs = 60
"#,
        )
        .unwrap();
        fs::write(
            dir.join("staging.toml"),
            r#"
[scheduler]
tick_interval_secs = 15
"#,
        )
        .unwrap();

        let config = load_config_from(&dir, "staging", "LILEAD_TEST_UNUSED").unwrap();

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.scheduler.tick_interval_secs, 15);
        assert_eq!(config.scheduler.gateway_timeout_secs, 10);

        fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_load_config_without_files_uses_defaults() {
        let dir = env::temp_dir().join("lilead-config-test-missing");
        let config = load_config_from(&dir, "debug", "LILEAD_TEST_UNUSED").unwrap();

        assert_eq!(config.server.port, 8086);
        assert!(config.scheduler.enabled);
    }
}
