use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;
use winlama_core::{ModelHost, ModelName};

const APP_NAME: &str = "winlama";
const CONFIG_PATH_VAR: &str = "WINLAMA_CONFIG_PATH";
const CONFIG_FILE_NAME: &str = "config.toml";
const LOG_FILE_NAME: &str = "winlama.log";

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub host: ModelHost,
    #[serde(default)]
    log_file: Option<PathBuf>,
    /// Selected after a listing when the server has it.
    #[serde(default)]
    pub default_model: Option<ModelName>,
}

impl Config {
    /// Load from `path`, then `$WINLAMA_CONFIG_PATH`, then the XDG config directory.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match std::env::var_os(CONFIG_PATH_VAR) {
                Some(path) => path.into(),
                None => base_dirs()?.get_config_file(CONFIG_FILE_NAME),
            },
        };
        Self::from_path(&path)
    }

    /// A missing file gives the defaults.
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Config::default());
        }

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str(&contents)
            .with_context(|| format!("invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn log_file(&self) -> anyhow::Result<PathBuf> {
        match &self.log_file {
            Some(path) => Ok(path.clone()),
            None => Ok(base_dirs()?.place_state_file(LOG_FILE_NAME)?),
        }
    }
}

fn base_dirs() -> anyhow::Result<xdg::BaseDirectories> {
    Ok(xdg::BaseDirectories::with_prefix(APP_NAME)?)
}
