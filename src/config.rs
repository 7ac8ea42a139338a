use crate::game::GameType;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub game_type: GameType,
    /// Board manager base URL; the websocket feed is derived from it.
    pub base_url: String,
    pub turn_timeout_secs: f64,
    /// Practice log destination; resolved under the app data dir when unset.
    pub training_log: Option<PathBuf>,
    /// Open the scoring website in the default browser on startup.
    pub open_scoreboard: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            game_type: GameType::FiveOhOne,
            base_url: "http://127.0.0.1:3180".to_string(),
            turn_timeout_secs: 3.0,
            training_log: None,
            open_scoreboard: false,
        }
    }
}

impl Config {
    /// Base URL with the `AUTODARTS_BASE_URL` environment override applied.
    /// Values pasted from shell configs often carry quotes; strip them.
    pub fn effective_base_url(&self) -> String {
        std::env::var("AUTODARTS_BASE_URL")
            .ok()
            .map(|raw| raw.trim().trim_matches(&['"', '\''][..]).to_string())
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| self.base_url.clone())
    }
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = if let Some(pd) = ProjectDirs::from("", "", "dartbridge") {
            pd.config_dir().join("config.json")
        } else {
            PathBuf::from("dartbridge_config.json")
        };
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            if let Ok(cfg) = serde_json::from_slice::<Config>(&bytes) {
                return cfg;
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg)?;
        fs::write(&self.path, data)
    }
}
