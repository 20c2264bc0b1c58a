use std::fs;
use std::path::PathBuf;

use tracing::warn;

pub mod user;

pub use user::UserConfig;

pub struct AppConfig;

impl AppConfig {
    pub fn get_config_dir() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        let xdg_dir = home.join(".config").join("songbook");

        // Ensure it exists
        if !xdg_dir.exists() {
            let _ = fs::create_dir_all(&xdg_dir);
        }

        xdg_dir
    }

    pub fn get_config_path() -> PathBuf {
        Self::get_config_dir().join("config.toml")
    }

    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("songbook")
    }

    pub fn get_log_dir() -> PathBuf {
        dirs::cache_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("songbook")
            .join("logs")
    }

    /// Data directory from `config`, falling back to the XDG data dir.
    pub fn data_dir(config: &UserConfig) -> PathBuf {
        config
            .data_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(Self::default_data_dir)
    }

    pub fn default_config_toml() -> String {
        toml::to_string_pretty(&UserConfig::default()).unwrap_or_default()
    }

    /// Loads `config.toml`, writing a default one when missing. A file that
    /// fails to parse yields the defaults.
    pub fn load() -> UserConfig {
        Self::load_from(&Self::get_config_path())
    }

    pub fn load_from(config_path: &std::path::Path) -> UserConfig {
        if config_path.exists() {
            match fs::read_to_string(config_path) {
                Ok(content) => toml::from_str(&content).unwrap_or_else(|e| {
                    warn!(path = %config_path.display(), error = %e, "invalid config, using defaults");
                    UserConfig::default()
                }),
                Err(_) => UserConfig::default(),
            }
        } else {
            // Create default config.toml if missing
            let c = UserConfig::default();
            if let Ok(content) = toml::to_string_pretty(&c) {
                let _ = fs::write(config_path, content);
            }
            c
        }
    }
}
