use serde::{Deserialize, Serialize};

use crate::library::LibrarySortMode;

/// User-editable configuration (read-only after load)
/// stored in `config.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserConfig {
    /// Where persisted collections live (defaults to the XDG data dir)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Song catalog document; the bundled catalog when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_path: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Display order for libraries that never picked one
    #[serde(default)]
    pub default_sort_mode: LibrarySortMode,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            catalog_path: None,
            log_level: default_log_level(),
            default_sort_mode: LibrarySortMode::default(),
        }
    }
}
