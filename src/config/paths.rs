//! Where settings and saved reports live, resolved with the `dirs` crate.
//!
//! | Kind | Linux | macOS | Windows |
//! |------|-------|-------|---------|
//! | settings | `~/.config/voice-quality/settings.toml` | `~/Library/Application Support/voice-quality/settings.toml` | `%APPDATA%\voice-quality\settings.toml` |
//! | reports | `~/.local/share/voice-quality/reports/` | `~/Library/Application Support/voice-quality/reports/` | `%LOCALAPPDATA%\voice-quality\reports\` |

use std::path::PathBuf;

const APP_DIR: &str = "voice-quality";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub settings_file: PathBuf,
    /// Default destination of report JSON files.
    pub reports_dir: PathBuf,
}

impl AppPaths {
    /// Platform directories, or the working directory where the platform
    /// has none.
    pub fn new() -> Self {
        let base = |dir: Option<PathBuf>| dir.unwrap_or_else(|| PathBuf::from(".")).join(APP_DIR);
        Self::rooted(base(dirs::config_dir()), base(dirs::data_local_dir()))
    }

    /// Paths under explicit config and data roots.
    pub fn rooted(config_dir: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            settings_file: config_dir.join("settings.toml"),
            config_dir,
            reports_dir: data_dir.join("reports"),
        }
    }

    /// Report file for a session id.  Characters that are unsafe in file
    /// names are replaced with `_`.
    pub fn report_file(&self, session_id: &str) -> PathBuf {
        let stem: String = session_id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let stem = if stem.trim_matches('.').is_empty() {
            "session".to_string()
        } else {
            stem
        };
        self.reports_dir.join(format!("{stem}.json"))
    }
}

impl Default for AppPaths {
    fn default() -> Self {
        Self::new()
    }
}
