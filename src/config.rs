//! Host configuration parsed from environment variables.

use std::path::PathBuf;

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

pub const DEFAULT_DATA_DIR: &str = ".deskcraft";
pub const DEFAULT_EXPORT_DIR: &str = ".";
pub const DEFAULT_CANVAS_WIDTH: f64 = 1200.0;
pub const DEFAULT_CANVAS_HEIGHT: f64 = 800.0;

/// Parse an environment variable, falling back to `default` when it is
/// missing or does not parse.
pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeskConfig {
    /// Directory holding the key-value slots.
    pub data_dir: PathBuf,
    /// Directory exports are written into.
    pub export_dir: PathBuf,
    pub canvas_width: f64,
    pub canvas_height: f64,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            export_dir: PathBuf::from(DEFAULT_EXPORT_DIR),
            canvas_width: DEFAULT_CANVAS_WIDTH,
            canvas_height: DEFAULT_CANVAS_HEIGHT,
        }
    }
}

impl DeskConfig {
    /// Build config from environment variables.
    ///
    /// Optional:
    /// - `DESK_DATA_DIR`: default `.deskcraft`
    /// - `DESK_EXPORT_DIR`: default current directory
    /// - `DESK_CANVAS_WIDTH`: default 1200
    /// - `DESK_CANVAS_HEIGHT`: default 800
    ///
    /// Non-positive canvas dimensions fall back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let width = env_parse("DESK_CANVAS_WIDTH", defaults.canvas_width);
        let height = env_parse("DESK_CANVAS_HEIGHT", defaults.canvas_height);
        Self {
            data_dir: env_parse("DESK_DATA_DIR", defaults.data_dir),
            export_dir: env_parse("DESK_EXPORT_DIR", defaults.export_dir),
            canvas_width: if width > 0.0 { width } else { DEFAULT_CANVAS_WIDTH },
            canvas_height: if height > 0.0 { height } else { DEFAULT_CANVAS_HEIGHT },
        }
    }
}
