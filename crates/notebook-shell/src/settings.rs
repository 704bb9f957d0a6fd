//! Shell settings persistence.
//!
//! Settings are stored in a JSON file in the user's config directory:
//! - macOS: ~/Library/Application Support/notebook-shell/settings.json
//! - Linux: ~/.config/notebook-shell/settings.json
//! - Windows: C:\Users\<User>\AppData\Roaming\notebook-shell\settings.json

use crate::document_cache::CacheLimits;
use anyhow::Result;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Budget for the in-memory document cache
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Maximum number of open buffers kept in memory
    pub max_entries: usize,

    /// Maximum total size of open buffers, in bytes
    #[serde(deserialize_with = "deserialize_byte_size")]
    pub max_bytes: usize,
}

impl Default for CacheSettings {
    fn default() -> Self {
        let limits = CacheLimits::default();
        Self {
            max_entries: limits.max_entries,
            max_bytes: limits.max_bytes,
        }
    }
}

impl From<CacheSettings> for CacheLimits {
    fn from(settings: CacheSettings) -> Self {
        CacheLimits {
            max_entries: settings.max_entries.max(1),
            max_bytes: settings.max_bytes,
        }
    }
}

/// Settings for the notebook shell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellSettings {
    pub cache: CacheSettings,

    /// Delay between the last cell edit and the notebook being written to disk
    pub save_debounce_ms: u64,
}

impl Default for ShellSettings {
    fn default() -> Self {
        Self {
            cache: CacheSettings::default(),
            save_debounce_ms: 500,
        }
    }
}

impl ShellSettings {
    pub fn cache_limits(&self) -> CacheLimits {
        self.cache.into()
    }

    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }
}

/// Deserialize a byte count that accepts both:
/// - A plain number: `67108864`
/// - A human size: `"64MB"`, `"512 KiB"`, `"1gb"`
fn deserialize_byte_size<'de, D>(deserializer: D) -> std::result::Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de;

    struct ByteSizeVisitor;

    impl<'de> de::Visitor<'de> for ByteSizeVisitor {
        type Value = usize;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a byte count or a size string like \"64MB\"")
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<usize, E> {
            usize::try_from(v).map_err(E::custom)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<usize, E> {
            usize::try_from(v).map_err(E::custom)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<usize, E> {
            parse_byte_size(v).ok_or_else(|| E::custom(format!("invalid size: {:?}", v)))
        }
    }

    deserializer.deserialize_any(ByteSizeVisitor)
}

fn parse_byte_size(input: &str) -> Option<usize> {
    let input = input.trim();
    let split = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let (digits, unit) = input.split_at(split);
    let value: usize = digits.parse().ok()?;

    let multiplier: usize = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" | "kib" => 1024,
        "m" | "mb" | "mib" => 1024 * 1024,
        "g" | "gb" | "gib" => 1024 * 1024 * 1024,
        _ => return None,
    };
    value.checked_mul(multiplier)
}

/// Get the path to the settings file
fn settings_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("notebook-shell")
        .join("settings.json")
}

/// Load settings from disk, returning defaults if file doesn't exist
pub fn load_settings() -> ShellSettings {
    load_settings_from(&settings_path())
}

/// Load settings from `path`, returning defaults if it is missing or unreadable
pub fn load_settings_from(path: &Path) -> ShellSettings {
    if path.exists() {
        std::fs::read_to_string(path)
            .ok()
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    } else {
        ShellSettings::default()
    }
}

/// Save settings to disk
pub fn save_settings(settings: &ShellSettings) -> Result<()> {
    save_settings_to(&settings_path(), settings)
}

pub fn save_settings_to(path: &Path, settings: &ShellSettings) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(settings)?)?;
    Ok(())
}
