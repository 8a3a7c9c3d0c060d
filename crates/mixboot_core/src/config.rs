//! Boot configuration for discovery and compatibility handling.
//!
//! # Responsibility
//! - Describe where artifacts, mod lists and settings files live.
//! - Carry the tunable scan tables (built-in units, skip fragments,
//!   identifier overrides).
//!
//! # Invariants
//! - Every field has a default, so a partial or absent file is valid.
//! - Relative paths are interpreted against `game_dir`.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Conventional config file location relative to the game directory.
pub const CONFIG_FILE_RELATIVE_PATH: &str = "config/mixboot.json";
/// Settings unit owning the booter's own options.
pub const BOOTER_SETTINGS_UNIT: &str = "mixboot";
/// Boolean option that disables every compatibility check.
pub const COMPAT_OVERRIDE_FIELD: &str = "Override Patch Compatibility Checks";

const DEFAULT_BUILTIN_UNITS: &[&str] = &["minecraft", "mcp", "FML", "forge"];
const DEFAULT_SKIPPED_FRAGMENTS: &[&str] = &[
    "__MACOSX",
    "module-info",
    "org/spongepowered",
    "it/unimi",
    "kotlin",
];
const DEFAULT_OVERRIDES: &[(&str, &str)] = &[
    ("net/jan/moddirector", "moddirector"),
    ("git/jbredwards/jsonpaintings", "jsonpaintings"),
    ("net/optifine", "optifine"),
];

/// One path-fragment rule that hard-assigns a unit identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentifierOverride {
    /// Substring matched against archive entry names.
    pub fragment: String,
    pub unit_id: String,
}

/// Settings unit + field pair for one boolean option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingKey {
    pub unit: String,
    pub field: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootConfig {
    pub game_dir: PathBuf,
    /// Directory holding `<unit>.cfg` settings files.
    pub settings_dir: PathBuf,
    pub artifact_dirs: Vec<PathBuf>,
    pub mod_lists: Vec<PathBuf>,
    /// Units reported present without any artifact declaring them.
    pub builtin_units: Vec<String>,
    pub skipped_entry_fragments: Vec<String>,
    pub identifier_overrides: Vec<IdentifierOverride>,
    pub compat_override: SettingKey,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            game_dir: PathBuf::from("."),
            settings_dir: PathBuf::from("config"),
            artifact_dirs: vec![PathBuf::from("mods"), PathBuf::from("mods/1.12.2")],
            mod_lists: vec![
                PathBuf::from("mods/mod_list.json"),
                PathBuf::from("mods/1.12.2/mod_list.json"),
            ],
            builtin_units: DEFAULT_BUILTIN_UNITS
                .iter()
                .map(|value| value.to_string())
                .collect(),
            skipped_entry_fragments: DEFAULT_SKIPPED_FRAGMENTS
                .iter()
                .map(|value| value.to_string())
                .collect(),
            identifier_overrides: DEFAULT_OVERRIDES
                .iter()
                .map(|(fragment, unit_id)| IdentifierOverride {
                    fragment: fragment.to_string(),
                    unit_id: unit_id.to_string(),
                })
                .collect(),
            compat_override: SettingKey {
                unit: BOOTER_SETTINGS_UNIT.to_string(),
                field: COMPAT_OVERRIDE_FIELD.to_string(),
            },
        }
    }
}

impl BootConfig {
    /// Defaults rooted at `game_dir`.
    pub fn for_game_dir(game_dir: impl Into<PathBuf>) -> Self {
        Self {
            game_dir: game_dir.into(),
            ..Self::default()
        }
    }

    /// Parses a JSON config file. `game_dir` is kept from the file when set,
    /// otherwise it becomes the directory two levels above the file
    /// (`<game>/config/mixboot.json`).
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|err| ConfigError::Io {
            path: path.to_path_buf(),
            source: err,
        })?;
        let mut config: Self = serde_json::from_str(&raw).map_err(|err| ConfigError::Parse {
            path: path.to_path_buf(),
            source: err,
        })?;

        let declares_game_dir = serde_json::from_str::<serde_json::Value>(&raw)
            .map(|value| value.get("game_dir").is_some())
            .unwrap_or(false);
        if !declares_game_dir {
            if let Some(game_dir) = path.parent().and_then(Path::parent) {
                config.game_dir = game_dir.to_path_buf();
            }
        }
        Ok(config)
    }

    /// Loads `<game_dir>/config/mixboot.json` when it exists, defaults otherwise.
    pub fn load_or_default(game_dir: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let game_dir = game_dir.into();
        let path = game_dir.join(CONFIG_FILE_RELATIVE_PATH);
        if !path.is_file() {
            return Ok(Self::for_game_dir(game_dir));
        }
        let mut config = Self::load(&path)?;
        if config.game_dir.is_relative() {
            config.game_dir = game_dir.join(&config.game_dir);
        }
        Ok(config)
    }

    /// Resolves a configured path against `game_dir`.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.game_dir.join(path)
        }
    }

    pub fn settings_dir_path(&self) -> PathBuf {
        self.resolve(&self.settings_dir)
    }

    pub fn artifact_dir_paths(&self) -> Vec<PathBuf> {
        self.artifact_dirs
            .iter()
            .map(|path| self.resolve(path))
            .collect()
    }

    pub fn mod_list_paths(&self) -> Vec<PathBuf> {
        self.mod_lists.iter().map(|path| self.resolve(path)).collect()
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse config `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
        }
    }
}
