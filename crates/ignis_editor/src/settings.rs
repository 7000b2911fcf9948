// SPDX-License-Identifier: MIT OR Apache-2.0
//! Editor settings, stored as RON.

use ignis_blueprint::InterpreterConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Current settings format version
pub const SETTINGS_FORMAT_VERSION: u32 = 1;

/// Default settings file name
pub const SETTINGS_FILE_NAME: &str = "ignis.ron";

/// Settings errors
#[derive(Debug, Error)]
pub enum SettingsError {
    /// File could not be read or written
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File is not valid settings RON
    #[error("Parse error: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Settings could not be serialized
    #[error("Serialization error: {0}")]
    Serialize(#[from] ron::Error),

    /// File was written by a newer editor
    #[error("Settings version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version in the file
        found: u32,
        /// Newest version this build reads
        supported: u32,
    },
}

/// Code generation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodegenSettings {
    /// Class name used when none is given
    pub default_class_name: String,
}

impl Default for CodegenSettings {
    fn default() -> Self {
        Self {
            default_class_name: "GeneratedBlueprint".to_string(),
        }
    }
}

/// Interpreter settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterSettings {
    /// Exec nodes one run may execute; `None` disables the limit
    pub max_steps: Option<u64>,
}

impl Default for InterpreterSettings {
    fn default() -> Self {
        Self {
            max_steps: InterpreterConfig::default().max_steps,
        }
    }
}

impl InterpreterSettings {
    /// Interpreter configuration for these settings
    pub fn config(&self) -> InterpreterConfig {
        InterpreterConfig {
            max_steps: self.max_steps,
        }
    }
}

/// Undo history settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistorySettings {
    /// Maximum number of undoable edits kept
    pub max_depth: usize,
}

impl Default for HistorySettings {
    fn default() -> Self {
        Self {
            max_depth: crate::history::DEFAULT_MAX_DEPTH,
        }
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "ignis_editor=info,ignis_blueprint=info".to_string(),
        }
    }
}

/// Complete editor settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditorSettings {
    /// Settings format version
    pub version: u32,
    /// Code generation
    #[serde(default)]
    pub codegen: CodegenSettings,
    /// Interpreter
    #[serde(default)]
    pub interpreter: InterpreterSettings,
    /// Undo history
    #[serde(default)]
    pub history: HistorySettings,
    /// Logging
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_FORMAT_VERSION,
            codegen: CodegenSettings::default(),
            interpreter: InterpreterSettings::default(),
            history: HistorySettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl EditorSettings {
    /// Load settings from a file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "Settings file not found, using defaults");
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        Self::from_ron(&content)
    }

    /// Parse settings from RON text
    pub fn from_ron(content: &str) -> Result<Self, SettingsError> {
        let settings: EditorSettings = ron::from_str(content)?;

        // Version check
        if settings.version > SETTINGS_FORMAT_VERSION {
            return Err(SettingsError::UnsupportedVersion {
                found: settings.version,
                supported: SETTINGS_FORMAT_VERSION,
            });
        }

        Ok(settings)
    }

    /// Save settings to a file
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let config = ron::ser::PrettyConfig::default()
            .struct_names(true)
            .enumerate_arrays(false);

        let content = ron::ser::to_string_pretty(self, config)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = EditorSettings::default();
        assert_eq!(settings.version, SETTINGS_FORMAT_VERSION);
        assert_eq!(settings.codegen.default_class_name, "GeneratedBlueprint");
        assert_eq!(settings.interpreter.max_steps, Some(100_000));
        assert_eq!(settings.history.max_depth, 100);
    }

    #[test]
    fn test_serialization() {
        let mut settings = EditorSettings::default();
        settings.interpreter.max_steps = None;
        let ron_str = ron::ser::to_string_pretty(&settings, ron::ser::PrettyConfig::default()).unwrap();
        let loaded = EditorSettings::from_ron(&ron_str).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let loaded = EditorSettings::from_ron("(version: 1, history: (max_depth: 5))").unwrap();
        assert_eq!(loaded.history.max_depth, 5);
        assert_eq!(loaded.codegen, CodegenSettings::default());
    }

    #[test]
    fn test_newer_version_rejected() {
        let err = EditorSettings::from_ron("(version: 99)").unwrap_err();
        assert!(matches!(err, SettingsError::UnsupportedVersion { found: 99, .. }));
    }

    #[test]
    fn test_save_and_load() {
        let path = std::env::temp_dir().join(format!("ignis-settings-{}.ron", uuid::Uuid::new_v4()));
        assert_eq!(EditorSettings::load(&path).unwrap(), EditorSettings::default());

        let mut settings = EditorSettings::default();
        settings.codegen.default_class_name = "PlayerLogic".to_string();
        settings.save(&path).unwrap();

        let loaded = EditorSettings::load(&path).unwrap();
        let _ = std::fs::remove_file(&path);
        assert_eq!(loaded.codegen.default_class_name, "PlayerLogic");
    }
}
