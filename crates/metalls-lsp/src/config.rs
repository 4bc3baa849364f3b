//! Server configuration.
//!
//! Settings arrive in `initialize.initializationOptions` and are replaced
//! wholesale by `workspace/didChangeConfiguration`. Unknown keys are ignored;
//! a malformed payload falls back to the defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Configuration for the language server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Program used to check sources.
    pub compiler_path: String,
    /// Arguments placed before the standard compiler flags.
    pub compiler_args: Vec<String>,
    /// Extra include directories. Relative entries resolve against the workspace root.
    pub include_paths: Vec<String>,
    /// External formatter program.
    pub formatter_path: String,
    /// Master switch for compiler diagnostics.
    pub diagnostics: bool,
    /// Also validate on every `didChange`, not only on open and save.
    pub diagnostics_on_change: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            compiler_path: "xcrun".to_string(),
            compiler_args: vec!["-sdk".to_string(), "macosx".to_string(), "metal".to_string()],
            include_paths: Vec::new(),
            formatter_path: "clang-format".to_string(),
            diagnostics: true,
            diagnostics_on_change: false,
        }
    }
}

impl Config {
    /// Build a config from client-provided JSON.
    ///
    /// Accepts either the settings object itself or one nested under a
    /// `metal` key (the shape `didChangeConfiguration` usually carries).
    pub fn from_json(value: Option<&serde_json::Value>) -> Self {
        let Some(value) = value else {
            return Self::default();
        };
        if value.is_null() {
            return Self::default();
        }
        let settings = value.get("metal").unwrap_or(value);
        match serde_json::from_value(settings.clone()) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Invalid configuration, using defaults: {}", e);
                Self::default()
            }
        }
    }

    /// Include directories resolved against `root`.
    pub fn resolved_include_paths(&self, root: Option<&Path>) -> Vec<PathBuf> {
        self.include_paths
            .iter()
            .map(|p| {
                let path = PathBuf::from(p);
                match root {
                    Some(root) if path.is_relative() => root.join(path),
                    _ => path,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_defaults() {
        let config = Config::from_json(None);
        assert_eq!(config.compiler_path, "xcrun");
        assert_eq!(config.compiler_args, vec!["-sdk", "macosx", "metal"]);
        assert!(config.diagnostics);
        assert!(!config.diagnostics_on_change);
    }

    #[test]
    fn test_partial_settings_keep_defaults() {
        let config = Config::from_json(Some(&json!({
            "includePaths": ["Shaders/Include"],
            "diagnosticsOnChange": true,
            "somethingElse": 1
        })));
        assert_eq!(config.include_paths, vec!["Shaders/Include"]);
        assert!(config.diagnostics_on_change);
        assert_eq!(config.formatter_path, "clang-format");
    }

    #[test]
    fn test_nested_under_metal_key() {
        let config = Config::from_json(Some(&json!({ "metal": { "diagnostics": false } })));
        assert!(!config.diagnostics);
    }

    #[test]
    fn test_malformed_falls_back() {
        let config = Config::from_json(Some(&json!({ "compilerArgs": "not a list" })));
        assert_eq!(config, Config::default());
    }

    #[cfg(unix)]
    #[test]
    fn test_resolved_include_paths() {
        let config = Config {
            include_paths: vec!["inc".to_string(), "/abs".to_string()],
            ..Config::default()
        };
        let resolved = config.resolved_include_paths(Some(Path::new("/proj")));
        assert_eq!(resolved, vec![PathBuf::from("/proj/inc"), PathBuf::from("/abs")]);
    }
}
