//! # Tree Configuration
//!
//! [`TreeOptions`] controls behavior that callers tune per form rather
//! than per schema: when validation runs, whether transformed errors get
//! sequence keys, which render hints are hidden from the validator, and
//! whether local `$ref`s are resolved.
//!
//! Options load from YAML or JSON (YAML is a superset) and can be
//! overridden from the environment:
//!
//! | Variable | Field |
//! |----------|-------|
//! | `FORMTREE_VALIDATION_MODE` | `validation_mode` (`none`, `on_change`, `on_request`) |
//! | `FORMTREE_ASSIGN_ERROR_KEYS` | `assign_error_keys` (`true` / `false`) |

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable overriding [`TreeOptions::validation_mode`].
pub const ENV_VALIDATION_MODE: &str = "FORMTREE_VALIDATION_MODE";

/// Environment variable overriding [`TreeOptions::assign_error_keys`].
pub const ENV_ASSIGN_ERROR_KEYS: &str = "FORMTREE_ASSIGN_ERROR_KEYS";

/// When the tree runs its validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationMode {
    /// Never validate automatically; `validate()` still works.
    None,
    /// Validate after every committed change.
    #[default]
    OnChange,
    /// Validate only when the caller asks.
    OnRequest,
}

impl ValidationMode {
    /// Whether a committed change should trigger validation.
    pub fn validates_on_change(&self) -> bool {
        matches!(self, Self::OnChange)
    }
}

impl std::str::FromStr for ValidationMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "on_change" | "onchange" => Ok(Self::OnChange),
            "on_request" | "onrequest" => Ok(Self::OnRequest),
            other => Err(ConfigError::InvalidEnv {
                variable: ENV_VALIDATION_MODE.to_string(),
                value: other.to_string(),
            }),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_stripped_hint_keys() -> Vec<String> {
    [
        "FormTypeInput",
        "FormTypeInputProps",
        "FormTypeRenderer",
        "FormTypeRendererProps",
        "formType",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Options for building and running a schema node tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeOptions {
    /// When validation runs.
    #[serde(default)]
    pub validation_mode: ValidationMode,
    /// Attach monotonically increasing keys to transformed errors.
    #[serde(default = "default_true")]
    pub assign_error_keys: bool,
    /// Render-only schema keys removed before validation.
    #[serde(default = "default_stripped_hint_keys")]
    pub stripped_hint_keys: Vec<String>,
    /// Resolve local `#/...` references during normalization.
    #[serde(default = "default_true")]
    pub resolve_references: bool,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            validation_mode: ValidationMode::default(),
            assign_error_keys: true,
            stripped_hint_keys: default_stripped_hint_keys(),
            resolve_references: true,
        }
    }
}

impl TreeOptions {
    /// Parse options from YAML or JSON text. Missing fields take defaults.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Parse` if the text is malformed.
    pub fn from_yaml_str(text: &str) -> Result<Self, ConfigError> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }

    /// Load options from a YAML or JSON file.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Io` if the file cannot be read, or
    /// `ConfigError::Parse` if it is malformed.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    /// Apply environment overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnv` if a variable holds an
    /// unrecognized value.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    /// Apply overrides from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidEnv` if a variable holds an
    /// unrecognized value.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(mode) = lookup(ENV_VALIDATION_MODE) {
            self.validation_mode = mode.parse()?;
        }
        if let Some(flag) = lookup(ENV_ASSIGN_ERROR_KEYS) {
            self.assign_error_keys = match flag.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => true,
                "false" | "0" => false,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        variable: ENV_ASSIGN_ERROR_KEYS.to_string(),
                        value: flag,
                    })
                }
            };
        }
        tracing::debug!(
            validation_mode = ?self.validation_mode,
            assign_error_keys = self.assign_error_keys,
            "tree options resolved"
        );
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = TreeOptions::default();
        assert_eq!(opts.validation_mode, ValidationMode::OnChange);
        assert!(opts.assign_error_keys);
        assert!(opts.resolve_references);
        assert!(opts.stripped_hint_keys.contains(&"FormTypeInput".to_string()));
    }

    #[test]
    fn test_yaml_partial_uses_defaults() {
        let opts = TreeOptions::from_yaml_str("validation_mode: on_request\n").unwrap();
        assert_eq!(opts.validation_mode, ValidationMode::OnRequest);
        assert!(opts.assign_error_keys);
        assert_eq!(opts.stripped_hint_keys, default_stripped_hint_keys());
    }

    #[test]
    fn test_json_is_accepted() {
        let opts =
            TreeOptions::from_yaml_str(r#"{"assign_error_keys": false, "stripped_hint_keys": []}"#)
                .unwrap();
        assert!(!opts.assign_error_keys);
        assert!(opts.stripped_hint_keys.is_empty());
    }

    #[test]
    fn test_empty_text_is_default() {
        assert_eq!(TreeOptions::from_yaml_str("  \n").unwrap(), TreeOptions::default());
    }

    #[test]
    fn test_malformed_yaml_rejected() {
        let err = TreeOptions::from_yaml_str("validation_mode: [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_unknown_mode_rejected() {
        let err = TreeOptions::from_yaml_str("validation_mode: sometimes").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_overrides_apply() {
        let opts = TreeOptions::default()
            .with_overrides(|name| match name {
                ENV_VALIDATION_MODE => Some("none".to_string()),
                ENV_ASSIGN_ERROR_KEYS => Some("FALSE".to_string()),
                _ => None,
            })
            .unwrap();
        assert_eq!(opts.validation_mode, ValidationMode::None);
        assert!(!opts.assign_error_keys);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let err = TreeOptions::default()
            .with_overrides(|name| (name == ENV_ASSIGN_ERROR_KEYS).then(|| "maybe".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnv { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = TreeOptions::from_path("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
