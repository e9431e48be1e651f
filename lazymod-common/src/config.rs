// lazymod-common/src/config.rs
use std::env;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::{ModuleError, Result};

const ENV_TRACK_CIRCULAR: &str = "LAZYMOD_TRACK_CIRCULAR_DEPENDENCIES";
const ENV_ALLOW_MULTIPLE: &str = "LAZYMOD_ALLOW_MULTIPLE_DECLARATIONS";
const ENV_ALLOW_OVERRIDE: &str = "LAZYMOD_ALLOW_DEPENDENCIES_OVERRIDE";
const ENV_STRICT_CIRCULAR: &str = "LAZYMOD_STRICT_CIRCULAR_DEPENDENCIES";

/// Engine behaviour switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Options {
    /// Detect wait-cycles through the resolution path. When off, a cycle never settles.
    pub track_circular_dependencies: bool,
    /// Allow `define` to be called again for an already defined name.
    pub allow_multiple_declarations: bool,
    /// Allow dependency specs carrying an overrides map.
    pub allow_dependencies_override: bool,
    /// Report a detected cycle as an error right away instead of on read.
    pub strict_circular_dependencies: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            track_circular_dependencies: true,
            allow_multiple_declarations: true,
            allow_dependencies_override: true,
            strict_circular_dependencies: false,
        }
    }
}

/// Partial set of options, merged into the current ones by `set_options`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OptionsUpdate {
    pub track_circular_dependencies: Option<bool>,
    pub allow_multiple_declarations: Option<bool>,
    pub allow_dependencies_override: Option<bool>,
    pub strict_circular_dependencies: Option<bool>,
}

impl Options {
    /// Defaults overlaid with the `LAZYMOD_*` environment variables.
    pub fn load() -> Result<Self> {
        debug!("Loading lazymod options from environment");

        let update = OptionsUpdate {
            track_circular_dependencies: env_flag(ENV_TRACK_CIRCULAR)?,
            allow_multiple_declarations: env_flag(ENV_ALLOW_MULTIPLE)?,
            allow_dependencies_override: env_flag(ENV_ALLOW_OVERRIDE)?,
            strict_circular_dependencies: env_flag(ENV_STRICT_CIRCULAR)?,
        };

        let mut options = Self::default();
        options.merge(update);
        debug!("Effective options: {:?}", options);
        Ok(options)
    }

    pub fn merge(&mut self, update: OptionsUpdate) {
        if let Some(v) = update.track_circular_dependencies {
            self.track_circular_dependencies = v;
        }
        if let Some(v) = update.allow_multiple_declarations {
            self.allow_multiple_declarations = v;
        }
        if let Some(v) = update.allow_dependencies_override {
            self.allow_dependencies_override = v;
        }
        if let Some(v) = update.strict_circular_dependencies {
            self.strict_circular_dependencies = v;
        }
    }
}

fn env_flag(key: &str) -> Result<Option<bool>> {
    match env::var(key) {
        Ok(raw) if raw.trim().is_empty() => Ok(None),
        Ok(raw) => parse_flag(&raw).map(Some).ok_or_else(|| {
            ModuleError::Config(format!("{key} must be a boolean flag, got '{raw}'"))
        }),
        Err(_) => Ok(None),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_only_touches_given_keys() {
        let mut options = Options::default();
        options.merge(OptionsUpdate {
            allow_multiple_declarations: Some(false),
            ..Default::default()
        });

        assert!(!options.allow_multiple_declarations);
        assert!(options.track_circular_dependencies);
        assert!(options.allow_dependencies_override);
        assert!(!options.strict_circular_dependencies);
    }

    #[test]
    fn update_deserializes_from_camel_case_and_ignores_unknown_keys() {
        let update: OptionsUpdate = serde_json::from_str(
            r#"{ "allowDependenciesOverride": false, "somethingElse": 1 }"#,
        )
        .unwrap();

        assert_eq!(update.allow_dependencies_override, Some(false));
        assert_eq!(update.track_circular_dependencies, None);
    }

    #[test]
    fn flags_accept_common_spellings() {
        assert_eq!(parse_flag("1"), Some(true));
        assert_eq!(parse_flag(" Yes "), Some(true));
        assert_eq!(parse_flag("off"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
