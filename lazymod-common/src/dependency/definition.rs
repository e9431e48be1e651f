// lazymod-common/src/dependency/definition.rs
use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ModuleError;

/// Original dependency name of the target -> replacement module name.
pub type Overrides = BTreeMap<String, String>;

/// A normalized dependency: which module to resolve, under which key the
/// value is exposed, and which of the target's own dependencies to swap.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawSpec", into = "RawSpec")]
pub struct DependencySpec {
    pub target: String,
    pub alias: String,
    pub overrides: Option<Overrides>,
}

impl DependencySpec {
    pub fn new(target: impl Into<String>) -> Self {
        let target = target.into();
        Self {
            alias: target.clone(),
            target,
            overrides: None,
        }
    }

    pub fn aliased(mut self, alias: impl Into<String>) -> Self {
        self.alias = alias.into();
        self
    }

    pub fn with_override(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.overrides
            .get_or_insert_with(Overrides::new)
            .insert(from.into(), to.into());
        self
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        self.overrides = Some(overrides);
        self
    }

    pub fn overrides(&self) -> Option<&Overrides> {
        self.overrides.as_ref()
    }

    /// Target this spec resolves to once `overrides` (of a dependent's
    /// request) are applied. The alias is left alone.
    pub fn target_under<'a>(&'a self, overrides: &'a Overrides) -> &'a str {
        overrides
            .get(&self.target)
            .map(String::as_str)
            .unwrap_or(&self.target)
    }

    /// Copy of this spec pointing at the overridden target, keeping the
    /// alias so the dependent still sees the value under its original key.
    pub fn substituted(&self, overrides: &Overrides) -> Self {
        Self {
            target: self.target_under(overrides).to_string(),
            alias: self.alias.clone(),
            overrides: self.overrides.clone(),
        }
    }
}

impl fmt::Display for DependencySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.target)?;
        if self.alias != self.target {
            write!(f, " as {}", self.alias)?;
        }
        if let Some(overrides) = &self.overrides {
            let pairs: Vec<String> = overrides.iter().map(|(k, v)| format!("{k}={v}")).collect();
            write!(f, " [{}]", pairs.join(", "))?;
        }
        Ok(())
    }
}

impl From<&str> for DependencySpec {
    fn from(target: &str) -> Self {
        Self::new(target)
    }
}

impl From<String> for DependencySpec {
    fn from(target: String) -> Self {
        Self::new(target)
    }
}

impl From<&String> for DependencySpec {
    fn from(target: &String) -> Self {
        Self::new(target.as_str())
    }
}

/// `(target, alias)`
impl From<(&str, &str)> for DependencySpec {
    fn from((target, alias): (&str, &str)) -> Self {
        Self::new(target).aliased(alias)
    }
}

/// `(target, overrides)`
impl From<(&str, Overrides)> for DependencySpec {
    fn from((target, overrides): (&str, Overrides)) -> Self {
        Self::new(target).with_overrides(overrides)
    }
}

/// `(target, alias, overrides)`
impl From<(&str, &str, Overrides)> for DependencySpec {
    fn from((target, alias, overrides): (&str, &str, Overrides)) -> Self {
        Self::new(target).aliased(alias).with_overrides(overrides)
    }
}

impl From<&DependencySpec> for DependencySpec {
    fn from(spec: &DependencySpec) -> Self {
        spec.clone()
    }
}

/// Shorthand accepted in manifests: `"name"`, `[name]`, `[name, alias]`,
/// `[name, overrides]` or `[name, alias, overrides]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawSpec {
    Name(String),
    List(Vec<RawPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPart {
    Text(String),
    Map(Overrides),
}

impl TryFrom<RawSpec> for DependencySpec {
    type Error = ModuleError;

    fn try_from(raw: RawSpec) -> Result<Self, Self::Error> {
        let parts = match raw {
            RawSpec::Name(name) => return Ok(Self::new(name)),
            RawSpec::List(parts) => parts,
        };

        let mut parts = parts.into_iter();
        let target = match parts.next() {
            Some(RawPart::Text(target)) => target,
            Some(RawPart::Map(_)) => {
                return Err(ModuleError::InvalidSpec(
                    "first element must be a module name".to_string(),
                ))
            }
            None => return Err(ModuleError::InvalidSpec("empty spec".to_string())),
        };

        let mut spec = Self::new(target);
        match (parts.next(), parts.next(), parts.next()) {
            (None, None, None) => {}
            (Some(RawPart::Text(alias)), None, None) => spec = spec.aliased(alias),
            (Some(RawPart::Map(overrides)), None, None) => spec = spec.with_overrides(overrides),
            (Some(RawPart::Text(alias)), Some(RawPart::Map(overrides)), None) => {
                spec = spec.aliased(alias).with_overrides(overrides)
            }
            _ => {
                return Err(ModuleError::InvalidSpec(format!(
                    "unsupported shape for dependency '{}'",
                    spec.target
                )))
            }
        }
        Ok(spec)
    }
}

impl From<DependencySpec> for RawSpec {
    fn from(spec: DependencySpec) -> Self {
        if spec.alias == spec.target && spec.overrides.is_none() {
            return RawSpec::Name(spec.target);
        }
        let mut parts = vec![RawPart::Text(spec.target.clone())];
        if spec.alias != spec.target {
            parts.push(RawPart::Text(spec.alias));
        }
        if let Some(overrides) = spec.overrides {
            parts.push(RawPart::Map(overrides));
        }
        RawSpec::List(parts)
    }
}
