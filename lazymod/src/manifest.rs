// lazymod/src/manifest.rs
//! JSON graph manifests: a list of module declarations whose factories
//! produce plain JSON, optionally after a delay or with a failure.

use std::collections::HashSet;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use lazymod_common::error::{ModuleError, Result};
use lazymod_common::{DependencySpec, OptionsUpdate};
use lazymod_core::{Deps, Modules, Provide};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub options: OptionsUpdate,
    #[serde(default)]
    pub modules: Vec<ModuleEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleEntry {
    pub name: String,
    #[serde(default)]
    pub deps: Vec<DependencySpec>,
    #[serde(default)]
    pub value: Value,
    /// Milliseconds the factory waits before settling.
    #[serde(default)]
    pub delay_ms: Option<u64>,
    /// When set, the factory fails with this message instead of providing.
    #[serde(default)]
    pub error: Option<String>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading manifest from {}", path.display());
        let raw = std::fs::read_to_string(path)?;
        Self::parse(&raw)
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let manifest: Manifest = serde_json::from_str(raw)?;
        if let Some(entry) = manifest.modules.iter().find(|entry| entry.name.is_empty()) {
            return Err(ModuleError::InvalidSpec(format!(
                "module with dependencies {:?} has an empty name",
                entry.deps.iter().map(ToString::to_string).collect::<Vec<_>>()
            )));
        }
        Ok(manifest)
    }

    /// Defines every entry, in file order, so repeated names become
    /// redefinitions.
    pub fn install(&self, modules: &Modules<Value>) {
        for entry in &self.modules {
            entry.define_on(modules);
        }
        debug!(
            "Installed {} declaration(s) for {} module(s)",
            self.modules.len(),
            self.module_names().len()
        );
    }

    /// Distinct module names in the order they first appear.
    pub fn module_names(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.modules
            .iter()
            .map(|entry| entry.name.as_str())
            .filter(|name| seen.insert(*name))
            .collect()
    }
}

impl ModuleEntry {
    fn define_on(&self, modules: &Modules<Value>) {
        let entry = Rc::new(self.clone());
        modules.define(
            self.name.clone(),
            &self.deps,
            move |p: Provide<Value>, deps: Deps<Value>, previous: Option<Value>| {
                let entry = Rc::clone(&entry);
                match entry.delay_ms.filter(|ms| *ms > 0) {
                    Some(ms) => {
                        tokio::task::spawn_local(async move {
                            tokio::time::sleep(Duration::from_millis(ms)).await;
                            entry.settle(&p, &deps, previous);
                        });
                    }
                    None => entry.settle(&p, &deps, previous),
                }
            },
        );
    }

    fn settle(&self, p: &Provide<Value>, deps: &Deps<Value>, previous: Option<Value>) {
        let outcome = match &self.error {
            Some(message) => Err(ModuleError::message(message.clone())),
            None => self.produce(deps, previous),
        };
        if let Err(err) = p.settle(outcome) {
            warn!("Module '{}': {}", self.name, err);
        }
    }

    /// Builds the provided value. Dependencies still on a cycle are
    /// rendered as `null`.
    fn produce(&self, deps: &Deps<Value>, previous: Option<Value>) -> Result<Value> {
        let mut values = Map::new();
        for alias in deps.aliases() {
            let value = match deps.get(alias) {
                Ok(value) => value,
                Err(ModuleError::CircularDependency { path }) => {
                    debug!(
                        "'{}' reads '{}' across cycle {}",
                        self.name,
                        alias,
                        path.join(" -> ")
                    );
                    Value::Null
                }
                Err(err) => return Err(err),
            };
            values.insert(alias.to_string(), value);
        }
        Ok(json!({
            "module": self.name,
            "value": self.value,
            "deps": values,
            "previous": previous,
        }))
    }
}
