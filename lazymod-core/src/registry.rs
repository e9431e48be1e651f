// lazymod-core/src/registry.rs
use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::rc::Rc;

use lazymod_common::error::{ModuleError, Result};
use lazymod_common::{DependencySpec, Options};
use serde::Serialize;
use tracing::debug;

use crate::declaration::{DeclRef, DeclState, Declaration, Factory, ModuleState};

/// State -> names of the modules whose head declaration is in that state.
pub type Stat = BTreeMap<DeclState, BTreeSet<String>>;

pub(crate) struct Module<T> {
    pub(crate) name: String,
    /// `[0]` is the head, the rest are override-derived variants of it.
    pub(crate) declarations: Vec<DeclRef<T>>,
}

impl<T> Module<T> {
    fn new(name: String) -> Self {
        Self {
            name,
            declarations: Vec::new(),
        }
    }

    pub(crate) fn head(&self) -> &DeclRef<T> {
        &self.declarations[0]
    }

    fn chain_len(&self) -> usize {
        let mut len = 0;
        let mut current = Some(Rc::clone(self.head()));
        while let Some(decl) = current {
            len += 1;
            current = decl.borrow().previous.clone();
        }
        len
    }
}

/// Summary of one module, used for inspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModuleInfo {
    pub name: String,
    pub state: ModuleState,
    /// Number of declarations in the redefinition chain, head included.
    pub declarations: usize,
    /// Override-derived variants currently cached for the head.
    pub variants: usize,
    pub dependencies: Vec<DependencySpec>,
}

pub(crate) struct Registry<T> {
    modules: HashMap<String, Module<T>>,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self {
            modules: HashMap::new(),
        }
    }
}

impl<T> Registry<T> {
    /// Pushes a new head for `name`. Variants of the old head are dropped
    /// since they were derived from a declaration that is no longer current.
    pub(crate) fn define(&mut self, name: String, specs: Vec<DependencySpec>, factory: Factory<T>) {
        let module = self
            .modules
            .entry(name.clone())
            .or_insert_with(|| Module::new(name.clone()));

        let previous = module.declarations.first().cloned();
        if previous.is_some() {
            debug!(
                "Redefining '{}' (discarding {} cached variant(s))",
                name,
                module.declarations.len() - 1
            );
        } else {
            debug!("Defining '{}' with {} dependency spec(s)", name, specs.len());
        }

        let head = Declaration::new(name, previous, factory, specs);
        module.declarations = vec![Rc::new(RefCell::new(head))];
    }

    pub(crate) fn is_defined(&self, name: &str) -> bool {
        self.modules.contains_key(name)
    }

    pub(crate) fn state(&self, name: &str) -> ModuleState {
        self.modules
            .get(name)
            .map_or(ModuleState::NotDefined, |module| {
                module.head().borrow().state.into()
            })
    }

    pub(crate) fn stat(&self) -> Stat {
        let mut stat = Stat::new();
        for (name, module) in &self.modules {
            stat.entry(module.head().borrow().state)
                .or_default()
                .insert(name.clone());
        }
        stat
    }

    pub(crate) fn describe(&self, name: &str) -> Option<ModuleInfo> {
        let module = self.modules.get(name)?;
        let head = module.head().borrow();
        Some(ModuleInfo {
            name: module.name.clone(),
            state: head.state.into(),
            declarations: module.chain_len(),
            variants: module.declarations.len() - 1,
            dependencies: head.specs.clone(),
        })
    }

    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.modules.keys().cloned().collect();
        names.sort();
        names
    }

    /// Picks the declaration a spec refers to: the head, or the variant
    /// matching its overrides (created on first use).
    pub(crate) fn select(
        &mut self,
        spec: &DependencySpec,
        requester: Option<&str>,
        options: &Options,
    ) -> Result<DeclRef<T>> {
        let module = self.modules.get_mut(&spec.target).ok_or_else(|| {
            ModuleError::ModuleNotFound {
                name: spec.target.clone(),
                requester: requester.map(str::to_string),
            }
        })?;

        match spec.overrides() {
            None => Ok(Rc::clone(module.head())),
            Some(_) if !options.allow_dependencies_override => {
                Err(ModuleError::DependencyOverrideDisallowed {
                    name: spec.target.clone(),
                    requester: requester.map(str::to_string),
                })
            }
            Some(overrides) => Ok(module.variant_for(overrides)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declaration::Provide;
    use crate::deps::Deps;

    fn noop() -> Factory<u32> {
        Rc::new(|_: Provide<u32>, _: Deps<u32>, _: Option<u32>| {})
    }

    #[test]
    fn redefinition_links_previous_head() {
        let mut registry = Registry::default();
        registry.define("A".into(), Vec::new(), noop());
        registry.define("A".into(), vec!["B".into()], noop());

        let info = registry.describe("A").unwrap();
        assert_eq!(info.declarations, 2);
        assert_eq!(info.dependencies, vec![DependencySpec::new("B")]);
        assert_eq!(info.state, ModuleState::NotResolved);
    }

    #[test]
    fn unknown_modules_report_not_defined() {
        let registry: Registry<u32> = Registry::default();
        assert!(!registry.is_defined("X"));
        assert_eq!(registry.state("X"), ModuleState::NotDefined);
        assert!(registry.stat().is_empty());
    }

    #[test]
    fn select_rejects_missing_and_disallowed_overrides() {
        let mut registry = Registry::default();
        registry.define("C".into(), vec!["A".into()], noop());

        let options = Options {
            allow_dependencies_override: false,
            ..Options::default()
        };

        let missing = registry
            .select(&DependencySpec::new("X"), Some("C"), &options)
            .err()
            .unwrap();
        assert_eq!(
            missing.to_string(),
            "Module \"C\": can't resolve dependence \"X\""
        );

        let overridden = DependencySpec::new("C").with_override("A", "B");
        let err = registry
            .select(&overridden, Some("D"), &options)
            .err()
            .unwrap();
        assert!(matches!(
            err,
            ModuleError::DependencyOverrideDisallowed { .. }
        ));
    }

    #[test]
    fn stat_groups_modules_by_head_state() {
        let mut registry = Registry::default();
        registry.define("A".into(), Vec::new(), noop());
        registry.define("B".into(), Vec::new(), noop());

        let stat = registry.stat();
        let not_resolved: Vec<&str> = stat[&DeclState::NotResolved]
            .iter()
            .map(String::as_str)
            .collect();
        assert_eq!(not_resolved, ["A", "B"]);
    }
}
