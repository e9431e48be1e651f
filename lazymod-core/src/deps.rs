// lazymod-core/src/deps.rs
//! Alias-keyed view over resolved dependencies.
//!
//! Values are read lazily: the view holds the declarations themselves, so a
//! cyclic peer can be stored now and read once it has settled. Reading it
//! while it is still resolving yields `CircularDependency`.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use lazymod_common::error::{ModuleError, Result};

use crate::declaration::{DeclRef, DeclState};

const REQUIRE_OWNER: &str = "<require>";

pub(crate) struct Slot<T> {
    alias: String,
    decl: DeclRef<T>,
    cycle: RefCell<Option<Vec<String>>>,
}

impl<T> Slot<T> {
    pub(crate) fn new(alias: String, decl: DeclRef<T>) -> Self {
        Self {
            alias,
            decl,
            cycle: RefCell::new(None),
        }
    }

    pub(crate) fn mark_cyclic(&self, path: Vec<String>) {
        *self.cycle.borrow_mut() = Some(path);
    }
}

pub struct Deps<T> {
    owner: Option<String>,
    slots: Rc<Vec<Slot<T>>>,
}

impl<T> Clone for Deps<T> {
    fn clone(&self) -> Self {
        Self {
            owner: self.owner.clone(),
            slots: Rc::clone(&self.slots),
        }
    }
}

impl<T> Deps<T> {
    pub(crate) fn new(owner: Option<String>, slots: Vec<Slot<T>>) -> Self {
        Self {
            owner,
            slots: Rc::new(slots),
        }
    }

    pub(crate) fn slot(&self, index: usize) -> Option<&Slot<T>> {
        self.slots.get(index)
    }

    // A repeated alias resolves to the last spec that declared it.
    fn find(&self, alias: &str) -> Option<&Slot<T>> {
        self.slots.iter().rev().find(|slot| slot.alias == alias)
    }

    pub fn contains(&self, alias: &str) -> bool {
        self.find(alias).is_some()
    }

    /// Declared aliases, in declaration order.
    pub fn aliases(&self) -> impl Iterator<Item = &str> + '_ {
        self.slots.iter().map(|slot| slot.alias.as_str())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Whether `alias` can be read without error right now.
    pub fn is_ready(&self, alias: &str) -> bool {
        self.find(alias)
            .is_some_and(|slot| slot.decl.borrow().result.is_some())
    }

    fn undeclared(&self, alias: &str) -> ModuleError {
        ModuleError::UndeclaredDependency {
            module: self
                .owner
                .clone()
                .unwrap_or_else(|| REQUIRE_OWNER.to_string()),
            alias: alias.to_string(),
        }
    }
}

impl<T: Clone> Deps<T> {
    /// Value behind `alias`. A peer that is still resolving (only reachable
    /// through a cycle) reads as `CircularDependency`; a peer whose attempt
    /// failed reads as `NotResolved`.
    pub fn get(&self, alias: &str) -> Result<T> {
        let slot = self.find(alias).ok_or_else(|| self.undeclared(alias))?;
        let decl = slot.decl.borrow();
        if let Some(value) = &decl.result {
            return Ok(value.clone());
        }
        match decl.state {
            DeclState::InResolving => {
                let path = slot
                    .cycle
                    .borrow()
                    .clone()
                    .unwrap_or_else(|| vec![decl.name.clone()]);
                Err(ModuleError::CircularDependency { path })
            }
            DeclState::NotResolved | DeclState::Resolved => Err(ModuleError::NotResolved {
                name: decl.name.clone(),
            }),
        }
    }

    /// Every dependency value keyed by alias. Fails on the first one that
    /// cannot be read yet.
    pub fn to_map(&self) -> Result<BTreeMap<String, T>> {
        self.aliases()
            .map(|alias| Ok((alias.to_string(), self.get(alias)?)))
            .collect()
    }
}

impl<T> fmt::Debug for Deps<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deps")
            .field("owner", &self.owner.as_deref().unwrap_or(REQUIRE_OWNER))
            .field("aliases", &self.aliases().collect::<Vec<_>>())
            .finish()
    }
}
