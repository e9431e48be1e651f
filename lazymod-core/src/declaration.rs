// lazymod-core/src/declaration.rs
//! Per-declaration lifecycle: `NOT_RESOLVED -> IN_RESOLVING -> RESOLVED`,
//! with failures falling back to `NOT_RESOLVED` so a later request can retry.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use lazymod_common::error::{ModuleError, Result};
use lazymod_common::DependencySpec;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::deps::Deps;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeclState {
    NotResolved,
    InResolving,
    Resolved,
}

impl DeclState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotResolved => "NOT_RESOLVED",
            Self::InResolving => "IN_RESOLVING",
            Self::Resolved => "RESOLVED",
        }
    }
}

impl fmt::Display for DeclState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of a module as reported by `Modules::state`, based on its head
/// declaration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ModuleState {
    NotDefined,
    NotResolved,
    InResolving,
    Resolved,
}

impl From<DeclState> for ModuleState {
    fn from(state: DeclState) -> Self {
        match state {
            DeclState::NotResolved => Self::NotResolved,
            DeclState::InResolving => Self::InResolving,
            DeclState::Resolved => Self::Resolved,
        }
    }
}

impl fmt::Display for ModuleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotDefined => f.write_str("NOT_DEFINED"),
            Self::NotResolved => f.write_str(DeclState::NotResolved.as_str()),
            Self::InResolving => f.write_str(DeclState::InResolving.as_str()),
            Self::Resolved => f.write_str(DeclState::Resolved.as_str()),
        }
    }
}

/// User computation producing a module's value. Receives the one-shot
/// [`Provide`] handle, the dependency view and the value of the declaration
/// it supersedes, if any.
pub type Factory<T> = Rc<dyn Fn(Provide<T>, Deps<T>, Option<T>)>;

pub(crate) type DeclRef<T> = Rc<RefCell<Declaration<T>>>;

/// Callback waiting on a declaration. May be invoked more than once only in
/// the double-provide case, where it first sees the value and then the error.
pub(crate) type Continuation = Rc<dyn Fn(Result<Wiring>)>;

/// How a waited-on declaration was wired into its dependent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Wiring {
    Ready,
    /// The wait was broken because the declaration is already on the
    /// resolution path; reading it before it settles is an error.
    Cyclic(Vec<String>),
}

pub(crate) struct Declaration<T> {
    pub(crate) name: String,
    pub(crate) previous: Option<DeclRef<T>>,
    pub(crate) factory: Factory<T>,
    pub(crate) specs: Vec<DependencySpec>,
    pub(crate) state: DeclState,
    pub(crate) pending: Vec<Continuation>,
    pub(crate) result: Option<T>,
}

impl<T> Declaration<T> {
    pub(crate) fn new(
        name: String,
        previous: Option<DeclRef<T>>,
        factory: Factory<T>,
        specs: Vec<DependencySpec>,
    ) -> Self {
        Self {
            name,
            previous,
            factory,
            specs,
            state: DeclState::NotResolved,
            pending: Vec::new(),
            result: None,
        }
    }

    /// Fresh declaration sharing factory, name and redefinition chain but
    /// with its own dependency list and lifecycle.
    pub(crate) fn derive(&self, specs: Vec<DependencySpec>) -> Self {
        Self::new(
            self.name.clone(),
            self.previous.clone(),
            Rc::clone(&self.factory),
            specs,
        )
    }

    pub(crate) fn targets(&self) -> impl Iterator<Item = &str> + '_ {
        self.specs.iter().map(|spec| spec.target.as_str())
    }
}

/// One resolution attempt of a declaration. A failed attempt is replaced by
/// a new one on retry, so late signals aimed at the old attempt are ignored.
pub(crate) struct Attempt {
    provided: Cell<bool>,
    initiator: Continuation,
}

impl Attempt {
    pub(crate) fn new(initiator: Continuation) -> Self {
        Self {
            provided: Cell::new(false),
            initiator,
        }
    }

    /// Marks the attempt settled; returns whether it already was.
    fn settle(&self) -> bool {
        self.provided.replace(true)
    }
}

/// Settles a declaration with a value and wakes everything waiting on it.
pub(crate) fn resolve_declaration<T>(decl: &DeclRef<T>, value: T) {
    let (name, waiting) = {
        let mut d = decl.borrow_mut();
        d.result = Some(value);
        d.state = DeclState::Resolved;
        (d.name.clone(), std::mem::take(&mut d.pending))
    };
    debug!("'{}' resolved, waking {} dependent(s)", name, waiting.len());
    for continuation in waiting {
        continuation(Ok(Wiring::Ready));
    }
}

/// Rolls a declaration back to `NOT_RESOLVED` and hands the error to
/// everything waiting on it.
pub(crate) fn fail_declaration<T>(decl: &DeclRef<T>, err: ModuleError) {
    let (name, waiting) = {
        let mut d = decl.borrow_mut();
        d.state = DeclState::NotResolved;
        (d.name.clone(), std::mem::take(&mut d.pending))
    };
    debug!(
        "'{}' failed ({}), notifying {} dependent(s)",
        name,
        err,
        waiting.len()
    );
    for continuation in waiting {
        continuation(Err(err.clone()));
    }
}

/// Dependency failure for an attempt whose factory may already have run.
pub(crate) fn abort_attempt<T>(decl: &DeclRef<T>, attempt: &Attempt, err: ModuleError) {
    if attempt.settle() {
        warn!(
            "Ignoring failure for already settled '{}': {}",
            decl.borrow().name,
            err
        );
        return;
    }
    fail_declaration(decl, err);
}

/// One-shot capability handed to a factory to settle its declaration.
pub struct Provide<T> {
    decl: DeclRef<T>,
    attempt: Rc<Attempt>,
}

impl<T> Clone for Provide<T> {
    fn clone(&self) -> Self {
        Self {
            decl: Rc::clone(&self.decl),
            attempt: Rc::clone(&self.attempt),
        }
    }
}

impl<T> fmt::Debug for Provide<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provide")
            .field("module", &self.decl.borrow().name)
            .field("provided", &self.attempt.provided.get())
            .finish()
    }
}

impl<T> Provide<T> {
    pub(crate) fn new(decl: DeclRef<T>, attempt: Rc<Attempt>) -> Self {
        Self { decl, attempt }
    }

    /// Name of the module being provided.
    pub fn name(&self) -> String {
        self.decl.borrow().name.clone()
    }

    pub fn is_provided(&self) -> bool {
        self.attempt.provided.get()
    }

    pub fn provide(&self, value: T) -> Result<()> {
        self.settle(Ok(value))
    }

    pub fn fail(&self, err: ModuleError) -> Result<()> {
        self.settle(Err(err))
    }

    /// Settles the declaration. Only the first call counts; any later call
    /// reports `DeclarationAlreadyProvided` to the request that started this
    /// attempt and returns the same error.
    pub fn settle(&self, outcome: Result<T>) -> Result<()> {
        if self.attempt.settle() {
            let err = ModuleError::DeclarationAlreadyProvided { name: self.name() };
            warn!("{}", err);
            (self.attempt.initiator)(Err(err.clone()));
            return Err(err);
        }

        trace!("Factory of '{}' settled", self.decl.borrow().name);
        match outcome {
            Ok(value) => resolve_declaration(&self.decl, value),
            Err(err) => fail_declaration(&self.decl, err),
        }
        Ok(())
    }
}
