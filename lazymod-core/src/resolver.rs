// lazymod-core/src/resolver.rs
//! Dependency walking: selects declarations for a list of specs, starts the
//! ones that are not resolved yet and reports once every one of them has
//! either resolved or been cycle-broken.

use std::cell::Cell;
use std::rc::Rc;

use lazymod_common::error::{ModuleError, Result};
use lazymod_common::DependencySpec;
use tracing::{debug, trace};

use crate::declaration::{
    abort_attempt, fail_declaration, Attempt, Continuation, DeclRef, DeclState, Provide, Wiring,
};
use crate::deps::{Deps, Slot};
use crate::engine::Inner;

/// What a dependent receives once its dependencies are wired.
pub(crate) struct Resolved<T> {
    pub(crate) deps: Deps<T>,
    pub(crate) previous: Option<T>,
}

pub(crate) type Done<T> = Rc<dyn Fn(Result<Resolved<T>>)>;

/// Counts down the outstanding dependencies of one `resolve_specs` call.
struct Join<T> {
    remaining: Cell<usize>,
    failed: Cell<bool>,
    deps: Deps<T>,
    previous: Option<DeclRef<T>>,
    done: Done<T>,
}

impl<T: Clone> Join<T> {
    /// `index` is the spec position, `None` for the implicit previous
    /// declaration.
    fn settle(&self, index: Option<usize>, outcome: Result<Wiring>) {
        let wiring = match outcome {
            Ok(wiring) => wiring,
            // Every failure is forwarded; the receiver decides what a late
            // one means (a settled attempt drops it, a request reports it).
            Err(err) => {
                if self.failed.replace(true) {
                    trace!("Forwarding secondary failure: {}", err);
                }
                (self.done)(Err(err));
                return;
            }
        };

        if let Wiring::Cyclic(path) = wiring {
            if let Some(slot) = index.and_then(|i| self.deps.slot(i)) {
                slot.mark_cyclic(path);
            }
        }

        if self.failed.get() || self.remaining.get() == 0 {
            return;
        }
        let left = self.remaining.get() - 1;
        self.remaining.set(left);
        if left == 0 {
            self.finish();
        }
    }

    fn finish(&self) {
        let previous = self
            .previous
            .as_ref()
            .and_then(|decl| decl.borrow().result.clone());
        (self.done)(Ok(Resolved {
            deps: self.deps.clone(),
            previous,
        }));
    }
}

fn cycle_path<T>(path: &[DeclRef<T>], decl: &DeclRef<T>) -> Vec<String> {
    path.iter()
        .map(|step| step.borrow().name.clone())
        .chain(std::iter::once(decl.borrow().name.clone()))
        .collect()
}

impl<T: Clone + 'static> Inner<T> {
    /// Resolves `specs` on behalf of `from` (`None` for a top-level request).
    /// `previous` is the requester's superseded declaration, resolved as an
    /// extra dependency and handed over separately.
    pub(crate) fn resolve_specs(
        self: &Rc<Self>,
        from: Option<&DeclRef<T>>,
        specs: &[DependencySpec],
        previous: Option<DeclRef<T>>,
        path: &[DeclRef<T>],
        done: Done<T>,
    ) {
        let requester = from.map(|decl| decl.borrow().name.clone());
        let options = self.options.get();

        // -------- select every declaration before starting any of them ------------------
        let selected: Result<Vec<DeclRef<T>>> = {
            let mut registry = self.registry.borrow_mut();
            specs
                .iter()
                .map(|spec| registry.select(spec, requester.as_deref(), &options))
                .collect()
        };
        let decls = match selected {
            Ok(decls) => decls,
            Err(err) => {
                debug!("Dependency selection failed: {}", err);
                done(Err(err));
                return;
            }
        };

        let slots = specs
            .iter()
            .zip(&decls)
            .map(|(spec, decl)| Slot::new(spec.alias.clone(), Rc::clone(decl)))
            .collect();
        let join = Rc::new(Join {
            remaining: Cell::new(decls.len() + usize::from(previous.is_some())),
            failed: Cell::new(false),
            deps: Deps::new(requester, slots),
            previous: previous.clone(),
            done,
        });

        if join.remaining.get() == 0 {
            join.finish();
            return;
        }

        // -------- start in declared order, previous last --------------------------------
        for (index, decl) in decls.iter().enumerate() {
            if join.failed.get() {
                return;
            }
            let join = Rc::clone(&join);
            self.start_resolving(
                decl,
                path,
                Rc::new(move |outcome: Result<Wiring>| join.settle(Some(index), outcome)),
            );
        }
        if let Some(previous) = previous {
            if join.failed.get() {
                return;
            }
            let join = Rc::clone(&join);
            self.start_resolving(
                &previous,
                path,
                Rc::new(move |outcome: Result<Wiring>| join.settle(None, outcome)),
            );
        }
    }

    /// Drives one declaration towards `RESOLVED`, or parks `continuation`
    /// until it gets there.
    pub(crate) fn start_resolving(
        self: &Rc<Self>,
        decl: &DeclRef<T>,
        path: &[DeclRef<T>],
        continuation: Continuation,
    ) {
        let options = self.options.get();
        let state = decl.borrow().state;

        match state {
            DeclState::Resolved => continuation(Ok(Wiring::Ready)),
            DeclState::InResolving => {
                let on_path = path.iter().any(|step| Rc::ptr_eq(step, decl));
                if !(options.track_circular_dependencies && on_path) {
                    trace!("Waiting on '{}'", decl.borrow().name);
                    decl.borrow_mut().pending.push(continuation);
                    return;
                }

                let cycle = cycle_path(path, decl);
                if options.strict_circular_dependencies {
                    continuation(Err(ModuleError::CircularDependency { path: cycle }));
                } else {
                    debug!("Breaking wait cycle {}", cycle.join(" -> "));
                    continuation(Ok(Wiring::Cyclic(cycle)));
                }
            }
            DeclState::NotResolved => self.begin(decl, path, continuation),
        }
    }

    fn begin(self: &Rc<Self>, decl: &DeclRef<T>, path: &[DeclRef<T>], continuation: Continuation) {
        let options = self.options.get();
        let (name, specs, previous) = {
            let mut d = decl.borrow_mut();
            d.pending.push(Rc::clone(&continuation));
            (d.name.clone(), d.specs.clone(), d.previous.clone())
        };

        if previous.is_some() && !options.allow_multiple_declarations {
            fail_declaration(decl, ModuleError::MultipleDeclarationDisallowed { name });
            return;
        }

        decl.borrow_mut().state = DeclState::InResolving;
        debug!("Resolving '{}' ({} dependency spec(s))", name, specs.len());

        let mut path = path.to_vec();
        if options.track_circular_dependencies {
            path.push(Rc::clone(decl));
        }

        let attempt = Rc::new(Attempt::new(continuation));
        let target = Rc::clone(decl);
        self.resolve_specs(
            Some(decl),
            &specs,
            previous,
            &path,
            Rc::new(move |outcome: Result<Resolved<T>>| match outcome {
                Ok(resolved) => invoke_factory(&target, &attempt, resolved),
                Err(err) => abort_attempt(&target, &attempt, err),
            }),
        );
    }
}

fn invoke_factory<T>(decl: &DeclRef<T>, attempt: &Rc<Attempt>, resolved: Resolved<T>) {
    let factory = {
        let d = decl.borrow();
        if d.state != DeclState::InResolving {
            trace!("Skipping factory of '{}': attempt already settled", d.name);
            return;
        }
        trace!("Invoking factory of '{}'", d.name);
        Rc::clone(&d.factory)
    };
    let provide = Provide::new(Rc::clone(decl), Rc::clone(attempt));
    factory(provide, resolved.deps, resolved.previous);
}
