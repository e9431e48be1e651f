//! Shared helpers for the engine integration tests.
#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use lazymod_core::{Deps, IntoSpecs, ModuleError, Modules, TickQueue};

pub type Outcome<T> = Rc<RefCell<Option<Result<Deps<T>, ModuleError>>>>;

/// Engine driven by a manual tick queue.
pub fn engine<T: Clone + 'static>() -> (Modules<T>, TickQueue) {
    let queue = TickQueue::new();
    (Modules::new(queue.clone()), queue)
}

/// Requires `names` and records whichever callback fires last.
pub fn outcome_of<T, N>(modules: &Modules<T>, names: N) -> Outcome<T>
where
    T: Clone + 'static,
    N: IntoSpecs,
{
    let outcome: Outcome<T> = Rc::new(RefCell::new(None));
    let (ok, err) = (Rc::clone(&outcome), Rc::clone(&outcome));
    modules.require_or_else(
        names,
        move |deps| *ok.borrow_mut() = Some(Ok(deps)),
        move |e| *err.borrow_mut() = Some(Err(e)),
    );
    outcome
}

pub fn settled<T>(outcome: &Outcome<T>) -> Result<Deps<T>, ModuleError> {
    outcome
        .borrow_mut()
        .take()
        .expect("request did not settle")
}

pub fn names(set: &std::collections::BTreeSet<String>) -> Vec<&str> {
    set.iter().map(String::as_str).collect()
}
