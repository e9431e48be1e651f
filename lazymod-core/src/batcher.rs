// lazymod-core/src/batcher.rs
//! Top-level `require` calls are buffered for the rest of the synchronous
//! turn and flushed together, so they always see every `define` issued in
//! that same turn.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use lazymod_common::error::{ModuleError, Result};
use lazymod_common::DependencySpec;
use tracing::{debug, error};

use crate::deps::Deps;
use crate::engine::Inner;
use crate::resolver::Resolved;

pub(crate) type OnSuccess<T> = Box<dyn FnOnce(Deps<T>)>;
pub(crate) type OnError = Box<dyn FnOnce(ModuleError)>;

pub(crate) struct Request<T> {
    pub(crate) specs: Vec<DependencySpec>,
    pub(crate) on_success: OnSuccess<T>,
    pub(crate) on_error: Option<OnError>,
}

pub(crate) struct Batcher<T> {
    pending: RefCell<Vec<Request<T>>>,
    scheduled: Cell<bool>,
}

impl<T> Default for Batcher<T> {
    fn default() -> Self {
        Self {
            pending: RefCell::new(Vec::new()),
            scheduled: Cell::new(false),
        }
    }
}

impl<T> Batcher<T> {
    /// Queues a request. Returns `true` when a flush has to be scheduled.
    pub(crate) fn enqueue(&self, request: Request<T>) -> bool {
        self.pending.borrow_mut().push(request);
        !self.scheduled.replace(true)
    }

    /// Swaps out everything queued so far and re-arms scheduling.
    fn drain(&self) -> Vec<Request<T>> {
        self.scheduled.set(false);
        std::mem::take(&mut *self.pending.borrow_mut())
    }

    pub(crate) fn len(&self) -> usize {
        self.pending.borrow().len()
    }
}

impl<T: Clone + 'static> Inner<T> {
    pub(crate) fn flush(self: &Rc<Self>) {
        let requests = self.batcher.drain();
        debug!("Flushing {} queued require(s)", requests.len());
        for request in requests {
            self.dispatch(request);
        }
    }

    /// Resolves one request on its own; a failure here does not touch the
    /// other requests of the batch. `on_error` runs at most once, later
    /// failures of the same request go to the unhandled path.
    fn dispatch(self: &Rc<Self>, request: Request<T>) {
        let Request {
            specs,
            on_success,
            on_error,
        } = request;
        let on_success = RefCell::new(Some(on_success));
        let on_error = RefCell::new(on_error);
        let engine = Rc::clone(self);

        self.resolve_specs(
            None,
            &specs,
            None,
            &[],
            Rc::new(move |outcome: Result<Resolved<T>>| match outcome {
                Ok(resolved) => {
                    let callback = on_success.borrow_mut().take();
                    if let Some(callback) = callback {
                        callback(resolved.deps);
                    }
                }
                Err(err) => {
                    let callback = on_error.borrow_mut().take();
                    match callback {
                        Some(callback) => callback(err),
                        None => engine.report_unhandled(err),
                    }
                }
            }),
        );
    }

    /// Surfaces a failure nobody asked to handle. Without a hook it is
    /// re-raised as a panic from a deferred task, outside the caller's frame.
    pub(crate) fn report_unhandled(&self, err: ModuleError) {
        error!("Unhandled module resolution failure: {}", err);
        let hook = self.unhandled.borrow().clone();
        match hook {
            Some(hook) => hook(err),
            None => self.scheduler.schedule(Box::new(move || {
                panic!("unhandled module resolution failure: {err}")
            })),
        }
    }
}
