// lazymod-core/src/engine.rs
use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::channel::oneshot;
use lazymod_common::error::{ModuleError, Result};
use lazymod_common::{DependencySpec, IntoSpecs, Options, OptionsUpdate};
use tracing::{debug, trace};

use crate::batcher::{Batcher, Request};
use crate::declaration::{Factory, ModuleState, Provide};
use crate::deps::Deps;
use crate::registry::{ModuleInfo, Registry, Stat};
use crate::scheduler::{LocalScheduler, Scheduler};

pub(crate) type UnhandledHook = Rc<dyn Fn(ModuleError)>;

pub(crate) struct Inner<T> {
    pub(crate) registry: RefCell<Registry<T>>,
    pub(crate) options: Cell<Options>,
    pub(crate) batcher: Batcher<T>,
    pub(crate) scheduler: Rc<dyn Scheduler>,
    pub(crate) unhandled: RefCell<Option<UnhandledHook>>,
}

/// A module system instance: a registry of declarations plus the machinery
/// to resolve them on demand.
///
/// Cloning yields another handle to the same instance, which is how
/// factories and callbacks define or require further modules. Independent
/// instances never share state.
pub struct Modules<T> {
    inner: Rc<Inner<T>>,
}

impl<T> Clone for Modules<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Modules<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Modules")
            .field("options", &self.inner.options.get())
            .field("queued", &self.inner.batcher.len())
            .finish()
    }
}

impl<T: Clone + 'static> Modules<T> {
    pub fn new(scheduler: impl Scheduler + 'static) -> Self {
        Self::with_options(scheduler, Options::default())
    }

    pub fn with_options(scheduler: impl Scheduler + 'static, options: Options) -> Self {
        debug!("Creating module system with {:?}", options);
        Self {
            inner: Rc::new(Inner {
                registry: RefCell::new(Registry::default()),
                options: Cell::new(options),
                batcher: Batcher::default(),
                scheduler: Rc::new(scheduler),
                unhandled: RefCell::new(None),
            }),
        }
    }

    /// Instance flushing through the current tokio `LocalSet`.
    pub fn local() -> Self {
        Self::new(LocalScheduler)
    }

    /// Instance configured from the `LAZYMOD_*` environment variables.
    pub fn from_env(scheduler: impl Scheduler + 'static) -> Result<Self> {
        Ok(Self::with_options(scheduler, Options::load()?))
    }

    /// Defines (or redefines) `name`. A redefinition receives the value of
    /// the declaration it replaces as its third factory argument.
    pub fn define<D, F>(&self, name: impl Into<String>, deps: D, factory: F)
    where
        D: IntoSpecs,
        F: Fn(Provide<T>, Deps<T>, Option<T>) + 'static,
    {
        let specs = deps.into_specs();
        let factory: Factory<T> = Rc::new(factory);
        self.inner
            .registry
            .borrow_mut()
            .define(name.into(), specs, factory);
    }

    /// [`Modules::define`] without dependencies.
    pub fn define_leaf<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(Provide<T>, Deps<T>, Option<T>) + 'static,
    {
        self.define(name, Vec::<DependencySpec>::new(), factory);
    }

    /// Requires `names`, a single name or spec or a list of them.
    /// `on_success` runs once all of them have settled.
    /// Failures go to the unhandled-error path, see
    /// [`Modules::on_unhandled_error`].
    pub fn require<N, S>(&self, names: N, on_success: S)
    where
        N: IntoSpecs,
        S: FnOnce(Deps<T>) + 'static,
    {
        self.enqueue(names, Box::new(on_success), None);
    }

    pub fn require_or_else<N, S, E>(&self, names: N, on_success: S, on_error: E)
    where
        N: IntoSpecs,
        S: FnOnce(Deps<T>) + 'static,
        E: FnOnce(ModuleError) + 'static,
    {
        self.enqueue(names, Box::new(on_success), Some(Box::new(on_error)));
    }

    /// Future flavour of [`Modules::require_or_else`]. The request is queued
    /// immediately; the future only observes its outcome.
    pub fn require_async<N>(&self, names: N) -> impl Future<Output = Result<Deps<T>>>
    where
        N: IntoSpecs,
    {
        let specs = names.into_specs();
        let label = specs
            .iter()
            .map(|spec| spec.target.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        let (tx, rx) = oneshot::channel();
        let tx = Rc::new(RefCell::new(Some(tx)));
        let on_error_tx = Rc::clone(&tx);

        self.enqueue(
            specs,
            Box::new(move |deps: Deps<T>| {
                let sender = tx.borrow_mut().take();
                if let Some(sender) = sender {
                    let _ = sender.send(Ok(deps));
                }
            }),
            Some(Box::new(move |err: ModuleError| {
                let sender = on_error_tx.borrow_mut().take();
                match sender {
                    Some(sender) => {
                        let _ = sender.send(Err(err));
                    }
                    None => trace!("Request already settled, dropping late error: {}", err),
                }
            })),
        );

        async move {
            rx.await
                .unwrap_or_else(|_| Err(ModuleError::Abandoned(label)))
        }
    }

    fn enqueue<N: IntoSpecs>(
        &self,
        names: N,
        on_success: Box<dyn FnOnce(Deps<T>)>,
        on_error: Option<Box<dyn FnOnce(ModuleError)>>,
    ) {
        let request = Request {
            specs: names.into_specs(),
            on_success,
            on_error,
        };
        if self.inner.batcher.enqueue(request) {
            trace!("Scheduling require flush");
            let inner = Rc::clone(&self.inner);
            self.inner.scheduler.schedule(Box::new(move || inner.flush()));
        }
    }

    pub fn state(&self, name: &str) -> ModuleState {
        self.inner.registry.borrow().state(name)
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.inner.registry.borrow().is_defined(name)
    }

    pub fn stat(&self) -> Stat {
        self.inner.registry.borrow().stat()
    }

    pub fn describe(&self, name: &str) -> Option<ModuleInfo> {
        self.inner.registry.borrow().describe(name)
    }

    /// Defined module names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.inner.registry.borrow().names()
    }

    pub fn options(&self) -> Options {
        self.inner.options.get()
    }

    /// Merges `update` into the current options. Takes effect for every
    /// resolution step started afterwards.
    pub fn set_options(&self, update: OptionsUpdate) {
        let mut options = self.inner.options.get();
        options.merge(update);
        debug!("Options updated: {:?}", options);
        self.inner.options.set(options);
    }

    /// Routes failures of requests without an error callback to `hook`
    /// instead of re-raising them.
    pub fn on_unhandled_error(&self, hook: impl Fn(ModuleError) + 'static) {
        *self.inner.unhandled.borrow_mut() = Some(Rc::new(hook));
    }
}
