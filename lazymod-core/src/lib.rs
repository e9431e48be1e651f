// lazymod-core/src/lib.rs
//! Lazy, asynchronous module resolution.
//!
//! Modules are *defined* with a factory and a list of dependencies, then
//! *required* by name. Requiring a module resolves its dependency graph on
//! demand, memoizes every produced value and hands the results back through
//! a callback (or a future, see [`Modules::require_async`]).
//!
//! The engine is single-threaded and continuation driven: factories may
//! settle synchronously or at any later point, and the only thing the engine
//! needs from its host is a [`Scheduler`] to run the batched `require` flush
//! after the current synchronous turn.

mod batcher;
pub mod declaration;
pub mod deps;
mod engine;
pub mod registry;
mod resolver;
pub mod scheduler;
mod variant;

// Re-export key types for easier use by the CLI crate
pub use declaration::{DeclState, Factory, ModuleState, Provide};
pub use deps::Deps;
pub use engine::Modules;
pub use lazymod_common::{
    DependencySpec, IntoSpecs, ModuleError, Options, OptionsUpdate, Overrides, Result,
};
pub use registry::{ModuleInfo, Stat};
pub use scheduler::{LocalScheduler, Scheduler, Task, TickQueue};
