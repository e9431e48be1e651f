// lazymod-common/src/lib.rs
pub mod config;
pub mod dependency;
pub mod error;

// Re-export key types
pub use config::{Options, OptionsUpdate};
pub use dependency::{DependencySpec, IntoSpecs, Overrides};
pub use error::{ModuleError, Result};
