// lazymod-common/src/dependency/mod.rs
pub mod definition;
pub mod specs;

pub use definition::{DependencySpec, Overrides, RawSpec};
pub use specs::IntoSpecs;
