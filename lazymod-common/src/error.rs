use std::sync::Arc;

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum ModuleError {
    #[error("{}", describe_not_found(.name, .requester.as_deref()))]
    ModuleNotFound {
        name: String,
        requester: Option<String>,
    },

    #[error("Circular dependence has been detected: \"{}\"", .path.join(" -> "))]
    CircularDependency { path: Vec<String> },

    #[error("Declaration of module \"{name}\" has already been provided")]
    DeclarationAlreadyProvided { name: String },

    #[error("Multiple declarations of module \"{name}\" have been detected")]
    MultipleDeclarationDisallowed { name: String },

    #[error("{}", describe_override(.name, .requester.as_deref()))]
    DependencyOverrideDisallowed {
        name: String,
        requester: Option<String>,
    },

    #[error("Module \"{name}\" is not resolved")]
    NotResolved { name: String },

    #[error("Module \"{module}\" has no dependency declared as \"{alias}\"")]
    UndeclaredDependency { module: String, alias: String },

    #[error("{0}")]
    User(Arc<dyn std::error::Error + Send + Sync>),

    #[error("Request for {0} was dropped before it settled")]
    Abandoned(String),

    #[error("Invalid dependency spec: {0}")]
    InvalidSpec(String),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("I/O Error: {0}")]
    Io(#[from] Arc<std::io::Error>),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] Arc<serde_json::Error>),
}

impl ModuleError {
    /// Wraps an arbitrary error passed to `provide` by a factory.
    pub fn user<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        ModuleError::User(Arc::new(err))
    }

    /// Builds a user error from a plain message.
    pub fn message(msg: impl Into<String>) -> Self {
        ModuleError::User(Arc::new(Message(msg.into())))
    }

    /// Whether this error originates from a factory rather than the engine.
    pub fn is_user(&self) -> bool {
        matches!(self, ModuleError::User(_))
    }
}

/// Plain-text error used by [`ModuleError::message`].
#[derive(Error, Debug)]
#[error("{0}")]
pub struct Message(pub String);

fn describe_not_found(name: &str, requester: Option<&str>) -> String {
    match requester {
        Some(requester) => format!("Module \"{requester}\": can't resolve dependence \"{name}\""),
        None => format!("Required module \"{name}\" can't be resolved"),
    }
}

fn describe_override(name: &str, requester: Option<&str>) -> String {
    match requester {
        Some(requester) => format!(
            "Dependency override of module \"{name}\" for module \"{requester}\" have been detected"
        ),
        None => format!("Dependency override of module \"{name}\" have been detected"),
    }
}

impl From<std::io::Error> for ModuleError {
    fn from(err: std::io::Error) -> Self {
        ModuleError::Io(Arc::new(err))
    }
}

impl From<serde_json::Error> for ModuleError {
    fn from(err: serde_json::Error) -> Self {
        ModuleError::Json(Arc::new(err))
    }
}

pub type Result<T> = std::result::Result<T, ModuleError>;
