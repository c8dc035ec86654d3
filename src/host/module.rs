//! Host module registry abstractions

use futures::future::BoxFuture;
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Failures raised while talking to host internals
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HostError {
    /// The host's registration entry point does not exist yet
    #[error("host module registry is not available yet")]
    NotReady,

    /// A host method or factory raised an error
    #[error("{0}")]
    Raised(String),

    /// A host method or factory panicked
    #[error("host code panicked: {0}")]
    Panicked(String),
}

impl HostError {
    pub fn raised(message: impl Into<String>) -> Self {
        Self::Raised(message.into())
    }

    /// Convert a caught panic payload
    pub fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        Self::Panicked(panic_message(payload.as_ref()))
    }
}

/// Best-effort text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

pub type HostResult = Result<Value, HostError>;

/// Result shape of a host method call
///
/// Host methods are not uniformly asynchronous: some return a value
/// immediately, others hand back something to wait on.
pub enum HostCall {
    Ready(HostResult),
    Deferred(BoxFuture<'static, HostResult>),
}

impl HostCall {
    pub fn ready(value: Value) -> Self {
        Self::Ready(Ok(value))
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Ready(Err(HostError::raised(message)))
    }

    pub fn deferred<F>(future: F) -> Self
    where
        F: Future<Output = HostResult> + Send + 'static,
    {
        Self::Deferred(Box::pin(future))
    }

    /// Wait for the call to settle, whichever shape it has
    pub async fn resolve(self) -> HostResult {
        match self {
            Self::Ready(result) => result,
            Self::Deferred(future) => future.await,
        }
    }
}

impl fmt::Debug for HostCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// An export object produced by a host module factory
pub trait HostObject: Send + Sync {
    fn has_method(&self, name: &str) -> bool;

    fn call(&self, method: &str, args: Vec<Value>) -> HostCall;
}

/// A host module body; instantiating it runs host code
pub trait ModuleFactory: Send + Sync {
    /// Run the factory and return its default export, if it has one
    fn instantiate(&self) -> Result<Option<Arc<dyn HostObject>>, HostError>;
}

impl<F> ModuleFactory for F
where
    F: Fn() -> Result<Option<Arc<dyn HostObject>>, HostError> + Send + Sync,
{
    fn instantiate(&self) -> Result<Option<Arc<dyn HostObject>>, HostError> {
        self()
    }
}

/// One module registered with the host
#[derive(Clone)]
pub struct ModuleBody {
    pub id: String,
    pub factory: Arc<dyn ModuleFactory>,
}

impl ModuleBody {
    pub fn new(id: impl Into<String>, factory: impl ModuleFactory + 'static) -> Self {
        Self {
            id: id.into(),
            factory: Arc::new(factory),
        }
    }

    /// Build a body from a closure factory
    pub fn from_fn<F>(id: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Result<Option<Arc<dyn HostObject>>, HostError> + Send + Sync + 'static,
    {
        Self::new(id, factory)
    }
}

impl fmt::Debug for ModuleBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleBody").field("id", &self.id).finish()
    }
}

/// Called with every chunk of modules the host registers after interception
pub type RegistrationHook = Arc<dyn Fn(&[ModuleBody]) + Send + Sync>;

/// The host's append-only module registration entry point
pub trait ModuleRegistry: Send + Sync {
    /// Whether the entry point exists yet; hosts create it lazily
    fn is_available(&self) -> bool;

    /// Wrap the entry point so `hook` sees every future registration
    ///
    /// Returns the modules registered before interception so they can be
    /// replayed through the same classification.
    fn intercept(&self, hook: RegistrationHook) -> Result<Vec<ModuleBody>, HostError>;
}
