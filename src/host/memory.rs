//! In-memory host doubles
//!
//! Embedders that already hold host exports as Rust values (and the test
//! suite) use these instead of a live host.

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use super::module::{HostCall, HostError, HostObject, ModuleBody, ModuleRegistry, RegistrationHook};

type Method = Arc<dyn Fn(Vec<Value>) -> HostCall + Send + Sync>;

/// A [`HostObject`] assembled from named closures
#[derive(Clone, Default)]
pub struct MethodTable {
    methods: HashMap<String, Method>,
}

impl MethodTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_method<F>(mut self, name: &str, method: F) -> Self
    where
        F: Fn(Vec<Value>) -> HostCall + Send + Sync + 'static,
    {
        self.methods.insert(name.to_string(), Arc::new(method));
        self
    }

    pub fn into_object(self) -> Arc<dyn HostObject> {
        Arc::new(self)
    }
}

impl HostObject for MethodTable {
    fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    fn call(&self, method: &str, args: Vec<Value>) -> HostCall {
        match self.methods.get(method) {
            Some(f) => f(args),
            None => HostCall::failed(format!("{} is not a function", method)),
        }
    }
}

impl fmt::Debug for MethodTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.methods.keys().collect();
        names.sort();
        f.debug_struct("MethodTable").field("methods", &names).finish()
    }
}

#[derive(Default)]
struct RegistryState {
    available: bool,
    modules: Vec<ModuleBody>,
    hook: Option<RegistrationHook>,
}

/// A host module registry held in memory
#[derive(Default)]
pub struct MemoryModuleRegistry {
    state: Mutex<RegistryState>,
}

impl MemoryModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry whose entry point already exists
    pub fn available() -> Self {
        let registry = Self::default();
        registry.mark_available();
        registry
    }

    /// Simulate the host creating its entry point
    pub fn mark_available(&self) {
        self.lock().available = true;
    }

    /// Register a chunk of modules, forwarding it to the interception hook
    pub fn push(&self, chunk: Vec<ModuleBody>) {
        let hook = {
            let mut state = self.lock();
            state.modules.extend(chunk.iter().cloned());
            state.hook.clone()
        };

        // Outside the lock: the hook runs module factories
        if let Some(hook) = hook {
            hook(&chunk);
        }
    }

    pub fn len(&self) -> usize {
        self.lock().modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_intercepted(&self) -> bool {
        self.lock().hook.is_some()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl ModuleRegistry for MemoryModuleRegistry {
    fn is_available(&self) -> bool {
        self.lock().available
    }

    fn intercept(&self, hook: RegistrationHook) -> Result<Vec<ModuleBody>, HostError> {
        let mut state = self.lock();
        if !state.available {
            return Err(HostError::NotReady);
        }
        state.hook = Some(hook);
        Ok(state.modules.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_method_table_dispatch() {
        let object = MethodTable::new()
            .with_method("getUser", |args| HostCall::ready(json!({ "id": args[0] })))
            .into_object();

        assert!(object.has_method("getUser"));
        assert!(!object.has_method("getCurrentUser"));

        let user = object.call("getUser", vec![json!("7")]).resolve().await;
        assert_eq!(user, Ok(json!({"id": "7"})));

        let missing = object.call("getCurrentUser", vec![]).resolve().await;
        assert!(missing.is_err());
    }

    #[test]
    fn test_intercept_requires_availability() {
        let registry = MemoryModuleRegistry::new();
        let hook: RegistrationHook = Arc::new(|_: &[ModuleBody]| {});
        assert_eq!(
            registry.intercept(hook.clone()).unwrap_err(),
            HostError::NotReady
        );

        registry.mark_available();
        assert!(registry.intercept(hook).is_ok());
        assert!(registry.is_intercepted());
    }

    #[test]
    fn test_push_replays_history_and_forwards_new_chunks() {
        let registry = MemoryModuleRegistry::available();
        registry.push(vec![ModuleBody::from_fn("1", || Ok(None))]);

        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let history = registry
            .intercept(Arc::new(move |chunk: &[ModuleBody]| {
                counter.fetch_add(chunk.len(), Ordering::SeqCst);
            }))
            .unwrap();
        assert_eq!(history.len(), 1);

        registry.push(vec![
            ModuleBody::from_fn("2", || Ok(None)),
            ModuleBody::from_fn("3", || Ok(None)),
        ]);
        assert_eq!(seen.load(Ordering::SeqCst), 2);
        assert_eq!(registry.len(), 3);
    }
}
