//! Capability table shared between the extractor and the API facade

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use super::module::HostObject;
use crate::log_debug;

/// Host-internal stores and services the facade depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Capability {
    MessageActions,
    UserStore,
    ChannelStore,
    GuildStore,
    PresenceStore,
    ReactionModule,
}

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::MessageActions,
        Capability::UserStore,
        Capability::ChannelStore,
        Capability::GuildStore,
        Capability::PresenceStore,
        Capability::ReactionModule,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Capability::MessageActions => "MessageActions",
            Capability::UserStore => "UserStore",
            Capability::ChannelStore => "ChannelStore",
            Capability::GuildStore => "GuildStore",
            Capability::PresenceStore => "PresenceStore",
            Capability::ReactionModule => "ReactionModule",
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability name -> captured host object
///
/// May stay partially empty forever when the host never exposes a given
/// store. The first object classified for a capability is kept.
#[derive(Default)]
pub struct CapabilityTable {
    handles: RwLock<HashMap<Capability, Arc<dyn HostObject>>>,
}

impl CapabilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `handle` for `capability`. Returns false if one was already captured
    pub fn insert(&self, capability: Capability, handle: Arc<dyn HostObject>) -> bool {
        let mut handles = self.handles.write().unwrap_or_else(|e| e.into_inner());
        if handles.contains_key(&capability) {
            log_debug!("{} already captured, ignoring duplicate", capability);
            return false;
        }
        handles.insert(capability, handle);
        true
    }

    pub fn get(&self, capability: Capability) -> Option<Arc<dyn HostObject>> {
        self.handles
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&capability)
            .cloned()
    }

    pub fn contains(&self, capability: Capability) -> bool {
        self.handles
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&capability)
    }

    /// Captured capabilities, in declaration order
    pub fn available(&self) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|c| self.contains(*c))
            .collect()
    }

    /// Capabilities the host has not exposed (yet)
    pub fn missing(&self) -> Vec<Capability> {
        Capability::ALL
            .into_iter()
            .filter(|c| !self.contains(*c))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.handles.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.handles
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::MethodTable;

    #[test]
    fn test_first_capture_wins() {
        let table = CapabilityTable::new();
        let first = MethodTable::new().into_object();
        let second = MethodTable::new().into_object();

        assert!(table.insert(Capability::UserStore, first.clone()));
        assert!(!table.insert(Capability::UserStore, second));
        assert!(Arc::ptr_eq(&table.get(Capability::UserStore).unwrap(), &first));
    }

    #[test]
    fn test_available_and_missing() {
        let table = CapabilityTable::new();
        assert!(table.is_empty());
        assert_eq!(table.missing().len(), 6);

        table.insert(Capability::GuildStore, MethodTable::new().into_object());
        table.insert(Capability::MessageActions, MethodTable::new().into_object());

        assert_eq!(
            table.available(),
            vec![Capability::MessageActions, Capability::GuildStore]
        );
        assert_eq!(table.missing().len(), 4);

        table.clear();
        assert!(table.get(Capability::GuildStore).is_none());
    }

    #[test]
    fn test_display_names() {
        assert_eq!(Capability::ReactionModule.to_string(), "ReactionModule");
    }
}
