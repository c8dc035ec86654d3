//! Integration with the host application's internals
//!
//! The host is never controlled by this crate. Everything here talks to it
//! through small traits:
//!
//! - [`ModuleRegistry`]: the host's module registration entry point
//! - [`HostObject`]: an export object whose methods we call by name
//!
//! The [`CapabilityExtractor`] watches the registry and fills the shared
//! [`CapabilityTable`]; the [`MessageSendShim`] turns observed network
//! requests into `messageSend` events.

pub mod capability;
pub mod extractor;
pub mod memory;
pub mod module;
pub mod shim;

pub use capability::{Capability, CapabilityTable};
pub use extractor::{CapabilityExtractor, ClassificationRule, Classifier};
pub use memory::{MemoryModuleRegistry, MethodTable};
pub use module::{
    HostCall, HostError, HostObject, HostResult, ModuleBody, ModuleFactory, ModuleRegistry,
    RegistrationHook,
};
pub use shim::{MessageSendShim, OutgoingRequest};
