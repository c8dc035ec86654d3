//! In-process event bus and the runtime's event vocabulary

mod bus;
mod types;

pub use bus::{EventBus, EventCallback, SubscriptionId};
pub use types::{RuntimeEvent, names};
