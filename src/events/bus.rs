// ModKit - Event Bus
// Copyright (C) 2025 Akaere Networks
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Synchronous publish/subscribe
//!
//! Delivery happens on the emitting thread, in subscription order, over a
//! snapshot of the subscriber list taken when `emit` starts. Callbacks may
//! therefore subscribe or unsubscribe while being delivered to. A callback
//! that returns an error or panics is logged and skipped; the emitter never
//! sees it.

use serde_json::Value;
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, RwLock};

use super::types::RuntimeEvent;
use crate::{log_debug, log_error};

/// Opaque token identifying one subscription
pub type SubscriptionId = String;

/// Subscriber callback
pub type EventCallback = Arc<dyn Fn(&Value) -> anyhow::Result<()> + Send + Sync>;

#[derive(Default)]
pub struct EventBus {
    /// event name -> subscribers in subscription order
    subscriptions: RwLock<HashMap<String, Vec<(SubscriptionId, EventCallback)>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe `callback` to `event`, returning the token needed to unsubscribe
    pub fn subscribe<F>(&self, event: &str, callback: F) -> SubscriptionId
    where
        F: Fn(&Value) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = uuid::Uuid::new_v4().simple().to_string();
        let mut subscriptions = self
            .subscriptions
            .write()
            .unwrap_or_else(|e| e.into_inner());
        subscriptions
            .entry(event.to_string())
            .or_default()
            .push((id.clone(), Arc::new(callback)));
        log_debug!("Subscribed {} to '{}'", id, event);
        id
    }

    /// Remove a subscription. Returns false if no such subscription exists
    pub fn unsubscribe(&self, event: &str, id: &str) -> bool {
        let mut subscriptions = self
            .subscriptions
            .write()
            .unwrap_or_else(|e| e.into_inner());
        let Some(subscribers) = subscriptions.get_mut(event) else {
            return false;
        };

        let before = subscribers.len();
        subscribers.retain(|(sub_id, _)| sub_id != id);
        let removed = subscribers.len() != before;

        if subscribers.is_empty() {
            subscriptions.remove(event);
        }
        removed
    }

    /// Deliver `payload` to every subscriber of `event`
    ///
    /// Returns the number of callbacks that completed without error.
    pub fn emit(&self, event: &str, payload: Value) -> usize {
        let snapshot: Vec<(SubscriptionId, EventCallback)> = {
            let subscriptions = self
                .subscriptions
                .read()
                .unwrap_or_else(|e| e.into_inner());
            match subscriptions.get(event) {
                Some(subscribers) => subscribers.clone(),
                None => return 0,
            }
        };

        let mut delivered = 0;
        for (id, callback) in snapshot {
            match panic::catch_unwind(AssertUnwindSafe(|| callback(&payload))) {
                Ok(Ok(())) => delivered += 1,
                Ok(Err(e)) => {
                    log_error!("Error in event handler {} for {}: {:#}", id, event, e);
                }
                Err(_) => {
                    log_error!("Event handler {} for {} panicked", id, event);
                }
            }
        }
        delivered
    }

    /// Emit a typed runtime event
    pub fn publish(&self, event: RuntimeEvent) -> usize {
        self.emit(event.name(), event.payload())
    }

    pub fn subscriber_count(&self, event: &str) -> usize {
        self.subscriptions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(event)
            .map_or(0, Vec::len)
    }

    /// Drop every subscription
    pub fn clear(&self) {
        self.subscriptions
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_subscribe_and_emit() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();

        bus.subscribe("messageSend", move |payload| {
            sink.lock().unwrap().push(payload.clone());
            Ok(())
        });

        let delivered = bus.emit("messageSend", json!({"content": "hi", "channelId": "1"}));
        assert_eq!(delivered, 1);
        assert_eq!(seen.lock().unwrap()[0]["content"], "hi");
    }

    #[test]
    fn test_emit_without_subscribers() {
        let bus = EventBus::new();
        assert_eq!(bus.emit("nobody", Value::Null), 0);
    }

    #[test]
    fn test_failing_subscriber_does_not_block_later_ones() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let first = order.clone();
        bus.subscribe("pluginEnabled", move |_| {
            first.lock().unwrap().push("first");
            Err(anyhow::anyhow!("observer broke"))
        });
        bus.subscribe("pluginEnabled", |_| panic!("observer panicked"));
        let third = order.clone();
        bus.subscribe("pluginEnabled", move |_| {
            third.lock().unwrap().push("third");
            Ok(())
        });

        let delivered = bus.emit("pluginEnabled", json!({"id": "a.plugin.lua"}));
        assert_eq!(delivered, 1);
        assert_eq!(*order.lock().unwrap(), vec!["first", "third"]);
    }

    #[test]
    fn test_unsubscribe() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = count.clone();

        let id = bus.subscribe("themeApplied", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert!(!bus.unsubscribe("themeRemoved", &id));
        assert!(bus.unsubscribe("themeApplied", &id));
        assert!(!bus.unsubscribe("themeApplied", &id));

        bus.emit("themeApplied", Value::Null);
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(bus.subscriber_count("themeApplied"), 0);
    }

    #[test]
    fn test_tokens_are_unique() {
        let bus = EventBus::new();
        let a = bus.subscribe("x", |_| Ok(()));
        let b = bus.subscribe("x", |_| Ok(()));
        assert_ne!(a, b);
        assert_eq!(bus.subscriber_count("x"), 2);
    }

    #[test]
    fn test_reentrant_unsubscribe_during_emit() {
        let bus = Arc::new(EventBus::new());
        let count = Arc::new(AtomicUsize::new(0));

        let slot: Arc<Mutex<Option<SubscriptionId>>> = Arc::new(Mutex::new(None));
        let inner_bus = bus.clone();
        let inner_slot = slot.clone();
        let counter = count.clone();
        let id = bus.subscribe("once", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = inner_slot.lock().unwrap().take() {
                inner_bus.unsubscribe("once", &id);
            }
            Ok(())
        });
        *slot.lock().unwrap() = Some(id);

        bus.emit("once", Value::Null);
        bus.emit("once", Value::Null);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }
}
