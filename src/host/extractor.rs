// ModKit - Capability Extractor
// Copyright (C) 2025 Akaere Networks
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Capability extraction from the host module registry
//!
//! The host never hands its stores over. Instead we wrap its module
//! registration entry point, run every module factory we see, and look at
//! the shape of the export: an object with both `getCurrentUser` and
//! `getUser` is the user store, and so on. The shapes live in a list of
//! [`ClassificationRule`]s so new capabilities are data, not control flow.
//!
//! Host module factories are untrusted and unversioned. A factory that
//! errors or panics is skipped; it never stops the others from being
//! classified.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::capability::{Capability, CapabilityTable};
use super::module::{HostError, HostObject, ModuleBody, ModuleRegistry, RegistrationHook};
use crate::config::HOST_POLL_INTERVAL;
use crate::{log_debug, log_info};

type Predicate = Arc<dyn Fn(&dyn HostObject) -> bool + Send + Sync>;

/// One (capability, predicate-over-export) pair
#[derive(Clone)]
pub struct ClassificationRule {
    pub capability: Capability,
    predicate: Predicate,
}

impl ClassificationRule {
    /// Match exports that expose every method in `methods`
    pub fn methods(capability: Capability, methods: &'static [&'static str]) -> Self {
        Self {
            capability,
            predicate: Arc::new(move |export| methods.iter().all(|m| export.has_method(m))),
        }
    }

    /// Match exports with an arbitrary predicate
    pub fn custom<F>(capability: Capability, predicate: F) -> Self
    where
        F: Fn(&dyn HostObject) -> bool + Send + Sync + 'static,
    {
        Self {
            capability,
            predicate: Arc::new(predicate),
        }
    }

    pub fn matches(&self, export: &dyn HostObject) -> bool {
        (self.predicate)(export)
    }
}

/// Method signatures that identify each capability
pub fn default_rules() -> Vec<ClassificationRule> {
    vec![
        ClassificationRule::methods(Capability::MessageActions, &["sendMessage", "editMessage"]),
        ClassificationRule::methods(Capability::UserStore, &["getCurrentUser", "getUser"]),
        ClassificationRule::methods(Capability::ChannelStore, &["getChannel", "getChannels"]),
        ClassificationRule::methods(Capability::GuildStore, &["getGuild", "getGuilds"]),
        ClassificationRule::methods(Capability::PresenceStore, &["getStatus", "getActivities"]),
        ClassificationRule::methods(Capability::ReactionModule, &["addReaction", "removeReaction"]),
    ]
}

/// Runs module factories and files their exports into the capability table
#[derive(Clone)]
pub struct Classifier {
    table: Arc<CapabilityTable>,
    rules: Arc<Vec<ClassificationRule>>,
}

impl Classifier {
    pub fn new(table: Arc<CapabilityTable>, rules: Vec<ClassificationRule>) -> Self {
        Self {
            table,
            rules: Arc::new(rules),
        }
    }

    /// First rule that matches `export`
    pub fn classify(&self, export: &dyn HostObject) -> Option<Capability> {
        self.rules
            .iter()
            .find(|rule| rule.matches(export))
            .map(|rule| rule.capability)
    }

    /// Instantiate one module and capture its export if it classifies
    pub fn process(&self, body: &ModuleBody) -> Option<Capability> {
        let export = match panic::catch_unwind(AssertUnwindSafe(|| body.factory.instantiate())) {
            Ok(Ok(Some(export))) => export,
            Ok(Ok(None)) => return None,
            Ok(Err(e)) => {
                log_debug!("Module {} factory failed: {}", body.id, e);
                return None;
            }
            Err(_) => {
                log_debug!("Module {} factory panicked", body.id);
                return None;
            }
        };

        let capability = self.classify(export.as_ref())?;
        if self.table.insert(capability, export) {
            log_info!("Captured {} from module {}", capability, body.id);
        }
        Some(capability)
    }

    /// Process a chunk, returning how many modules classified
    pub fn process_all(&self, chunk: &[ModuleBody]) -> usize {
        chunk.iter().filter_map(|body| self.process(body)).count()
    }
}

/// Watches the host registry and resolves a ready signal once attached
pub struct CapabilityExtractor {
    classifier: Classifier,
    poll_interval: Duration,
    ready_tx: watch::Sender<bool>,
}

impl CapabilityExtractor {
    pub fn new(table: Arc<CapabilityTable>) -> Self {
        Self::with_rules(table, default_rules())
    }

    pub fn with_rules(table: Arc<CapabilityTable>, rules: Vec<ClassificationRule>) -> Self {
        let (ready_tx, _) = watch::channel(false);
        Self {
            classifier: Classifier::new(table, rules),
            poll_interval: HOST_POLL_INTERVAL,
            ready_tx,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Intercept `registry` now and replay its history
    ///
    /// Returns the number of historical modules that classified.
    pub fn attach(&self, registry: &dyn ModuleRegistry) -> Result<usize, HostError> {
        let classifier = self.classifier.clone();
        let hook: RegistrationHook = Arc::new(move |chunk: &[ModuleBody]| {
            classifier.process_all(chunk);
        });

        let history = registry.intercept(hook)?;
        let classified = self.classifier.process_all(&history);
        self.ready_tx.send_replace(true);
        Ok(classified)
    }

    /// Wait for the registry entry point to appear, then attach
    ///
    /// Never times out; host start-up time is unbounded.
    pub async fn run(&self, registry: Arc<dyn ModuleRegistry>) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        loop {
            ticker.tick().await;
            if !registry.is_available() {
                continue;
            }
            match self.attach(registry.as_ref()) {
                Ok(classified) => {
                    log_info!(
                        "Host module registry intercepted, {} existing module(s) classified",
                        classified
                    );
                    return;
                }
                Err(e) => log_debug!("Host registry not attachable yet: {}", e),
            }
        }
    }

    /// Spawn [`run`](Self::run) on the current runtime
    pub fn spawn(self: &Arc<Self>, registry: Arc<dyn ModuleRegistry>) -> JoinHandle<()> {
        let extractor = self.clone();
        tokio::spawn(async move { extractor.run(registry).await })
    }

    pub fn is_ready(&self) -> bool {
        *self.ready_tx.borrow()
    }

    /// Resolves once the host registry has been intercepted
    pub async fn ready(&self) {
        let mut rx = self.ready_tx.subscribe();
        // The sender lives in self, so the channel cannot close under us
        let _ = rx.wait_for(|ready| *ready).await;
    }
}
