// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Allowlist resolution and refresh.
//!
//! External services may narrow access with `CADDY_ALLOWLIST`. Entries can be IP
//! literals, CIDRs or hostnames; hostnames are resolved through [`doh`] and only
//! the resulting addresses ever reach a config file.
//!
//! # Fail Closed
//!
//! When a refresh resolves nothing but a previous resolution exists, the previous
//! set is kept. A set that was never resolved stays empty, which still compiles to
//! private ranges only.
//!
//! # Change Notification
//!
//! [`AllowlistResolver::refresh_all`] publishes every key whose sorted address set
//! changed on the channel returned by [`AllowlistResolver::new`]. Publishing
//! happens after the lock is released.

pub mod doh;

pub use doh::{DohClient, HostLookup};

use crate::metrics;
use crate::shutdown::Shutdown;
use crate::spec::{ServiceSpec, SpecKey};
use ipnet::IpNet;
use std::collections::{BTreeSet, HashMap};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct ResolverState {
    entries: HashMap<SpecKey, Vec<String>>,
    resolved: HashMap<SpecKey, Vec<String>>,
}

/// Registry of allowlists and their latest resolution.
pub struct AllowlistResolver {
    lookup: Arc<dyn HostLookup>,
    state: RwLock<ResolverState>,
    changes: mpsc::UnboundedSender<SpecKey>,
}

/// Whether `entry` is used verbatim rather than resolved.
#[must_use]
pub fn is_literal(entry: &str) -> bool {
    entry.parse::<IpAddr>().is_ok() || entry.parse::<IpNet>().is_ok()
}

/// Keep `previous` when the new resolution is empty.
fn with_fallback(resolved: Vec<String>, previous: Option<&Vec<String>>) -> Vec<String> {
    match previous {
        Some(previous) if resolved.is_empty() && !previous.is_empty() => previous.clone(),
        _ => resolved,
    }
}

impl AllowlistResolver {
    /// Create a resolver and the receiving end of its change channel.
    #[must_use]
    pub fn new(lookup: Arc<dyn HostLookup>) -> (Self, mpsc::UnboundedReceiver<SpecKey>) {
        let (changes, rx) = mpsc::unbounded_channel();
        let resolver = Self {
            lookup,
            state: RwLock::new(ResolverState::default()),
            changes,
        };
        (resolver, rx)
    }

    /// Resolve entries to a sorted, de-duplicated address set.
    pub async fn resolve_entries(&self, entries: &[String]) -> Vec<String> {
        let mut addresses = BTreeSet::new();
        for entry in entries {
            if is_literal(entry) {
                addresses.insert(entry.clone());
                continue;
            }
            match self.lookup.lookup(entry).await {
                Ok(found) => addresses.extend(found),
                Err(e) => {
                    metrics::record_dns_failure();
                    warn!(host = %entry, error = %e, "Failed to resolve allowlist entry");
                }
            }
        }
        addresses.into_iter().collect()
    }

    /// Register the allowlist of `spec` and resolve it immediately.
    ///
    /// Specs without an allowlist are ignored.
    pub async fn register(&self, spec: &ServiceSpec) {
        if !spec.has_allowlist() {
            return;
        }
        let key = spec.key();
        let resolved = self.resolve_entries(&spec.allowlist).await;

        let mut state = self.state.write().await;
        // Previous addresses only stand in for the same entries
        let resolved = if state.entries.get(&key) == Some(&spec.allowlist) {
            with_fallback(resolved, state.resolved.get(&key))
        } else {
            resolved
        };
        debug!(key = %key, addresses = ?resolved, "Registered allowlist");
        state.entries.insert(key.clone(), spec.allowlist.clone());
        state.resolved.insert(key, resolved);
    }

    /// Forget the allowlist of `key`.
    ///
    /// # Returns
    ///
    /// Whether the key was registered.
    pub async fn unregister(&self, key: &SpecKey) -> bool {
        let mut state = self.state.write().await;
        state.resolved.remove(key);
        state.entries.remove(key).is_some()
    }

    /// Forget every allowlist of `network`.
    pub async fn unregister_network(&self, network: &str) -> usize {
        let mut state = self.state.write().await;
        let keys: Vec<SpecKey> = state
            .entries
            .keys()
            .filter(|k| k.network == network)
            .cloned()
            .collect();
        for key in &keys {
            state.entries.remove(key);
            state.resolved.remove(key);
        }
        keys.len()
    }

    /// Latest resolution for `key`, empty when unknown.
    pub async fn resolved_ips(&self, key: &SpecKey) -> Vec<String> {
        self.state
            .read()
            .await
            .resolved
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Registered raw entries for `key`.
    pub async fn entries(&self, key: &SpecKey) -> Vec<String> {
        self.state
            .read()
            .await
            .entries
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    /// Re-resolve every registered allowlist.
    ///
    /// # Returns
    ///
    /// Keys whose address set changed, also published on the change channel.
    pub async fn refresh_all(&self) -> Vec<SpecKey> {
        let snapshot: Vec<(SpecKey, Vec<String>)> = self
            .state
            .read()
            .await
            .entries
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        let mut fresh = Vec::with_capacity(snapshot.len());
        for (key, entries) in snapshot {
            let resolved = self.resolve_entries(&entries).await;
            fresh.push((key, entries, resolved));
        }

        let mut changed = Vec::new();
        {
            let mut state = self.state.write().await;
            for (key, entries, resolved) in fresh {
                // Skip keys unregistered or re-registered while resolving
                if state.entries.get(&key) != Some(&entries) {
                    continue;
                }
                let previous = state.resolved.get(&key);
                let resolved = with_fallback(resolved, previous);
                if previous != Some(&resolved) {
                    info!(key = %key, addresses = ?resolved, "Allowlist resolution changed");
                    changed.push(key.clone());
                }
                state.resolved.insert(key, resolved);
            }
        }

        for key in &changed {
            metrics::record_allowlist_change();
            if self.changes.send(key.clone()).is_err() {
                debug!(key = %key, "No listener for allowlist changes");
            }
        }
        changed
    }

    /// Refresh on a fixed interval until shutdown.
    pub async fn run(self: Arc<Self>, interval: Duration, shutdown: Shutdown) {
        info!(interval = ?interval, "Starting allowlist refresh loop");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick completes immediately; registration already resolved
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let changed = self.refresh_all().await;
                    debug!(changed = changed.len(), "Allowlist refresh complete");
                }
                () = shutdown.cancelled() => {
                    info!("Allowlist refresh loop stopped");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod mod_tests;
