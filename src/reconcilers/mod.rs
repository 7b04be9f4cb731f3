// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Reconciliation of Docker topology into site configs.
//!
//! The [`Reconciler`] keeps the config tree consistent with the containers
//! attached to proxy networks (networks whose name ends with the configured
//! suffix).
//!
//! # Triggers
//!
//! - [`Reconciler::process_existing_networks`] - startup pass over every proxy network
//! - [`Reconciler::handle_event`] - one Docker lifecycle event
//! - [`Reconciler::run_event_loop`] - subscription with reconnect and resync
//! - [`Reconciler::run_cleanup_loop`] - periodic orphan sweep
//! - [`notifier::run_allowlist_notifier`] - regeneration after allowlist changes
//!
//! Every pass ends by refreshing the status projection.

pub mod cleanup;
pub mod events;
pub mod network;
pub mod notifier;
pub mod retry;

pub use cleanup::extract_project_name;
pub use network::GenerationReport;
pub use notifier::run_allowlist_notifier;

use crate::allowlist::AllowlistResolver;
use crate::constants::{
    DEFAULT_CLEANUP_INTERVAL_SECS, DEFAULT_DESTROY_GRACE_PERIOD_SECS, RETRY_ATTEMPTS,
    RETRY_DELAY_MILLIS,
};
use crate::errors::RuntimeError;
use crate::runtime::ContainerRuntime;
use crate::shutdown::Shutdown;
use crate::status::StatusManager;
use crate::store::ConfigStore;
use retry::RetryPolicy;
use std::sync::Arc;
use std::time::Duration;

/// Tunables of the reconciler.
#[derive(Debug, Clone)]
pub struct ReconcileSettings {
    /// Name of the Caddy container
    pub proxy_container: String,
    /// Suffix identifying proxy networks
    pub network_suffix: String,
    /// Delay before checking a network after a container is destroyed
    pub destroy_grace: Duration,
    /// Orphan sweep interval
    pub cleanup_interval: Duration,
    /// Fixed retry for topology races
    pub retry: RetryPolicy,
}

impl ReconcileSettings {
    /// Settings with the default retry policy.
    #[must_use]
    pub fn new(proxy_container: impl Into<String>, network_suffix: impl Into<String>) -> Self {
        Self {
            proxy_container: proxy_container.into(),
            network_suffix: network_suffix.into(),
            destroy_grace: Duration::from_secs(DEFAULT_DESTROY_GRACE_PERIOD_SECS),
            cleanup_interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS),
            retry: RetryPolicy {
                attempts: RETRY_ATTEMPTS,
                delay: Duration::from_millis(RETRY_DELAY_MILLIS),
            },
        }
    }

    /// Whether the proxy joins `network`.
    #[must_use]
    pub fn is_proxy_network(&self, network: &str) -> bool {
        network.ends_with(&self.network_suffix)
    }

    #[must_use]
    pub fn is_proxy_container(&self, name: &str) -> bool {
        name.trim_start_matches('/') == self.proxy_container
    }
}

/// Shared state of every reconciliation task.
///
/// Cloning is cheap; detached tasks take their own clone.
#[derive(Clone)]
pub struct Reconciler {
    /// Container engine
    pub runtime: Arc<dyn ContainerRuntime>,

    /// Config tree on disk
    pub store: ConfigStore,

    /// Resolved allowlists, shared with the refresh loop
    pub allowlist: Arc<AllowlistResolver>,

    /// Status projection, shared with the status server
    pub status: Arc<StatusManager>,

    pub settings: ReconcileSettings,

    pub shutdown: Shutdown,
}

impl Reconciler {
    #[must_use]
    pub fn new(
        runtime: Arc<dyn ContainerRuntime>,
        store: ConfigStore,
        allowlist: Arc<AllowlistResolver>,
        status: Arc<StatusManager>,
        settings: ReconcileSettings,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            runtime,
            store,
            allowlist,
            status,
            settings,
            shutdown,
        }
    }

    /// Names of every proxy network.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] when the networks cannot be listed.
    pub async fn proxy_networks(&self) -> Result<Vec<String>, RuntimeError> {
        let mut networks: Vec<String> = self
            .runtime
            .list_networks()
            .await?
            .into_iter()
            .filter(|n| self.settings.is_proxy_network(n))
            .collect();
        networks.sort();
        Ok(networks)
    }

    /// Attach the proxy container to `network`, retrying races.
    ///
    /// # Errors
    ///
    /// Returns the last [`RuntimeError`] once the retries are exhausted.
    pub async fn connect_proxy(&self, network: &str) -> Result<(), RuntimeError> {
        let proxy = self.settings.proxy_container.as_str();
        self.settings
            .retry
            .run("connect proxy", &self.shutdown, || {
                self.runtime.connect_network(network, proxy)
            })
            .await
    }

    /// Rebuild the status projection from disk.
    pub async fn refresh_status(&self) {
        self.status.update(&self.store.list_configs()).await;
    }
}
