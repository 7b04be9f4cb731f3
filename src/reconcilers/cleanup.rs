// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Orphaned network cleanup.
//!
//! A proxy network is orphaned once no container other than the proxy is
//! attached to it. Cleaning it up detaches the proxy, removes the network, and
//! removes every config it owned. Orphans are detected after a container is
//! destroyed (once a grace period has passed) and by a periodic sweep.

use super::Reconciler;
use crate::errors::RuntimeError;
use crate::metrics;
use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Derive the Compose project of a container name.
///
/// Compose names containers `{project}-{service}-{index}` (or with underscores
/// on older releases). The last two segments are dropped using the separator
/// that yields a project, hyphen first. Names with fewer than three segments
/// yield an empty string.
///
/// # Examples
///
/// ```
/// use caddy_watcher::reconcilers::extract_project_name;
///
/// assert_eq!(extract_project_name("visual-studio-code-app-1"), "visual-studio-code");
/// assert_eq!(extract_project_name("my_project_web_1"), "my_project");
/// assert_eq!(extract_project_name("app-1"), "");
/// ```
#[must_use]
pub fn extract_project_name(container: &str) -> String {
    let name = container.trim_start_matches('/');
    for separator in ["-", "_"] {
        let parts: Vec<&str> = name.split(separator).collect();
        if parts.len() >= 3 {
            return parts[..parts.len() - 2].join(separator);
        }
    }
    String::new()
}

impl Reconciler {
    /// Whether a container other than the proxy is attached to `network`.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] when the members cannot be listed.
    pub async fn has_service_members(&self, network: &str) -> Result<bool, RuntimeError> {
        let members = self.runtime.network_containers(network).await?;
        Ok(members
            .iter()
            .any(|m| !self.settings.is_proxy_container(&m.name)))
    }

    /// Detach the proxy from `network`, remove the network, and drop its configs.
    ///
    /// Runtime failures are logged; the configs are removed regardless.
    ///
    /// # Returns
    ///
    /// Number of config files removed.
    ///
    /// # Errors
    ///
    /// Returns an error when the configs cannot be removed.
    pub async fn cleanup_network(&self, network: &str) -> Result<usize> {
        info!(network = %network, "Cleaning up orphaned network");

        if let Err(e) = self
            .runtime
            .disconnect_network(network, &self.settings.proxy_container)
            .await
        {
            warn!(network = %network, error = %e, "Failed to disconnect proxy");
        }
        if let Err(e) = self.runtime.remove_network(network).await {
            warn!(network = %network, error = %e, "Failed to remove network");
        }

        let removed = self.store.remove_config(network)?;
        let unregistered = self.allowlist.unregister_network(network).await;
        metrics::record_configs_removed(removed);
        metrics::record_orphan_cleanup();
        self.refresh_status().await;

        info!(
            network = %network,
            removed = removed,
            allowlists = unregistered,
            "Orphaned network cleaned up"
        );
        Ok(removed)
    }

    /// Clean up `network` if only the proxy is left on it.
    ///
    /// # Returns
    ///
    /// `true` when the network was cleaned up.
    ///
    /// # Errors
    ///
    /// Returns an error when the members cannot be listed or the configs cannot
    /// be removed.
    pub async fn cleanup_if_orphaned(&self, network: &str) -> Result<bool> {
        if self.has_service_members(network).await? {
            debug!(network = %network, "Network still has service members");
            return Ok(false);
        }
        self.cleanup_network(network).await?;
        Ok(true)
    }

    /// Check every proxy network once.
    ///
    /// # Returns
    ///
    /// Number of networks cleaned up.
    pub async fn sweep_orphans(&self) -> usize {
        let networks = match self.proxy_networks().await {
            Ok(networks) => networks,
            Err(e) => {
                warn!(error = %e, "Orphan sweep: failed to list networks");
                return 0;
            }
        };

        let mut cleaned = 0;
        for network in networks {
            if self.shutdown.is_shutdown() {
                break;
            }
            match self.cleanup_if_orphaned(&network).await {
                Ok(true) => cleaned += 1,
                Ok(false) => {}
                Err(e) => warn!(network = %network, error = %e, "Orphan sweep failed for network"),
            }
        }
        cleaned
    }

    /// Sweep on the cleanup interval until shutdown.
    pub async fn run_cleanup_loop(&self) {
        let interval = self.settings.cleanup_interval;
        info!(interval = ?interval, "Orphan cleanup loop scheduled");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let cleaned = self.sweep_orphans().await;
                    debug!(cleaned = cleaned, "Orphan sweep complete");
                }
                () = self.shutdown.cancelled() => {
                    info!("Orphan cleanup loop stopped");
                    return;
                }
            }
        }
    }

    /// Check the project network of a destroyed container after the grace period.
    ///
    /// Compose destroys a project's containers one by one; waiting lets the
    /// network destroy event arrive first when the whole project goes down.
    pub fn schedule_destroy_check(&self, container: &str) -> JoinHandle<()> {
        let reconciler = self.clone();
        let container = container.to_string();

        tokio::spawn(async move {
            let project = extract_project_name(&container);
            if project.is_empty() {
                debug!(container = %container, "No project in container name");
                return;
            }
            let network = format!("{project}{}", reconciler.settings.network_suffix);

            if !reconciler
                .shutdown
                .sleep(reconciler.settings.destroy_grace)
                .await
            {
                return;
            }

            match reconciler.runtime.list_networks().await {
                Ok(networks) if networks.contains(&network) => {}
                Ok(_) => {
                    debug!(network = %network, "Network already gone");
                    return;
                }
                Err(e) => {
                    warn!(network = %network, error = %e, "Failed to list networks");
                    return;
                }
            }

            if let Err(e) = reconciler.cleanup_if_orphaned(&network).await {
                error!(network = %network, error = %e, "Deferred orphan check failed");
            }
        })
    }
}

#[cfg(test)]
#[path = "cleanup_tests.rs"]
mod cleanup_tests;
