// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Docker event handling.
//!
//! | Event | Reaction |
//! |-------|----------|
//! | network create | connect proxy, wait for members, generate |
//! | network destroy | remove configs and allowlists |
//! | network connect | regenerate (proxy connects are ignored) |
//! | network disconnect | orphan cleanup once the container is gone and no service member remains |
//! | container start (proxy) | reconnect the proxy to every proxy network |
//! | container start (other) | regenerate each proxy network of the container |
//! | container destroy | deferred orphan check of the project network |
//!
//! Network events for networks without the proxy suffix are ignored.

use super::retry::event_stream_backoff;
use super::Reconciler;
use crate::metrics;
use crate::runtime::WatchEvent;
use anyhow::Result;
use futures::StreamExt;
use std::collections::BTreeSet;
use tracing::{debug, error, info, warn};

impl Reconciler {
    /// Connect the proxy to every proxy network and generate its configs.
    ///
    /// Configs of managed networks that no longer exist are removed. Used at
    /// startup and after the event stream was lost.
    ///
    /// # Returns
    ///
    /// Number of proxy networks processed.
    ///
    /// # Errors
    ///
    /// Returns an error when the networks cannot be listed.
    pub async fn process_existing_networks(&self) -> Result<usize> {
        let networks = self.proxy_networks().await?;
        info!(count = networks.len(), "Processing existing proxy networks");

        let mut processed = 0;
        for network in &networks {
            if self.shutdown.is_shutdown() {
                break;
            }
            if let Err(e) = self.connect_proxy(network).await {
                warn!(network = %network, error = %e, "Failed to connect proxy");
            }
            if let Err(e) = self.generate_configs_for_network(network).await {
                error!(network = %network, error = %e, "Failed to generate configs");
            }
            processed += 1;
        }

        self.remove_vanished_networks(&networks).await;
        Ok(processed)
    }

    async fn remove_vanished_networks(&self, existing: &[String]) {
        let on_disk: BTreeSet<String> = self
            .store
            .list_configs()
            .into_iter()
            .filter(|c| c.managed)
            .map(|c| c.network)
            .collect();

        for network in on_disk.iter().filter(|n| !existing.contains(n)) {
            info!(network = %network, "Network no longer exists");
            self.remove_network_configs(network).await;
        }
    }

    async fn remove_network_configs(&self, network: &str) {
        match self.store.remove_config(network) {
            Ok(removed) => {
                metrics::record_configs_removed(removed);
                info!(network = %network, removed = removed, "Removed configs");
            }
            Err(e) => error!(network = %network, error = %e, "Failed to remove configs"),
        }
        self.allowlist.unregister_network(network).await;
        self.refresh_status().await;
    }

    /// React to one classified Docker event.
    ///
    /// # Errors
    ///
    /// Returns an error when the reaction fails; the event loop logs it and
    /// carries on.
    pub async fn handle_event(&self, event: &WatchEvent) -> Result<()> {
        if let Some(network) = event.network() {
            if !self.settings.is_proxy_network(network) {
                return Ok(());
            }
        }

        match event {
            WatchEvent::NetworkCreated { network } => {
                info!(network = %network, "New proxy network detected");
                if let Err(e) = self.connect_proxy(network).await {
                    warn!(network = %network, error = %e, "Failed to connect proxy");
                }
                self.generate_configs_for_network_with_retry(network)
                    .await?;
            }
            WatchEvent::NetworkDestroyed { network } => {
                info!(network = %network, "Proxy network removed");
                self.remove_network_configs(network).await;
            }
            WatchEvent::NetworkConnected { network, container } => {
                let Some(details) = self.runtime.inspect_container(container).await? else {
                    debug!(container = %container, "Connected container already gone");
                    return Ok(());
                };
                if self.settings.is_proxy_container(&details.name) {
                    return Ok(());
                }
                info!(container = %details.name, network = %network, "Container connected");
                self.generate_configs_for_network_with_retry(network)
                    .await?;
            }
            WatchEvent::NetworkDisconnected { network, container } => {
                if let Some(details) = self.runtime.inspect_container(container).await? {
                    debug!(
                        container = %details.name,
                        network = %network,
                        "Disconnected container still exists"
                    );
                    return Ok(());
                }
                if !self.has_service_members(network).await? {
                    self.cleanup_network(network).await?;
                }
            }
            WatchEvent::ContainerStarted { name, .. } if self.settings.is_proxy_container(name) => {
                info!(container = %name, "Proxy container started, reconnecting networks");
                for network in self.proxy_networks().await? {
                    if let Err(e) = self.connect_proxy(&network).await {
                        warn!(network = %network, error = %e, "Failed to reconnect proxy");
                    }
                }
            }
            WatchEvent::ContainerStarted { id, name } => {
                let Some(details) = self.runtime.inspect_container(id).await? else {
                    return Ok(());
                };
                for network in details
                    .networks
                    .iter()
                    .filter(|n| self.settings.is_proxy_network(n))
                {
                    debug!(container = %name, network = %network, "Container started");
                    if let Err(e) = self.generate_configs_for_network(network).await {
                        error!(network = %network, error = %e, "Failed to generate configs");
                    }
                }
            }
            WatchEvent::ContainerDestroyed { name, .. } => {
                if !self.settings.is_proxy_container(name) {
                    self.schedule_destroy_check(name);
                }
            }
            WatchEvent::Ignored => {}
        }
        Ok(())
    }

    /// Consume Docker events until shutdown.
    ///
    /// Events are handled one at a time in receipt order. A lost subscription is
    /// re-established with exponential backoff and followed by a full resync.
    pub async fn run_event_loop(&self) {
        let mut backoff = event_stream_backoff();
        let mut resync = false;

        loop {
            let subscription = tokio::select! {
                result = self.runtime.events() => result,
                () = self.shutdown.cancelled() => return,
            };

            match subscription {
                Ok(mut events) => {
                    backoff.reset();
                    if resync {
                        info!("Event stream re-established, resynchronising");
                        if let Err(e) = self.process_existing_networks().await {
                            error!(error = %e, "Resync failed");
                        }
                    }
                    info!("Watching for events");

                    loop {
                        let next = tokio::select! {
                            next = events.next() => next,
                            () = self.shutdown.cancelled() => {
                                info!("Event loop stopped");
                                return;
                            }
                        };
                        match next {
                            Some(Ok(event)) => {
                                metrics::record_event(&event.kind, &event.action);
                                let watch_event = WatchEvent::from_runtime(&event);
                                if let Err(e) = self.handle_event(&watch_event).await {
                                    error!(event = ?watch_event, error = %e, "Failed to handle event");
                                }
                            }
                            Some(Err(e)) => {
                                warn!(error = %e, "Event stream failed");
                                break;
                            }
                            None => {
                                warn!("Event stream closed");
                                break;
                            }
                        }
                    }
                }
                Err(e) => warn!(error = %e, "Failed to subscribe to events"),
            }

            resync = true;
            let delay = backoff.next_backoff();
            info!(retry_after = ?delay, "Reconnecting to event stream");
            if !self.shutdown.sleep(delay).await {
                return;
            }
        }
    }
}
