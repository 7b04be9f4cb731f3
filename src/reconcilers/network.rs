// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Config generation for one proxy network.

use super::Reconciler;
use crate::errors::RuntimeError;
use crate::metrics;
use crate::runtime::ContainerSummary;
use crate::spec::{parse_all_service_env, SpecKey};
use anyhow::Result;
use std::collections::BTreeSet;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Outcome of one generation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationReport {
    /// Configs written
    pub written: usize,
    /// Members that declared nothing or no longer exist
    pub skipped: usize,
    /// Inspection, validation, and write failures
    pub failed: usize,
    /// Stale managed configs removed
    pub pruned: usize,
}

impl GenerationReport {
    /// Whether every member was processed without failure.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

impl Reconciler {
    /// Regenerate every config of `network` from its current members.
    ///
    /// The proxy container is skipped. A member that fails inspection, validation,
    /// or writing is logged and counted without stopping the pass. Only a clean
    /// pass removes managed configs of the network that it did not produce.
    ///
    /// # Errors
    ///
    /// Returns an error when the members cannot be listed or stale configs cannot
    /// be listed.
    pub async fn generate_configs_for_network(&self, network: &str) -> Result<GenerationReport> {
        let members = self.runtime.network_containers(network).await?;
        self.generate_from_members(network, &members).await
    }

    /// [`Self::generate_configs_for_network`], waiting for members of a freshly
    /// created or connected network.
    ///
    /// Listing is retried while it fails or returns nothing but the proxy.
    ///
    /// # Errors
    ///
    /// Returns the last listing error once the retries are exhausted.
    pub async fn generate_configs_for_network_with_retry(
        &self,
        network: &str,
    ) -> Result<GenerationReport> {
        let members = self
            .settings
            .retry
            .run("list network members", &self.shutdown, || async {
                let members = self
                    .runtime
                    .network_containers(network)
                    .await
                    .map_err(MembersError::Runtime)?;
                if members
                    .iter()
                    .all(|m| self.settings.is_proxy_container(&m.name))
                {
                    return Err(MembersError::Pending(members));
                }
                Ok(members)
            })
            .await;

        let members = match members {
            Ok(members) | Err(MembersError::Pending(members)) => members,
            Err(MembersError::Runtime(e)) => return Err(e.into()),
        };
        self.generate_from_members(network, &members).await
    }

    async fn generate_from_members(
        &self,
        network: &str,
        members: &[ContainerSummary],
    ) -> Result<GenerationReport> {
        let started = Instant::now();
        let mut report = GenerationReport::default();
        let mut produced: BTreeSet<SpecKey> = BTreeSet::new();

        for member in members {
            if self.settings.is_proxy_container(&member.name) {
                continue;
            }

            let details = match self.runtime.inspect_container(&member.id).await {
                Ok(Some(details)) => details,
                Ok(None) => {
                    debug!(container = %member.name, "Container gone before inspection");
                    report.skipped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(container = %member.name, error = %e, "Failed to inspect container");
                    report.failed += 1;
                    continue;
                }
            };

            let specs = parse_all_service_env(&details.env, network, &details.name);
            if specs.is_empty() {
                debug!(container = %details.name, "Container declares no service");
                report.skipped += 1;
                continue;
            }

            for spec in specs {
                let spec = match spec {
                    Ok(spec) => spec,
                    Err(e) => {
                        warn!(
                            container = %details.name,
                            network = %network,
                            error = %e,
                            "Invalid service declaration"
                        );
                        metrics::record_validation_error();
                        report.failed += 1;
                        continue;
                    }
                };

                let key = spec.key();
                if spec.has_allowlist() {
                    self.allowlist.register(&spec).await;
                } else {
                    self.allowlist.unregister(&key).await;
                }
                let resolved = self.allowlist.resolved_ips(&key).await;

                match self.store.write_config(&spec, &resolved) {
                    Ok(path) => {
                        info!(key = %key, path = %path.display(), "Generated config");
                        metrics::record_config_written(spec.visibility.as_str());
                        produced.insert(key);
                        report.written += 1;
                    }
                    Err(e) => {
                        error!(key = %key, error = %e, "Failed to write config");
                        report.failed += 1;
                    }
                }
            }
        }

        if report.is_clean() {
            report.pruned = self.prune_stale(network, &produced).await?;
        } else {
            debug!(network = %network, failed = report.failed, "Skipping stale config pruning");
        }

        metrics::record_generation(report.is_clean(), started.elapsed());
        self.refresh_status().await;

        info!(
            network = %network,
            written = report.written,
            skipped = report.skipped,
            failed = report.failed,
            pruned = report.pruned,
            "Generation pass complete"
        );
        Ok(report)
    }

    async fn prune_stale(&self, network: &str, produced: &BTreeSet<SpecKey>) -> Result<usize> {
        let mut pruned = 0;
        for key in self.store.managed_keys(network)? {
            if produced.contains(&key) {
                continue;
            }
            if self.store.remove_key(&key)? {
                info!(key = %key, "Removed config of departed service");
                pruned += 1;
            }
            self.allowlist.unregister(&key).await;
        }
        metrics::record_configs_removed(pruned);
        Ok(pruned)
    }
}

/// Why a member listing is retried.
#[derive(Debug)]
enum MembersError {
    /// Listing succeeded but only the proxy is attached so far
    Pending(Vec<ContainerSummary>),
    Runtime(RuntimeError),
}

impl std::fmt::Display for MembersError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending(members) => {
                write!(f, "no service members yet ({} attached)", members.len())
            }
            Self::Runtime(e) => write!(f, "{e}"),
        }
    }
}
