// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Regeneration after allowlist changes.

use super::Reconciler;
use crate::spec::SpecKey;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{error, info};

/// Regenerate the network of every changed allowlist until shutdown or until
/// the resolver is dropped. Each regeneration runs as a detached task.
pub async fn run_allowlist_notifier(
    reconciler: Reconciler,
    mut changes: UnboundedReceiver<SpecKey>,
) {
    info!("Allowlist notifier started");
    loop {
        let key = tokio::select! {
            key = changes.recv() => key,
            () = reconciler.shutdown.cancelled() => break,
        };
        let Some(key) = key else {
            break;
        };

        info!(key = %key, "Allowlist changed, regenerating network");
        let task = reconciler.clone();
        tokio::spawn(async move {
            if let Err(e) = task.generate_configs_for_network(&key.network).await {
                error!(
                    network = %key.network,
                    error = %e,
                    "Regeneration after allowlist change failed"
                );
            }
        });
    }
    info!("Allowlist notifier stopped");
}
