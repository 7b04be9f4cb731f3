// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! In-memory Docker engine and harness for reconciler integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use caddy_watcher::allowlist::{AllowlistResolver, HostLookup};
use caddy_watcher::errors::{DnsError, RuntimeError};
use caddy_watcher::reconcilers::retry::RetryPolicy;
use caddy_watcher::reconcilers::{ReconcileSettings, Reconciler};
use caddy_watcher::runtime::events::EventActor;
use caddy_watcher::runtime::{
    ContainerDetails, ContainerRuntime, ContainerSummary, EventStream, RuntimeEvent,
};
use caddy_watcher::shutdown::{self, ShutdownTrigger};
use caddy_watcher::spec::SpecKey;
use caddy_watcher::status::StatusManager;
use caddy_watcher::store::ConfigStore;
use futures::channel::mpsc;
use futures::StreamExt;
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc::UnboundedReceiver;

pub const PROXY: &str = "caddy-app-1";
pub const PROXY_ID: &str = "proxy0000001";

fn status_error(status: u16, path: &str, message: &str) -> RuntimeError {
    RuntimeError::Status {
        method: "POST".to_string(),
        path: path.to_string(),
        status,
        message: message.to_string(),
    }
}

#[derive(Default)]
struct EngineState {
    networks: BTreeSet<String>,
    containers: Vec<ContainerDetails>,
    subscribers: Vec<mpsc::UnboundedSender<Result<RuntimeEvent, RuntimeError>>>,
}

impl EngineState {
    fn find_mut(&mut self, id_or_name: &str) -> Option<&mut ContainerDetails> {
        self.containers
            .iter_mut()
            .find(|c| c.id == id_or_name || c.name == id_or_name)
    }
}

/// Docker engine kept in memory.
#[derive(Default)]
pub struct FakeRuntime {
    state: Mutex<EngineState>,
}

impl FakeRuntime {
    /// Engine with the proxy container running and attached to nothing.
    pub fn with_proxy() -> Arc<Self> {
        let runtime = Arc::new(Self::default());
        runtime.add_container(PROXY_ID, PROXY, &[], &[]);
        runtime
    }

    pub fn add_network(&self, name: &str) {
        self.state.lock().unwrap().networks.insert(name.to_string());
    }

    /// Delete `name` without any event, detaching every container.
    pub fn drop_network(&self, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.networks.remove(name);
        for container in &mut state.containers {
            container.networks.retain(|n| n != name);
        }
    }

    pub fn has_network(&self, name: &str) -> bool {
        self.state.lock().unwrap().networks.contains(name)
    }

    pub fn add_container(&self, id: &str, name: &str, env: &[(&str, &str)], networks: &[&str]) {
        let mut state = self.state.lock().unwrap();
        for network in networks {
            state.networks.insert((*network).to_string());
        }
        state.containers.push(ContainerDetails {
            id: id.to_string(),
            name: name.to_string(),
            env: env
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            networks: networks.iter().map(ToString::to_string).collect(),
            running: true,
        });
    }

    pub fn set_env(&self, id: &str, env: &[(&str, &str)]) {
        let mut state = self.state.lock().unwrap();
        if let Some(container) = state.find_mut(id) {
            container.env = env
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect();
        }
    }

    pub fn remove_container(&self, id: &str) {
        self.state
            .lock()
            .unwrap()
            .containers
            .retain(|c| c.id != id && c.name != id);
    }

    /// Whether `container` is attached to `network`.
    pub fn is_attached(&self, network: &str, container: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .containers
            .iter()
            .any(|c| {
                (c.id == container || c.name == container)
                    && c.networks.iter().any(|n| n == network)
            })
    }

    /// Deliver an event to every subscriber.
    pub fn emit(&self, kind: &str, action: &str, id: &str, attributes: &[(&str, &str)]) {
        let event = RuntimeEvent {
            kind: kind.to_string(),
            action: action.to_string(),
            actor: EventActor {
                id: id.to_string(),
                attributes: attributes
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
            },
        };
        let mut state = self.state.lock().unwrap();
        state
            .subscribers
            .retain(|tx| tx.unbounded_send(Ok(event.clone())).is_ok());
    }

    /// Drop every event subscription, as a daemon restart would.
    pub fn close_streams(&self) {
        self.state.lock().unwrap().subscribers.clear();
    }

    pub fn subscriber_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .subscribers
            .iter()
            .filter(|tx| !tx.is_closed())
            .count()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn list_networks(&self) -> Result<Vec<String>, RuntimeError> {
        Ok(self.state.lock().unwrap().networks.iter().cloned().collect())
    }

    async fn connect_network(&self, network: &str, container: &str) -> Result<(), RuntimeError> {
        let path = format!("/networks/{network}/connect");
        let mut state = self.state.lock().unwrap();
        if !state.networks.contains(network) {
            return Err(status_error(404, &path, "network not found"));
        }
        let Some(details) = state.find_mut(container) else {
            return Err(status_error(404, &path, "No such container"));
        };
        if !details.networks.iter().any(|n| n == network) {
            details.networks.push(network.to_string());
        }
        Ok(())
    }

    async fn disconnect_network(
        &self,
        network: &str,
        container: &str,
    ) -> Result<(), RuntimeError> {
        let mut state = self.state.lock().unwrap();
        if let Some(details) = state.find_mut(container) {
            details.networks.retain(|n| n != network);
        }
        Ok(())
    }

    async fn remove_network(&self, network: &str) -> Result<(), RuntimeError> {
        let mut state = self.state.lock().unwrap();
        let in_use = state
            .containers
            .iter()
            .any(|c| c.networks.iter().any(|n| n == network));
        if !in_use {
            state.networks.remove(network);
        }
        Ok(())
    }

    async fn network_containers(
        &self,
        network: &str,
    ) -> Result<Vec<ContainerSummary>, RuntimeError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .containers
            .iter()
            .filter(|c| c.running && c.networks.iter().any(|n| n == network))
            .map(|c| ContainerSummary {
                id: c.id.clone(),
                name: c.name.clone(),
            })
            .collect())
    }

    async fn inspect_container(&self, id: &str) -> Result<Option<ContainerDetails>, RuntimeError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .containers
            .iter()
            .find(|c| c.id == id || c.name == id)
            .cloned())
    }

    async fn events(&self) -> Result<EventStream, RuntimeError> {
        let (tx, rx) = mpsc::unbounded();
        self.state.lock().unwrap().subscribers.push(tx);
        Ok(rx.boxed())
    }
}

/// Lookup backed by a mutable table; missing hosts fail.
#[derive(Default)]
pub struct TableLookup {
    table: Mutex<HashMap<String, Vec<String>>>,
}

impl TableLookup {
    pub fn set(&self, host: &str, addresses: &[&str]) {
        self.table.lock().unwrap().insert(
            host.to_string(),
            addresses.iter().map(ToString::to_string).collect(),
        );
    }
}

#[async_trait]
impl HostLookup for TableLookup {
    async fn lookup(&self, host: &str) -> Result<Vec<String>, DnsError> {
        self.table
            .lock()
            .unwrap()
            .get(host)
            .cloned()
            .ok_or_else(|| DnsError::NoAnswers {
                host: host.to_string(),
            })
    }
}

/// Reconciler over a [`FakeRuntime`] writing into a temporary hosts dir.
pub struct Harness {
    pub runtime: Arc<FakeRuntime>,
    pub lookup: Arc<TableLookup>,
    pub reconciler: Reconciler,
    pub trigger: ShutdownTrigger,
    pub changes: Option<UnboundedReceiver<SpecKey>>,
    dir: TempDir,
}

impl Harness {
    pub fn new(runtime: Arc<FakeRuntime>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::new(dir.path());
        store.ensure_layout().unwrap();

        let lookup = Arc::new(TableLookup::default());
        let (resolver, changes) = AllowlistResolver::new(lookup.clone());
        let (trigger, shutdown) = shutdown::channel();

        let mut settings = ReconcileSettings::new(PROXY, "_caddy");
        settings.destroy_grace = Duration::from_millis(20);
        settings.retry = RetryPolicy {
            attempts: 3,
            delay: Duration::from_millis(10),
        };

        let reconciler = Reconciler::new(
            runtime.clone(),
            store,
            Arc::new(resolver),
            Arc::new(StatusManager::new(None, None)),
            settings,
            shutdown,
        );

        Self {
            runtime,
            lookup,
            reconciler,
            trigger,
            changes: Some(changes),
            dir,
        }
    }

    pub fn hosts_dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn config_path(&self, visibility: &str, stem: &str) -> PathBuf {
        self.dir.path().join(visibility).join(format!("{stem}.conf"))
    }

    pub fn read_config(&self, visibility: &str, stem: &str) -> Option<String> {
        std::fs::read_to_string(self.config_path(visibility, stem)).ok()
    }

    /// Every config file across the three partitions, as `type/name`.
    pub fn config_files(&self) -> Vec<String> {
        let mut files = Vec::new();
        for visibility in ["internal", "external", "cloudflare"] {
            let Ok(entries) = std::fs::read_dir(self.dir.path().join(visibility)) else {
                continue;
            };
            for entry in entries.flatten() {
                files.push(format!(
                    "{visibility}/{}",
                    entry.file_name().to_string_lossy()
                ));
            }
        }
        files.sort();
        files
    }
}

/// Poll `condition` until it holds or a few seconds pass.
pub async fn eventually(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..500 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
