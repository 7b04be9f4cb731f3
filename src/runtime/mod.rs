// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Container runtime boundary.
//!
//! The reconciler only talks to the runtime through [`ContainerRuntime`]. The
//! production implementation is [`docker::DockerClient`]; tests drive the
//! reconciler with an in-memory implementation.

pub mod docker;
pub mod events;

pub use docker::DockerClient;
pub use events::{decode_events, RuntimeEvent, WatchEvent};

use crate::errors::RuntimeError;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::collections::HashMap;

/// Stream of runtime events, ending when the connection closes.
pub type EventStream = BoxStream<'static, Result<RuntimeEvent, RuntimeError>>;

/// A container attached to a network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerSummary {
    pub id: String,
    /// Name without the leading `/`
    pub name: String,
}

/// Inspection result of a single container.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContainerDetails {
    pub id: String,
    /// Name without the leading `/`
    pub name: String,
    pub env: HashMap<String, String>,
    /// Names of the networks the container is attached to
    pub networks: Vec<String>,
    pub running: bool,
}

/// Split `KEY=VALUE` pairs; entries without `=` map to an empty value.
#[must_use]
pub fn env_map(entries: &[String]) -> HashMap<String, String> {
    entries
        .iter()
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) => (key.to_string(), value.to_string()),
            None => (entry.clone(), String::new()),
        })
        .collect()
}

/// Operations the watcher needs from the container engine.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Names of every network.
    async fn list_networks(&self) -> Result<Vec<String>, RuntimeError>;

    /// Attach `container` to `network`; already attached is success.
    async fn connect_network(&self, network: &str, container: &str) -> Result<(), RuntimeError>;

    /// Detach `container` from `network`; not attached is success.
    async fn disconnect_network(&self, network: &str, container: &str)
        -> Result<(), RuntimeError>;

    /// Remove `network`; missing or still in use is success.
    async fn remove_network(&self, network: &str) -> Result<(), RuntimeError>;

    /// Running containers attached to `network`.
    async fn network_containers(&self, network: &str)
        -> Result<Vec<ContainerSummary>, RuntimeError>;

    /// Inspect a container by id or name; `None` when it no longer exists.
    async fn inspect_container(&self, id: &str) -> Result<Option<ContainerDetails>, RuntimeError>;

    /// Subscribe to network and container events.
    async fn events(&self) -> Result<EventStream, RuntimeError>;
}
