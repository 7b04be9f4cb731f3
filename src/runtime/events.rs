// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Docker event decoding.
//!
//! `GET /events` answers with one JSON object per line for as long as the
//! connection stays open. [`decode_events`] turns the raw body chunks into
//! [`RuntimeEvent`]s, and [`WatchEvent::from_runtime`] classifies them into the
//! lifecycle transitions the reconciler reacts to.

use super::EventStream;
use crate::errors::RuntimeError;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use tracing::warn;

/// Event object as emitted by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "PascalCase")]
pub struct RuntimeEvent {
    #[serde(rename = "Type", default)]
    pub kind: String,
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub actor: EventActor,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Default)]
pub struct EventActor {
    #[serde(rename = "ID", default)]
    pub id: String,
    #[serde(rename = "Attributes", default)]
    pub attributes: HashMap<String, String>,
}

impl RuntimeEvent {
    fn attribute(&self, name: &str) -> Option<String> {
        self.actor.attributes.get(name).cloned()
    }
}

/// Lifecycle transitions the reconciler handles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    NetworkCreated { network: String },
    NetworkDestroyed { network: String },
    NetworkConnected { network: String, container: String },
    NetworkDisconnected { network: String, container: String },
    ContainerStarted { id: String, name: String },
    ContainerDestroyed { id: String, name: String },
    /// Any other event
    Ignored,
}

impl WatchEvent {
    /// Classify an engine event.
    ///
    /// Network events carry the network name in the `name` attribute and the
    /// container id in `container`; container events carry the container name
    /// in `name`.
    #[must_use]
    pub fn from_runtime(event: &RuntimeEvent) -> Self {
        let name = event.attribute("name").unwrap_or_default();
        match (event.kind.as_str(), event.action.as_str()) {
            ("network", "create") => Self::NetworkCreated { network: name },
            ("network", "destroy") => Self::NetworkDestroyed { network: name },
            ("network", "connect") => Self::NetworkConnected {
                network: name,
                container: event.attribute("container").unwrap_or_default(),
            },
            ("network", "disconnect") => Self::NetworkDisconnected {
                network: name,
                container: event.attribute("container").unwrap_or_default(),
            },
            ("container", "start") => Self::ContainerStarted {
                id: event.actor.id.clone(),
                name: name.trim_start_matches('/').to_string(),
            },
            ("container", "destroy") => Self::ContainerDestroyed {
                id: event.actor.id.clone(),
                name: name.trim_start_matches('/').to_string(),
            },
            _ => Self::Ignored,
        }
    }

    /// Network the event concerns, if any.
    #[must_use]
    pub fn network(&self) -> Option<&str> {
        match self {
            Self::NetworkCreated { network }
            | Self::NetworkDestroyed { network }
            | Self::NetworkConnected { network, .. }
            | Self::NetworkDisconnected { network, .. } => Some(network),
            _ => None,
        }
    }
}

/// Move every complete line of `buf` into `out` as decoded events.
fn drain_lines(buf: &mut Vec<u8>, out: &mut VecDeque<Result<RuntimeEvent, RuntimeError>>) {
    while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
        let line: Vec<u8> = buf.drain(..=pos).collect();
        push_line(&line, out);
    }
}

fn push_line(line: &[u8], out: &mut VecDeque<Result<RuntimeEvent, RuntimeError>>) {
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    if text.is_empty() {
        return;
    }
    match serde_json::from_str::<RuntimeEvent>(text) {
        Ok(event) => out.push_back(Ok(event)),
        Err(e) => warn!(error = %e, "Skipping undecodable Docker event"),
    }
}

/// Decode a newline-delimited JSON body into events.
///
/// Malformed lines are skipped; a transport error is yielded once and ends the
/// stream.
pub fn decode_events<S>(chunks: S) -> EventStream
where
    S: Stream<Item = Result<Bytes, RuntimeError>> + Send + 'static,
{
    struct State<S> {
        chunks: std::pin::Pin<Box<S>>,
        buf: Vec<u8>,
        pending: VecDeque<Result<RuntimeEvent, RuntimeError>>,
        done: bool,
    }

    let state = State {
        chunks: Box::pin(chunks),
        buf: Vec::new(),
        pending: VecDeque::new(),
        done: false,
    };

    futures::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.done {
                return None;
            }
            match state.chunks.next().await {
                Some(Ok(chunk)) => {
                    state.buf.extend_from_slice(&chunk);
                    drain_lines(&mut state.buf, &mut state.pending);
                }
                Some(Err(e)) => {
                    state.done = true;
                    state.pending.push_back(Err(e));
                }
                None => {
                    state.done = true;
                    let rest = std::mem::take(&mut state.buf);
                    push_line(&rest, &mut state.pending);
                }
            }
        }
    })
    .boxed()
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod events_tests;
