// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Docker Engine API client.
//!
//! Requests use hyper's HTTP/1 client over the engine's unix socket
//! (`unix:///var/run/docker.sock`) or a TCP endpoint (`tcp://host:2375`). Each
//! request opens its own connection; the event subscription keeps its
//! connection for the lifetime of the stream.

use super::{env_map, ContainerDetails, ContainerRuntime, ContainerSummary, EventStream};
use crate::constants::DOCKER_API_VERSION;
use crate::errors::RuntimeError;
use crate::runtime::events::decode_events;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use http_body_util::{BodyExt, BodyStream, Full};
use hyper::body::Incoming;
use hyper::client::conn::http1;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tracing::{debug, info};

/// Where the engine listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transport {
    Unix(String),
    Tcp(String),
}

impl Transport {
    /// Parse a `DOCKER_HOST` value.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidHost`] for unsupported schemes.
    pub fn parse(host: &str) -> Result<Self, RuntimeError> {
        if let Some(path) = host.strip_prefix("unix://") {
            Ok(Self::Unix(path.to_string()))
        } else if host.starts_with('/') {
            Ok(Self::Unix(host.to_string()))
        } else if let Some(addr) = host
            .strip_prefix("tcp://")
            .or_else(|| host.strip_prefix("http://"))
        {
            Ok(Self::Tcp(addr.trim_end_matches('/').to_string()))
        } else {
            Err(RuntimeError::InvalidHost {
                host: host.to_string(),
            })
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NetworkResponse {
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerListItem {
    id: String,
    #[serde(default)]
    names: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerInspect {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    config: InspectConfig,
    #[serde(default)]
    state: InspectState,
    #[serde(default)]
    network_settings: InspectNetworkSettings,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectConfig {
    #[serde(default)]
    env: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectState {
    #[serde(default)]
    running: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InspectNetworkSettings {
    #[serde(default)]
    networks: Option<HashMap<String, serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(default)]
    message: String,
}

/// Docker Engine API client.
#[derive(Debug, Clone)]
pub struct DockerClient {
    transport: Transport,
    endpoint: String,
}

impl DockerClient {
    /// Create a client for `host` (a `DOCKER_HOST` value).
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError::InvalidHost`] for unsupported schemes.
    pub fn new(host: &str) -> Result<Self, RuntimeError> {
        Ok(Self {
            transport: Transport::parse(host)?,
            endpoint: host.to_string(),
        })
    }

    /// Check that the engine answers.
    ///
    /// # Errors
    ///
    /// Returns [`RuntimeError`] when the engine cannot be reached.
    pub async fn ping(&self) -> Result<(), RuntimeError> {
        let (status, body) = self.request(Method::GET, "/_ping", None).await?;
        self.check(&Method::GET, "/_ping", status, &body)?;
        info!(endpoint = %self.endpoint, "Connected to Docker");
        Ok(())
    }

    fn connect_error(&self, e: impl std::fmt::Display) -> RuntimeError {
        RuntimeError::Connect {
            endpoint: self.endpoint.clone(),
            reason: e.to_string(),
        }
    }

    async fn handshake<T>(&self, io: T) -> Result<http1::SendRequest<Full<Bytes>>, RuntimeError>
    where
        T: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (sender, conn) = http1::Builder::new()
            .handshake::<_, Full<Bytes>>(TokioIo::new(io))
            .await
            .map_err(|e| self.connect_error(e))?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "Docker connection closed with error");
            }
        });
        Ok(sender)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<Response<Incoming>, RuntimeError> {
        let (mut sender, host) = match &self.transport {
            #[cfg(unix)]
            Transport::Unix(socket) => {
                let stream = tokio::net::UnixStream::connect(socket)
                    .await
                    .map_err(|e| self.connect_error(e))?;
                (self.handshake(stream).await?, "localhost".to_string())
            }
            #[cfg(not(unix))]
            Transport::Unix(_) => {
                return Err(RuntimeError::InvalidHost {
                    host: self.endpoint.clone(),
                })
            }
            Transport::Tcp(addr) => {
                let stream = TcpStream::connect(addr)
                    .await
                    .map_err(|e| self.connect_error(e))?;
                (self.handshake(stream).await?, addr.clone())
            }
        };

        let payload = match body {
            Some(value) => Bytes::from(value.to_string()),
            None => Bytes::new(),
        };
        let request = Request::builder()
            .method(method)
            .uri(format!("/{DOCKER_API_VERSION}{path}"))
            .header("Host", host)
            .header("Content-Type", "application/json")
            .body(Full::new(payload))
            .map_err(|e| self.connect_error(e))?;

        sender
            .send_request(request)
            .await
            .map_err(|e| self.connect_error(e))
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<(StatusCode, Bytes), RuntimeError> {
        let response = self.send(method, path, body).await?;
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .map_err(|e| self.connect_error(e))?
            .to_bytes();
        Ok((status, bytes))
    }

    fn check(
        &self,
        method: &Method,
        path: &str,
        status: StatusCode,
        body: &Bytes,
    ) -> Result<(), RuntimeError> {
        if status.is_success() {
            return Ok(());
        }
        Err(status_error(method, path, status, body))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RuntimeError> {
        let (status, body) = self.request(Method::GET, path, None).await?;
        self.check(&Method::GET, path, status, &body)?;
        serde_json::from_slice(&body).map_err(|e| RuntimeError::Decode {
            path: path.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Query-string encoding of a Docker `filters` argument.
#[must_use]
pub fn encode_filters(filters: &serde_json::Value) -> String {
    url::form_urlencoded::byte_serialize(filters.to_string().as_bytes()).collect()
}

/// Error for a non-success response, using the engine's `message` when present.
fn status_error(method: &Method, path: &str, status: StatusCode, body: &Bytes) -> RuntimeError {
    let message = serde_json::from_slice::<ErrorResponse>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| String::from_utf8_lossy(body).to_string());
    RuntimeError::Status {
        method: method.to_string(),
        path: path.to_string(),
        status: status.as_u16(),
        message,
    }
}

/// Treat acknowledged no-op responses as success.
fn tolerate(result: Result<(), RuntimeError>, benign: &[&str]) -> Result<(), RuntimeError> {
    match result {
        Err(RuntimeError::Status { ref message, .. })
            if benign.iter().any(|b| message.contains(b)) =>
        {
            debug!(message = %message, "Ignoring benign Docker response");
            Ok(())
        }
        other => other,
    }
}

#[async_trait]
impl ContainerRuntime for DockerClient {
    async fn list_networks(&self) -> Result<Vec<String>, RuntimeError> {
        let networks: Vec<NetworkResponse> = self.get_json("/networks").await?;
        Ok(networks.into_iter().map(|n| n.name).collect())
    }

    async fn connect_network(&self, network: &str, container: &str) -> Result<(), RuntimeError> {
        let path = format!("/networks/{network}/connect");
        let (status, body) = self
            .request(Method::POST, &path, Some(json!({ "Container": container })))
            .await?;
        tolerate(
            self.check(&Method::POST, &path, status, &body),
            &["already exists"],
        )
    }

    async fn disconnect_network(
        &self,
        network: &str,
        container: &str,
    ) -> Result<(), RuntimeError> {
        let path = format!("/networks/{network}/disconnect");
        let (status, body) = self
            .request(
                Method::POST,
                &path,
                Some(json!({ "Container": container, "Force": false })),
            )
            .await?;
        tolerate(
            self.check(&Method::POST, &path, status, &body),
            &["is not connected"],
        )
    }

    async fn remove_network(&self, network: &str) -> Result<(), RuntimeError> {
        let path = format!("/networks/{network}");
        let (status, body) = self.request(Method::DELETE, &path, None).await?;
        match self.check(&Method::DELETE, &path, status, &body) {
            Err(e) if e.is_not_found() => Ok(()),
            other => tolerate(other, &["not found", "has active endpoints"]),
        }
    }

    async fn network_containers(
        &self,
        network: &str,
    ) -> Result<Vec<ContainerSummary>, RuntimeError> {
        let filters = encode_filters(&json!({ "network": [network] }));
        let list: Vec<ContainerListItem> = self
            .get_json(&format!("/containers/json?filters={filters}"))
            .await?;
        Ok(list
            .into_iter()
            .map(|c| ContainerSummary {
                name: c
                    .names
                    .first()
                    .map(|n| n.trim_start_matches('/').to_string())
                    .unwrap_or_default(),
                id: c.id,
            })
            .collect())
    }

    async fn inspect_container(&self, id: &str) -> Result<Option<ContainerDetails>, RuntimeError> {
        let inspect: ContainerInspect = match self.get_json(&format!("/containers/{id}/json")).await
        {
            Ok(inspect) => inspect,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        let mut networks: Vec<String> = inspect
            .network_settings
            .networks
            .map(|n| n.into_keys().collect())
            .unwrap_or_default();
        networks.sort();

        Ok(Some(ContainerDetails {
            id: inspect.id,
            name: inspect.name.trim_start_matches('/').to_string(),
            env: env_map(&inspect.config.env.unwrap_or_default()),
            networks,
            running: inspect.state.running,
        }))
    }

    async fn events(&self) -> Result<EventStream, RuntimeError> {
        let filters = encode_filters(&json!({ "type": ["network", "container"] }));
        let path = format!("/events?filters={filters}");
        let response = self.send(Method::GET, &path, None).await?;

        let (parts, body) = response.into_parts();
        if !parts.status.is_success() {
            let bytes = body
                .collect()
                .await
                .map(http_body_util::Collected::to_bytes)
                .unwrap_or_default();
            return Err(status_error(&Method::GET, &path, parts.status, &bytes));
        }

        let chunks = BodyStream::new(body).filter_map(|frame| async move {
            match frame {
                Ok(frame) => frame.into_data().ok().map(Ok),
                Err(e) => Some(Err(RuntimeError::StreamClosed {
                    reason: e.to_string(),
                })),
            }
        });
        info!("Subscribed to Docker events");
        Ok(decode_events(chunks))
    }
}

#[cfg(test)]
#[path = "docker_tests.rs"]
mod docker_tests;
