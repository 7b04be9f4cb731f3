// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for the Caddy watcher.
//!
//! This module provides specialized error types for:
//! - Validation of the `CADDY_*` environment surface
//! - Caddyfile compilation
//! - Config file persistence
//! - Docker Engine API calls
//! - DNS-over-HTTPS lookups
//!
//! Application glue (startup and the long-lived loops) wraps these in `anyhow::Error`.

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while turning a container environment into a `ServiceSpec`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    /// The trigger key is present but other mandatory keys are absent
    #[error("missing {keys} ({trigger}={domain})")]
    MissingKeys {
        /// Comma separated names of the missing keys
        keys: String,
        /// Name of the trigger key that was present
        trigger: String,
        /// Raw value of the trigger key
        domain: String,
    },

    /// Visibility class is not one of the supported values
    #[error("invalid {key}: {value} (must be internal|external|cloudflare)")]
    InvalidType {
        /// Key that carried the value
        key: String,
        /// The rejected value
        value: String,
    },

    /// Port is not a number
    #[error("invalid {key}: {value} (must be numeric)")]
    InvalidPort {
        /// Key that carried the value
        key: String,
        /// The rejected value
        value: String,
    },

    /// A hostname failed RFC 952 style validation
    #[error("invalid domain: {domain}")]
    InvalidDomain {
        /// The rejected hostname
        domain: String,
    },

    /// The domain key contained only separators
    #[error("no domains in {key}")]
    NoDomains {
        /// Key that carried the empty list
        key: String,
    },

    /// TLS provider is not supported
    #[error("invalid {key}: {value} (must be cloudflare|hetzner|http)")]
    InvalidTlsProvider {
        /// Key that carried the value
        key: String,
        /// The rejected value
        value: String,
    },

    /// Validation failure of one service in multi-service mode
    #[error("service {service}: {source}")]
    Service {
        /// Service discriminator
        service: String,
        /// Underlying validation error
        #[source]
        source: Box<SpecError>,
    },
}

/// Errors produced by the Caddyfile compiler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// Upstream is not `host:port` with a numeric port
    #[error("invalid upstream '{upstream}' for {container}")]
    InvalidUpstream {
        /// Service identity
        container: String,
        /// The rejected upstream
        upstream: String,
    },

    /// A spec without hostnames cannot produce a site block
    #[error("no domains for {container}")]
    NoDomains {
        /// Service identity
        container: String,
    },
}

/// Errors produced by the config store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Compilation failed before anything was written
    #[error(transparent)]
    Compile(#[from] CompileError),

    /// Filesystem operation failed
    #[error("filesystem error at {}: {source}", path.display())]
    Io {
        /// Path the operation targeted
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    /// Wrap an I/O error with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors produced while talking to the Docker Engine API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RuntimeError {
    /// Could not reach the engine
    #[error("failed to connect to Docker at {endpoint}: {reason}")]
    Connect {
        /// Engine endpoint
        endpoint: String,
        /// Transport error
        reason: String,
    },

    /// The engine answered with a non-success status
    #[error("Docker API {method} {path} returned {status}: {message}")]
    Status {
        /// HTTP method
        method: String,
        /// Request path
        path: String,
        /// HTTP status code
        status: u16,
        /// Engine error message
        message: String,
    },

    /// Response body could not be decoded
    #[error("failed to decode Docker response for {path}: {reason}")]
    Decode {
        /// Request path
        path: String,
        /// Decoder error
        reason: String,
    },

    /// `DOCKER_HOST` has an unsupported scheme
    #[error("unsupported Docker host '{host}' (expected unix:// or tcp://)")]
    InvalidHost {
        /// The rejected host
        host: String,
    },

    /// The event stream ended or broke
    #[error("Docker event stream closed: {reason}")]
    StreamClosed {
        /// Why the stream ended
        reason: String,
    },
}

impl RuntimeError {
    /// Whether the engine reported the target as missing (HTTP 404).
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

/// Errors produced by DNS-over-HTTPS lookups.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DnsError {
    /// The request could not be sent or timed out
    #[error("DoH request to {endpoint} failed: {reason}")]
    Request {
        /// Provider endpoint
        endpoint: String,
        /// Transport error
        reason: String,
    },

    /// The provider answered with a non-success status
    #[error("DoH provider {endpoint} returned HTTP {status}")]
    Status {
        /// Provider endpoint
        endpoint: String,
        /// HTTP status code
        status: u16,
    },

    /// The answer was not valid DNS JSON
    #[error("failed to decode DoH answer from {endpoint}: {reason}")]
    Decode {
        /// Provider endpoint
        endpoint: String,
        /// Decoder error
        reason: String,
    },

    /// Every provider failed or returned nothing
    #[error("no addresses found for {host}")]
    NoAnswers {
        /// Hostname that was queried
        host: String,
    },
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
