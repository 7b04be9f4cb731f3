// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! DNS-over-HTTPS hostname lookups.
//!
//! Providers are queried in order using the JSON dialect
//! (`Accept: application/dns-json`). For each provider the `A` query must succeed;
//! the `AAAA` query is best effort. The first provider returning at least one
//! address wins.

use crate::constants::{DNS_TYPE_A, DNS_TYPE_AAAA, DOH_ACCEPT, DOH_ENDPOINTS, DOH_TIMEOUT_SECS};
use crate::errors::DnsError;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Resolves hostnames to IP address literals.
#[async_trait]
pub trait HostLookup: Send + Sync {
    /// Resolve `host` to its A and AAAA addresses.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError`] when no address could be obtained.
    async fn lookup(&self, host: &str) -> Result<Vec<String>, DnsError>;
}

#[derive(Debug, Deserialize)]
struct DohResponse {
    #[serde(rename = "Answer", default)]
    answer: Vec<DohAnswer>,
}

#[derive(Debug, Deserialize)]
struct DohAnswer {
    #[serde(rename = "type")]
    record_type: u16,
    data: String,
}

/// DoH client over a list of providers.
#[derive(Debug, Clone)]
pub struct DohClient {
    client: reqwest::Client,
    endpoints: Vec<String>,
}

impl DohClient {
    /// Client for the default public providers.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::Request`] when the HTTP client cannot be built.
    pub fn new() -> Result<Self, DnsError> {
        Self::with_endpoints(DOH_ENDPOINTS.iter().map(ToString::to_string).collect())
    }

    /// Client for a custom provider list.
    ///
    /// # Errors
    ///
    /// Returns [`DnsError::Request`] when the HTTP client cannot be built.
    pub fn with_endpoints(endpoints: Vec<String>) -> Result<Self, DnsError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DOH_TIMEOUT_SECS))
            .build()
            .map_err(|e| DnsError::Request {
                endpoint: "client".to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { client, endpoints })
    }

    async fn query(
        &self,
        endpoint: &str,
        host: &str,
        record_type: &str,
    ) -> Result<Vec<String>, DnsError> {
        let url = url::Url::parse_with_params(endpoint, &[("name", host), ("type", record_type)])
            .map_err(|e| DnsError::Request {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        let response = self
            .client
            .get(url)
            .header(ACCEPT, DOH_ACCEPT)
            .send()
            .await
            .map_err(|e| DnsError::Request {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(DnsError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }

        let body: DohResponse = response.json().await.map_err(|e| DnsError::Decode {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })?;

        Ok(body
            .answer
            .into_iter()
            .filter(|a| a.record_type == DNS_TYPE_A || a.record_type == DNS_TYPE_AAAA)
            .map(|a| a.data)
            .collect())
    }
}

#[async_trait]
impl HostLookup for DohClient {
    async fn lookup(&self, host: &str) -> Result<Vec<String>, DnsError> {
        for endpoint in &self.endpoints {
            let mut addresses = match self.query(endpoint, host, "A").await {
                Ok(addresses) => addresses,
                Err(e) => {
                    warn!(host = host, endpoint = %endpoint, error = %e, "DoH A query failed");
                    continue;
                }
            };

            match self.query(endpoint, host, "AAAA").await {
                Ok(v6) => addresses.extend(v6),
                Err(e) => debug!(host = host, endpoint = %endpoint, error = %e, "DoH AAAA query failed"),
            }

            if !addresses.is_empty() {
                debug!(host = host, endpoint = %endpoint, count = addresses.len(), "Resolved hostname");
                return Ok(addresses);
            }
        }

        Err(DnsError::NoAnswers {
            host: host.to_string(),
        })
    }
}

#[cfg(test)]
#[path = "doh_tests.rs"]
mod doh_tests;
