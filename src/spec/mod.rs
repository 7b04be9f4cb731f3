// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Canonical service specification.
//!
//! A [`ServiceSpec`] is the validated form of one routable service declared by a
//! container through `CADDY_*` environment variables. Specs are rebuilt on every
//! reconciliation pass and never persisted; the generated Caddyfile is the only
//! durable artifact.
//!
//! # Identity
//!
//! A spec is identified by its [`SpecKey`], the pair of service identity (container
//! name, or `{container}-{service}` in multi-service mode) and routing domain
//! (Docker network). The key's display form `{container}_{network}` is the config
//! file stem.

use crate::constants::DEFAULT_AUTH_SERVER;
use crate::env_keys::{CADDY_DNS_PROVIDER, CADDY_TYPE};
use crate::errors::SpecError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod parse;

pub use parse::{is_valid_hostname, parse_all_service_env, parse_service_env, split_comma_separated};

/// Visibility class of a service. Each class is also an on-disk partition.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Reachable only from private ranges
    #[default]
    Internal,
    /// Reachable from the internet, optionally narrowed by an allowlist
    External,
    /// Reachable only through Cloudflare's edge
    Cloudflare,
}

impl Visibility {
    /// Every visibility class, in partition scan order.
    pub const ALL: [Visibility; 3] = [Self::Internal, Self::External, Self::Cloudflare];

    /// Lowercase name, also the partition directory name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Internal => "internal",
            Self::External => "external",
            Self::Cloudflare => "cloudflare",
        }
    }

    /// Parse a visibility value read from `key`.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::InvalidType`] for anything but the three known classes.
    pub fn parse_for_key(value: &str, key: &str) -> Result<Self, SpecError> {
        match value {
            "internal" => Ok(Self::Internal),
            "external" => Ok(Self::External),
            "cloudflare" => Ok(Self::Cloudflare),
            other => Err(SpecError::InvalidType {
                key: key.to_string(),
                value: other.to_string(),
            }),
        }
    }
}

impl FromStr for Visibility {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_for_key(s, CADDY_TYPE)
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Certificate issuance strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TlsProvider {
    /// ACME DNS challenge through Cloudflare
    #[default]
    Cloudflare,
    /// ACME DNS challenge through Hetzner DNS
    Hetzner,
    /// Caddy's default HTTP challenge, no provider snippet
    Http,
}

impl TlsProvider {
    /// Lowercase provider name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cloudflare => "cloudflare",
            Self::Hetzner => "hetzner",
            Self::Http => "http",
        }
    }

    /// Name of the TLS snippet to import, if the provider needs one.
    #[must_use]
    pub fn import_name(self) -> Option<String> {
        match self {
            Self::Http => None,
            other => Some(format!("tls-{}", other.as_str())),
        }
    }

    /// Parse a provider value read from `key`.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::InvalidTlsProvider`] for unsupported providers.
    pub fn parse_for_key(value: &str, key: &str) -> Result<Self, SpecError> {
        match value {
            "cloudflare" => Ok(Self::Cloudflare),
            "hetzner" => Ok(Self::Hetzner),
            "http" => Ok(Self::Http),
            other => Err(SpecError::InvalidTlsProvider {
                key: key.to_string(),
                value: other.to_string(),
            }),
        }
    }
}

impl FromStr for TlsProvider {
    type Err = SpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_for_key(s, CADDY_DNS_PROVIDER)
    }
}

impl fmt::Display for TlsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a spec and of its config file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpecKey {
    /// Service identity
    pub container: String,
    /// Routing domain (Docker network)
    pub network: String,
}

impl SpecKey {
    #[must_use]
    pub fn new(container: impl Into<String>, network: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            network: network.into(),
        }
    }

    /// File stem of the config written for this key.
    #[must_use]
    pub fn file_stem(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SpecKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.container, self.network)
    }
}

/// Which requests require authentication.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AuthScope {
    /// Every request
    #[default]
    Site,
    /// Only requests matching these paths
    Only(Vec<String>),
    /// Every request except those matching these paths
    Except(Vec<String>),
}

/// Forward-auth settings of a service.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AuthConfig {
    pub enabled: bool,
    /// Custom auth server; `None` targets the local tinyauth container
    pub url: Option<String>,
    pub scope: AuthScope,
    /// Groups allowed after authentication, in declared order
    pub groups: Vec<String>,
}

impl AuthConfig {
    /// Forward-auth target address.
    #[must_use]
    pub fn target(&self) -> &str {
        self.url.as_deref().unwrap_or(DEFAULT_AUTH_SERVER)
    }

    /// Whether the target is a remote URL rather than the local container.
    #[must_use]
    pub fn is_remote(&self) -> bool {
        self.url
            .as_deref()
            .is_some_and(|u| u.starts_with("http://") || u.starts_with("https://"))
    }

    /// Site-wide local auth without groups, expressible through the `auth` snippet.
    #[must_use]
    pub fn is_plain(&self) -> bool {
        self.enabled && self.url.is_none() && self.scope == AuthScope::Site && self.groups.is_empty()
    }
}

/// Validated routing declaration of one service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceSpec {
    pub network: String,
    pub container: String,
    pub domains: Vec<String>,
    pub visibility: Visibility,
    /// `{container}:{port}`
    pub upstream: String,
    /// Raw allowlist entries (hostnames, IPs, CIDRs)
    pub allowlist: Vec<String>,
    pub trusted_proxies: Vec<String>,
    pub tls: TlsProvider,
    pub logging: bool,
    pub compression: bool,
    pub header: bool,
    pub security: bool,
    pub performance: bool,
    pub wordpress: bool,
    pub seo: bool,
    pub seo_noindex_types: Vec<String>,
    pub www_redirect: bool,
    pub auth: AuthConfig,
}

impl ServiceSpec {
    /// Create a spec with every optional setting at its default.
    #[must_use]
    pub fn new(
        network: impl Into<String>,
        container: impl Into<String>,
        domains: Vec<String>,
        visibility: Visibility,
        upstream: impl Into<String>,
    ) -> Self {
        Self {
            network: network.into(),
            container: container.into(),
            domains,
            visibility,
            upstream: upstream.into(),
            allowlist: Vec::new(),
            trusted_proxies: Vec::new(),
            tls: TlsProvider::default(),
            logging: false,
            compression: true,
            header: true,
            security: true,
            performance: true,
            wordpress: false,
            seo: false,
            seo_noindex_types: Vec::new(),
            www_redirect: false,
            auth: AuthConfig::default(),
        }
    }

    #[must_use]
    pub fn key(&self) -> SpecKey {
        SpecKey::new(self.container.clone(), self.network.clone())
    }

    /// External sites with an allowlist are gated by remote address.
    #[must_use]
    pub fn has_allowlist(&self) -> bool {
        !self.allowlist.is_empty()
    }
}
