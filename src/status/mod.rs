// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Status projection of the config tree.
//!
//! After every reconciliation pass the reconciler hands the current listing of
//! [`ConfigStore::list_configs`](crate::store::ConfigStore::list_configs) to
//! [`StatusManager::update`]. The status server reads the latest snapshot.

pub mod server;

use crate::spec::{TlsProvider, Visibility};
use crate::store::parser::ConfigInfo;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

/// One config file as shown on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceStatus {
    pub network: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub container: String,
    #[serde(rename = "type")]
    pub visibility: Visibility,
    pub domains: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowlist: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trusted_proxies: Vec<String>,
    pub logging: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dns_provider: Option<TlsProvider>,
    pub compression: bool,
    pub header: bool,
    pub auth: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub auth_paths: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub auth_except: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub auth_groups: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_url: Option<String>,
    pub seo: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub seo_noindex_types: Vec<String>,
    pub www_redirect: bool,
    pub performance: bool,
    pub security: bool,
    pub wordpress: bool,
    pub managed: bool,
    pub config_path: String,
}

impl From<&ConfigInfo> for ServiceStatus {
    fn from(info: &ConfigInfo) -> Self {
        Self {
            network: info.network.clone(),
            container: info.container.clone(),
            visibility: info.visibility,
            domains: info.domains.clone(),
            allowlist: info.allowlist.clone(),
            trusted_proxies: info.trusted_proxies.clone(),
            logging: info.logging,
            dns_provider: info.tls,
            compression: info.compression,
            header: info.header,
            auth: info.auth,
            auth_paths: info.auth_paths.clone(),
            auth_except: info.auth_except.clone(),
            auth_groups: info.auth_groups.clone(),
            auth_url: info.auth_url.clone(),
            seo: info.seo,
            seo_noindex_types: info.seo_noindex_types.clone(),
            www_redirect: info.www_redirect,
            performance: info.performance,
            security: info.security,
            wordpress: info.wordpress,
            managed: info.managed,
            config_path: info.path.display().to_string(),
        }
    }
}

/// Counts by origin and visibility class.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusSummary {
    pub total: usize,
    pub managed: usize,
    pub manual: usize,
    pub external: usize,
    pub internal: usize,
    pub cloudflare: usize,
}

impl StatusSummary {
    fn of(services: &[ServiceStatus]) -> Self {
        let mut summary = Self {
            total: services.len(),
            ..Self::default()
        };
        for service in services {
            if service.managed {
                summary.managed += 1;
            } else {
                summary.manual += 1;
            }
            match service.visibility {
                Visibility::External => summary.external += 1,
                Visibility::Internal => summary.internal += 1,
                Visibility::Cloudflare => summary.cloudflare += 1,
            }
        }
        summary
    }
}

/// Snapshot served at `/api/status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub services: Vec<ServiceStatus>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub wildcard_domains: Vec<String>,
    pub summary: StatusSummary,
    /// RFC 3339 time of the last update
    pub updated: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_editor_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_domain: Option<String>,
}

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Holder of the latest [`Status`].
#[derive(Debug)]
pub struct StatusManager {
    code_editor_url: Option<String>,
    status_domain: Option<String>,
    wildcard_domains: RwLock<Vec<String>>,
    current: RwLock<Status>,
}

impl StatusManager {
    #[must_use]
    pub fn new(code_editor_url: Option<String>, status_domain: Option<String>) -> Self {
        let current = Status {
            services: Vec::new(),
            wildcard_domains: Vec::new(),
            summary: StatusSummary::default(),
            updated: now_rfc3339(),
            code_editor_url: code_editor_url.clone(),
            status_domain: status_domain.clone(),
        };
        Self {
            code_editor_url,
            status_domain,
            wildcard_domains: RwLock::new(Vec::new()),
            current: RwLock::new(current),
        }
    }

    /// Wildcard domains reported from the next update on.
    pub async fn set_wildcard_domains(&self, domains: Vec<String>) {
        *self.wildcard_domains.write().await = domains;
    }

    /// Rebuild the snapshot from a config listing.
    pub async fn update(&self, configs: &[ConfigInfo]) {
        let services: Vec<ServiceStatus> = configs.iter().map(ServiceStatus::from).collect();
        let status = Status {
            summary: StatusSummary::of(&services),
            services,
            wildcard_domains: self.wildcard_domains.read().await.clone(),
            updated: now_rfc3339(),
            code_editor_url: self.code_editor_url.clone(),
            status_domain: self.status_domain.clone(),
        };
        *self.current.write().await = status;
    }

    /// Latest snapshot.
    pub async fn snapshot(&self) -> Status {
        self.current.read().await.clone()
    }
}
