// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Process configuration.
//!
//! Every setting is a command-line flag backed by an environment variable, so the
//! watcher can run unchanged from a Compose file.

use crate::constants::{
    CADDY_CONTAINER_SUFFIX, DEFAULT_CLEANUP_INTERVAL_SECS, DEFAULT_DESTROY_GRACE_PERIOD_SECS,
    DEFAULT_DNS_REFRESH_INTERVAL_SECS, DEFAULT_DOCKER_HOST, DEFAULT_HOSTS_DIR,
    DEFAULT_NETWORK_SUFFIX, DEFAULT_PROJECT_NAME, DEFAULT_STATUS_PORT,
};
use crate::spec::{split_comma_separated, TlsProvider};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Watches Docker and generates Caddy site configs from `CADDY_*` container env.
#[derive(Debug, Clone, Parser)]
#[command(name = "caddy-watcher", version, about)]
pub struct WatcherConfig {
    /// Compose project of the proxy stack
    #[arg(long, env = "COMPOSE_PROJECT_NAME", default_value = DEFAULT_PROJECT_NAME)]
    pub project_name: String,

    /// Name of the Caddy container; defaults to `{project}-app-1`
    #[arg(long, env = "CADDY_CONTAINER")]
    pub caddy_container: Option<String>,

    /// Suffix identifying networks the proxy joins
    #[arg(long, env = "NETWORK_SUFFIX", default_value = DEFAULT_NETWORK_SUFFIX)]
    pub network_suffix: String,

    /// Root of the generated config tree
    #[arg(long, env = "HOSTS_DIR", default_value = DEFAULT_HOSTS_DIR)]
    pub hosts_dir: PathBuf,

    /// Allowlist hostname refresh interval in seconds
    #[arg(
        long,
        env = "DNS_REFRESH_INTERVAL",
        default_value_t = DEFAULT_DNS_REFRESH_INTERVAL_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub dns_refresh_interval: u64,

    /// Orphan sweep interval in seconds
    #[arg(
        long,
        env = "CLEANUP_INTERVAL",
        default_value_t = DEFAULT_CLEANUP_INTERVAL_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub cleanup_interval: u64,

    /// Delay before checking a network after one of its containers is destroyed
    #[arg(long, env = "DESTROY_GRACE_PERIOD", default_value_t = DEFAULT_DESTROY_GRACE_PERIOD_SECS)]
    pub destroy_grace_period: u64,

    /// Docker Engine endpoint
    #[arg(long, env = "DOCKER_HOST", default_value = DEFAULT_DOCKER_HOST)]
    pub docker_host: String,

    /// Status server port
    #[arg(long, env = "STATUS_PORT", default_value_t = DEFAULT_STATUS_PORT)]
    pub status_port: u16,

    /// Domain of the status dashboard; the status server only runs when set
    #[arg(long, env = "CADDY_DOMAIN")]
    pub status_domain: Option<String>,

    /// Link shown on the dashboard
    #[arg(long, env = "CODE_EDITOR_URL")]
    pub code_editor_url: Option<String>,

    /// Comma separated domains to issue wildcard certificates for
    #[arg(long, env = "WILDCARD_DOMAINS", default_value = "")]
    pub wildcard_domains: String,

    /// DNS provider for wildcard certificates
    #[arg(long, env = "WILDCARD_DNS_PROVIDER", default_value = "cloudflare")]
    pub wildcard_dns_provider: TlsProvider,
}

impl WatcherConfig {
    /// Name of the Caddy container.
    #[must_use]
    pub fn caddy_container(&self) -> String {
        match &self.caddy_container {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("{}{CADDY_CONTAINER_SUFFIX}", self.project_name),
        }
    }

    #[must_use]
    pub fn wildcard_domains(&self) -> Vec<String> {
        split_comma_separated(&self.wildcard_domains)
    }

    #[must_use]
    pub fn dns_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.dns_refresh_interval)
    }

    #[must_use]
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval)
    }

    #[must_use]
    pub fn destroy_grace_period(&self) -> Duration {
        Duration::from_secs(self.destroy_grace_period)
    }

    /// Status domain, ignoring an empty value.
    #[must_use]
    pub fn status_domain(&self) -> Option<String> {
        self.status_domain.clone().filter(|d| !d.is_empty())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
