// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the Caddy watcher.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Process Defaults
// ============================================================================

/// Default Compose project name of the Caddy stack
pub const DEFAULT_PROJECT_NAME: &str = "caddy";

/// Suffix appended to the project name to form the proxy container name
pub const CADDY_CONTAINER_SUFFIX: &str = "-app-1";

/// Networks ending with this suffix are routing domains the watcher manages
pub const DEFAULT_NETWORK_SUFFIX: &str = "_caddy";

/// Root of the generated host configuration tree
pub const DEFAULT_HOSTS_DIR: &str = "/hosts";

/// Default Docker Engine endpoint
pub const DEFAULT_DOCKER_HOST: &str = "unix:///var/run/docker.sock";

/// Docker Engine API version prefix used for every request
pub const DOCKER_API_VERSION: &str = "v1.41";

/// Default port for the status HTTP server
pub const DEFAULT_STATUS_PORT: u16 = 8080;

// ============================================================================
// Timing Constants
// ============================================================================

/// Default allowlist DNS refresh interval in seconds
pub const DEFAULT_DNS_REFRESH_INTERVAL_SECS: u64 = 60;

/// Default orphan sweep interval in seconds (5 minutes)
pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 300;

/// Default wait after a container destroy before checking for an orphaned network
pub const DEFAULT_DESTROY_GRACE_PERIOD_SECS: u64 = 10;

/// Attempts made for retried runtime operations
pub const RETRY_ATTEMPTS: u32 = 3;

/// Fixed delay between retried runtime operations
pub const RETRY_DELAY_MILLIS: u64 = 500;

/// Timeout for a single DNS-over-HTTPS request
pub const DOH_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// DNS-over-HTTPS Constants
// ============================================================================

/// DNS-over-HTTPS providers, queried in order
pub const DOH_ENDPOINTS: &[&str] = &["https://1.1.1.1/dns-query", "https://dns.google/dns-query"];

/// Accept header value for the JSON DoH dialect
pub const DOH_ACCEPT: &str = "application/dns-json";

/// DNS record type number for A records
pub const DNS_TYPE_A: u16 = 1;

/// DNS record type number for AAAA records
pub const DNS_TYPE_AAAA: u16 = 28;

// ============================================================================
// Caddyfile Constants
// ============================================================================

/// Marker line identifying a file as written by the watcher
pub const MANAGED_MARKER: &str = "# Managed by caddy-watcher - do not edit";

/// Comment introducing a generated www redirect block
pub const WWW_REDIRECT_COMMENT: &str = "# www redirect";

/// Default forward-auth target (local tinyauth container in the Caddy project)
pub const DEFAULT_AUTH_SERVER: &str = "{env.COMPOSE_PROJECT_NAME}-tinyauth-1:3000";

/// Forward-auth verification endpoint on tinyauth
pub const AUTH_VERIFY_URI: &str = "/api/auth/caddy";

/// Identity headers copied from the auth response onto the upstream request
pub const AUTH_COPY_HEADERS: &str = "Remote-User Remote-Name Remote-Email Remote-Groups";

/// Header carrying the authenticated user's group claims
pub const AUTH_GROUPS_HEADER: &str = "Remote-Groups";

/// Indentation unit for rendered Caddyfiles
pub const INDENT: &str = "    ";

/// File extension of generated site configs
pub const CONFIG_EXTENSION: &str = "conf";

/// Partition directory for wildcard certificate sites
pub const WILDCARD_DIR: &str = "wildcard";
