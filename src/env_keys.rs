// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Container environment keys that declare routing intent.
//!
//! In multi-service mode every key is suffixed with `_{service}`, e.g.
//! `CADDY_DOMAIN_api`.

// ============================================================================
// Mandatory Keys
// ============================================================================

/// Trigger key: presence opts the container in
pub const CADDY_DOMAIN: &str = "CADDY_DOMAIN";

/// Visibility class (`internal`, `external`, `cloudflare`)
pub const CADDY_TYPE: &str = "CADDY_TYPE";

/// Upstream port inside the container
pub const CADDY_PORT: &str = "CADDY_PORT";

// ============================================================================
// Access Control Keys
// ============================================================================

/// Comma separated hostnames, IPs or CIDRs allowed to reach an external site
pub const CADDY_ALLOWLIST: &str = "CADDY_ALLOWLIST";

/// Comma separated proxies whose forwarded headers are trusted
pub const CADDY_TRUSTED_PROXIES: &str = "CADDY_TRUSTED_PROXIES";

// ============================================================================
// Feature Flag Keys
// ============================================================================

pub const CADDY_LOGGING: &str = "CADDY_LOGGING";
pub const CADDY_DNS_PROVIDER: &str = "CADDY_DNS_PROVIDER";
pub const CADDY_COMPRESSION: &str = "CADDY_COMPRESSION";
pub const CADDY_HEADER: &str = "CADDY_HEADER";
pub const CADDY_SECURITY: &str = "CADDY_SECURITY";
pub const CADDY_PERFORMANCE: &str = "CADDY_PERFORMANCE";
pub const CADDY_WORDPRESS: &str = "CADDY_WORDPRESS";
pub const CADDY_SEO: &str = "CADDY_SEO";
pub const CADDY_SEO_NOINDEX_TYPES: &str = "CADDY_SEO_NOINDEX_TYPES";
pub const CADDY_WWW_REDIRECT: &str = "CADDY_WWW_REDIRECT";

// ============================================================================
// Authentication Keys
// ============================================================================

/// Enables forward authentication
pub const CADDY_AUTH: &str = "CADDY_AUTH";

/// Custom auth server URL (defaults to the local tinyauth container)
pub const CADDY_AUTH_URL: &str = "CADDY_AUTH_URL";

/// Paths that require auth; everything else is public
pub const CADDY_AUTH_PATHS: &str = "CADDY_AUTH_PATHS";

/// Paths exempt from auth; everything else requires it
pub const CADDY_AUTH_EXCEPT: &str = "CADDY_AUTH_EXCEPT";

/// Groups allowed after authentication
pub const CADDY_AUTH_GROUPS: &str = "CADDY_AUTH_GROUPS";

// ============================================================================
// Boolean Values
// ============================================================================

/// Literal value that enables an off-by-default flag
pub const VALUE_TRUE: &str = "true";

/// Literal value that disables an on-by-default flag
pub const VALUE_FALSE: &str = "false";

/// Build the multi-service variant of a key.
#[must_use]
pub fn service_key(key: &str, service: &str) -> String {
    format!("{key}_{service}")
}
