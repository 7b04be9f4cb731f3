// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Validation of the `CADDY_*` environment surface.
//!
//! A container opts in by setting `CADDY_DOMAIN`. Once the trigger is present,
//! `CADDY_TYPE` and `CADDY_PORT` are mandatory and every other key is optional.
//!
//! A container that sets `CADDY_DOMAIN_{service}` keys declares several services;
//! each discriminator is validated on its own and its identity becomes
//! `{container}-{service}`.

use super::{AuthConfig, AuthScope, ServiceSpec, TlsProvider, Visibility};
use crate::env_keys::{
    service_key, CADDY_ALLOWLIST, CADDY_AUTH, CADDY_AUTH_EXCEPT, CADDY_AUTH_GROUPS,
    CADDY_AUTH_PATHS, CADDY_AUTH_URL, CADDY_COMPRESSION, CADDY_DNS_PROVIDER, CADDY_DOMAIN,
    CADDY_HEADER, CADDY_LOGGING, CADDY_PERFORMANCE, CADDY_PORT, CADDY_SECURITY, CADDY_SEO,
    CADDY_SEO_NOINDEX_TYPES, CADDY_TRUSTED_PROXIES, CADDY_TYPE, CADDY_WORDPRESS,
    CADDY_WWW_REDIRECT, VALUE_FALSE, VALUE_TRUE,
};
use crate::errors::SpecError;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

/// Maximum length of a full hostname
const MAX_HOSTNAME_LEN: usize = 253;

/// Maximum length of a single hostname label
const MAX_LABEL_LEN: usize = 63;

/// Reads keys for one service, applying the multi-service suffix when present.
struct EnvReader<'a> {
    env: &'a HashMap<String, String>,
    service: Option<&'a str>,
}

impl<'a> EnvReader<'a> {
    fn key(&self, base: &str) -> String {
        match self.service {
            Some(service) => service_key(base, service),
            None => base.to_string(),
        }
    }

    /// Empty values count as unset.
    fn get(&self, base: &str) -> Option<&'a str> {
        self.env
            .get(&self.key(base))
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    fn list(&self, base: &str) -> Vec<String> {
        self.get(base).map(split_comma_separated).unwrap_or_default()
    }

    /// Off-by-default flag, on only for the literal `true`.
    fn enabled(&self, base: &str) -> bool {
        self.get(base) == Some(VALUE_TRUE)
    }

    /// On-by-default flag, off only for the literal `false`.
    fn not_disabled(&self, base: &str) -> bool {
        self.get(base) != Some(VALUE_FALSE)
    }
}

/// Split a comma separated value, trimming segments and dropping empty ones.
#[must_use]
pub fn split_comma_separated(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Validate a hostname.
///
/// A valid hostname is 1-253 characters, contains at least one dot, and consists of
/// labels of 1-63 ASCII alphanumerics or hyphens that neither start nor end with a
/// hyphen.
#[must_use]
pub fn is_valid_hostname(domain: &str) -> bool {
    if domain.is_empty() || domain.len() > MAX_HOSTNAME_LEN || !domain.contains('.') {
        return false;
    }

    domain.split('.').all(|label| {
        !label.is_empty()
            && label.len() <= MAX_LABEL_LEN
            && !label.starts_with('-')
            && !label.ends_with('-')
            && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
    })
}

/// Parse a single-service environment.
///
/// # Arguments
///
/// * `env` - Container environment
/// * `network` - Routing domain the container was found in
/// * `container` - Container name, a leading `/` is stripped
///
/// # Returns
///
/// `Ok(None)` when `CADDY_DOMAIN` is not set.
///
/// # Errors
///
/// Returns a [`SpecError`] when the trigger is present but the declaration is incomplete
/// or invalid.
pub fn parse_service_env(
    env: &HashMap<String, String>,
    network: &str,
    container: &str,
) -> Result<Option<ServiceSpec>, SpecError> {
    let container = container.trim_start_matches('/');
    let reader = EnvReader { env, service: None };
    parse_reader(&reader, network, container, container)
}

/// Parse every service a container declares.
///
/// Multi-service mode is used when at least one `CADDY_DOMAIN_{service}` key exists;
/// discriminators are processed in sorted order and validated independently, so one
/// invalid service never hides the others.
///
/// An empty result means the container opted out.
#[must_use]
pub fn parse_all_service_env(
    env: &HashMap<String, String>,
    network: &str,
    container: &str,
) -> Vec<Result<ServiceSpec, SpecError>> {
    let container = container.trim_start_matches('/');
    let services = discover_services(env);

    if services.is_empty() {
        return parse_service_env(env, network, container)
            .transpose()
            .into_iter()
            .collect();
    }

    debug!(
        container = container,
        services = ?services,
        "Container declares multiple services"
    );

    services
        .iter()
        .filter_map(|service| {
            let reader = EnvReader {
                env,
                service: Some(service),
            };
            let identity = format!("{container}-{service}");
            parse_reader(&reader, network, &identity, container)
                .map_err(|source| SpecError::Service {
                    service: service.clone(),
                    source: Box::new(source),
                })
                .transpose()
        })
        .collect()
}

/// Discriminators of every `CADDY_DOMAIN_{service}` key.
fn discover_services(env: &HashMap<String, String>) -> BTreeSet<String> {
    let prefix = format!("{CADDY_DOMAIN}_");
    env.keys()
        .filter_map(|key| key.strip_prefix(&prefix))
        .filter(|service| !service.is_empty())
        .map(ToString::to_string)
        .collect()
}

fn parse_reader(
    reader: &EnvReader<'_>,
    network: &str,
    identity: &str,
    upstream_host: &str,
) -> Result<Option<ServiceSpec>, SpecError> {
    let Some(domain_value) = reader.get(CADDY_DOMAIN) else {
        return Ok(None);
    };

    let missing: Vec<String> = [CADDY_TYPE, CADDY_PORT]
        .into_iter()
        .filter(|key| reader.get(key).is_none())
        .map(|key| reader.key(key))
        .collect();
    if !missing.is_empty() {
        return Err(SpecError::MissingKeys {
            keys: missing.join(", "),
            trigger: reader.key(CADDY_DOMAIN),
            domain: domain_value.to_string(),
        });
    }

    let type_key = reader.key(CADDY_TYPE);
    let visibility = Visibility::parse_for_key(reader.get(CADDY_TYPE).unwrap_or_default(), &type_key)?;

    let port_key = reader.key(CADDY_PORT);
    let port_value = reader.get(CADDY_PORT).unwrap_or_default();
    let port: u16 = port_value.parse().map_err(|_| SpecError::InvalidPort {
        key: port_key,
        value: port_value.to_string(),
    })?;

    let domains = split_comma_separated(domain_value);
    if domains.is_empty() {
        return Err(SpecError::NoDomains {
            key: reader.key(CADDY_DOMAIN),
        });
    }
    if let Some(invalid) = domains.iter().find(|d| !is_valid_hostname(d)) {
        return Err(SpecError::InvalidDomain {
            domain: invalid.clone(),
        });
    }

    let tls = match reader.get(CADDY_DNS_PROVIDER) {
        Some(value) => TlsProvider::parse_for_key(value, &reader.key(CADDY_DNS_PROVIDER))?,
        None => TlsProvider::default(),
    };

    let mut spec = ServiceSpec::new(
        network,
        identity,
        domains,
        visibility,
        format!("{upstream_host}:{port}"),
    );
    spec.tls = tls;
    spec.allowlist = reader.list(CADDY_ALLOWLIST);
    spec.trusted_proxies = reader.list(CADDY_TRUSTED_PROXIES);
    spec.logging = reader.enabled(CADDY_LOGGING);
    spec.compression = reader.not_disabled(CADDY_COMPRESSION);
    spec.header = reader.not_disabled(CADDY_HEADER);
    spec.security = reader.not_disabled(CADDY_SECURITY);
    spec.performance = reader.not_disabled(CADDY_PERFORMANCE);
    spec.wordpress = reader.enabled(CADDY_WORDPRESS);
    spec.seo = reader.enabled(CADDY_SEO);
    spec.seo_noindex_types = reader.list(CADDY_SEO_NOINDEX_TYPES);
    spec.www_redirect = reader.enabled(CADDY_WWW_REDIRECT);
    spec.auth = parse_auth(reader, identity);

    Ok(Some(spec))
}

fn parse_auth(reader: &EnvReader<'_>, identity: &str) -> AuthConfig {
    let paths = reader.list(CADDY_AUTH_PATHS);
    let except = reader.list(CADDY_AUTH_EXCEPT);

    let scope = match (paths.is_empty(), except.is_empty()) {
        (false, false) => {
            warn!(
                container = identity,
                paths = ?paths,
                except = ?except,
                "Both {} and {} are set, ignoring the exclusion list",
                reader.key(CADDY_AUTH_PATHS),
                reader.key(CADDY_AUTH_EXCEPT)
            );
            AuthScope::Only(paths)
        }
        (false, true) => AuthScope::Only(paths),
        (true, false) => AuthScope::Except(except),
        (true, true) => AuthScope::Site,
    };

    AuthConfig {
        enabled: reader.enabled(CADDY_AUTH),
        url: reader.get(CADDY_AUTH_URL).map(ToString::to_string),
        scope,
        groups: reader.list(CADDY_AUTH_GROUPS),
    }
}

#[cfg(test)]
#[path = "parse_tests.rs"]
mod parse_tests;
