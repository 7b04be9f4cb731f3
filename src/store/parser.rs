// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Recovery of settings from config files on disk.
//!
//! The parser is the only code that inspects generated text. Managed files are
//! recognised by the marker line the compiler writes first; their identity comes
//! from the header comments. Hand-written files in the same partitions are listed
//! as unmanaged and identified by their file stem.

use crate::caddyfile::auth::AUTH_PATHS_MATCHER;
use crate::caddyfile::compiler::ALLOWED_MATCHER;
use crate::constants::{MANAGED_MARKER, WWW_REDIRECT_COMMENT};
use crate::spec::{SpecKey, TlsProvider, Visibility};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Header comment carrying the service identity
const CONTAINER_HEADER: &str = "# container:";

/// Header comment carrying the routing domain
const NETWORK_HEADER: &str = "# network:";

/// Settings recovered from one config file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfigInfo {
    pub network: String,
    pub container: String,
    pub visibility: Visibility,
    pub domains: Vec<String>,
    /// Addresses of the `@allowed` matcher, without `private_ranges`
    pub allowlist: Vec<String>,
    pub trusted_proxies: Vec<String>,
    /// `None` for files without a TLS snippet import
    pub tls: Option<TlsProvider>,
    pub logging: bool,
    pub compression: bool,
    pub header: bool,
    pub security: bool,
    pub performance: bool,
    pub wordpress: bool,
    pub seo: bool,
    pub seo_noindex_types: Vec<String>,
    pub www_redirect: bool,
    pub auth: bool,
    pub auth_url: Option<String>,
    pub auth_paths: Vec<String>,
    pub auth_except: Vec<String>,
    pub auth_groups: Vec<String>,
    pub managed: bool,
    pub path: PathBuf,
}

impl ConfigInfo {
    /// Identity key of a managed file.
    #[must_use]
    pub fn key(&self) -> Option<SpecKey> {
        self.managed
            .then(|| SpecKey::new(self.container.clone(), self.network.clone()))
    }
}

/// Whether `content` was written by the watcher.
#[must_use]
pub fn is_managed(content: &str) -> bool {
    content.lines().next().map(str::trim) == Some(MANAGED_MARKER)
}

/// Value of a `# name: value` header comment.
#[must_use]
pub fn header_value(content: &str, header: &str) -> Option<String> {
    content
        .lines()
        .take_while(|line| line.trim_start().starts_with('#'))
        .find_map(|line| line.trim().strip_prefix(header))
        .map(|value| value.trim().to_string())
}

/// Network recorded in a managed file's header.
#[must_use]
pub fn managed_network(content: &str) -> Option<String> {
    if is_managed(content) {
        header_value(content, NETWORK_HEADER)
    } else {
        None
    }
}

/// Parse a config file's content.
///
/// # Arguments
///
/// * `content` - File content
/// * `visibility` - Partition the file was found in
/// * `path` - File path, its stem names unmanaged files
#[must_use]
pub fn parse_config(content: &str, visibility: Visibility, path: &Path) -> ConfigInfo {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let managed = is_managed(content);

    let (container, network) = if managed {
        (
            header_value(content, CONTAINER_HEADER).unwrap_or_default(),
            header_value(content, NETWORK_HEADER).unwrap_or_else(|| stem.clone()),
        )
    } else {
        (String::new(), stem)
    };

    let mut info = ConfigInfo {
        network,
        container,
        visibility,
        domains: extract_domains(content),
        managed,
        path: path.to_path_buf(),
        ..ConfigInfo::default()
    };
    parse_directives(content, &mut info);
    info
}

/// Minimal record for a file that could not be read.
#[must_use]
pub fn unreadable_config(visibility: Visibility, path: &Path) -> ConfigInfo {
    ConfigInfo {
        network: path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default(),
        visibility,
        path: path.to_path_buf(),
        ..ConfigInfo::default()
    }
}

/// Hostnames of every site block, excluding generated www redirect blocks.
#[must_use]
pub fn extract_domains(content: &str) -> Vec<String> {
    let mut domains = Vec::new();
    let mut after_redirect_comment = false;

    for line in content.lines().map(str::trim) {
        if line.is_empty() {
            continue;
        }
        if line == WWW_REDIRECT_COMMENT {
            after_redirect_comment = true;
            continue;
        }
        let skip = std::mem::take(&mut after_redirect_comment);

        let Some(addresses) = line.strip_suffix('{').map(str::trim) else {
            continue;
        };
        if !addresses.starts_with("https://") || skip {
            continue;
        }

        domains.extend(
            addresses
                .split(',')
                .map(|a| a.trim().trim_start_matches("https://").to_string())
                .filter(|a| !a.is_empty()),
        );
    }

    domains
}

fn parse_directives(content: &str, info: &mut ConfigInfo) {
    let lines: Vec<&str> = content.lines().map(str::trim).collect();
    let imports: HashSet<&str> = lines
        .iter()
        .filter_map(|line| line.strip_prefix("import "))
        .map(str::trim)
        .collect();

    info.tls = if imports.contains("tls-cloudflare") {
        Some(TlsProvider::Cloudflare)
    } else if imports.contains("tls-hetzner") {
        Some(TlsProvider::Hetzner)
    } else {
        None
    };
    info.logging = imports.contains("logging");
    info.compression = imports.contains("compression");
    info.header = imports.contains("header");
    info.security = imports.contains("security");
    info.performance = imports.contains("performance");
    info.wordpress = imports.contains("wordpress");
    info.seo = !imports.contains("noindex");
    info.www_redirect = lines.iter().any(|line| *line == WWW_REDIRECT_COMMENT);
    info.auth = imports.contains("auth") || lines.iter().any(|l| l.starts_with("forward_auth"));

    for line in &lines {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        match tokens.as_slice() {
            ["trusted_proxies", rest @ ..] => {
                info.trusted_proxies = without_private_ranges(rest);
            }
            [matcher, "remote_ip", rest @ ..] if *matcher == ALLOWED_MATCHER => {
                info.allowlist = without_private_ranges(rest);
            }
            ["@noindex-files", "path", rest @ ..] => {
                info.seo_noindex_types = rest
                    .iter()
                    .map(|p| p.trim_start_matches("*.").to_string())
                    .collect();
            }
            [matcher, "not", "path", rest @ ..] if *matcher == AUTH_PATHS_MATCHER => {
                info.auth_except = owned(rest);
            }
            [matcher, "path", rest @ ..] if *matcher == AUTH_PATHS_MATCHER => {
                info.auth_paths = owned(rest);
            }
            ["forward_auth", rest @ ..] => {
                let target = rest
                    .iter()
                    .find(|t| !t.starts_with('@') && **t != "{")
                    .copied();
                info.auth_url = target
                    .filter(|t| t.starts_with("http://") || t.starts_with("https://"))
                    .map(ToString::to_string);
            }
            ["not", "header_regexp", _, pattern] => {
                info.auth_groups = parse_group_pattern(pattern);
            }
            _ => {}
        }
    }
}

fn without_private_ranges(tokens: &[&str]) -> Vec<String> {
    tokens
        .iter()
        .filter(|t| **t != "private_ranges")
        .map(ToString::to_string)
        .collect()
}

fn owned(tokens: &[&str]) -> Vec<String> {
    tokens.iter().map(ToString::to_string).collect()
}

/// Groups of a `(^|,)(g1|g2)(,|$)` pattern.
fn parse_group_pattern(pattern: &str) -> Vec<String> {
    pattern
        .strip_prefix("(^|,)(")
        .and_then(|rest| rest.strip_suffix(")(,|$)"))
        .map(|inner| {
            inner
                .split('|')
                .filter(|g| !g.is_empty())
                .map(|g| g.replace('\\', ""))
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
#[path = "parser_tests.rs"]
mod parser_tests;
