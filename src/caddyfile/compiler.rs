// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! `ServiceSpec` to Caddyfile compilation.
//!
//! # Site Layout
//!
//! The membership check always runs before authentication. Guarded sites
//! (internal, Cloudflare, allowlisted external) wrap auth and the upstream in a
//! `handle` block keyed on the membership matcher and fall through to
//! `import stealth`, so unauthorised clients get a generic not-found and never
//! see an auth challenge.
//!
//! ```text
//! https://app.example.com {
//!     import tls-cloudflare
//!     ...
//!     import internal
//!
//!     handle @internal {
//!         forward_auth ...
//!         reverse_proxy app:8080
//!     }
//!
//!     import stealth
//! }
//! ```
//!
//! Open sites (external without allowlist) place auth at the top level.

use super::auth::AuthBlock;
use super::node::{render, Node};
use crate::constants::{MANAGED_MARKER, WWW_REDIRECT_COMMENT};
use crate::errors::CompileError;
use crate::spec::{ServiceSpec, TlsProvider, Visibility};

/// Import bundle that renders the generic not-found fallback
pub const STEALTH_IMPORT: &str = "import stealth";

/// Remote-address matcher for allowlisted external sites
pub const ALLOWED_MATCHER: &str = "@allowed";

/// Network membership that gates a site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Membership {
    /// `@internal` from the `internal` snippet
    Internal,
    /// `@cloudflare` from the `cloudflare` snippet
    Cloudflare,
    /// `@allowed` built from private ranges plus resolved allowlist addresses
    Allowlist(Vec<String>),
}

impl Membership {
    fn matcher(&self) -> &'static str {
        match self {
            Self::Internal => "@internal",
            Self::Cloudflare => "@cloudflare",
            Self::Allowlist(_) => ALLOWED_MATCHER,
        }
    }

    fn definition(&self) -> Node {
        match self {
            Self::Internal => Node::directive("import internal"),
            Self::Cloudflare => Node::directive("import cloudflare"),
            Self::Allowlist(ips) => {
                let mut line = format!("{ALLOWED_MATCHER} remote_ip private_ranges");
                for ip in ips {
                    line.push(' ');
                    line.push_str(ip);
                }
                Node::directive(line)
            }
        }
    }
}

/// Top-level auth of an open site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenAuth {
    /// Plain site-wide local auth through the `auth` snippet
    Snippet,
    /// Scoped, grouped or remote auth
    Inline(AuthBlock),
}

/// The `reverse_proxy` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upstream {
    pub address: String,
    pub trusted_proxies: Vec<String>,
    /// Forward the client address Cloudflare reports
    pub cloudflare_real_ip: bool,
}

impl Upstream {
    fn node(&self) -> Node {
        let header = format!("reverse_proxy {}", self.address);
        let mut settings = Vec::new();
        if self.cloudflare_real_ip {
            settings.push(Node::directive(
                "header_up X-Real-IP {header.CF-Connecting-IP}",
            ));
        }
        if !self.trusted_proxies.is_empty() {
            settings.push(Node::directive(format!(
                "trusted_proxies private_ranges {}",
                self.trusted_proxies.join(" ")
            )));
        }

        if settings.is_empty() {
            Node::directive(header)
        } else {
            Node::block(header, settings)
        }
    }
}

/// Routing of a site. Auth exists only as a field of one of these variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    Open {
        auth: Option<OpenAuth>,
        upstream: Upstream,
    },
    Guarded {
        membership: Membership,
        auth: Option<AuthBlock>,
        upstream: Upstream,
    },
}

impl Gate {
    fn nodes(&self) -> Vec<Node> {
        match self {
            Self::Open { auth, upstream } => {
                let mut nodes = Vec::new();
                match auth {
                    Some(OpenAuth::Snippet) => nodes.push(Node::directive("import auth")),
                    Some(OpenAuth::Inline(block)) => {
                        if block.has_groups() {
                            nodes.push(Node::directive("import errors"));
                        }
                        nodes.extend(block.nodes());
                    }
                    None => {}
                }
                nodes.push(upstream.node());
                nodes
            }
            Self::Guarded {
                membership,
                auth,
                upstream,
            } => {
                let mut inner = auth.as_ref().map(AuthBlock::nodes).unwrap_or_default();
                inner.push(upstream.node());
                vec![
                    membership.definition(),
                    Node::Blank,
                    Node::block(format!("handle {}", membership.matcher()), inner),
                    Node::Blank,
                    Node::directive(STEALTH_IMPORT),
                ]
            }
        }
    }
}

/// A complete site block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteBlock {
    pub addresses: Vec<String>,
    /// Snippet imports and site-wide directives
    pub preamble: Vec<Node>,
    pub gate: Gate,
}

impl SiteBlock {
    /// Build the site block for `spec`.
    ///
    /// # Arguments
    ///
    /// * `spec` - Validated service spec
    /// * `resolved_ips` - Latest resolution of the spec's allowlist
    ///
    /// # Errors
    ///
    /// Returns [`CompileError`] when the spec has no domains or a malformed upstream.
    pub fn build(spec: &ServiceSpec, resolved_ips: &[String]) -> Result<Self, CompileError> {
        if spec.domains.is_empty() {
            return Err(CompileError::NoDomains {
                container: spec.container.clone(),
            });
        }
        validate_upstream(spec)?;

        let upstream = Upstream {
            address: spec.upstream.clone(),
            trusted_proxies: spec.trusted_proxies.clone(),
            cloudflare_real_ip: spec.visibility == Visibility::Cloudflare,
        };
        let auth = spec.auth.enabled.then(|| AuthBlock::from_config(&spec.auth));

        let gate = match spec.visibility {
            Visibility::Internal => Gate::Guarded {
                membership: Membership::Internal,
                auth,
                upstream,
            },
            Visibility::Cloudflare => Gate::Guarded {
                membership: Membership::Cloudflare,
                auth,
                upstream,
            },
            Visibility::External if spec.has_allowlist() => Gate::Guarded {
                membership: Membership::Allowlist(resolved_ips.to_vec()),
                auth,
                upstream,
            },
            Visibility::External => Gate::Open {
                auth: auth.map(|block| {
                    if spec.auth.is_plain() {
                        OpenAuth::Snippet
                    } else {
                        OpenAuth::Inline(block)
                    }
                }),
                upstream,
            },
        };

        Ok(Self {
            addresses: spec.domains.iter().map(|d| format!("https://{d}")).collect(),
            preamble: preamble(spec),
            gate,
        })
    }

    #[must_use]
    pub fn node(&self) -> Node {
        let mut children = self.preamble.clone();
        if !children.is_empty() {
            children.push(Node::Blank);
        }
        children.extend(self.gate.nodes());
        Node::block(self.addresses.join(", "), children)
    }
}

/// Compile `spec` into the full text of its config file.
///
/// # Errors
///
/// Returns [`CompileError`] when the spec cannot produce a valid site block.
pub fn compile(spec: &ServiceSpec, resolved_ips: &[String]) -> Result<String, CompileError> {
    let site = SiteBlock::build(spec, resolved_ips)?;

    let mut nodes = vec![
        Node::comment(MANAGED_MARKER),
        Node::comment(format!("# container: {}", spec.container)),
        Node::comment(format!("# network: {}", spec.network)),
        Node::comment(format!("# type: {}", spec.visibility)),
        Node::Blank,
        site.node(),
    ];
    if spec.www_redirect {
        nodes.extend(www_redirect_nodes(&spec.domains, spec.tls));
    }

    Ok(render(&nodes))
}

/// Compile a wildcard certificate site for `domain`.
#[must_use]
pub fn compile_wildcard(domain: &str, provider: TlsProvider) -> String {
    let mut children = Vec::new();
    if let Some(tls) = provider.import_name() {
        children.push(Node::directive(format!("import {tls}")));
    }
    children.push(Node::directive(STEALTH_IMPORT));

    render(&[
        Node::comment(MANAGED_MARKER),
        Node::comment(format!("# wildcard: {domain}")),
        Node::Blank,
        Node::block(format!("https://*.{domain}"), children),
    ])
}

fn preamble(spec: &ServiceSpec) -> Vec<Node> {
    let mut imports: Vec<String> = Vec::new();
    if let Some(tls) = spec.tls.import_name() {
        imports.push(tls);
    }
    let flags = [
        (spec.logging, "logging"),
        (spec.compression, "compression"),
        (spec.header, "header"),
        (spec.security, "security"),
        (spec.performance, "performance"),
        (!spec.seo, "noindex"),
        (spec.wordpress, "wordpress"),
    ];
    imports.extend(
        flags
            .into_iter()
            .filter(|(on, _)| *on)
            .map(|(_, name)| name.to_string()),
    );

    let mut nodes: Vec<Node> = imports
        .into_iter()
        .map(|name| Node::directive(format!("import {name}")))
        .collect();

    if spec.seo && !spec.seo_noindex_types.is_empty() {
        let patterns: Vec<String> = spec
            .seo_noindex_types
            .iter()
            .map(|t| format!("*.{}", t.trim_start_matches("*.").trim_start_matches('.')))
            .collect();
        nodes.push(Node::Blank);
        nodes.push(Node::directive(format!(
            "@noindex-files path {}",
            patterns.join(" ")
        )));
        nodes.push(Node::directive(
            "header @noindex-files X-Robots-Tag \"noindex, nofollow\"",
        ));
    }

    nodes
}

fn www_redirect_nodes(domains: &[String], tls: TlsProvider) -> Vec<Node> {
    let mut nodes = Vec::new();
    for domain in domains {
        let (from, to) = match domain.strip_prefix("www.") {
            Some(bare) => (bare.to_string(), domain.clone()),
            None => (format!("www.{domain}"), domain.clone()),
        };
        // A counterpart served by the main block must not get a second site
        if domains.contains(&from) {
            continue;
        }

        let mut children = Vec::new();
        if let Some(import) = tls.import_name() {
            children.push(Node::directive(format!("import {import}")));
        }
        children.push(Node::directive(format!(
            "redir https://{to}{{uri}} permanent"
        )));

        nodes.push(Node::Blank);
        nodes.push(Node::comment(WWW_REDIRECT_COMMENT));
        nodes.push(Node::block(format!("https://{from}"), children));
    }
    nodes
}

fn validate_upstream(spec: &ServiceSpec) -> Result<(), CompileError> {
    let valid = spec
        .upstream
        .rsplit_once(':')
        .is_some_and(|(host, port)| !host.is_empty() && port.parse::<u16>().is_ok());
    if valid {
        Ok(())
    } else {
        Err(CompileError::InvalidUpstream {
            container: spec.container.clone(),
            upstream: spec.upstream.clone(),
        })
    }
}

#[cfg(test)]
#[path = "compiler_tests.rs"]
mod compiler_tests;
