// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Forward-auth block generation.
//!
//! The block delegates authentication to tinyauth (or a custom server) and, when
//! groups are configured, rejects authenticated users outside those groups with a
//! 403. Path scoping uses the same clause for both the auth matcher and the group
//! matcher so the two checks always cover the same requests.

use super::node::Node;
use crate::constants::{AUTH_COPY_HEADERS, AUTH_GROUPS_HEADER, AUTH_VERIFY_URI};
use crate::spec::{AuthConfig, AuthScope};

/// Matcher name for path-scoped auth
pub const AUTH_PATHS_MATCHER: &str = "@auth-paths";

/// Matcher name for group denial
pub const AUTH_GROUPS_DENIED_MATCHER: &str = "@auth-groups-denied";

/// Fully resolved forward-auth block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthBlock {
    target: String,
    remote: bool,
    scope: AuthScope,
    groups: Vec<String>,
}

impl AuthBlock {
    #[must_use]
    pub fn from_config(auth: &AuthConfig) -> Self {
        Self {
            target: auth.target().to_string(),
            remote: auth.is_remote(),
            scope: auth.scope.clone(),
            groups: auth.groups.clone(),
        }
    }

    #[must_use]
    pub fn has_groups(&self) -> bool {
        !self.groups.is_empty()
    }

    /// Lower the block to Caddyfile nodes.
    #[must_use]
    pub fn nodes(&self) -> Vec<Node> {
        let mut nodes = Vec::new();
        let scope = scope_clause(&self.scope);

        let forward_auth = match &scope {
            Some(clause) => {
                nodes.push(Node::directive(format!("{AUTH_PATHS_MATCHER} {clause}")));
                format!("forward_auth {AUTH_PATHS_MATCHER} {}", self.target)
            }
            None => format!("forward_auth {}", self.target),
        };

        let mut settings = vec![
            Node::directive(format!("uri {AUTH_VERIFY_URI}")),
            Node::directive(format!("copy_headers {AUTH_COPY_HEADERS}")),
        ];
        if self.remote {
            settings.push(Node::directive(
                "header_up Host {http.reverse_proxy.upstream.hostport}",
            ));
        }
        nodes.push(Node::block(forward_auth, settings));

        if self.has_groups() {
            let mut conditions = Vec::new();
            if let Some(clause) = &scope {
                conditions.push(Node::directive(clause.clone()));
            }
            conditions.push(Node::directive(format!(
                "not header_regexp {AUTH_GROUPS_HEADER} {}",
                group_pattern(&self.groups)
            )));
            nodes.push(Node::block(AUTH_GROUPS_DENIED_MATCHER, conditions));
            nodes.push(Node::directive(format!(
                "error {AUTH_GROUPS_DENIED_MATCHER} 403"
            )));
        }

        nodes
    }
}

/// Matcher clause selecting the requests that need auth, or `None` for the whole site.
#[must_use]
pub fn scope_clause(scope: &AuthScope) -> Option<String> {
    match scope {
        AuthScope::Site => None,
        AuthScope::Only(paths) => Some(format!("path {}", paths.join(" "))),
        AuthScope::Except(paths) => Some(format!("not path {}", paths.join(" "))),
    }
}

/// Regex matching a comma separated group claim containing any of `groups`.
///
/// Groups are joined verbatim in declared order: `(^|,)(admin|users)(,|$)`.
#[must_use]
pub fn group_pattern(groups: &[String]) -> String {
    format!("(^|,)({})(,|$)", groups.join("|"))
}
