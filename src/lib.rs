// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! # caddy-watcher - Caddy site configs from Docker containers
//!
//! caddy-watcher watches a Docker engine for containers that declare routing
//! intent through `CADDY_*` environment variables and keeps a tree of Caddy site
//! configs in step with the live topology.
//!
//! ## Overview
//!
//! - Services join a proxy network (name ending in `_caddy`); the watcher
//!   attaches the Caddy container to it
//! - Each declaration is validated into a [`spec::ServiceSpec`]
//! - The [`caddyfile`] compiler emits a site block whose directive order keeps
//!   network membership checks ahead of authentication
//! - The [`store`] writes one file per service under `{hosts_dir}/{type}/`
//! - Allowlist hostnames are resolved over DNS-over-HTTPS and refreshed on a timer
//!
//! ## Modules
//!
//! - [`spec`] - `CADDY_*` surface and its validation
//! - [`caddyfile`] - Caddyfile compilation
//! - [`store`] - Config files on disk and their parser
//! - [`allowlist`] - Allowlist hostname resolution
//! - [`runtime`] - Docker Engine API client
//! - [`reconcilers`] - Event-driven reconciliation
//! - [`status`] - Status projection and HTTP server
//!
//! ## Example
//!
//! ```rust
//! use caddy_watcher::caddyfile::compile;
//! use caddy_watcher::spec::{ServiceSpec, Visibility};
//!
//! let spec = ServiceSpec::new(
//!     "blog_caddy",
//!     "blog-web-1",
//!     vec!["blog.example.com".to_string()],
//!     Visibility::External,
//!     "blog-web-1:80",
//! );
//! let config = compile(&spec, &[]).unwrap();
//! assert!(config.contains("https://blog.example.com {"));
//! ```

pub mod allowlist;
pub mod caddyfile;
pub mod config;
pub mod constants;
pub mod env_keys;
pub mod errors;
pub mod metrics;
pub mod reconcilers;
pub mod runtime;
pub mod shutdown;
pub mod spec;
pub mod status;
pub mod store;
