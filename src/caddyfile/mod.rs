// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Caddyfile generation.
//!
//! - [`node`] - syntax tree and renderer
//! - [`auth`] - forward-auth and group enforcement blocks
//! - [`compiler`] - spec to site block compilation

pub mod auth;
pub mod compiler;
pub mod node;

pub use compiler::{compile, compile_wildcard, Gate, Membership, OpenAuth, SiteBlock, Upstream};
pub use node::{render, Node};
