// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Caddyfile syntax tree and renderer.

use crate::constants::INDENT;

/// One line or block of a Caddyfile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// `# text` (the text carries its own `#`)
    Comment(String),
    /// A single-line directive
    Directive(String),
    /// `header {` children `}`
    Block { header: String, children: Vec<Node> },
    /// Empty separator line
    Blank,
}

impl Node {
    pub fn directive(line: impl Into<String>) -> Self {
        Self::Directive(line.into())
    }

    pub fn comment(line: impl Into<String>) -> Self {
        Self::Comment(line.into())
    }

    pub fn block(header: impl Into<String>, children: Vec<Node>) -> Self {
        Self::Block {
            header: header.into(),
            children,
        }
    }

    fn render_into(&self, out: &mut String, depth: usize) {
        let indent = INDENT.repeat(depth);
        match self {
            Self::Comment(text) | Self::Directive(text) => {
                out.push_str(&indent);
                out.push_str(text);
                out.push('\n');
            }
            Self::Block { header, children } => {
                out.push_str(&indent);
                out.push_str(header);
                out.push_str(" {\n");
                for child in children {
                    child.render_into(out, depth + 1);
                }
                out.push_str(&indent);
                out.push_str("}\n");
            }
            Self::Blank => out.push('\n'),
        }
    }
}

/// Render top-level nodes to Caddyfile text.
#[must_use]
pub fn render(nodes: &[Node]) -> String {
    let mut out = String::new();
    for node in nodes {
        node.render_into(&mut out, 0);
    }
    out
}
