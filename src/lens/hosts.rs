//! `Hosts.lns`: the `/etc/hosts` syntax.
//!
//! ```text
//! # comment
//! 192.168.0.5	iridium	iridium.example.com	# lab box
//! ```
//!
//! becomes
//!
//! ```text
//! #comment = "comment"
//! 1
//!   ipaddr = "192.168.0.5"
//!   canonical = "iridium"
//!   alias = "iridium.example.com"
//!   #comment = "lab box"
//! ```

use super::{COMMENT, EMPTY, Lens, put_comment, token};
use crate::error::LensError;
use crate::tree::Node;
use std::net::IpAddr;

/// Lens name.
pub const NAME: &str = "Hosts.lns";

/// Entry address label.
pub const IPADDR: &str = "ipaddr";
/// Entry canonical name label.
pub const CANONICAL: &str = "canonical";
/// Entry alias label.
pub const ALIAS: &str = "alias";

/// The `/etc/hosts` lens.
#[derive(Debug, Clone, Copy, Default)]
pub struct HostsLens;

impl Lens for HostsLens {
    fn name(&self) -> &'static str {
        NAME
    }

    fn get(&self, text: &str) -> Result<Vec<Node>, LensError> {
        let mut nodes = Vec::new();
        let mut seq = 0usize;
        for (idx, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                nodes.push(Node::new(EMPTY));
            } else if let Some(comment) = line.strip_prefix('#') {
                nodes.push(Node::leaf(COMMENT, comment.trim()));
            } else {
                seq += 1;
                let entry = parse_entry(line, seq).map_err(|message| LensError::Parse {
                    line: idx + 1,
                    message,
                })?;
                nodes.push(entry);
            }
        }
        Ok(nodes)
    }

    fn put(&self, nodes: &[Node]) -> Result<String, LensError> {
        let mut out = String::new();
        for node in nodes {
            match node.label.as_str() {
                EMPTY => {}
                COMMENT => put_comment(node, &mut out),
                _ => put_entry(node, &mut out)?,
            }
            out.push('\n');
        }
        Ok(out)
    }
}

fn parse_entry(line: &str, seq: usize) -> Result<Node, String> {
    let (fields, comment) = match line.split_once('#') {
        Some((fields, comment)) => (fields, Some(comment.trim())),
        None => (line, None),
    };

    let mut words = fields.split_whitespace();
    let ip = words.next().ok_or("missing address")?;
    if !is_address(ip) {
        return Err(format!("invalid address {ip:?}"));
    }
    let canonical = words
        .next()
        .ok_or_else(|| format!("missing canonical name after {ip}"))?;

    let mut entry = Node::new(seq.to_string())
        .with_child(Node::leaf(IPADDR, ip))
        .with_child(Node::leaf(CANONICAL, canonical));
    for alias in words {
        entry = entry.with_child(Node::leaf(ALIAS, alias));
    }
    if let Some(comment) = comment.filter(|c| !c.is_empty()) {
        entry = entry.with_child(Node::leaf(COMMENT, comment));
    }
    Ok(entry)
}

/// IPv4 or IPv6 address, optionally scoped (`fe80::1%eth0`).
pub(crate) fn is_address(s: &str) -> bool {
    let addr = s.split_once('%').map_or(s, |(addr, _)| addr);
    addr.parse::<IpAddr>().is_ok()
}

fn put_entry(entry: &Node, out: &mut String) -> Result<(), LensError> {
    let mut children = entry.children.iter().peekable();
    let mut expect = |label: &str| {
        children
            .next_if(|c| c.label == label)
            .ok_or_else(|| LensError::Render {
                label: entry.label.clone(),
                message: format!("expected {label}"),
            })
    };
    let ip = token(entry, expect(IPADDR)?)?;
    let canonical = token(entry, expect(CANONICAL)?)?;
    if !is_address(ip) {
        return Err(LensError::Render {
            label: entry.label.clone(),
            message: format!("invalid address {ip:?}"),
        });
    }

    out.push_str(ip);
    out.push('\t');
    out.push_str(canonical);
    while let Some(alias) = children.next_if(|c| c.label == ALIAS) {
        out.push('\t');
        out.push_str(token(entry, alias)?);
    }
    if let Some(comment) = children.next_if(|c| c.label == COMMENT) {
        let text = comment.value.as_deref().unwrap_or_default();
        if text.contains(['\n', '\r']) {
            return Err(LensError::Render {
                label: entry.label.clone(),
                message: "comment spans several lines".into(),
            });
        }
        out.push_str("\t# ");
        out.push_str(text);
    }
    if let Some(extra) = children.next() {
        return Err(LensError::Render {
            label: entry.label.clone(),
            message: format!("unexpected {}", extra.label),
        });
    }
    Ok(())
}
