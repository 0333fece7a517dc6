//! `Aliases.lns`: the `/etc/aliases` syntax.
//!
//! ```text
//! test: user1, user2,
//!     "| /usr/bin/filter"
//! ```
//!
//! becomes a numbered entry with a `name` child and one `value` child per
//! recipient. Quoted recipients keep their quotes in the tree.

use super::{COMMENT, EMPTY, Lens, put_comment, token};
use crate::error::LensError;
use crate::tree::Node;

/// Lens name.
pub const NAME: &str = "Aliases.lns";

/// Entry name label.
pub const NAME_LABEL: &str = "name";
/// Entry recipient label.
pub const VALUE: &str = "value";

/// The `/etc/aliases` lens.
#[derive(Debug, Clone, Copy, Default)]
pub struct AliasesLens;

impl Lens for AliasesLens {
    fn name(&self) -> &'static str {
        NAME
    }

    fn get(&self, text: &str) -> Result<Vec<Node>, LensError> {
        let mut nodes: Vec<Node> = Vec::new();
        // Line number and node index of the entry continuation lines extend.
        let mut open: Option<(usize, usize)> = None;
        let mut seq = 0usize;

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            let parse_err = |message: String| LensError::Parse {
                line: line_no,
                message,
            };

            let indented = raw.starts_with([' ', '\t']) && !line.is_empty();
            // An indented comment inside a multi-line alias leaves the alias
            // open; it is kept as a comment after the entry.
            if let (true, Some(comment), Some(_)) = (indented, line.strip_prefix('#'), open) {
                nodes.push(Node::leaf(COMMENT, comment.trim()));
                continue;
            }
            if indented && !line.starts_with('#') {
                let Some((_, at)) = open else {
                    return Err(parse_err("continuation line without an alias".into()));
                };
                for value in parse_values(line).map_err(parse_err)? {
                    nodes[at].children.push(Node::leaf(VALUE, value));
                }
                continue;
            }

            close_entry(&nodes, open.take())?;
            if line.is_empty() {
                nodes.push(Node::new(EMPTY));
            } else if let Some(comment) = line.strip_prefix('#') {
                nodes.push(Node::leaf(COMMENT, comment.trim()));
            } else {
                let (name, rest) = line
                    .split_once(':')
                    .ok_or_else(|| parse_err("missing ':' after alias name".into()))?;
                let name = name.trim();
                if name.is_empty() || name.contains(char::is_whitespace) {
                    return Err(parse_err(format!("invalid alias name {name:?}")));
                }
                seq += 1;
                let mut entry = Node::new(seq.to_string()).with_child(Node::leaf(NAME_LABEL, name));
                for value in parse_values(rest).map_err(parse_err)? {
                    entry = entry.with_child(Node::leaf(VALUE, value));
                }
                open = Some((line_no, nodes.len()));
                nodes.push(entry);
            }
        }
        close_entry(&nodes, open)?;
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

/// Fails if the finished entry collected no recipients.
fn close_entry(nodes: &[Node], open: Option<(usize, usize)>) -> Result<(), LensError> {
    match open {
        Some((line, at)) if !nodes[at].children.iter().any(|c| c.label == VALUE) => {
            Err(LensError::Parse {
                line,
                message: "alias has no recipients".into(),
            })
        }
        _ => Ok(()),
    }
}

/// Splits a comma-separated recipient list. A trailing comma is allowed so
/// the list can continue on the next line.
fn parse_values(s: &str) -> Result<Vec<String>, String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    for ch in s.chars() {
        match ch {
            '"' => {
                quoted = !quoted;
                current.push(ch);
            }
            ',' if !quoted => pieces.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    if quoted {
        return Err("unterminated quote".into());
    }
    pieces.push(current);

    let mut values: Vec<String> = pieces.iter().map(|p| p.trim().to_string()).collect();
    if values.last().is_some_and(String::is_empty) {
        values.pop();
    }
    for value in &values {
        check_value(value)?;
    }
    Ok(values)
}

fn check_value(value: &str) -> Result<(), String> {
    if value.is_empty() {
        return Err("empty recipient".into());
    }
    let quotes = value.matches('"').count();
    let fully_quoted = quotes == 2 && value.len() >= 2 && value.starts_with('"') && value.ends_with('"');
    if quotes != 0 && !fully_quoted {
        return Err(format!("misplaced quote in {value:?}"));
    }
    Ok(())
}

fn put_entry(entry: &Node, out: &mut String) -> Result<(), LensError> {
    let mut children = entry.children.iter().peekable();
    let name = children
        .next_if(|c| c.label == NAME_LABEL)
        .ok_or_else(|| LensError::Render {
            label: entry.label.clone(),
            message: format!("expected {NAME_LABEL}"),
        })?;
    let name = token(entry, name)?;
    if name.contains(':') {
        return Err(LensError::Render {
            label: entry.label.clone(),
            message: format!("alias name {name:?} contains ':'"),
        });
    }

    let mut values = Vec::new();
    while let Some(value) = children.next_if(|c| c.label == VALUE) {
        let text = value.value.as_deref().unwrap_or_default();
        check_value(text)
            .and_then(|()| {
                if text.contains(['\n', '\r']) || (!text.starts_with('"') && text.contains(',')) {
                    Err(format!("recipient {text:?} cannot be written unquoted"))
                } else {
                    Ok(())
                }
            })
            .map_err(|message| LensError::Render {
                label: entry.label.clone(),
                message,
            })?;
        values.push(text);
    }
    if values.is_empty() {
        return Err(LensError::Render {
            label: entry.label.clone(),
            message: "alias has no recipients".into(),
        });
    }
    if let Some(extra) = children.next() {
        return Err(LensError::Render {
            label: entry.label.clone(),
            message: format!("unexpected {}", extra.label),
        });
    }

    out.push_str(name);
    out.push_str(": ");
    out.push_str(&values.join(","));
    Ok(())
}
