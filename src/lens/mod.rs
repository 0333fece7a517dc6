//! Lenses: bidirectional grammars mapping file text to a [`Node`] tree.

pub mod aliases;
pub mod hosts;

pub use aliases::AliasesLens;
pub use hosts::HostsLens;

use crate::error::LensError;
use crate::tree::Node;

/// Label of comment lines and inline comments.
pub const COMMENT: &str = "#comment";

/// Label of blank lines, kept so they survive a save.
pub const EMPTY: &str = "#empty";

/// A file syntax understood by [`LensEditor`](crate::LensEditor).
pub trait Lens {
    /// Lens name used to select it, e.g. `Hosts.lns`.
    fn name(&self) -> &'static str;

    /// Parses file text into top-level nodes.
    ///
    /// # Errors
    ///
    /// Returns [`LensError::Parse`] naming the first offending line.
    fn get(&self, text: &str) -> Result<Vec<Node>, LensError>;

    /// Renders top-level nodes back into file text.
    ///
    /// # Errors
    ///
    /// Returns [`LensError::Render`] if a node does not fit the syntax.
    fn put(&self, nodes: &[Node]) -> Result<String, LensError>;
}

/// Renders a top-level comment line.
fn put_comment(node: &Node, out: &mut String) {
    match node.value.as_deref() {
        Some(text) if !text.is_empty() => {
            out.push_str("# ");
            out.push_str(text);
        }
        _ => out.push('#'),
    }
}

/// Value of a node that must hold a single non-blank token.
fn token<'a>(entry: &Node, node: &'a Node) -> Result<&'a str, LensError> {
    match node.value.as_deref() {
        Some(v) if !v.is_empty() && !v.contains(char::is_whitespace) => Ok(v),
        Some(v) => Err(LensError::Render {
            label: entry.label.clone(),
            message: format!("{} value {v:?} is not a single token", node.label),
        }),
        None => Err(LensError::Render {
            label: entry.label.clone(),
            message: format!("{} has no value", node.label),
        }),
    }
}
