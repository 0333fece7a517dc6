//! The tree-editor collaborator consumed by the providers.
//!
//! A [`TreeEditor`] opens a file through a named lens and hands back a
//! [`TreeHandle`]: a parsed, path-addressable view of the file that is
//! written back with [`TreeHandle::save`]. Providers only ever talk to the
//! file through this interface.

mod editor;
mod node;

pub use editor::{LensEditor, LensTree};
pub use node::Node;

use crate::error::Result;
use crate::path::PathExpr;
use std::path::Path;

/// Where [`TreeHandle::insert`] places the new node relative to its anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    /// Immediately before the anchor.
    Before,
    /// Immediately after the anchor.
    After,
}

/// A backend able to open files as editable trees.
pub trait TreeEditor {
    /// The open-tree handle type.
    type Handle: TreeHandle;

    /// Name used in diagnostics (`"<name> didn't load <path>"`).
    fn name(&self) -> &str;

    /// Backend version string.
    fn version(&self) -> &str;

    /// Returns `true` if `lens` can be used with [`open`](Self::open).
    fn has_lens(&self, lens: &str) -> bool;

    /// Parses `path` with `lens`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Load`](crate::ProviderError::Load) if the
    /// file cannot be read or parsed, or
    /// [`ProviderError::MissingDependency`](crate::ProviderError::MissingDependency)
    /// if the lens is unknown.
    fn open(&self, path: &Path, lens: &str) -> Result<Self::Handle>;
}

/// An open, parsed file. Released when dropped.
pub trait TreeHandle {
    /// The file this tree was loaded from.
    fn target(&self) -> &Path;

    /// Concrete paths of every node matched by `path`, in file order.
    ///
    /// # Errors
    ///
    /// Backend-specific evaluation failures.
    fn matches(&self, path: &PathExpr) -> Result<Vec<PathExpr>>;

    /// Value of the single node matched by `path`, `None` if nothing matches.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Ambiguous`](crate::ProviderError::Ambiguous)
    /// if `path` matches more than one node.
    fn get(&self, path: &PathExpr) -> Result<Option<String>>;

    /// Sets the value of the node at `path`, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if `path` is ambiguous or cannot be created.
    fn set(&mut self, path: &PathExpr, value: &str) -> Result<()>;

    /// Removes every node matched by `path` and returns how many were removed.
    ///
    /// # Errors
    ///
    /// Backend-specific evaluation failures.
    fn remove(&mut self, path: &PathExpr) -> Result<usize>;

    /// Inserts an empty `label` node next to the single node matched by `anchor`.
    ///
    /// # Errors
    ///
    /// Returns an error unless `anchor` matches exactly one non-root node.
    fn insert(&mut self, anchor: &PathExpr, label: &str, position: Position) -> Result<()>;

    /// Writes the tree back to [`target`](Self::target).
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Save`](crate::ProviderError::Save) if the
    /// tree cannot be rendered or written.
    fn save(&mut self) -> Result<()>;
}
