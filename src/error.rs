//! Error types.

use thiserror::Error;

/// Result alias for provider and tree operations.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Errors returned by providers and tree editors.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The target file could not be read or parsed by its lens.
    #[error("{editor} didn't load {path}: {details}")]
    Load {
        /// Name of the tree editor.
        editor: String,
        /// The file that failed to load.
        path: String,
        /// Lens or I/O diagnostic.
        details: String,
    },

    /// The tree could not be written back to the target file.
    #[error("{editor} didn't save {path}: {details}")]
    Save {
        /// Name of the tree editor.
        editor: String,
        /// The file that failed to save.
        path: String,
        /// Lens or I/O diagnostic.
        details: String,
    },

    /// The tree-editing capability needed by a provider is unavailable.
    #[error("missing dependency {feature}: {reason}")]
    MissingDependency {
        /// The capability that was probed (usually a lens name).
        feature: String,
        /// Why it is unavailable.
        reason: String,
    },

    /// A value cannot be embedded in a path expression.
    #[error("invalid name {name:?}: {reason}")]
    InvalidName {
        /// The rejected value.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A desired resource carries values the target syntax cannot hold.
    #[error("invalid resource {name}: {reason}")]
    InvalidResource {
        /// Resource name.
        name: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A path expression cannot be applied to the tree.
    #[error("invalid path {path}: {reason}")]
    InvalidPath {
        /// Rendered path expression.
        path: String,
        /// What is wrong with it.
        reason: String,
    },

    /// A path expected to address one node matched several.
    #[error("path {path} matches {count} nodes, expected one")]
    Ambiguous {
        /// Rendered path expression.
        path: String,
        /// Number of matched nodes.
        count: usize,
    },

    /// No record with the given name exists in the target file.
    #[error("{kind} {name} not found in {target}")]
    NotFound {
        /// Resource kind (`host`, `mailalias`).
        kind: &'static str,
        /// Resource name.
        name: String,
        /// Target file.
        target: String,
    },

    /// A record with the given name already exists in the target file.
    #[error("{kind} {name} already exists in {target}")]
    AlreadyExists {
        /// Resource kind (`host`, `mailalias`).
        kind: &'static str,
        /// Resource name.
        name: String,
        /// Target file.
        target: String,
    },
}

impl ProviderError {
    /// Returns `true` if the target file failed to load or save.
    #[must_use]
    pub const fn is_persistence_failure(&self) -> bool {
        matches!(self, Self::Load { .. } | Self::Save { .. })
    }
}

/// Diagnostics produced by a lens while parsing or rendering a file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LensError {
    /// The file text does not match the lens syntax.
    #[error("line {line}: {message}")]
    Parse {
        /// 1-based line number.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// The tree cannot be rendered back into the lens syntax.
    #[error("node {label}: {message}")]
    Render {
        /// Label of the offending node.
        label: String,
        /// What went wrong.
        message: String,
    },
}
