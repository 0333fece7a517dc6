//! Startup capability check for the tree-editing backend.
//!
//! Providers are only usable when their backend can parse the target
//! syntax. [`probe`] answers that once, at registration, with a typed
//! result instead of failing later in the middle of a run.

use crate::error::{ProviderError, Result};
use crate::tree::TreeEditor;

/// Outcome of probing an editor for a lens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    /// The editor can open files with the lens.
    Available {
        /// Editor name.
        editor: String,
        /// Editor version.
        version: String,
    },
    /// The lens is not usable.
    Missing {
        /// The probed lens.
        feature: String,
        /// Why it is unavailable.
        reason: String,
    },
}

impl Availability {
    /// Returns `true` for [`Availability::Available`].
    #[must_use]
    pub const fn is_available(&self) -> bool {
        matches!(self, Self::Available { .. })
    }

    /// Converts a missing capability into an error.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::MissingDependency`] for [`Availability::Missing`].
    pub fn require(self) -> Result<()> {
        match self {
            Self::Available { .. } => Ok(()),
            Self::Missing { feature, reason } => {
                Err(ProviderError::MissingDependency { feature, reason })
            }
        }
    }
}

/// Checks whether `editor` can open files with `lens`.
#[must_use]
pub fn probe<E: TreeEditor + ?Sized>(editor: &E, lens: &str) -> Availability {
    if editor.has_lens(lens) {
        Availability::Available {
            editor: editor.name().to_string(),
            version: editor.version().to_string(),
        }
    } else {
        Availability::Missing {
            feature: lens.to_string(),
            reason: format!("{} {} has no {lens} lens", editor.name(), editor.version()),
        }
    }
}
