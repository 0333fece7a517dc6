//! File-backed tree editor driven by the bundled lenses.

use super::{Node, Position, TreeEditor, TreeHandle};
use crate::error::{ProviderError, Result};
use crate::lens::{AliasesLens, HostsLens, Lens};
use crate::path::PathExpr;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;

const EDITOR_NAME: &str = "LensEditor";

/// Suffix of the staging file written next to the target before it is
/// renamed into place.
const STAGING_SUFFIX: &str = ".augnew";

/// Opens files as [`LensTree`]s using a registry of [`Lens`]es.
///
/// # Example
///
/// ```rust,ignore
/// use augprov::{LensEditor, TreeEditor, TreeHandle, PathExpr};
///
/// let editor = LensEditor::new();
/// let mut tree = editor.open("/etc/hosts".as_ref(), "Hosts.lns")?;
/// let entries = tree.matches(&PathExpr::root().any())?;
/// ```
#[derive(Clone)]
pub struct LensEditor {
    lenses: HashMap<&'static str, Rc<dyn Lens>>,
}

impl LensEditor {
    /// Creates an editor with the `Hosts.lns` and `Aliases.lns` lenses.
    #[must_use]
    pub fn new() -> Self {
        Self::bare().with_lens(HostsLens).with_lens(AliasesLens)
    }

    /// Creates an editor with no lenses registered.
    #[must_use]
    pub fn bare() -> Self {
        Self {
            lenses: HashMap::new(),
        }
    }

    /// Registers a lens under its own name, replacing any previous one.
    #[must_use]
    pub fn with_lens(mut self, lens: impl Lens + 'static) -> Self {
        self.lenses.insert(lens.name(), Rc::new(lens));
        self
    }

    fn load_error(path: &Path, details: impl ToString) -> ProviderError {
        ProviderError::Load {
            editor: EDITOR_NAME.to_string(),
            path: path.display().to_string(),
            details: details.to_string(),
        }
    }
}

impl Default for LensEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for LensEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut lenses: Vec<&str> = self.lenses.keys().copied().collect();
        lenses.sort_unstable();
        f.debug_struct("LensEditor").field("lenses", &lenses).finish()
    }
}

impl TreeEditor for LensEditor {
    type Handle = LensTree;

    fn name(&self) -> &str {
        EDITOR_NAME
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn has_lens(&self, lens: &str) -> bool {
        self.lenses.contains_key(lens)
    }

    fn open(&self, path: &Path, lens: &str) -> Result<LensTree> {
        let lens = self
            .lenses
            .get(lens)
            .cloned()
            .ok_or_else(|| ProviderError::MissingDependency {
                feature: lens.to_string(),
                reason: format!("{EDITOR_NAME} has no lens named {lens}"),
            })?;

        // A missing file is an empty tree; saving creates it.
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(Self::load_error(path, e)),
        };
        let children = lens.get(&text).map_err(|e| Self::load_error(path, e))?;

        tracing::debug!(
            path = %path.display(),
            lens = lens.name(),
            nodes = children.len(),
            "Loaded tree"
        );
        Ok(LensTree {
            path: path.to_path_buf(),
            lens,
            root: Node {
                children,
                ..Node::default()
            },
            dirty: false,
        })
    }
}

/// A file parsed by a [`LensEditor`].
///
/// Changes stay in memory until [`save`](TreeHandle::save). Dropping the
/// handle discards unsaved changes.
pub struct LensTree {
    path: PathBuf,
    lens: Rc<dyn Lens>,
    root: Node,
    dirty: bool,
}

impl LensTree {
    fn save_error(&self, details: impl ToString) -> ProviderError {
        ProviderError::Save {
            editor: EDITOR_NAME.to_string(),
            path: self.path.display().to_string(),
            details: details.to_string(),
        }
    }
}

impl TreeHandle for LensTree {
    fn target(&self) -> &Path {
        &self.path
    }

    fn matches(&self, path: &PathExpr) -> Result<Vec<PathExpr>> {
        Ok(self
            .root
            .select(path)
            .iter()
            .map(|pos| self.root.concrete(pos))
            .collect())
    }

    fn get(&self, path: &PathExpr) -> Result<Option<String>> {
        self.root.get(path)
    }

    fn set(&mut self, path: &PathExpr, value: &str) -> Result<()> {
        self.root.set(path, value)?;
        self.dirty = true;
        Ok(())
    }

    fn remove(&mut self, path: &PathExpr) -> Result<usize> {
        let removed = self.root.remove(path);
        if removed > 0 {
            self.dirty = true;
        }
        Ok(removed)
    }

    fn insert(&mut self, anchor: &PathExpr, label: &str, position: Position) -> Result<()> {
        self.root.insert(anchor, label, position)?;
        self.dirty = true;
        Ok(())
    }

    fn save(&mut self) -> Result<()> {
        if !self.dirty {
            tracing::trace!(path = %self.path.display(), "Tree unchanged, skipping save");
            return Ok(());
        }
        let text = self
            .lens
            .put(&self.root.children)
            .map_err(|e| self.save_error(e))?;
        write_replacing(&self.path, &text).map_err(|e| self.save_error(e))?;
        self.dirty = false;
        tracing::debug!(path = %self.path.display(), bytes = text.len(), "Saved tree");
        Ok(())
    }
}

impl Drop for LensTree {
    fn drop(&mut self) {
        tracing::trace!(
            path = %self.path.display(),
            unsaved = self.dirty,
            "Released tree"
        );
    }
}

/// Writes `text` to a staging file beside `path` and renames it over
/// `path`, keeping the original permissions.
fn write_replacing(path: &Path, text: &str) -> std::io::Result<()> {
    let mut staged = path.as_os_str().to_owned();
    staged.push(STAGING_SUFFIX);
    let staged = PathBuf::from(staged);

    let result = std::fs::write(&staged, text)
        .and_then(|()| match std::fs::metadata(path) {
            Ok(meta) => std::fs::set_permissions(&staged, meta.permissions()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        })
        .and_then(|()| std::fs::rename(&staged, path));

    if result.is_err() {
        let _ = std::fs::remove_file(&staged);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lens::hosts;

    fn entries() -> PathExpr {
        PathExpr::root().any()
    }

    #[test]
    fn missing_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let tree = LensEditor::new()
            .open(&dir.path().join("hosts"), hosts::NAME)
            .unwrap();
        assert!(tree.matches(&entries()).unwrap().is_empty());
    }

    #[test]
    fn unchanged_tree_is_not_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts");
        let mut tree = LensEditor::new().open(&path, hosts::NAME).unwrap();
        tree.save().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn save_writes_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts");
        let editor = LensEditor::new();

        let mut tree = editor.open(&path, hosts::NAME).unwrap();
        tree.set(&PathExpr::root().child("1").child("ipaddr"), "10.0.0.1")
            .unwrap();
        tree.set(&PathExpr::root().child("1").child("canonical"), "foo")
            .unwrap();
        tree.save().unwrap();
        drop(tree);

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "10.0.0.1\tfoo\n");
        assert!(!dir.path().join("hosts.augnew").exists());

        let tree = editor.open(&path, hosts::NAME).unwrap();
        assert_eq!(
            tree.get(&PathExpr::root().child("1").child("canonical")).unwrap().as_deref(),
            Some("foo")
        );
    }

    #[test]
    fn unparsable_file_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts");
        std::fs::write(&path, "127.0.0.1\n").unwrap();

        let err = LensEditor::new().open(&path, hosts::NAME).err().unwrap();
        assert!(matches!(err, ProviderError::Load { .. }));
        assert!(err.to_string().starts_with("LensEditor didn't load "));
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn failed_render_leaves_file_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts");
        std::fs::write(&path, "127.0.0.1\tlocalhost\n").unwrap();

        let mut tree = LensEditor::new().open(&path, hosts::NAME).unwrap();
        tree.remove(&PathExpr::root().child("1").child("canonical"))
            .unwrap();
        let err = tree.save().unwrap_err();
        assert!(matches!(err, ProviderError::Save { .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "127.0.0.1\tlocalhost\n");
    }

    #[test]
    fn unknown_lens_is_a_missing_dependency() {
        let dir = tempfile::tempdir().unwrap();
        let err = LensEditor::bare()
            .open(&dir.path().join("hosts"), hosts::NAME)
            .err()
            .unwrap();
        assert!(matches!(err, ProviderError::MissingDependency { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn save_keeps_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hosts");
        std::fs::write(&path, "127.0.0.1\tlocalhost\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o640)).unwrap();

        let mut tree = LensEditor::new().open(&path, hosts::NAME).unwrap();
        tree.set(&PathExpr::root().child("1").child("ipaddr"), "127.0.1.1")
            .unwrap();
        tree.save().unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o640);
    }
}
