//! Resource providers and the machinery they share.
//!
//! Each provider opens its target file through a [`TreeEditor`] for every
//! operation, edits the tree, saves, and releases the handle before
//! returning. Discovered state is never cached on the provider: it lives in
//! a [`Prefetched`] map that callers pass into each operation.

pub mod host;
pub mod mailalias;

use crate::capability::probe;
use crate::error::{ProviderError, Result};
use crate::path::PathExpr;
use crate::resource::Ensure;
use crate::tree::{TreeEditor, TreeHandle};
use crate::util::next_seq;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::{Path, PathBuf};

/// A record type a provider reads from its target file.
pub trait Record: Clone + std::fmt::Debug {
    /// Resource kind used in logs and errors.
    const KIND: &'static str;

    /// Child label holding the record's name.
    const KEY_LABEL: &'static str;

    /// Record name.
    fn name(&self) -> &str;

    /// File the record lives in.
    fn target(&self) -> &Path;

    /// Present or absent.
    fn ensure(&self) -> Ensure;

    /// Marks the record destroyed.
    fn mark_absent(&mut self);

    /// Reads the record at `node`, or `None` if it has no name.
    ///
    /// # Errors
    ///
    /// Propagates tree read failures.
    fn read<H: TreeHandle>(aug: &H, node: &PathExpr, target: &Path) -> Result<Option<Self>>;
}

/// Identity of a record: its name within a target file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey {
    /// Record name.
    pub name: String,
    /// Target file.
    pub target: PathBuf,
}

impl RecordKey {
    /// Creates a key.
    #[must_use]
    pub fn new(name: impl Into<String>, target: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
        }
    }

    fn of<R: Record>(record: &R) -> Self {
        Self::new(record.name(), record.target())
    }
}

/// Records discovered by a prefetch, keyed by `(name, target)`.
///
/// Provider operations keep it current: create inserts, destroy marks the
/// record absent and setters update the stored fields.
#[derive(Debug, Clone)]
pub struct Prefetched<R> {
    records: HashMap<RecordKey, R>,
}

impl<R> Default for Prefetched<R> {
    fn default() -> Self {
        Self {
            records: HashMap::new(),
        }
    }
}

impl<R: Record> Prefetched<R> {
    /// The record for `name` in `target`, present or destroyed.
    #[must_use]
    pub fn get(&self, name: &str, target: &Path) -> Option<&R> {
        self.records.get(&RecordKey::new(name, target))
    }

    /// Returns `true` if `name` exists in `target`.
    #[must_use]
    pub fn is_present(&self, name: &str, target: &Path) -> bool {
        self.get(name, target)
            .is_some_and(|r| r.ensure() == Ensure::Present)
    }

    /// Number of tracked records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if no record is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub(crate) fn insert(&mut self, record: R) {
        self.records.insert(RecordKey::of(&record), record);
    }

    pub(crate) fn update(&mut self, name: &str, target: &Path, f: impl FnOnce(&mut R)) {
        if let Some(record) = self.records.get_mut(&RecordKey::new(name, target)) {
            f(record);
        }
    }
}

/// What [`apply`](host::HostProvider::apply) did to one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// A new entry was written.
    Created,
    /// The entry was removed.
    Removed,
    /// The named field was rewritten.
    Updated(&'static str),
}

/// One applied change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// Resource name.
    pub name: String,
    /// Target file.
    pub target: PathBuf,
    /// What changed.
    pub kind: ChangeKind,
}

/// A resource whose changes were aborted.
#[derive(Debug)]
pub struct Failure {
    /// Resource name.
    pub name: String,
    /// Target file.
    pub target: PathBuf,
    /// Why it failed.
    pub error: ProviderError,
}

/// Outcome of applying a batch of resources.
#[derive(Debug, Default)]
pub struct Report {
    /// Changes written, in resource order.
    pub changes: Vec<Change>,
    /// Resources that failed. Other resources are unaffected.
    pub failures: Vec<Failure>,
}

impl Report {
    /// Returns `true` if every resource was brought in sync.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Returns `true` if nothing was written.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.changes.is_empty() && self.failures.is_empty()
    }

    fn record(&mut self, name: &str, target: &Path, outcome: Result<Vec<ChangeKind>>) {
        match outcome {
            Ok(kinds) => self.changes.extend(kinds.into_iter().map(|kind| Change {
                name: name.to_string(),
                target: target.to_path_buf(),
                kind,
            })),
            Err(error) => {
                tracing::error!(
                    name = %name,
                    target = %target.display(),
                    error = %error,
                    "Failed to apply resource"
                );
                self.failures.push(Failure {
                    name: name.to_string(),
                    target: target.to_path_buf(),
                    error,
                });
            }
        }
    }
}

/// State shared by every provider: the editor, its lens and the default
/// target file.
#[derive(Debug)]
pub(crate) struct TreeProvider<E> {
    editor: E,
    lens: &'static str,
    default_target: PathBuf,
}

impl<E: TreeEditor> TreeProvider<E> {
    /// Confirms that `editor` supports `lens` before the provider is used.
    pub(crate) fn register(
        editor: E,
        kind: &'static str,
        lens: &'static str,
        default_target: &str,
    ) -> Result<Self> {
        probe(&editor, lens).require().inspect_err(|e| {
            tracing::warn!(kind, lens, error = %e, "Provider unavailable");
        })?;
        tracing::info!(
            kind,
            lens,
            editor = editor.name(),
            version = editor.version(),
            "Registered provider"
        );
        Ok(Self {
            editor,
            lens,
            default_target: PathBuf::from(default_target),
        })
    }

    pub(crate) fn set_default_target(&mut self, target: PathBuf) {
        self.default_target = target;
    }

    pub(crate) fn default_target(&self) -> &Path {
        &self.default_target
    }

    pub(crate) fn target(&self, explicit: Option<&Path>) -> PathBuf {
        explicit.unwrap_or(self.default_target.as_path()).to_path_buf()
    }

    /// Opens `target`, runs `f` and releases the handle on every exit path.
    pub(crate) fn with_tree<T>(
        &self,
        target: &Path,
        f: impl FnOnce(&mut E::Handle) -> Result<T>,
    ) -> Result<T> {
        let mut aug = self.editor.open(target, self.lens)?;
        f(&mut aug)
    }

    /// Reads every named record of `target` in file order.
    pub(crate) fn read_all<R: Record>(&self, target: &Path) -> Result<Vec<R>> {
        self.with_tree(target, |aug| {
            let aug: &E::Handle = aug;
            aug.matches(&PathExpr::root().any())?
                .iter()
                .map(|node| R::read(aug, node, target))
                .filter_map(Result::transpose)
                .collect()
        })
    }

    /// Reads each distinct target once and keeps the records whose
    /// `(name, target)` one of `wanted` asks for.
    pub(crate) fn prefetch<R: Record>(
        &self,
        wanted: impl IntoIterator<Item = RecordKey>,
    ) -> Result<Prefetched<R>> {
        let wanted: HashSet<RecordKey> = wanted.into_iter().collect();
        let targets: BTreeSet<&Path> = wanted.iter().map(|k| k.target.as_path()).collect();

        let mut state = Prefetched::default();
        for target in &targets {
            for record in self.read_all::<R>(target)? {
                let key = RecordKey::of(&record);
                if wanted.contains(&key) {
                    state.records.entry(key).or_insert(record);
                }
            }
        }
        tracing::debug!(
            kind = R::KIND,
            targets = targets.len(),
            wanted = wanted.len(),
            found = state.len(),
            "Prefetched records"
        );
        Ok(state)
    }

    /// `/*[<key> = '<name>']`
    pub(crate) fn record_path<R: Record>(name: &str) -> Result<PathExpr> {
        PathExpr::root().any().where_child(R::KEY_LABEL, name)
    }

    /// The single node holding `name`.
    pub(crate) fn locate<R: Record>(aug: &E::Handle, name: &str) -> Result<PathExpr> {
        let path = Self::record_path::<R>(name)?;
        let mut found = aug.matches(&path)?;
        match found.len() {
            1 => Ok(found.remove(0)),
            0 => Err(ProviderError::NotFound {
                kind: R::KIND,
                name: name.to_string(),
                target: aug.target().display().to_string(),
            }),
            count => Err(ProviderError::Ambiguous {
                path: path.to_string(),
                count,
            }),
        }
    }

    /// Allocates the node for a new record, refusing duplicate names.
    pub(crate) fn allocate<R: Record>(aug: &E::Handle, name: &str) -> Result<PathExpr> {
        if !aug.matches(&Self::record_path::<R>(name)?)?.is_empty() {
            return Err(ProviderError::AlreadyExists {
                kind: R::KIND,
                name: name.to_string(),
                target: aug.target().display().to_string(),
            });
        }
        let seq = next_seq(&aug.matches(&PathExpr::root().any())?);
        Ok(PathExpr::root().child(&seq.to_string()))
    }

    /// Removes every node holding `name` and saves.
    pub(crate) fn remove<R: Record>(&self, target: &Path, name: &str) -> Result<usize> {
        let path = Self::record_path::<R>(name)?;
        self.with_tree(target, |aug| {
            let removed = aug.remove(&path)?;
            aug.save()?;
            Ok(removed)
        })
    }

    /// Locates `name`, applies `edit` to its node and saves.
    pub(crate) fn edit<R: Record>(
        &self,
        target: &Path,
        name: &str,
        edit: impl FnOnce(&mut E::Handle, &PathExpr) -> Result<()>,
    ) -> Result<()> {
        self.with_tree(target, |aug| {
            let node = Self::locate::<R>(aug, name)?;
            edit(aug, &node)?;
            aug.save()
        })
    }
}
