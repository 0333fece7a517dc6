//! `host` provider: entries of `/etc/hosts`.

use super::{ChangeKind, Prefetched, Record, RecordKey, Report, TreeProvider};
use crate::error::{ProviderError, Result};
use crate::lens::COMMENT;
use crate::lens::hosts::{ALIAS, CANONICAL, IPADDR, NAME as LENS};
use crate::path::PathExpr;
use crate::resource::{Ensure, HostRecord, HostResource};
use crate::tree::{Position, TreeEditor, TreeHandle};
use std::path::{Path, PathBuf};

/// Default hosts file.
pub const DEFAULT_TARGET: &str = "/etc/hosts";

impl Record for HostRecord {
    const KIND: &'static str = "host";
    const KEY_LABEL: &'static str = CANONICAL;

    fn name(&self) -> &str {
        &self.name
    }

    fn target(&self) -> &Path {
        &self.target
    }

    fn ensure(&self) -> Ensure {
        self.ensure
    }

    fn mark_absent(&mut self) {
        self.ensure = Ensure::Absent;
    }

    fn read<H: TreeHandle>(aug: &H, node: &PathExpr, target: &Path) -> Result<Option<Self>> {
        let Some(name) = aug.get(&node.child(CANONICAL))? else {
            return Ok(None);
        };
        let host_aliases = aug
            .matches(&node.child(ALIAS))?
            .iter()
            .filter_map(|p| aug.get(p).transpose())
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(Self {
            name,
            ensure: Ensure::Present,
            target: target.to_path_buf(),
            ip: aug.get(&node.child(IPADDR))?.unwrap_or_default(),
            host_aliases,
            comment: aug.get(&node.child(COMMENT))?,
        }))
    }
}

/// Manages `/etc/hosts` entries through a [`TreeEditor`].
///
/// # Example
///
/// ```rust,ignore
/// use augprov::{HostProvider, HostResource, LensEditor};
///
/// let provider = HostProvider::new(LensEditor::new())?;
/// let report = provider.apply(&[
///     HostResource::new("foo").with_ip("192.168.1.1"),
///     HostResource::new("old").absent(),
/// ])?;
/// ```
#[derive(Debug)]
pub struct HostProvider<E> {
    inner: TreeProvider<E>,
}

impl<E: TreeEditor> HostProvider<E> {
    /// Registers the provider.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::MissingDependency`] if `editor` lacks the
    /// hosts lens.
    pub fn new(editor: E) -> Result<Self> {
        Ok(Self {
            inner: TreeProvider::register(editor, HostRecord::KIND, LENS, DEFAULT_TARGET)?,
        })
    }

    /// Overrides the file used by resources without a target.
    #[must_use]
    pub fn with_default_target(mut self, target: impl Into<PathBuf>) -> Self {
        self.inner.set_default_target(target.into());
        self
    }

    /// The file used by resources without a target.
    #[must_use]
    pub fn default_target(&self) -> &Path {
        self.inner.default_target()
    }

    /// The file `resource` manages.
    #[must_use]
    pub fn target(&self, resource: &HostResource) -> PathBuf {
        self.inner.target(resource.target.as_deref())
    }

    /// Lists every entry of the default target in file order.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Load`] if the file cannot be parsed.
    pub fn instances(&self) -> Result<Vec<HostRecord>> {
        self.instances_in(self.inner.default_target())
    }

    /// Lists every entry of `target` in file order.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Load`] if the file cannot be parsed.
    pub fn instances_in(&self, target: &Path) -> Result<Vec<HostRecord>> {
        self.inner.read_all(target)
    }

    /// Reads each distinct target of `resources` once and returns the
    /// entries they refer to.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Load`] if any target cannot be parsed.
    pub fn prefetch(&self, resources: &[HostResource]) -> Result<Prefetched<HostRecord>> {
        self.inner.prefetch(
            resources
                .iter()
                .map(|r| RecordKey::new(r.name.as_str(), self.target(r))),
        )
    }

    /// Returns `true` if `resource` exists according to `state`.
    #[must_use]
    pub fn exists(&self, state: &Prefetched<HostRecord>, resource: &HostResource) -> bool {
        state.is_present(&resource.name, &self.target(resource))
    }

    /// Appends a new entry for `resource`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidResource`] if the resource has no IP
    /// or invalid fields, [`ProviderError::AlreadyExists`] if the name is
    /// taken, or a load/save error.
    pub fn create(
        &self,
        state: &mut Prefetched<HostRecord>,
        resource: &HostResource,
    ) -> Result<HostRecord> {
        resource.validate()?;
        let ip = resource
            .ip
            .as_deref()
            .ok_or_else(|| ProviderError::InvalidResource {
                name: resource.name.clone(),
                reason: "ip is required to create a host entry".into(),
            })?;
        let target = self.target(resource);
        let host_aliases = resource.host_aliases.clone().unwrap_or_default();
        let comment = resource.comment.clone().filter(|c| !c.is_empty());

        self.inner.with_tree(&target, |aug| {
            let node = TreeProvider::<E>::allocate::<HostRecord>(aug, &resource.name)?;
            aug.set(&node.child(IPADDR), ip)?;
            aug.set(&node.child(CANONICAL), &resource.name)?;
            for alias in &host_aliases {
                aug.set(&node.child(ALIAS).append(), alias)?;
            }
            if let Some(comment) = &comment {
                aug.set(&node.child(COMMENT), comment)?;
            }
            aug.save()
        })?;

        tracing::info!(
            name = %resource.name,
            ip = %ip,
            target = %target.display(),
            "Created host entry"
        );
        let record = HostRecord {
            name: resource.name.clone(),
            ensure: Ensure::Present,
            target,
            ip: ip.to_string(),
            host_aliases,
            comment,
        };
        state.insert(record.clone());
        Ok(record)
    }

    /// Removes every entry named like `resource`.
    ///
    /// # Errors
    ///
    /// Returns a load/save error, or [`ProviderError::InvalidName`] if the
    /// name cannot be addressed.
    pub fn destroy(&self, state: &mut Prefetched<HostRecord>, resource: &HostResource) -> Result<()> {
        let target = self.target(resource);
        let removed = self.inner.remove::<HostRecord>(&target, &resource.name)?;
        state.update(&resource.name, &target, Record::mark_absent);
        tracing::info!(
            name = %resource.name,
            removed,
            target = %target.display(),
            "Removed host entry"
        );
        Ok(())
    }

    /// Rewrites the entry's address.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::NotFound`] if the entry is missing, or a
    /// load/save error.
    pub fn set_ip(
        &self,
        state: &mut Prefetched<HostRecord>,
        resource: &HostResource,
        ip: &str,
    ) -> Result<()> {
        HostResource::new(resource.name.as_str()).with_ip(ip).validate()?;
        let target = self.target(resource);
        self.inner.edit::<HostRecord>(&target, &resource.name, |aug, node| {
            aug.set(&node.child(IPADDR), ip)
        })?;
        state.update(&resource.name, &target, |r| r.ip = ip.to_string());
        tracing::info!(name = %resource.name, ip = %ip, "Updated host address");
        Ok(())
    }

    /// Replaces the entry's aliases with `aliases`, in order.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::NotFound`] if the entry is missing, or a
    /// load/save error.
    pub fn set_host_aliases(
        &self,
        state: &mut Prefetched<HostRecord>,
        resource: &HostResource,
        aliases: &[String],
    ) -> Result<()> {
        HostResource::new(resource.name.as_str())
            .with_host_aliases(aliases)
            .validate()?;
        let target = self.target(resource);
        self.inner.edit::<HostRecord>(&target, &resource.name, |aug, node| {
            aug.remove(&node.child(ALIAS))?;
            let Some((first, rest)) = aliases.split_first() else {
                return Ok(());
            };
            // The first alias goes right after the last field so it stays
            // ahead of an inline comment; the rest follow it.
            let anchor = aug
                .matches(&node.any())?
                .into_iter()
                .rev()
                .find(|p| p.last_label() != Some(COMMENT))
                .ok_or_else(|| ProviderError::InvalidPath {
                    path: node.to_string(),
                    reason: "entry has no fields".into(),
                })?;
            aug.insert(&anchor, ALIAS, Position::After)?;
            aug.set(&node.child(ALIAS), first)?;
            for alias in rest {
                aug.set(&node.child(ALIAS).append(), alias)?;
            }
            Ok(())
        })?;
        state.update(&resource.name, &target, |r| r.host_aliases = aliases.to_vec());
        tracing::info!(name = %resource.name, aliases = ?aliases, "Updated host aliases");
        Ok(())
    }

    /// Sets the entry's comment; an empty string removes it.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::NotFound`] if the entry is missing, or a
    /// load/save error.
    pub fn set_comment(
        &self,
        state: &mut Prefetched<HostRecord>,
        resource: &HostResource,
        comment: &str,
    ) -> Result<()> {
        HostResource::new(resource.name.as_str())
            .with_comment(comment)
            .validate()?;
        let target = self.target(resource);
        self.inner.edit::<HostRecord>(&target, &resource.name, |aug, node| {
            if comment.is_empty() {
                aug.remove(&node.child(COMMENT)).map(drop)
            } else {
                aug.set(&node.child(COMMENT), comment)
            }
        })?;
        let stored = Some(comment.to_string()).filter(|c| !c.is_empty());
        state.update(&resource.name, &target, |r| r.comment = stored);
        tracing::info!(name = %resource.name, comment = %comment, "Updated host comment");
        Ok(())
    }

    /// Brings every resource in line with its desired state.
    ///
    /// Targets are prefetched once. A resource that fails is reported in
    /// [`Report::failures`] and does not stop the others.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Load`] if a target cannot be prefetched.
    pub fn apply(&self, resources: &[HostResource]) -> Result<Report> {
        let mut state = self.prefetch(resources)?;
        let mut report = Report::default();
        for resource in resources {
            let outcome = self.sync(&mut state, resource);
            report.record(&resource.name, &self.target(resource), outcome);
        }
        Ok(report)
    }

    fn sync(
        &self,
        state: &mut Prefetched<HostRecord>,
        resource: &HostResource,
    ) -> Result<Vec<ChangeKind>> {
        let exists = self.exists(state, resource);
        match resource.ensure {
            Ensure::Absent if exists => {
                self.destroy(state, resource)?;
                Ok(vec![ChangeKind::Removed])
            }
            Ensure::Absent => Ok(Vec::new()),
            Ensure::Present if !exists => {
                self.create(state, resource)?;
                Ok(vec![ChangeKind::Created])
            }
            Ensure::Present => {
                let Some(current) = state.get(&resource.name, &self.target(resource)).cloned()
                else {
                    return Ok(Vec::new());
                };
                let mut changes = Vec::new();
                if let Some(ip) = resource.ip.as_deref().filter(|ip| *ip != current.ip) {
                    self.set_ip(state, resource, ip)?;
                    changes.push(ChangeKind::Updated("ip"));
                }
                if let Some(aliases) = resource
                    .host_aliases
                    .as_deref()
                    .filter(|a| *a != current.host_aliases.as_slice())
                {
                    self.set_host_aliases(state, resource, aliases)?;
                    changes.push(ChangeKind::Updated("host_aliases"));
                }
                if let Some(comment) = resource
                    .comment
                    .as_deref()
                    .filter(|c| Some(*c).filter(|c| !c.is_empty()) != current.comment.as_deref())
                {
                    self.set_comment(state, resource, comment)?;
                    changes.push(ChangeKind::Updated("comment"));
                }
                Ok(changes)
            }
        }
    }
}
