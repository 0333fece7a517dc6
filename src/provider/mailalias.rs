//! `mailalias` provider: entries of `/etc/aliases`.

use super::{ChangeKind, Prefetched, Record, RecordKey, Report, TreeProvider};
use crate::error::{ProviderError, Result};
use crate::lens::aliases::{NAME as LENS, NAME_LABEL, VALUE};
use crate::path::PathExpr;
use crate::resource::{Ensure, MailAliasRecord, MailAliasResource};
use crate::tree::{TreeEditor, TreeHandle};
use crate::util::{quote, unquote};
use std::path::{Path, PathBuf};

/// Default aliases file.
pub const DEFAULT_TARGET: &str = "/etc/aliases";

impl Record for MailAliasRecord {
    const KIND: &'static str = "mailalias";
    const KEY_LABEL: &'static str = NAME_LABEL;

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
        let Some(name) = aug.get(&node.child(NAME_LABEL))? else {
            return Ok(None);
        };
        let mut recipients = Vec::new();
        for value in aug.matches(&node.child(VALUE))? {
            if let Some(raw) = aug.get(&value)? {
                recipients.push(unquote(&raw).to_string());
            }
        }
        Ok(Some(Self {
            name,
            ensure: Ensure::Present,
            target: target.to_path_buf(),
            recipients,
        }))
    }
}

/// Manages `/etc/aliases` entries through a [`TreeEditor`].
#[derive(Debug)]
pub struct MailAliasProvider<E> {
    inner: TreeProvider<E>,
}

impl<E: TreeEditor> MailAliasProvider<E> {
    /// Registers the provider.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::MissingDependency`] if `editor` lacks the
    /// aliases lens.
    pub fn new(editor: E) -> Result<Self> {
        Ok(Self {
            inner: TreeProvider::register(editor, MailAliasRecord::KIND, LENS, DEFAULT_TARGET)?,
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
    pub fn target(&self, resource: &MailAliasResource) -> PathBuf {
        self.inner.target(resource.target.as_deref())
    }

    /// Lists every alias of the default target in file order.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Load`] if the file cannot be parsed.
    pub fn instances(&self) -> Result<Vec<MailAliasRecord>> {
        self.instances_in(self.inner.default_target())
    }

    /// Lists every alias of `target` in file order.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Load`] if the file cannot be parsed.
    pub fn instances_in(&self, target: &Path) -> Result<Vec<MailAliasRecord>> {
        self.inner.read_all(target)
    }

    /// Reads each distinct target of `resources` once and returns the
    /// aliases they refer to.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Load`] if any target cannot be parsed.
    pub fn prefetch(&self, resources: &[MailAliasResource]) -> Result<Prefetched<MailAliasRecord>> {
        self.inner.prefetch(
            resources
                .iter()
                .map(|r| RecordKey::new(r.name.as_str(), self.target(r))),
        )
    }

    /// Returns `true` if `resource` exists according to `state`.
    #[must_use]
    pub fn exists(&self, state: &Prefetched<MailAliasRecord>, resource: &MailAliasResource) -> bool {
        state.is_present(&resource.name, &self.target(resource))
    }

    /// Appends a new alias for `resource`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidResource`] if the resource has no
    /// recipients or invalid fields, [`ProviderError::AlreadyExists`] if
    /// the name is taken, or a load/save error.
    pub fn create(
        &self,
        state: &mut Prefetched<MailAliasRecord>,
        resource: &MailAliasResource,
    ) -> Result<MailAliasRecord> {
        resource.validate()?;
        let recipients = normalize(resource.recipients.as_deref().unwrap_or_default());
        require_recipients(&resource.name, &recipients)?;
        let target = self.target(resource);

        self.inner.with_tree(&target, |aug| {
            let node = TreeProvider::<E>::allocate::<MailAliasRecord>(aug, &resource.name)?;
            aug.set(&node.child(NAME_LABEL), &resource.name)?;
            for recipient in &recipients {
                aug.set(&node.child(VALUE).append(), &quote(recipient))?;
            }
            aug.save()
        })?;

        tracing::info!(
            name = %resource.name,
            recipients = recipients.len(),
            target = %target.display(),
            "Created mail alias"
        );
        let record = MailAliasRecord {
            name: resource.name.clone(),
            ensure: Ensure::Present,
            target,
            recipients,
        };
        state.insert(record.clone());
        Ok(record)
    }

    /// Removes every alias named like `resource`.
    ///
    /// # Errors
    ///
    /// Returns a load/save error, or [`ProviderError::InvalidName`] if the
    /// name cannot be addressed.
    pub fn destroy(
        &self,
        state: &mut Prefetched<MailAliasRecord>,
        resource: &MailAliasResource,
    ) -> Result<()> {
        let target = self.target(resource);
        let removed = self.inner.remove::<MailAliasRecord>(&target, &resource.name)?;
        state.update(&resource.name, &target, Record::mark_absent);
        tracing::info!(
            name = %resource.name,
            removed,
            target = %target.display(),
            "Removed mail alias"
        );
        Ok(())
    }

    /// Replaces the alias's recipients with `recipients`, in order.
    ///
    /// Recipients may be given quoted or bare; both are stored bare and
    /// quoted on write as needed.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidResource`] for an empty list,
    /// [`ProviderError::NotFound`] if the alias is missing, or a load/save
    /// error.
    pub fn set_recipients(
        &self,
        state: &mut Prefetched<MailAliasRecord>,
        resource: &MailAliasResource,
        recipients: &[String],
    ) -> Result<()> {
        MailAliasResource::new(resource.name.as_str())
            .with_recipients(recipients)
            .validate()?;
        require_recipients(&resource.name, recipients)?;
        let recipients = normalize(recipients);
        let target = self.target(resource);
        self.inner
            .edit::<MailAliasRecord>(&target, &resource.name, |aug, node| {
                aug.remove(&node.child(VALUE))?;
                for recipient in &recipients {
                    aug.set(&node.child(VALUE).append(), &quote(recipient))?;
                }
                Ok(())
            })?;
        tracing::info!(
            name = %resource.name,
            recipients = ?recipients,
            "Updated mail alias recipients"
        );
        state.update(&resource.name, &target, |r| r.recipients = recipients);
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
    pub fn apply(&self, resources: &[MailAliasResource]) -> Result<Report> {
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
        state: &mut Prefetched<MailAliasRecord>,
        resource: &MailAliasResource,
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
                let current = state
                    .get(&resource.name, &self.target(resource))
                    .map(|r| r.recipients.clone())
                    .unwrap_or_default();
                match resource.recipients.as_deref() {
                    Some(wanted) if normalize(wanted) != current => {
                        self.set_recipients(state, resource, wanted)?;
                        Ok(vec![ChangeKind::Updated("recipients")])
                    }
                    _ => Ok(Vec::new()),
                }
            }
        }
    }
}

/// Recipients as they read back from the file: one surrounding quote pair
/// stripped.
fn normalize(recipients: &[String]) -> Vec<String> {
    recipients.iter().map(|r| unquote(r).to_string()).collect()
}

/// The aliases syntax cannot hold an alias without recipients.
fn require_recipients(name: &str, recipients: &[String]) -> Result<()> {
    if recipients.is_empty() {
        return Err(ProviderError::InvalidResource {
            name: name.to_string(),
            reason: "at least one recipient is required".into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LensEditor;

    const FULL: &str = "\
# Basic system aliases -- these MUST be present
mailer-daemon:\tpostmaster
postmaster:\troot

# General redirections for pseudo accounts
test: user1, user2
";

    const FULLQUOTES: &str = "\
mailer-daemon:\tpostmaster
postmaster:\troot
test: user1, user2
users-leave: \"| /var/lib/mailman/mail/mailman leave users\"
";

    fn fixture(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aliases");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    fn provider(target: &Path) -> MailAliasProvider<LensEditor> {
        MailAliasProvider::new(LensEditor::new())
            .unwrap()
            .with_default_target(target)
    }

    /// Raw tree values of the alias at `/<seq>`.
    fn raw_values(path: &Path, seq: &str) -> Vec<String> {
        let tree = LensEditor::new().open(path, LENS).unwrap();
        let node = PathExpr::root().child(seq);
        tree.matches(&node.child(VALUE))
            .unwrap()
            .iter()
            .filter_map(|p| tree.get(p).unwrap())
            .collect()
    }

    #[test]
    fn lists_instances() {
        let (_dir, path) = fixture(FULL);
        let inst = provider(&path).instances().unwrap();

        assert_eq!(inst.len(), 3);
        assert_eq!(inst[0].name, "mailer-daemon");
        assert_eq!(inst[0].recipients, ["postmaster"]);
        assert_eq!(inst[1].name, "postmaster");
        assert_eq!(inst[1].recipients, ["root"]);
        assert_eq!(inst[2].name, "test");
        assert_eq!(inst[2].recipients, ["user1", "user2"]);
    }

    #[test]
    fn creates_entries_in_empty_file() {
        let (_dir, path) = fixture("");
        let p = provider(&path);
        let mut state = Prefetched::default();

        p.create(&mut state, &MailAliasResource::new("foo").with_recipients(["bar"]))
            .unwrap();
        p.create(&mut state, &MailAliasResource::new("bar").with_recipients(["baz"]))
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "foo: bar\nbar: baz\n"
        );
        assert_eq!(state.len(), 2);
    }

    #[test]
    fn create_keeps_recipient_order() {
        let (_dir, path) = fixture("");
        let p = provider(&path);
        let created = p
            .create(
                &mut Prefetched::default(),
                &MailAliasResource::new("foo").with_recipients(["foo-a", "foo-b"]),
            )
            .unwrap();

        assert_eq!(raw_values(&path, "1"), ["foo-a", "foo-b"]);
        assert_eq!(p.instances().unwrap(), [created]);
    }

    #[test]
    fn quotes_command_recipients() {
        let (_dir, path) = fixture("");
        let p = provider(&path);
        let pipe = "| /var/lib/mailman/mail/mailman leave users";
        p.create(
            &mut Prefetched::default(),
            &MailAliasResource::new("users-leave").with_recipients([pipe]),
        )
        .unwrap();

        assert_eq!(raw_values(&path, "1"), [format!("\"{pipe}\"")]);
        assert_eq!(p.instances().unwrap()[0].recipients, [pipe]);
    }

    #[test]
    fn create_requires_recipients() {
        let (_dir, path) = fixture("");
        let err = provider(&path)
            .create(&mut Prefetched::default(), &MailAliasResource::new("foo"))
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResource { .. }));
    }

    #[test]
    fn deletes_entries() {
        let (_dir, path) = fixture(FULL);
        let p = provider(&path);
        let resource = MailAliasResource::new("mailer-daemon").absent();
        let mut state = p.prefetch(std::slice::from_ref(&resource)).unwrap();

        p.destroy(&mut state, &resource).unwrap();

        let names: Vec<String> = p.instances().unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, ["postmaster", "test"]);
        assert!(!p.exists(&state, &resource));
    }

    #[test]
    fn replaces_recipients_in_order() {
        let (_dir, path) = fixture(FULL);
        let p = provider(&path);
        let resource = MailAliasResource::new("mailer-daemon");
        let mut state = p.prefetch(std::slice::from_ref(&resource)).unwrap();

        p.set_recipients(&mut state, &resource, &["test-a".into(), "test-b".into()])
            .unwrap();

        assert_eq!(raw_values(&path, "1"), ["test-a", "test-b"]);
        assert!(
            std::fs::read_to_string(&path)
                .unwrap()
                .contains("mailer-daemon: test-a,test-b\n")
        );
        assert_eq!(
            state.get("mailer-daemon", &path).unwrap().recipients,
            ["test-a", "test-b"]
        );

        p.set_recipients(&mut state, &resource, &["test".into()]).unwrap();
        assert_eq!(raw_values(&path, "1"), ["test"]);
    }

    #[test]
    fn updates_quoted_entry() {
        let (_dir, path) = fixture(FULLQUOTES);
        let p = provider(&path);
        let report = p
            .apply(&[MailAliasResource::new("users-leave")
                .with_recipients(["| /var/lib/mailman/mail/mailman leave userss"])])
            .unwrap();

        assert_eq!(report.changes.len(), 1);
        assert_eq!(
            raw_values(&path, "4"),
            ["\"| /var/lib/mailman/mail/mailman leave userss\""]
        );
    }

    #[test]
    fn empty_recipient_list_is_rejected() {
        let (_dir, path) = fixture(FULL);
        let p = provider(&path);
        let resource = MailAliasResource::new("test");
        let err = p
            .set_recipients(&mut Prefetched::default(), &resource, &[])
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResource { .. }));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), FULL);
    }

    #[test]
    fn pre_quoted_recipients_settle_after_one_apply() {
        let (_dir, path) = fixture("");
        let p = provider(&path);
        let resource =
            MailAliasResource::new("cmd").with_recipients(["\"| /bin/filter\"", "'x y'"]);

        let created = p.create(&mut Prefetched::default(), &resource).unwrap();
        assert_eq!(created.recipients, ["| /bin/filter", "x y"]);
        assert_eq!(p.instances().unwrap(), [created]);
        assert_eq!(raw_values(&path, "1"), ["\"| /bin/filter\"", "\"x y\""]);

        let again = p.apply(std::slice::from_ref(&resource)).unwrap();
        assert!(again.is_noop());
    }

    #[test]
    fn recipients_with_commas_are_quoted() {
        let (_dir, path) = fixture(FULL);
        let p = provider(&path);
        let resource = MailAliasResource::new("test").with_recipients(["a,b", "c"]);

        let report = p.apply(std::slice::from_ref(&resource)).unwrap();
        assert_eq!(report.changes[0].kind, ChangeKind::Updated("recipients"));
        assert!(
            std::fs::read_to_string(&path)
                .unwrap()
                .contains("test: \"a,b\",c\n")
        );
        assert_eq!(p.instances().unwrap()[2].recipients, ["a,b", "c"]);
        assert!(p.apply(&[resource]).unwrap().is_noop());
    }

    #[test]
    fn apply_skips_in_sync_aliases() {
        let (_dir, path) = fixture(FULL);
        let report = provider(&path)
            .apply(&[
                MailAliasResource::new("test").with_recipients(["user1", "user2"]),
                MailAliasResource::new("postmaster"),
            ])
            .unwrap();
        assert!(report.is_noop());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), FULL);
    }
}
