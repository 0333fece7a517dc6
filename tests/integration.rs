//! Integration tests for `augprov`.
//!
//! Tests marked `#[ignore]` read the real system files:
//!
//! ```bash
//! cargo test -- --ignored
//! ```

use augprov::{
    ChangeKind, Ensure, HostProvider, HostResource, LensEditor, MailAliasProvider,
    MailAliasResource, ProviderError,
};
use std::path::{Path, PathBuf};

const HOSTS: &str = "\
# Do not remove the following line, or various programs
# that require network functionality will fail.
127.0.0.1\tlocalhost.localdomain\tlocalhost
::1\tlocalhost6.localdomain6\tlocalhost6
192.168.0.5\tiridium\tiridium.example.com
192.168.0.10\targon\t# NAS
";

const ALIASES: &str = "\
# Basic system aliases -- these MUST be present
mailer-daemon:\tpostmaster
postmaster:\troot

# General redirections for pseudo accounts
test: user1, user2
";

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn hosts(target: &Path) -> HostProvider<LensEditor> {
    HostProvider::new(LensEditor::new())
        .unwrap()
        .with_default_target(target)
}

fn aliases(target: &Path) -> MailAliasProvider<LensEditor> {
    MailAliasProvider::new(LensEditor::new())
        .unwrap()
        .with_default_target(target)
}

// ---------------------------------------------------------------------------
// Hosts
// ---------------------------------------------------------------------------

#[test]
fn host_full_lifecycle() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "hosts", "");
    let p = hosts(&path);

    let report = p
        .apply(&[
            HostResource::new("foo")
                .with_ip("192.168.1.1")
                .with_host_aliases(["foo-a", "foo-b"])
                .with_comment("test"),
            HostResource::new("bar")
                .with_ip("192.168.1.2")
                .with_host_aliases(["bar-a", "bar-b"])
                .with_comment("test"),
        ])
        .unwrap();
    assert_eq!(report.changes.len(), 2);
    assert!(report.changes.iter().all(|c| c.kind == ChangeKind::Created));

    let inst = p.instances().unwrap();
    assert_eq!(inst.len(), 2);
    assert!(inst.iter().all(|r| r.comment.as_deref() == Some("test")));

    let report = p
        .apply(&[
            HostResource::new("foo").with_host_aliases(Vec::<String>::new()),
            HostResource::new("bar").absent(),
        ])
        .unwrap();
    assert_eq!(report.changes.len(), 2);

    let inst = p.instances().unwrap();
    assert_eq!(inst.len(), 1);
    assert_eq!(inst[0].name, "foo");
    assert!(inst[0].host_aliases.is_empty());
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "192.168.1.1\tfoo\t# test\n"
    );
}

#[test]
fn host_delete_leaves_other_entries() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "hosts", HOSTS);
    let p = hosts(&path);

    p.apply(&[HostResource::new("iridium").absent()]).unwrap();

    let inst = p.instances().unwrap();
    assert_eq!(inst.len(), 3);
    assert!(inst.iter().all(|r| r.name != "iridium"));
    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.starts_with("# Do not remove the following line"));
}

#[test]
fn broken_hosts_file_fails_to_load_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let broken = "127.0.0.1 localhost\nthis line is broken\n";
    let path = write(dir.path(), "hosts", broken);

    let err = hosts(&path)
        .apply(&[HostResource::new("foo").with_ip("192.168.1.1")])
        .unwrap_err();

    assert!(matches!(err, ProviderError::Load { .. }));
    assert!(err.to_string().contains("didn't load"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), broken);
}

// ---------------------------------------------------------------------------
// Mail aliases
// ---------------------------------------------------------------------------

#[test]
fn mailalias_update_preserves_order() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "aliases", ALIASES);
    let p = aliases(&path);

    let report = p
        .apply(&[MailAliasResource::new("mailer-daemon").with_recipients(["test-a", "test-b"])])
        .unwrap();
    assert_eq!(report.changes[0].kind, ChangeKind::Updated("recipients"));

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("mailer-daemon: test-a,test-b\n"));
    assert_eq!(p.instances().unwrap()[0].recipients, ["test-a", "test-b"]);
}

#[test]
fn mailalias_round_trip_with_quoting() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("aliases");
    let p = aliases(&path);
    let pipe = "| /var/lib/mailman/mail/mailman leave users";

    p.apply(&[
        MailAliasResource::new("users-leave").with_recipients([pipe]),
        MailAliasResource::new("plain").with_recipients(["root"]),
    ])
    .unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains(&format!("users-leave: \"{pipe}\"\n")));
    assert!(content.contains("plain: root\n"));

    let inst = p.instances().unwrap();
    assert_eq!(inst[0].recipients, [pipe]);
    assert_eq!(inst[1].recipients, ["root"]);
    assert!(inst.iter().all(|r| r.ensure == Ensure::Present));
}

#[test]
fn broken_aliases_file_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = write(dir.path(), "aliases", "root admin\n");

    let err = aliases(&path)
        .apply(&[MailAliasResource::new("foo").with_recipients(["bar"])])
        .unwrap_err();
    assert!(err.is_persistence_failure());
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "root admin\n");
}

// ---------------------------------------------------------------------------
// Prefetch across targets
// ---------------------------------------------------------------------------

#[test]
fn prefetch_groups_by_target() {
    let dir = tempfile::tempdir().unwrap();
    let first = write(dir.path(), "hosts-a", HOSTS);
    let second = write(dir.path(), "hosts-b", "10.0.0.1\targon\n");
    let p = hosts(&first);

    let resources = [
        HostResource::new("argon"),
        HostResource::new("argon").with_target(&second),
        HostResource::new("iridium").with_target(&second),
    ];
    let state = p.prefetch(&resources).unwrap();

    assert_eq!(state.len(), 2);
    assert_eq!(state.get("argon", &first).unwrap().ip, "192.168.0.10");
    assert_eq!(state.get("argon", &second).unwrap().ip, "10.0.0.1");
    assert!(p.exists(&state, &resources[0]));
    assert!(p.exists(&state, &resources[1]));
    assert!(!p.exists(&state, &resources[2]));
}

#[test]
fn one_broken_target_does_not_block_direct_operations_on_another() {
    let dir = tempfile::tempdir().unwrap();
    let good = write(dir.path(), "hosts", HOSTS);
    let bad = write(dir.path(), "hosts-broken", "garbage\n");
    let p = hosts(&good);

    assert!(p.instances_in(&bad).is_err());
    let mut state = p.prefetch(&[HostResource::new("argon")]).unwrap();
    p.set_ip(&mut state, &HostResource::new("argon"), "192.168.0.11")
        .unwrap();
    assert_eq!(state.get("argon", &good).unwrap().ip, "192.168.0.11");
}

// ---------------------------------------------------------------------------
// System files
// ---------------------------------------------------------------------------

#[test]
#[ignore = "reads the system /etc/hosts"]
fn reads_system_hosts() {
    let p = HostProvider::new(LensEditor::new()).unwrap();
    assert_eq!(p.default_target(), Path::new("/etc/hosts"));
    let inst = p.instances().unwrap();
    assert!(inst.iter().any(|r| r.ip == "127.0.0.1" || r.ip == "::1"));
}
