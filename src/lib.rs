//! # augprov
//!
//! Manage `/etc/hosts` and `/etc/aliases` entries through a lens-parsed
//! configuration tree.
//!
//! Each file is opened through a [`TreeEditor`], which parses it with a
//! named lens into a tree of labelled nodes. The providers locate entries
//! with typed [`PathExpr`]s, read or rewrite a few child nodes and save.
//! They never touch the file text directly.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use augprov::{HostProvider, HostResource, LensEditor};
//!
//! let hosts = HostProvider::new(LensEditor::new())?;
//!
//! let report = hosts.apply(&[
//!     HostResource::new("iridium")
//!         .with_ip("192.168.0.5")
//!         .with_host_aliases(["iridium.example.com"]),
//!     HostResource::new("argon").absent(),
//! ])?;
//!
//! for change in &report.changes {
//!     println!("{} {:?}", change.name, change.kind);
//! }
//! ```
//!
//! ## Tree layout
//!
//! ```text
//! /etc/hosts                          /etc/aliases
//! /1/ipaddr     = "127.0.0.1"         /1/name  = "mailer-daemon"
//! /1/canonical  = "localhost"         /1/value = "postmaster"
//! /1/alias      = "localhost.local"
//! /1/#comment   = "loopback"
//! ```
//!
//! ## State
//!
//! Providers keep no state between calls. [`HostProvider::prefetch`] reads
//! each target file once and returns a [`Prefetched`] map; the per-resource
//! operations take that map and keep it current.
//!
//! ## Failures
//!
//! A file that cannot be parsed fails with [`ProviderError::Load`]
//! (`"LensEditor didn't load <path>: <details>"`) before anything is
//! written. Nothing is retried.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod capability;
pub mod error;
pub mod lens;
pub mod path;
pub mod provider;
pub mod resource;
pub mod tree;
pub mod util;

pub use capability::{Availability, probe};
pub use error::{LensError, ProviderError, Result};
pub use path::PathExpr;
pub use provider::host::HostProvider;
pub use provider::mailalias::MailAliasProvider;
pub use provider::{Change, ChangeKind, Failure, Prefetched, Record, RecordKey, Report};
pub use resource::{Ensure, HostRecord, HostResource, MailAliasRecord, MailAliasResource};
pub use tree::{LensEditor, LensTree, Node, Position, TreeEditor, TreeHandle};
