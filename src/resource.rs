//! Desired and discovered state of `host` and `mailalias` resources.

use crate::error::{ProviderError, Result};
use std::path::PathBuf;

/// Whether a record should exist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Ensure {
    /// The record exists.
    #[default]
    Present,
    /// The record does not exist.
    Absent,
}

/// Desired state of one `/etc/hosts` entry.
///
/// Fields left as `None` are not managed.
///
/// # Example
///
/// ```
/// use augprov::HostResource;
///
/// let host = HostResource::new("iridium")
///     .with_ip("192.168.0.5")
///     .with_host_aliases(["iridium.example.com"])
///     .with_target("/tmp/hosts");
///
/// assert_eq!(host.name, "iridium");
/// assert_eq!(host.host_aliases.as_deref(), Some(&["iridium.example.com".to_string()][..]));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostResource {
    /// Canonical host name. Unique within a target file.
    pub name: String,
    /// Present or absent.
    pub ensure: Ensure,
    /// Hosts file; the provider's default when `None`.
    pub target: Option<PathBuf>,
    /// IP address.
    pub ip: Option<String>,
    /// Aliases, in file order.
    pub host_aliases: Option<Vec<String>>,
    /// Inline comment. An empty string removes it.
    pub comment: Option<String>,
}

impl HostResource {
    /// Creates a present resource that manages no fields yet.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ensure: Ensure::Present,
            target: None,
            ip: None,
            host_aliases: None,
            comment: None,
        }
    }

    /// Marks the resource absent.
    #[must_use]
    pub const fn absent(mut self) -> Self {
        self.ensure = Ensure::Absent;
        self
    }

    /// Overrides the hosts file.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<PathBuf>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Manages the IP address.
    #[must_use]
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }

    /// Manages the alias list.
    #[must_use]
    pub fn with_host_aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.host_aliases = Some(aliases.into_iter().map(Into::into).collect());
        self
    }

    /// Manages the comment.
    #[must_use]
    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    /// Checks that every managed field fits the hosts syntax.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidResource`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| ProviderError::InvalidResource {
            name: self.name.clone(),
            reason,
        };
        check_token(&self.name, "name", &['#', '\'']).map_err(invalid)?;
        if let Some(ip) = &self.ip {
            check_token(ip, "ip", &['#']).map_err(invalid)?;
            if !crate::lens::hosts::is_address(ip) {
                return Err(invalid(format!("ip {ip:?} is not an IP address")));
            }
        }
        for alias in self.host_aliases.iter().flatten() {
            check_token(alias, "alias", &['#']).map_err(invalid)?;
        }
        if self.comment.as_deref().is_some_and(|c| c.contains(['\n', '\r'])) {
            return Err(invalid("comment must be a single line".into()));
        }
        Ok(())
    }
}

/// Desired state of one `/etc/aliases` entry.
///
/// ```
/// use augprov::MailAliasResource;
///
/// let alias = MailAliasResource::new("mailer-daemon").with_recipients(["postmaster"]);
/// assert_eq!(alias.recipients.as_deref(), Some(&["postmaster".to_string()][..]));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailAliasResource {
    /// Alias name. Unique within a target file.
    pub name: String,
    /// Present or absent.
    pub ensure: Ensure,
    /// Aliases file; the provider's default when `None`.
    pub target: Option<PathBuf>,
    /// Recipients, in file order.
    pub recipients: Option<Vec<String>>,
}

impl MailAliasResource {
    /// Creates a present resource that manages no fields yet.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ensure: Ensure::Present,
            target: None,
            recipients: None,
        }
    }

    /// Marks the resource absent.
    #[must_use]
    pub const fn absent(mut self) -> Self {
        self.ensure = Ensure::Absent;
        self
    }

    /// Overrides the aliases file.
    #[must_use]
    pub fn with_target(mut self, target: impl Into<PathBuf>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Manages the recipient list.
    #[must_use]
    pub fn with_recipients<I, S>(mut self, recipients: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.recipients = Some(recipients.into_iter().map(Into::into).collect());
        self
    }

    /// Checks that the name and recipients fit the aliases syntax.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidResource`] naming the offending field.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| ProviderError::InvalidResource {
            name: self.name.clone(),
            reason,
        };
        check_token(&self.name, "name", &[':', '\'', '#']).map_err(invalid)?;
        for recipient in self.recipients.iter().flatten() {
            check_recipient(recipient).map_err(invalid)?;
        }
        Ok(())
    }
}

fn check_token(value: &str, field: &str, forbidden: &[char]) -> std::result::Result<(), String> {
    if value.is_empty() {
        return Err(format!("{field} is empty"));
    }
    if value.contains(char::is_whitespace) {
        return Err(format!("{field} {value:?} contains whitespace"));
    }
    if let Some(c) = value.chars().find(|c| forbidden.contains(c)) {
        return Err(format!("{field} {value:?} contains {c:?}"));
    }
    Ok(())
}

fn check_recipient(value: &str) -> std::result::Result<(), String> {
    let inner = crate::util::unquote(value);
    if inner.trim().is_empty() {
        return Err("recipient is empty".into());
    }
    if value.contains(['\n', '\r']) {
        return Err(format!("recipient {value:?} spans several lines"));
    }
    if inner.contains('"') {
        return Err(format!("recipient {value:?} contains a double quote"));
    }
    Ok(())
}

/// A host entry as found in a hosts file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRecord {
    /// Canonical host name.
    pub name: String,
    /// Present, or absent once destroyed.
    pub ensure: Ensure,
    /// File the entry lives in.
    pub target: PathBuf,
    /// IP address.
    pub ip: String,
    /// Aliases, in file order.
    pub host_aliases: Vec<String>,
    /// Inline comment.
    pub comment: Option<String>,
}

/// A mail alias as found in an aliases file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailAliasRecord {
    /// Alias name.
    pub name: String,
    /// Present, or absent once destroyed.
    pub ensure: Ensure,
    /// File the alias lives in.
    pub target: PathBuf,
    /// Unquoted recipients, in file order.
    pub recipients: Vec<String>,
}
