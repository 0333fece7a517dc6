//! Typed path expressions addressing nodes in a parsed file tree.
//!
//! Expressions render to the familiar XPath-like form
//! (`/*[canonical = 'foo']/alias[last()+1]`) but are only built through
//! this API, so a resource name can never change the shape of a query.

use crate::error::{ProviderError, Result};
use std::fmt;

/// Which children a step selects by label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Label {
    /// `*`: every child.
    Any,
    /// Children with exactly this label.
    Name(String),
}

/// Filter applied to the children selected by a step.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Predicate {
    /// `[n]`: the n-th selected child, 1-based.
    Index(usize),
    /// `[last()]`: the last selected child.
    Last,
    /// `[last()+1]`: a position past the end. Matches nothing; `set` creates it.
    Append,
    /// `[label = 'value']`: children that own a `label` child with `value`.
    ChildEq {
        /// Label of the grandchild to compare.
        label: String,
        /// Expected value.
        value: String,
    },
}

/// One segment of a [`PathExpr`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Step {
    /// Label filter.
    pub label: Label,
    /// Optional predicate.
    pub predicate: Option<Predicate>,
}

impl Step {
    /// Returns `true` if a child labelled `label` passes this step's label filter.
    #[must_use]
    pub fn accepts(&self, label: &str) -> bool {
        match &self.label {
            Label::Any => true,
            Label::Name(name) => name == label,
        }
    }
}

/// An absolute path from the tree root.
///
/// ```
/// use augprov::PathExpr;
///
/// let entry = PathExpr::root().any().where_child("canonical", "iridium")?;
/// assert_eq!(entry.to_string(), "/*[canonical = 'iridium']");
/// assert_eq!(entry.child("alias").append().to_string(), "/*[canonical = 'iridium']/alias[last()+1]");
/// # Ok::<(), augprov::ProviderError>(())
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PathExpr {
    steps: Vec<Step>,
}

impl PathExpr {
    /// The tree root, `/`.
    #[must_use]
    pub const fn root() -> Self {
        Self { steps: Vec::new() }
    }

    /// Appends a step selecting children labelled `label`.
    ///
    /// `label` is a tree label (`ipaddr`, `#comment`, `3`), never user data.
    #[must_use]
    pub fn child(&self, label: &str) -> Self {
        self.push(Step {
            label: Label::Name(label.to_string()),
            predicate: None,
        })
    }

    /// Appends a `*` step.
    #[must_use]
    pub fn any(&self) -> Self {
        self.push(Step {
            label: Label::Any,
            predicate: None,
        })
    }

    /// Restricts the last step to its n-th match (1-based).
    ///
    /// Predicates attach to a step, so this and the other predicate
    /// builders must not be called on [`root`](Self::root); debug builds
    /// panic if they are.
    #[must_use]
    pub fn nth(self, n: usize) -> Self {
        self.with_predicate(Predicate::Index(n))
    }

    /// Restricts the last step to its last match.
    #[must_use]
    pub fn last(self) -> Self {
        self.with_predicate(Predicate::Last)
    }

    /// Points the last step past its final match (`[last()+1]`).
    #[must_use]
    pub fn append(self) -> Self {
        self.with_predicate(Predicate::Append)
    }

    /// Restricts the last step to nodes owning a `label` child equal to `value`.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::InvalidName`] if `value` contains a single
    /// quote or a line break, which the query grammar cannot express, and
    /// [`ProviderError::InvalidPath`] if called on the root.
    pub fn where_child(self, label: &str, value: &str) -> Result<Self> {
        if self.steps.is_empty() {
            return Err(ProviderError::InvalidPath {
                path: self.to_string(),
                reason: "the root cannot carry a predicate".into(),
            });
        }
        if value.contains('\'') {
            return Err(ProviderError::InvalidName {
                name: value.to_string(),
                reason: "single quotes cannot be addressed in a path expression".into(),
            });
        }
        if value.contains(['\n', '\r']) {
            return Err(ProviderError::InvalidName {
                name: value.to_string(),
                reason: "line breaks cannot be addressed in a path expression".into(),
            });
        }
        Ok(self.with_predicate(Predicate::ChildEq {
            label: label.to_string(),
            value: value.to_string(),
        }))
    }

    /// The steps of this path, outermost first.
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    /// Label of the final step, if it names one.
    #[must_use]
    pub fn last_label(&self) -> Option<&str> {
        match &self.steps.last()?.label {
            Label::Name(name) => Some(name),
            Label::Any => None,
        }
    }

    fn push(&self, step: Step) -> Self {
        let mut steps = self.steps.clone();
        steps.push(step);
        Self { steps }
    }

    fn with_predicate(mut self, predicate: Predicate) -> Self {
        debug_assert!(!self.steps.is_empty(), "predicate {predicate:?} applied to the root");
        if let Some(step) = self.steps.last_mut() {
            step.predicate = Some(predicate);
        }
        self
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.label {
            Label::Any => f.write_str("*")?,
            Label::Name(name) => f.write_str(name)?,
        }
        match &self.predicate {
            None => Ok(()),
            Some(Predicate::Index(n)) => write!(f, "[{n}]"),
            Some(Predicate::Last) => f.write_str("[last()]"),
            Some(Predicate::Append) => f.write_str("[last()+1]"),
            Some(Predicate::ChildEq { label, value }) => write!(f, "[{label} = '{value}']"),
        }
    }
}

impl fmt::Display for PathExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.steps.is_empty() {
            return f.write_str("/");
        }
        for step in &self.steps {
            write!(f, "/{step}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_paths() {
        assert_eq!(PathExpr::root().to_string(), "/");
        assert_eq!(PathExpr::root().child("3").child("alias").nth(2).to_string(), "/3/alias[2]");
        assert_eq!(PathExpr::root().child("1").child("value").last().to_string(), "/1/value[last()]");
        assert_eq!(PathExpr::root().any().to_string(), "/*");
    }

    #[test]
    fn where_child_rejects_single_quotes() {
        let err = PathExpr::root()
            .any()
            .where_child("canonical", "o'brien")
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidName { ref name, .. } if name == "o'brien"));
    }

    #[test]
    fn where_child_rejects_line_breaks() {
        assert!(PathExpr::root().any().where_child("name", "a\nb").is_err());
    }

    #[test]
    fn last_label_of_wildcard_is_none() {
        assert_eq!(PathExpr::root().any().last_label(), None);
        assert_eq!(PathExpr::root().child("7").last_label(), Some("7"));
    }

    #[test]
    fn where_child_on_root_is_rejected() {
        let err = PathExpr::root().where_child("name", "foo").unwrap_err();
        assert!(matches!(err, ProviderError::InvalidPath { ref path, .. } if path == "/"));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "applied to the root")]
    fn index_on_root_panics_in_debug_builds() {
        let _ = PathExpr::root().nth(3);
    }
}
