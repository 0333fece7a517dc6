//! In-memory tree nodes and path evaluation.

use crate::error::{ProviderError, Result};
use crate::path::{Label, PathExpr, Predicate, Step};
use crate::tree::Position;

/// A node in a parsed file tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Node {
    /// Label, e.g. `ipaddr`, `#comment` or an entry sequence number.
    pub label: String,
    /// Optional scalar value.
    pub value: Option<String>,
    /// Children in file order.
    pub children: Vec<Self>,
}

impl Node {
    /// Creates a node without value or children.
    #[must_use]
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: None,
            children: Vec::new(),
        }
    }

    /// Creates a node carrying a value.
    #[must_use]
    pub fn leaf(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: Some(value.into()),
            children: Vec::new(),
        }
    }

    /// Appends a child.
    #[must_use]
    pub fn with_child(mut self, child: Self) -> Self {
        self.children.push(child);
        self
    }

    /// Value of the first child labelled `label`.
    #[must_use]
    pub fn child_value(&self, label: &str) -> Option<&str> {
        self.children
            .iter()
            .find(|c| c.label == label)
            .and_then(|c| c.value.as_deref())
    }

    /// Positions of every node matched by `path`, in tree order.
    pub(crate) fn select(&self, path: &PathExpr) -> Vec<Vec<usize>> {
        let mut current = vec![Vec::new()];
        for step in path.steps() {
            let mut next = Vec::new();
            for pos in &current {
                for i in select_step(self.at(pos), step) {
                    let mut child = pos.clone();
                    child.push(i);
                    next.push(child);
                }
            }
            current = next;
        }
        current
    }

    /// Renders a position as a concrete path.
    ///
    /// A step carries an index only when siblings share its label.
    pub(crate) fn concrete(&self, pos: &[usize]) -> PathExpr {
        let mut node = self;
        let mut path = PathExpr::root();
        for &i in pos {
            let child = &node.children[i];
            path = path.child(&child.label);
            let same = node.children.iter().filter(|c| c.label == child.label).count();
            if same > 1 {
                let nth = node.children[..i]
                    .iter()
                    .filter(|c| c.label == child.label)
                    .count();
                path = path.nth(nth + 1);
            }
            node = child;
        }
        path
    }

    pub(crate) fn get(&self, path: &PathExpr) -> Result<Option<String>> {
        match self.select(path).as_slice() {
            [] => Ok(None),
            [pos] => Ok(self.at(pos).value.clone()),
            many => Err(ambiguous(path, many.len())),
        }
    }

    pub(crate) fn set(&mut self, path: &PathExpr, value: &str) -> Result<()> {
        let pos = self.resolve_or_create(path)?;
        self.at_mut(&pos).value = Some(value.to_string());
        Ok(())
    }

    pub(crate) fn remove(&mut self, path: &PathExpr) -> usize {
        let mut matched: Vec<Vec<usize>> = self
            .select(path)
            .into_iter()
            .filter(|pos| !pos.is_empty())
            .collect();
        // Descendants and later siblings first, so earlier positions stay valid.
        matched.sort_unstable_by(|a, b| b.cmp(a));
        for pos in &matched {
            if let Some((&last, parent)) = pos.split_last() {
                self.at_mut(parent).children.remove(last);
            }
        }
        matched.len()
    }

    pub(crate) fn insert(&mut self, anchor: &PathExpr, label: &str, position: Position) -> Result<()> {
        let pos = match self.select(anchor).as_slice() {
            [pos] => pos.clone(),
            [] => {
                return Err(ProviderError::InvalidPath {
                    path: anchor.to_string(),
                    reason: "insert anchor matches no node".into(),
                });
            }
            many => return Err(ambiguous(anchor, many.len())),
        };
        let Some((&idx, parent)) = pos.split_last() else {
            return Err(ProviderError::InvalidPath {
                path: anchor.to_string(),
                reason: "cannot insert next to the root".into(),
            });
        };
        let at = match position {
            Position::Before => idx,
            Position::After => idx + 1,
        };
        self.at_mut(parent).children.insert(at, Self::new(label));
        Ok(())
    }

    fn resolve_or_create(&mut self, path: &PathExpr) -> Result<Vec<usize>> {
        match self.select(path).as_slice() {
            [pos] => return Ok(pos.clone()),
            [] => {}
            many => return Err(ambiguous(path, many.len())),
        }

        let mut pos = Vec::new();
        for step in path.steps() {
            let found = select_step(self.at(&pos), step);
            match found.as_slice() {
                [i] => pos.push(*i),
                [] => {
                    let i = self.at_mut(&pos).create_child(step).ok_or_else(|| {
                        ProviderError::InvalidPath {
                            path: path.to_string(),
                            reason: format!("step {step} cannot create a node"),
                        }
                    })?;
                    pos.push(i);
                }
                many => return Err(ambiguous(path, many.len())),
            }
        }
        Ok(pos)
    }

    /// Creates the child a step would address, right after the last
    /// sibling sharing its label.
    fn create_child(&mut self, step: &Step) -> Option<usize> {
        let Label::Name(label) = &step.label else {
            return None;
        };
        let count = self.children.iter().filter(|c| c.label == *label).count();
        let creatable = match &step.predicate {
            None | Some(Predicate::Append) => true,
            Some(Predicate::Last) => count == 0,
            Some(Predicate::Index(n)) => *n == count + 1,
            Some(Predicate::ChildEq { .. }) => false,
        };
        if !creatable {
            return None;
        }
        let at = self
            .children
            .iter()
            .rposition(|c| c.label == *label)
            .map_or(self.children.len(), |i| i + 1);
        self.children.insert(at, Self::new(label.clone()));
        Some(at)
    }

    fn at(&self, pos: &[usize]) -> &Self {
        pos.iter().fold(self, |node, &i| &node.children[i])
    }

    fn at_mut(&mut self, pos: &[usize]) -> &mut Self {
        let mut node = self;
        for &i in pos {
            node = &mut node.children[i];
        }
        node
    }
}

fn select_step(node: &Node, step: &Step) -> Vec<usize> {
    let candidates: Vec<usize> = node
        .children
        .iter()
        .enumerate()
        .filter(|(_, c)| step.accepts(&c.label))
        .map(|(i, _)| i)
        .collect();

    match &step.predicate {
        None => candidates,
        Some(Predicate::Index(n)) => n
            .checked_sub(1)
            .and_then(|i| candidates.get(i))
            .copied()
            .into_iter()
            .collect(),
        Some(Predicate::Last) => candidates.last().copied().into_iter().collect(),
        Some(Predicate::Append) => Vec::new(),
        Some(Predicate::ChildEq { label, value }) => candidates
            .into_iter()
            .filter(|&i| {
                node.children[i]
                    .children
                    .iter()
                    .any(|c| c.label == *label && c.value.as_deref() == Some(value.as_str()))
            })
            .collect(),
    }
}

fn ambiguous(path: &PathExpr, count: usize) -> ProviderError {
    ProviderError::Ambiguous {
        path: path.to_string(),
        count,
    }
}
