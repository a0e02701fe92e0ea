use std::fmt::{Display, Formatter};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Separator used to join path segments into bookkeeping keys.
pub const PATH_SEPARATOR: char = ':';

/// Name of the implicit transition the store constructs itself under.
pub const BOOTSTRAP: &str = "bootstrap";

/// Hierarchical name of a unit of work, e.g. `["todo", "7", "toggle"]`.
///
/// Every prefix of a path is tracked separately, so asking whether `["todo"]`
/// is happening also covers `["todo", "7", "toggle"]`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TransitionPath(Vec<String>);

impl TransitionPath {
    pub fn new<I, T>(segments: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        Self(segments.into_iter().map(|s| s.to_string()).collect())
    }

    pub fn bootstrap() -> Self {
        Self(vec![BOOTSTRAP.to_string()])
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The colon-joined key identifying this exact path.
    pub fn key(&self) -> String {
        self.0.join(&PATH_SEPARATOR.to_string())
    }

    /// Keys for every prefix, shortest first: `a`, `a:b`, `a:b:c`.
    pub fn prefix_keys(&self) -> Vec<String> {
        let mut keys = Vec::with_capacity(self.0.len());
        let mut current = String::new();
        for (i, segment) in self.0.iter().enumerate() {
            if i > 0 {
                current.push(PATH_SEPARATOR);
            }
            current.push_str(segment);
            keys.push(current.clone());
        }
        keys
    }

    pub fn child(&self, segment: impl ToString) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.to_string());
        Self(segments)
    }

    pub fn parent(&self) -> Option<Self> {
        if self.0.len() < 2 {
            return None;
        }
        Some(Self(self.0[..self.0.len() - 1].to_vec()))
    }

    pub fn starts_with(&self, prefix: &TransitionPath) -> bool {
        self.0.starts_with(&prefix.0)
    }
}

impl Display for TransitionPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key())
    }
}

/// Parses a joined key, `"todo:7"` becomes `["todo", "7"]`.
impl From<&str> for TransitionPath {
    fn from(value: &str) -> Self {
        if value.is_empty() {
            return Self::default();
        }
        Self::new(value.split(PATH_SEPARATOR))
    }
}

impl From<String> for TransitionPath {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl From<Vec<String>> for TransitionPath {
    fn from(value: Vec<String>) -> Self {
        Self(value)
    }
}

impl From<&[&str]> for TransitionPath {
    fn from(value: &[&str]) -> Self {
        Self::new(value.iter())
    }
}

impl<const N: usize> From<[&str; N]> for TransitionPath {
    fn from(value: [&str; N]) -> Self {
        Self::new(value)
    }
}

impl From<&TransitionPath> for TransitionPath {
    fn from(value: &TransitionPath) -> Self {
        value.clone()
    }
}
