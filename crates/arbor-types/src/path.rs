//! Path segments and root-to-leaf paths.
//!
//! The human-readable form joins steps with `/` behind a leading `/`. Parsing
//! is lenient: empty segments (leading, trailing or doubled slashes) are
//! skipped. Construction is strict: a [`Step`] is never empty and never
//! contains `/`, so `Path::of_hum(&p.to_hum()) == p` for every path.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Separator used by the human-readable path form.
pub const SEPARATOR: char = '/';

/// A single path segment.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Step(String);

impl Step {
    /// Create a step, failing with [`TypeError::InvalidStep`] on an empty
    /// string or one containing the separator.
    pub fn new(step: impl Into<String>) -> Result<Self, TypeError> {
        let step = step.into();
        if step.is_empty() || step.contains(SEPARATOR) {
            return Err(TypeError::InvalidStep);
        }
        Ok(Self(step))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for Step {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for Step {
    type Error = TypeError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Step> for String {
    fn from(step: Step) -> Self {
        step.0
    }
}

impl AsRef<str> for Step {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// An ordered sequence of steps, front to back = root to leaf.
///
/// The empty path denotes the node it is resolved against.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Path(Vec<Step>);

impl Path {
    /// The empty path.
    pub fn empty() -> Self {
        Self(Vec::new())
    }

    /// Build a path from already-validated steps.
    pub fn create(steps: impl IntoIterator<Item = Step>) -> Self {
        Self(steps.into_iter().collect())
    }

    /// Build a path from raw strings, validating every step.
    pub fn from_strs<I, S>(steps: I) -> Result<Self, TypeError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        steps
            .into_iter()
            .map(Step::new)
            .collect::<Result<Vec<_>, _>>()
            .map(Self)
    }

    /// Prepend `step`. O(n).
    pub fn cons(step: Step, path: &Path) -> Self {
        let mut steps = Vec::with_capacity(path.len() + 1);
        steps.push(step);
        steps.extend(path.0.iter().cloned());
        Self(steps)
    }

    /// Append `step`. Amortised O(1) on an owned path.
    pub fn rcons(mut self, step: Step) -> Self {
        self.0.push(step);
        self
    }

    /// Split into the first step and the remaining path.
    pub fn decons(&self) -> Option<(&Step, Path)> {
        let (head, tail) = self.0.split_first()?;
        Some((head, Self(tail.to_vec())))
    }

    /// Split into the leading path and the last step.
    pub fn rdecons(&self) -> Option<(Path, &Step)> {
        let (last, init) = self.0.split_last()?;
        Some((Self(init.to_vec()), last))
    }

    pub fn steps(&self) -> &[Step] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Step> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Human-readable form: `/a/b/c`, or `/` for the empty path.
    pub fn to_hum(&self) -> String {
        self.to_string()
    }

    /// Parse the human-readable form, silently dropping empty segments.
    pub fn of_hum(s: &str) -> Self {
        Self(
            s.split(SEPARATOR)
                .filter(|segment| !segment.is_empty())
                .map(|segment| Step(segment.to_string()))
                .collect(),
        )
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("/");
        }
        for step in &self.0 {
            write!(f, "{SEPARATOR}{step}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({self})")
    }
}

impl FromStr for Path {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::of_hum(s))
    }
}

impl FromIterator<Step> for Path {
    fn from_iter<T: IntoIterator<Item = Step>>(iter: T) -> Self {
        Self::create(iter)
    }
}

impl<'a> IntoIterator for &'a Path {
    type Item = &'a Step;
    type IntoIter = std::slice::Iter<'a, Step>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
