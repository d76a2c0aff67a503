//! Merge results and the three-way base case.

use std::fmt;

use arbor_types::{Path, Step};
use serde::{Serialize, Serializer};

/// Where and how two sides diverged.
///
/// `path` names the smallest subtree whose merge failed, relative to the
/// root being merged. The three sides are human-readable renderings; `None`
/// means the value was absent on that side.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Conflict {
    #[serde(serialize_with = "serialize_path")]
    pub path: Path,
    pub ancestor: Option<String>,
    pub left: Option<String>,
    pub right: Option<String>,
}

fn serialize_path<S: Serializer>(path: &Path, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&path.to_hum())
}

impl Conflict {
    pub fn new(ancestor: Option<String>, left: Option<String>, right: Option<String>) -> Self {
        Self {
            path: Path::empty(),
            ancestor,
            left,
            right,
        }
    }

    /// Relocate this conflict to `path`.
    pub fn with_path(mut self, path: Path) -> Self {
        self.path = path;
        self
    }

    /// Prefix the conflict's path with `step`.
    pub fn under(self, step: Step) -> Self {
        let path = Path::cons(step, &self.path);
        self.with_path(path)
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn side(value: &Option<String>) -> &str {
            value.as_deref().unwrap_or("<absent>")
        }
        write!(
            f,
            "{}: ancestor={} left={} right={}",
            self.path,
            side(&self.ancestor),
            side(&self.left),
            side(&self.right)
        )
    }
}

/// The result of a merge: a resolved value or every conflict found.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MergeOutcome<T> {
    Resolved(T),
    Conflict(Vec<Conflict>),
}

impl<T> MergeOutcome<T> {
    /// A single conflict at the root of the merged value.
    pub fn conflict(conflict: Conflict) -> Self {
        Self::Conflict(vec![conflict])
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    pub fn resolved(self) -> Option<T> {
        match self {
            Self::Resolved(value) => Some(value),
            Self::Conflict(_) => None,
        }
    }

    /// The conflicts, empty when resolved.
    pub fn conflicts(&self) -> &[Conflict] {
        match self {
            Self::Resolved(_) => &[],
            Self::Conflict(conflicts) => conflicts,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> MergeOutcome<U> {
        match self {
            Self::Resolved(value) => MergeOutcome::Resolved(f(value)),
            Self::Conflict(conflicts) => MergeOutcome::Conflict(conflicts),
        }
    }

    pub fn into_result(self) -> Result<T, Vec<Conflict>> {
        match self {
            Self::Resolved(value) => Ok(value),
            Self::Conflict(conflicts) => Err(conflicts),
        }
    }
}

impl<T> From<Result<T, Vec<Conflict>>> for MergeOutcome<T> {
    fn from(result: Result<T, Vec<Conflict>>) -> Self {
        match result {
            Ok(value) => Self::Resolved(value),
            Err(conflicts) => Self::Conflict(conflicts),
        }
    }
}

/// Three-way merge of plain values.
///
/// Equal sides win outright. If one side still equals the ancestor the
/// other side is the update and is taken. Returns `None` when both sides
/// changed to different values.
pub fn three_way<T: PartialEq + Clone>(ancestor: &T, left: &T, right: &T) -> Option<T> {
    if left == right || right == ancestor {
        Some(left.clone())
    } else if left == ancestor {
        Some(right.clone())
    } else {
        None
    }
}
