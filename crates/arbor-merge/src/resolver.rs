//! Resolvers for leaf payloads.
//!
//! A resolver sees the ancestor, left and right payloads (each possibly
//! absent) and either produces the merged payload or reports a conflict.
//! Conflicts it returns are relocated to the node being merged, so
//! resolvers never need to know where they run.

use arbor_store::Contents;

use crate::outcome::{three_way, Conflict, MergeOutcome};

/// Three-way merge of optional leaf payloads.
pub trait ContentsMerge<C>: Send + Sync {
    fn merge(&self, ancestor: Option<&C>, left: Option<&C>, right: Option<&C>)
        -> MergeOutcome<Option<C>>;
}

impl<C, F> ContentsMerge<C> for F
where
    F: Fn(Option<&C>, Option<&C>, Option<&C>) -> MergeOutcome<Option<C>> + Send + Sync,
{
    fn merge(
        &self,
        ancestor: Option<&C>,
        left: Option<&C>,
        right: Option<&C>,
    ) -> MergeOutcome<Option<C>> {
        self(ancestor, left, right)
    }
}

fn describe_sides<C: Contents>(ancestor: Option<&C>, left: Option<&C>, right: Option<&C>) -> Conflict {
    Conflict::new(
        ancestor.map(|c| c.describe()),
        left.map(|c| c.describe()),
        right.map(|c| c.describe()),
    )
}

/// The base case: no invented resolutions, divergent changes conflict.
#[derive(Clone, Copy, Debug, Default)]
pub struct DefaultMerge;

impl<C: Contents> ContentsMerge<C> for DefaultMerge {
    fn merge(
        &self,
        ancestor: Option<&C>,
        left: Option<&C>,
        right: Option<&C>,
    ) -> MergeOutcome<Option<C>> {
        match three_way(&ancestor, &left, &right) {
            Some(merged) => MergeOutcome::Resolved(merged.cloned()),
            None => MergeOutcome::conflict(describe_sides(ancestor, left, right)),
        }
    }
}

/// Merges `i64` counters by applying both sides' deltas to the ancestor.
///
/// Whatever the three-way base case settles is kept as is, so a counter
/// removed on one side and untouched on the other stays removed. When both
/// sides changed, an absent counter counts as zero and the merged value is
/// `ancestor + (left - ancestor) + (right - ancestor)`. A removal racing a
/// change, or a result outside `i64`, is reported as a conflict.
#[derive(Clone, Copy, Debug, Default)]
pub struct CounterMerge;

impl ContentsMerge<i64> for CounterMerge {
    fn merge(
        &self,
        ancestor: Option<&i64>,
        left: Option<&i64>,
        right: Option<&i64>,
    ) -> MergeOutcome<Option<i64>> {
        if let Some(merged) = three_way(&ancestor, &left, &right) {
            return MergeOutcome::Resolved(merged.copied());
        }
        let (Some(&l), Some(&r)) = (left, right) else {
            return MergeOutcome::conflict(describe_sides(ancestor, left, right));
        };
        let base = i128::from(ancestor.copied().unwrap_or(0));
        let merged = base + (i128::from(l) - base) + (i128::from(r) - base);
        match i64::try_from(merged) {
            Ok(value) => MergeOutcome::Resolved(Some(value)),
            Err(_) => MergeOutcome::conflict(describe_sides(ancestor, left, right)),
        }
    }
}
