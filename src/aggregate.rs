//! Plan evaluation: set algebra over index lookups.
//!
//! The evaluator walks the prefix node array with an explicit stack of
//! pending combinator frames, so predicate nesting depth never translates
//! into call-stack depth.

use roaring::RoaringTreemap;

use crate::error::{CellarError, Result};
use crate::index::ColumnIndex;
use crate::plan::{Plan, PlanNode};

/// The value a plan node resolves to.
///
/// `Unconstrained` is the absorbing operand: it stands for "this node
/// places no constraint" and never vetoes its sibling —
/// `Intersect(Unconstrained, X) = X`, and `Union` follows the same shape.
/// A filter resolves to `Unconstrained` when there is no bucket for its
/// operand or no index on its column; at the root of a non-empty plan
/// that means no rows at all.
#[derive(Debug, Clone, PartialEq)]
pub enum ResultSet {
    Unconstrained,
    Rows(RoaringTreemap),
}

impl ResultSet {
    pub fn rows(ids: RoaringTreemap) -> Self {
        ResultSet::Rows(ids)
    }

    pub fn intersect_with(&mut self, other: ResultSet) {
        match (&mut *self, other) {
            (_, ResultSet::Unconstrained) => {}
            (ResultSet::Unconstrained, other) => *self = other,
            (ResultSet::Rows(mine), ResultSet::Rows(theirs)) => {
                // roaring iterates the smaller side internally
                *mine &= theirs;
            }
        }
    }

    pub fn union_with(&mut self, other: ResultSet) {
        match (&mut *self, other) {
            (_, ResultSet::Unconstrained) => {}
            (ResultSet::Unconstrained, other) => *self = other,
            (ResultSet::Rows(mine), ResultSet::Rows(theirs)) => {
                *mine |= theirs;
            }
        }
    }

    pub fn len(&self) -> Option<u64> {
        match self {
            ResultSet::Unconstrained => None,
            ResultSet::Rows(ids) => Some(ids.len()),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Combinator {
    Intersect,
    Union,
}

struct Frame {
    combinator: Combinator,
    left: Option<ResultSet>,
}

fn combine(combinator: Combinator, mut left: ResultSet, right: ResultSet) -> ResultSet {
    match combinator {
        Combinator::Intersect => left.intersect_with(right),
        Combinator::Union => left.union_with(right),
    }
    left
}

/// Evaluates a plan against one read handle per column (`None` where the
/// column is unindexed). The caller holds the latches for the duration.
pub fn evaluate(plan: &Plan, indexes: &[Option<&ColumnIndex>]) -> Result<ResultSet> {
    if plan.is_empty() {
        return Ok(ResultSet::Unconstrained);
    }
    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<ResultSet> = None;
    for node in plan.nodes() {
        if root.is_some() {
            return Err(CellarError::Invariant(
                "plan nodes remain after the expression resolved".into(),
            ));
        }
        let resolved = match node {
            PlanNode::Intersect => {
                stack.push(Frame { combinator: Combinator::Intersect, left: None });
                continue;
            }
            PlanNode::Union => {
                stack.push(Frame { combinator: Combinator::Union, left: None });
                continue;
            }
            PlanNode::Filter { column, operator, low, high } => {
                match indexes.get(*column).and_then(|handle| handle.as_ref()) {
                    // no index to consult: the degenerate unconstrained case
                    None => ResultSet::Unconstrained,
                    Some(index) => match index.fetch(*operator, low, high.as_ref())? {
                        None => ResultSet::Unconstrained,
                        Some(ids) => ResultSet::Rows(ids),
                    },
                }
            }
        };
        // feed the operand upwards, collapsing every frame it completes
        let mut value = resolved;
        loop {
            let top_awaits_left = match stack.last() {
                None => {
                    root = Some(value);
                    break;
                }
                Some(frame) => frame.left.is_none(),
            };
            if top_awaits_left {
                if let Some(frame) = stack.last_mut() {
                    frame.left = Some(value);
                }
                break;
            }
            let frame = stack
                .pop()
                .ok_or_else(|| CellarError::Invariant("evaluator stack underflow".into()))?;
            let left = frame
                .left
                .ok_or_else(|| CellarError::Invariant("combinator frame missing operand".into()))?;
            value = combine(frame.combinator, left, value);
        }
    }
    root.ok_or_else(|| CellarError::Invariant("plan resolved to no root operand".into()))
}

/// Applies the root rule: an unconstrained result means "everything" only
/// for the empty plan, otherwise it means no rows.
pub fn materialise(result: ResultSet, plan_was_empty: bool, universe: impl FnOnce() -> RoaringTreemap) -> RoaringTreemap {
    match result {
        ResultSet::Rows(ids) => ids,
        ResultSet::Unconstrained if plan_was_empty => universe(),
        ResultSet::Unconstrained => RoaringTreemap::new(),
    }
}
