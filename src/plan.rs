//! The compiled query plan: a prefix-ordered tree of set combinators over
//! per-column filters. Building a plan is pure — validation happens here,
//! against the schema, before any index is touched.

use crate::datatype::DataCell;
use crate::error::{CellarError, Result};
use crate::schema::{IndexKind, Schema};

/// Comparison operators a filter can carry. Which ones are legal depends
/// on the column's indexing strategy: an equality index answers only
/// `Equal`, a range index answers all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComparisonOperator {
    Equal,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    ClosedBetween,
}

impl ComparisonOperator {
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(ComparisonOperator::Equal),
            2 => Some(ComparisonOperator::GreaterThan),
            3 => Some(ComparisonOperator::GreaterOrEqual),
            4 => Some(ComparisonOperator::LessThan),
            5 => Some(ComparisonOperator::LessOrEqual),
            6 => Some(ComparisonOperator::ClosedBetween),
            _ => None,
        }
    }
    pub fn as_u8(&self) -> u8 {
        match self {
            ComparisonOperator::Equal => 1,
            ComparisonOperator::GreaterThan => 2,
            ComparisonOperator::GreaterOrEqual => 3,
            ComparisonOperator::LessThan => 4,
            ComparisonOperator::LessOrEqual => 5,
            ComparisonOperator::ClosedBetween => 6,
        }
    }
    pub fn name(&self) -> &'static str {
        match self {
            ComparisonOperator::Equal => "Equal",
            ComparisonOperator::GreaterThan => "GreaterThan",
            ComparisonOperator::GreaterOrEqual => "GreaterOrEqual",
            ComparisonOperator::LessThan => "LessThan",
            ComparisonOperator::LessOrEqual => "LessOrEqual",
            ComparisonOperator::ClosedBetween => "ClosedBetween",
        }
    }
    /// Two literal operands instead of one.
    pub fn takes_pair(&self) -> bool {
        matches!(self, ComparisonOperator::ClosedBetween)
    }
}

/// One node of the prefix-encoded predicate tree. A binary combinator is
/// followed by its left subtree, then its right subtree.
#[derive(Debug, Clone)]
pub enum PlanNode {
    Intersect,
    Union,
    Filter {
        column: usize,
        operator: ComparisonOperator,
        low: DataCell,
        high: Option<DataCell>,
    },
}

/// An immutable, schema-bound predicate. An empty plan matches everything.
#[derive(Debug, Clone)]
pub struct Plan {
    nodes: Vec<PlanNode>,
}

impl Plan {
    /// Matches every row.
    pub fn everything() -> Self {
        Self { nodes: Vec::new() }
    }

    /// Validates the prefix sequence against the schema and seals it.
    pub fn new(nodes: Vec<PlanNode>, schema: &Schema) -> Result<Self> {
        // the prefix walk must form exactly one complete expression
        let mut pending: usize = 1;
        for (position, node) in nodes.iter().enumerate() {
            if pending == 0 {
                return Err(CellarError::Plan(format!(
                    "trailing node at position {} after the expression completed",
                    position
                )));
            }
            pending -= 1;
            match node {
                PlanNode::Intersect | PlanNode::Union => pending += 2,
                PlanNode::Filter { column, operator, low, high } => {
                    Self::check_filter(schema, *column, *operator, low, high.as_ref())?;
                }
            }
        }
        if pending != 0 && !nodes.is_empty() {
            return Err(CellarError::Plan(format!(
                "incomplete expression: {} operand(s) missing",
                pending
            )));
        }
        Ok(Self { nodes })
    }

    fn check_filter(
        schema: &Schema,
        column: usize,
        operator: ComparisonOperator,
        low: &DataCell,
        high: Option<&DataCell>,
    ) -> Result<()> {
        let column_schema = schema.column(column).ok_or_else(|| {
            CellarError::Plan(format!(
                "column offset {} out of range (schema has {} columns)",
                column,
                schema.column_count()
            ))
        })?;
        let declared = column_schema.column_type();
        if low.column_type() != declared {
            return Err(CellarError::TypeMismatch {
                column,
                expected: declared,
                actual: low.column_type(),
            });
        }
        match (operator.takes_pair(), high) {
            (true, Some(high)) => {
                if high.column_type() != declared {
                    return Err(CellarError::TypeMismatch {
                        column,
                        expected: declared,
                        actual: high.column_type(),
                    });
                }
            }
            (true, None) => {
                return Err(CellarError::Plan(format!(
                    "{} on column {} needs a second operand",
                    operator.name(),
                    column
                )));
            }
            (false, Some(_)) => {
                return Err(CellarError::Plan(format!(
                    "{} on column {} takes a single operand",
                    operator.name(),
                    column
                )));
            }
            (false, None) => {}
        }
        // operator legality per indexing strategy; a filter on an
        // unindexed column is the documented degenerate case and passes
        // validation (it resolves to no rows at the root)
        match column_schema.index() {
            IndexKind::Equality if operator != ComparisonOperator::Equal => {
                Err(CellarError::UnsupportedOperator {
                    column,
                    operator: operator.name(),
                    strategy: "equality",
                })
            }
            _ => Ok(()),
        }
    }

    pub fn nodes(&self) -> &[PlanNode] {
        &self.nodes
    }
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Convenience for the common single-filter predicate.
    pub fn filter(
        schema: &Schema,
        column: usize,
        operator: ComparisonOperator,
        low: DataCell,
        high: Option<DataCell>,
    ) -> Result<Self> {
        Self::new(vec![PlanNode::Filter { column, operator, low, high }], schema)
    }
}
