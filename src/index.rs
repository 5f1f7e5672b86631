//! Per-column indexes. The two strategies are closed variants of
//! [`ColumnIndex`] so operator compatibility is enforced by plain matching
//! rather than by runtime reflection.

use std::collections::HashMap;
use std::ops::Bound;

use roaring::RoaringTreemap;

use crate::construct::{CellHasher, Row};
use crate::datatype::{ColumnType, DataCell};
use crate::error::{CellarError, Result};
use crate::ordered::CellTree;
use crate::plan::ComparisonOperator;

/// Groups rows by exact cell value. Answers `Equal` and nothing else.
#[derive(Debug)]
pub struct EqualityIndex {
    ordinal: usize,
    key_type: ColumnType,
    buckets: HashMap<DataCell, RoaringTreemap, CellHasher>,
    rows: u64,
}

impl EqualityIndex {
    pub fn new(ordinal: usize, key_type: ColumnType) -> Self {
        Self {
            ordinal,
            key_type,
            buckets: HashMap::default(),
            rows: 0,
        }
    }

    fn key_of<'r>(&self, row: &'r Row) -> Result<&'r DataCell> {
        let cell = row.cell(self.ordinal);
        if cell.column_type() != self.key_type {
            return Err(CellarError::TypeMismatch {
                column: self.ordinal,
                expected: self.key_type,
                actual: cell.column_type(),
            });
        }
        Ok(cell)
    }

    pub fn add(&mut self, row: &Row) -> Result<bool> {
        let key = self.key_of(row)?.clone();
        let grew = self.buckets.entry(key).or_default().insert(row.id());
        if grew {
            self.rows += 1;
        }
        Ok(grew)
    }

    pub fn remove(&mut self, row: &Row) -> bool {
        let key = row.cell(self.ordinal);
        let Some(bucket) = self.buckets.get_mut(key) else {
            return false;
        };
        let removed = bucket.remove(row.id());
        if removed {
            self.rows -= 1;
            if bucket.is_empty() {
                self.buckets.remove(key);
            }
        }
        removed
    }

    pub fn contains(&self, row: &Row) -> bool {
        self.buckets
            .get(row.cell(self.ordinal))
            .is_some_and(|bucket| bucket.contains(row.id()))
    }

    pub fn fetch(
        &self,
        operator: ComparisonOperator,
        operand: &DataCell,
    ) -> Result<Option<RoaringTreemap>> {
        if operator != ComparisonOperator::Equal {
            return Err(CellarError::UnsupportedOperator {
                column: self.ordinal,
                operator: operator.name(),
                strategy: "equality",
            });
        }
        Ok(self.buckets.get(operand).cloned())
    }

    pub fn clear(&mut self) {
        self.buckets.clear();
        self.rows = 0;
    }
    pub fn len(&self) -> u64 {
        self.rows
    }
}

/// Groups rows in key order so point lookups and open/closed range scans
/// are both answered by the same tree. Scans materialise their result
/// while the caller still holds this column's latch.
#[derive(Debug)]
pub struct RangeIndex {
    ordinal: usize,
    key_type: ColumnType,
    tree: CellTree,
}

impl RangeIndex {
    pub fn new(ordinal: usize, key_type: ColumnType, fan_out: usize) -> Self {
        Self {
            ordinal,
            key_type,
            tree: CellTree::new(fan_out),
        }
    }

    pub fn add(&mut self, row: &Row) -> Result<bool> {
        let cell = row.cell(self.ordinal);
        if cell.column_type() != self.key_type {
            return Err(CellarError::TypeMismatch {
                column: self.ordinal,
                expected: self.key_type,
                actual: cell.column_type(),
            });
        }
        Ok(self.tree.insert(cell.clone(), row.id()))
    }

    pub fn remove(&mut self, row: &Row) -> bool {
        self.tree.remove(row.cell(self.ordinal), row.id())
    }

    pub fn contains(&self, row: &Row) -> bool {
        self.tree.contains(row.cell(self.ordinal), row.id())
    }

    pub fn fetch(
        &self,
        operator: ComparisonOperator,
        low: &DataCell,
        high: Option<&DataCell>,
    ) -> Result<Option<RoaringTreemap>> {
        let (lower, upper): (Bound<&DataCell>, Bound<&DataCell>) = match operator {
            ComparisonOperator::Equal => {
                return Ok(self.tree.get(low).cloned());
            }
            ComparisonOperator::GreaterThan => (Bound::Excluded(low), Bound::Unbounded),
            ComparisonOperator::GreaterOrEqual => (Bound::Included(low), Bound::Unbounded),
            ComparisonOperator::LessThan => (Bound::Unbounded, Bound::Excluded(low)),
            ComparisonOperator::LessOrEqual => (Bound::Unbounded, Bound::Included(low)),
            ComparisonOperator::ClosedBetween => {
                let high = high.ok_or_else(|| {
                    CellarError::Plan(format!(
                        "ClosedBetween on column {} needs a second operand",
                        self.ordinal
                    ))
                })?;
                // low > high is the caller's mistake and yields nothing
                if low > high {
                    return Ok(None);
                }
                (Bound::Included(low), Bound::Included(high))
            }
        };
        let mut matched = RoaringTreemap::new();
        self.tree.scan(lower, upper, |_, bucket| {
            matched |= bucket;
        });
        Ok(if matched.is_empty() { None } else { Some(matched) })
    }

    pub fn clear(&mut self) {
        self.tree.clear();
    }
    pub fn len(&self) -> u64 {
        self.tree.len()
    }
}

/// A column's index, dispatched by strategy.
#[derive(Debug)]
pub enum ColumnIndex {
    Equality(EqualityIndex),
    Range(RangeIndex),
}

impl ColumnIndex {
    /// Inserts the row under its cell at this column, reporting growth.
    pub fn add(&mut self, row: &Row) -> Result<bool> {
        match self {
            ColumnIndex::Equality(index) => index.add(row),
            ColumnIndex::Range(index) => index.add(row),
        }
    }
    pub fn remove(&mut self, row: &Row) -> bool {
        match self {
            ColumnIndex::Equality(index) => index.remove(row),
            ColumnIndex::Range(index) => index.remove(row),
        }
    }
    pub fn contains(&self, row: &Row) -> bool {
        match self {
            ColumnIndex::Equality(index) => index.contains(row),
            ColumnIndex::Range(index) => index.contains(row),
        }
    }
    /// The only read surface the aggregator uses. `None` means no bucket
    /// or an empty scan; a returned bitmap is never empty.
    pub fn fetch(
        &self,
        operator: ComparisonOperator,
        low: &DataCell,
        high: Option<&DataCell>,
    ) -> Result<Option<RoaringTreemap>> {
        match self {
            ColumnIndex::Equality(index) => index.fetch(operator, low),
            ColumnIndex::Range(index) => index.fetch(operator, low, high),
        }
    }
    pub fn clear(&mut self) {
        match self {
            ColumnIndex::Equality(index) => index.clear(),
            ColumnIndex::Range(index) => index.clear(),
        }
    }
    pub fn len(&self) -> u64 {
        match self {
            ColumnIndex::Equality(index) => index.len(),
            ColumnIndex::Range(index) => index.len(),
        }
    }
}
