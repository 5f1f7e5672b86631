//! The schema descriptor: one [`ColumnSchema`] per column, fixed when the
//! registry is constructed and never mutated afterwards.

use crate::datatype::{ColumnType, DataCell};
use crate::error::{CellarError, Result};

/// Which indexing strategy a column uses, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    None,
    Equality,
    Range,
}

impl IndexKind {
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(IndexKind::None),
            1 => Some(IndexKind::Equality),
            2 => Some(IndexKind::Range),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColumnSchema {
    name: String,
    column_type: ColumnType,
    index: IndexKind,
    hashed: bool,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, column_type: ColumnType, index: IndexKind, hashed: bool) -> Self {
        Self {
            name: name.into(),
            column_type,
            index,
            hashed,
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn column_type(&self) -> ColumnType {
        self.column_type
    }
    pub fn index(&self) -> IndexKind {
        self.index
    }
    pub fn hashed(&self) -> bool {
        self.hashed
    }
}

/// The ordered list of columns plus the fan-out degree shared by all
/// range indexes of this table.
#[derive(Debug, Clone)]
pub struct Schema {
    columns: Vec<ColumnSchema>,
    fan_out: usize,
}

/// Smallest permitted B-tree minimum degree for range indexes.
pub const MIN_FAN_OUT: usize = 3;

impl Schema {
    pub fn new(columns: Vec<ColumnSchema>, fan_out: usize) -> Result<Self> {
        if columns.is_empty() {
            return Err(CellarError::Schema("a schema needs at least one column".into()));
        }
        if fan_out < MIN_FAN_OUT {
            return Err(CellarError::Schema(format!(
                "range index fan-out {} is below the minimum {}",
                fan_out, MIN_FAN_OUT
            )));
        }
        if !columns.iter().any(|c| c.hashed()) {
            return Err(CellarError::Schema(
                "at least one column must be hashed so rows have a content identity".into(),
            ));
        }
        Ok(Self { columns, fan_out })
    }

    pub fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }
    pub fn column(&self, ordinal: usize) -> Option<&ColumnSchema> {
        self.columns.get(ordinal)
    }
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
    pub fn fan_out(&self) -> usize {
        self.fan_out
    }

    /// Checks a candidate row against the schema: exact arity and, per
    /// column, the declared cell variant. Runs before any latch is taken.
    pub fn check_row(&self, cells: &[DataCell]) -> Result<()> {
        if cells.len() != self.columns.len() {
            return Err(CellarError::Schema(format!(
                "row has {} cells but the schema declares {} columns",
                cells.len(),
                self.columns.len()
            )));
        }
        for (ordinal, (cell, column)) in cells.iter().zip(self.columns.iter()).enumerate() {
            if cell.column_type() != column.column_type() {
                return Err(CellarError::TypeMismatch {
                    column: ordinal,
                    expected: column.column_type(),
                    actual: cell.column_type(),
                });
            }
        }
        Ok(())
    }
}
