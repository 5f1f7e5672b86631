//! Row identity, pooled row buffers and the primary row set.
//!
//! The primary row set follows a "keeper" pattern: it owns every live row,
//! is the only component that can mint a row identity, and answers
//! existence and dedup questions for the registry.

use std::collections::HashMap;
use std::collections::hash_map::Keys;
use std::hash::{BuildHasherDefault, Hash, Hasher};

use parking_lot::Mutex;
use seahash::SeaHasher;

use crate::datatype::DataCell;
use crate::schema::Schema;

// ------------- RowId -------------
pub type RowId = u64;

pub type RowHasher = BuildHasherDefault<SeaHasher>;
pub type CellHasher = BuildHasherDefault<SeaHasher>;

/// Ids start above GENESIS and are never reused, so "same id" always means
/// "same row" for the lifetime of a registry.
pub const GENESIS: RowId = 0;

// ------------- CellPool -------------

/// A free list of cell buffers. Rows check a buffer out on construction
/// and surrender it when they are removed from every owning structure.
/// An explicit pool instead of thread-local scratch keeps reuse without
/// hidden global state.
#[derive(Debug, Default)]
pub struct CellPool {
    free: Mutex<Vec<Vec<DataCell>>>,
}

impl CellPool {
    pub fn new() -> Self {
        Self {
            free: Mutex::new(Vec::new()),
        }
    }
    pub fn acquire(&self) -> Vec<DataCell> {
        self.free.lock().pop().unwrap_or_default()
    }
    pub fn release(&self, mut cells: Vec<DataCell>) {
        cells.clear();
        self.free.lock().push(cells);
    }
    pub fn pooled(&self) -> usize {
        self.free.lock().len()
    }
}

// ------------- Row -------------

/// One record: an id, a content hash over the hashed columns, and the
/// schema-ordered cells in a pooled buffer.
///
/// A row is move-only. The buffer leaves through [`Row::into_cells`] when
/// the row has been removed from the primary set and every index; nothing
/// may observe the row after that.
#[derive(Debug)]
pub struct Row {
    id: RowId,
    hash: u64,
    cells: Vec<DataCell>,
}

impl Row {
    pub fn new(id: RowId, hash: u64, cells: Vec<DataCell>) -> Self {
        Self { id, hash, cells }
    }
    pub fn id(&self) -> RowId {
        self.id
    }
    pub fn content_hash(&self) -> u64 {
        self.hash
    }
    pub fn cells(&self) -> &[DataCell] {
        &self.cells
    }
    pub fn cell(&self, ordinal: usize) -> &DataCell {
        &self.cells[ordinal]
    }
    /// Surrenders the cell buffer, consuming the row.
    pub fn into_cells(self) -> Vec<DataCell> {
        self.cells
    }
    /// Structural equality over all cells, exposed separately from row
    /// identity (which is by id alone).
    pub fn same_content(&self, other: &Row) -> bool {
        self.cells == other.cells
    }
}

/// The content hash over the hashed-column subset, in schema order.
/// This is the row's dedup identity; a 64-bit collision is treated as a
/// true duplicate by design.
pub fn content_hash(schema: &Schema, cells: &[DataCell]) -> u64 {
    let mut hasher = SeaHasher::new();
    for (cell, column) in cells.iter().zip(schema.columns()) {
        if column.hashed() {
            cell.hash(&mut hasher);
        }
    }
    hasher.finish()
}

// ------------- PrimaryRowSet -------------

/// The canonical set of all live rows, keyed by row id, with a secondary
/// content-hash map for dedup. No index may hold a row absent from here.
#[derive(Debug, Default)]
pub struct PrimaryRowSet {
    lower_bound: RowId,
    rows: HashMap<RowId, Row, RowHasher>,
    by_hash: HashMap<u64, RowId, RowHasher>,
}

impl PrimaryRowSet {
    pub fn new() -> Self {
        Self {
            lower_bound: GENESIS,
            rows: HashMap::default(),
            by_hash: HashMap::default(),
        }
    }

    /// Mints the next row id. Strictly increasing, never reused.
    pub fn mint_id(&mut self) -> RowId {
        self.lower_bound += 1;
        self.lower_bound
    }

    /// True unless a row with the same id is already present. Duplicate
    /// suppression by content is the registry's job via [`content_hash`];
    /// this guard only protects row identity itself.
    pub fn insert(&mut self, row: Row) -> bool {
        if self.rows.contains_key(&row.id()) {
            return false;
        }
        self.by_hash.insert(row.content_hash(), row.id());
        self.rows.insert(row.id(), row);
        true
    }

    pub fn remove(&mut self, id: RowId) -> Option<Row> {
        let row = self.rows.remove(&id)?;
        // only drop the hash entry if it still points at this row
        if self.by_hash.get(&row.content_hash()) == Some(&id) {
            self.by_hash.remove(&row.content_hash());
        }
        Some(row)
    }

    pub fn contains(&self, id: RowId) -> bool {
        self.rows.contains_key(&id)
    }

    pub fn contains_hash(&self, hash: u64) -> Option<RowId> {
        self.by_hash.get(&hash).copied()
    }

    pub fn get(&self, id: RowId) -> Option<&Row> {
        self.rows.get(&id)
    }

    /// Empties the set, handing every row back so the caller can release
    /// the buffers once the indexes have been cleaned as well.
    pub fn clear(&mut self) -> Vec<Row> {
        self.by_hash.clear();
        self.rows.drain().map(|(_, row)| row).collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Unordered iteration over all live row ids.
    pub fn ids(&self) -> Keys<'_, RowId, Row> {
        self.rows.keys()
    }
}
