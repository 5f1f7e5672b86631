//! The registry wires the primary row set and the per-column indexes
//! together and owns the concurrency discipline: one read/write latch per
//! structure, always acquired in the same fixed order (primary first, then
//! columns in schema order), so writers appear atomic to every reader.
//!
//! All mutation goes through a [`WriteTxn`]: the full latch set is held
//! for the whole operation (or batch of operations), every change is
//! recorded in an undo log, and commit or rollback is all-or-nothing.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use roaring::RoaringTreemap;
use tracing::{debug, info};

use crate::aggregate;
use crate::construct::{CellPool, PrimaryRowSet, Row, RowId, content_hash};
use crate::datatype::DataCell;
use crate::error::Result;
use crate::index::{ColumnIndex, EqualityIndex, RangeIndex};
use crate::plan::Plan;
use crate::schema::{ColumnSchema, IndexKind, Schema};
use crate::settings::Settings;

pub struct Registry {
    schema: Schema,
    primary: RwLock<PrimaryRowSet>,
    columns: Vec<Option<RwLock<ColumnIndex>>>,
    pool: CellPool,
}

impl Registry {
    pub fn new(schema: Schema) -> Self {
        let columns = schema
            .columns()
            .iter()
            .enumerate()
            .map(|(ordinal, column)| match column.index() {
                IndexKind::None => None,
                IndexKind::Equality => Some(RwLock::new(ColumnIndex::Equality(
                    EqualityIndex::new(ordinal, column.column_type()),
                ))),
                IndexKind::Range => Some(RwLock::new(ColumnIndex::Range(RangeIndex::new(
                    ordinal,
                    column.column_type(),
                    schema.fan_out(),
                )))),
            })
            .collect();
        info!(columns = schema.column_count(), fan_out = schema.fan_out(), "registry ready");
        Self {
            schema,
            primary: RwLock::new(PrimaryRowSet::new()),
            columns,
            pool: CellPool::new(),
        }
    }

    /// Builds the schema with the configured default fan-out and opens a
    /// registry over it.
    pub fn with_settings(columns: Vec<ColumnSchema>, settings: &Settings) -> Result<Self> {
        Ok(Self::new(Schema::new(columns, settings.range_fan_out)?))
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub(crate) fn pool(&self) -> &CellPool {
        &self.pool
    }

    // latch acquisition, always primary first then schema-column order

    pub(crate) fn begin_read(&self) -> ReadTxn<'_> {
        let primary = self.primary.read();
        let columns = self.columns.iter().map(|latch| latch.as_ref().map(|l| l.read())).collect();
        ReadTxn { primary, columns }
    }

    pub(crate) fn begin_write(&self) -> WriteTxn<'_> {
        let primary = self.primary.write();
        let columns = self.columns.iter().map(|latch| latch.as_ref().map(|l| l.write())).collect();
        WriteTxn {
            schema: &self.schema,
            pool: &self.pool,
            primary,
            columns,
            undo: Vec::new(),
        }
    }

    /// Inserts candidate rows, skipping content-hash duplicates silently.
    /// Returns how many rows were actually added. Any failure rolls the
    /// whole call back to the pre-call state before propagating.
    pub fn insert(&self, rows: Vec<Vec<DataCell>>) -> Result<usize> {
        // fail fast, before any latch is taken
        for cells in &rows {
            self.schema.check_row(cells)?;
        }
        let mut txn = self.begin_write();
        let mut inserted = 0usize;
        for source in rows {
            let mut cells = self.pool.acquire();
            cells.extend(source);
            match txn.insert_cells(cells) {
                Ok(true) => inserted += 1,
                Ok(false) => {}
                Err(e) => {
                    txn.rollback();
                    return Err(e);
                }
            }
        }
        txn.commit();
        info!(inserted, "insert complete");
        Ok(inserted)
    }

    /// Deletes every row matching the plan, returning how many went away.
    pub fn delete(&self, plan: &Plan) -> Result<u64> {
        let mut txn = self.begin_write();
        let deleted = match txn.delete_matching(plan) {
            Ok(deleted) => deleted,
            Err(e) => {
                txn.rollback();
                return Err(e);
            }
        };
        txn.commit();
        info!(deleted, "delete complete");
        Ok(deleted)
    }

    /// Empties the primary set and every index, returning the previous
    /// row count.
    pub fn clear(&self) -> u64 {
        let mut txn = self.begin_write();
        let previous = txn.clear_all();
        txn.commit();
        info!(previous, "clear complete");
        previous
    }

    /// Read-only evaluation: the matching rows' cells, materialised while
    /// the read latches are held so the snapshot is consistent per index.
    pub fn aggregate(&self, plan: &Plan) -> Result<Vec<Vec<DataCell>>> {
        let txn = self.begin_read();
        let ids = txn.ids_matching(plan)?;
        let mut rows = Vec::with_capacity(ids.len() as usize);
        for id in ids.iter() {
            if let Some(row) = txn.primary.get(id) {
                rows.push(row.cells().to_vec());
            }
        }
        debug!(rows = rows.len(), "aggregate complete");
        Ok(rows)
    }

    pub fn count_all(&self) -> u64 {
        self.primary.read().len() as u64
    }

    pub fn conditional_count(&self, plan: &Plan) -> Result<u64> {
        let txn = self.begin_read();
        Ok(txn.ids_matching(plan)?.len())
    }
}

/// Shared read access to the whole latch set, for one aggregation.
pub(crate) struct ReadTxn<'a> {
    pub(crate) primary: RwLockReadGuard<'a, PrimaryRowSet>,
    columns: Vec<Option<RwLockReadGuard<'a, ColumnIndex>>>,
}

impl ReadTxn<'_> {
    pub(crate) fn ids_matching(&self, plan: &Plan) -> Result<RoaringTreemap> {
        let handles: Vec<Option<&ColumnIndex>> = self.columns.iter().map(|g| g.as_deref()).collect();
        let result = aggregate::evaluate(plan, &handles)?;
        Ok(aggregate::materialise(result, plan.is_empty(), || {
            self.primary.ids().copied().collect()
        }))
    }

    pub(crate) fn count_all(&self) -> u64 {
        self.primary.len() as u64
    }
}

enum Undo {
    Inserted(RowId),
    Removed(Row),
}

/// Exclusive access to the whole latch set plus an undo log. Commit
/// releases removed rows' buffers; rollback restores the pre-transaction
/// state exactly.
pub(crate) struct WriteTxn<'a> {
    schema: &'a Schema,
    pool: &'a CellPool,
    primary: RwLockWriteGuard<'a, PrimaryRowSet>,
    columns: Vec<Option<RwLockWriteGuard<'a, ColumnIndex>>>,
    undo: Vec<Undo>,
}

impl WriteTxn<'_> {
    /// Adds one candidate row: dedup by content hash (a silent skip),
    /// then primary set, then every index in schema order. If an index
    /// rejects the row, everything done for it is undone and the buffer
    /// is returned before the error propagates.
    pub(crate) fn insert_cells(&mut self, cells: Vec<DataCell>) -> Result<bool> {
        let hash = content_hash(self.schema, &cells);
        if self.primary.contains_hash(hash).is_some() {
            self.pool.release(cells);
            return Ok(false);
        }
        let id = self.primary.mint_id();
        if !self.primary.insert(Row::new(id, hash, cells)) {
            return Err(crate::error::CellarError::Invariant(format!(
                "freshly minted row id {} already present",
                id
            )));
        }
        let mut indexed = 0usize;
        let mut failure = None;
        for ordinal in 0..self.columns.len() {
            let Some(index) = self.columns[ordinal].as_deref_mut() else {
                continue;
            };
            let row = self.primary.get(id).expect("row was just inserted");
            match index.add(row) {
                Ok(_) => indexed = ordinal + 1,
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }
        if let Some(e) = failure {
            // partial-write rollback: the row ends up present nowhere
            let row = self.primary.remove(id).expect("row was just inserted");
            for column in self.columns[..indexed].iter_mut() {
                if let Some(index) = column.as_deref_mut() {
                    index.remove(&row);
                }
            }
            self.pool.release(row.into_cells());
            return Err(e);
        }
        self.undo.push(Undo::Inserted(id));
        Ok(true)
    }

    /// Evaluates the plan against the write-locked handles and removes
    /// every matched row from every structure.
    pub(crate) fn delete_matching(&mut self, plan: &Plan) -> Result<u64> {
        let ids = self.ids_matching(plan)?;
        let deleted = ids.len();
        for id in ids.iter() {
            self.remove_row(id);
        }
        Ok(deleted)
    }

    fn remove_row(&mut self, id: RowId) {
        let Some(row) = self.primary.remove(id) else {
            return;
        };
        for column in self.columns.iter_mut() {
            if let Some(index) = column.as_deref_mut() {
                index.remove(&row);
            }
        }
        // keep the row until commit so rollback can restore it
        self.undo.push(Undo::Removed(row));
    }

    pub(crate) fn clear_all(&mut self) -> u64 {
        let rows = self.primary.clear();
        let previous = rows.len() as u64;
        for column in self.columns.iter_mut() {
            if let Some(index) = column.as_deref_mut() {
                index.clear();
            }
        }
        for row in rows {
            self.undo.push(Undo::Removed(row));
        }
        previous
    }

    pub(crate) fn ids_matching(&self, plan: &Plan) -> Result<RoaringTreemap> {
        let handles: Vec<Option<&ColumnIndex>> = self.columns.iter().map(|g| g.as_deref()).collect();
        let result = aggregate::evaluate(plan, &handles)?;
        Ok(aggregate::materialise(result, plan.is_empty(), || {
            self.primary.ids().copied().collect()
        }))
    }

    pub(crate) fn cells_of(&self, id: RowId) -> Option<&[DataCell]> {
        self.primary.get(id).map(|row| row.cells())
    }

    pub(crate) fn count_all(&self) -> u64 {
        self.primary.len() as u64
    }

    /// Makes every change permanent and hands removed buffers back.
    pub(crate) fn commit(self) {
        let mut released = 0usize;
        for entry in self.undo {
            if let Undo::Removed(row) = entry {
                self.pool.release(row.into_cells());
                released += 1;
            }
        }
        debug!(released, "write transaction committed");
    }

    /// Restores the exact pre-transaction state, newest change first.
    pub(crate) fn rollback(mut self) {
        let undone = self.undo.len();
        while let Some(entry) = self.undo.pop() {
            match entry {
                Undo::Inserted(id) => {
                    if let Some(row) = self.primary.remove(id) {
                        for column in self.columns.iter_mut() {
                            if let Some(index) = column.as_deref_mut() {
                                index.remove(&row);
                            }
                        }
                        self.pool.release(row.into_cells());
                    }
                }
                Undo::Removed(row) => {
                    for column in self.columns.iter_mut() {
                        if let Some(index) = column.as_deref_mut() {
                            index
                                .add(&row)
                                .expect("a row removed this transaction re-indexes cleanly");
                        }
                    }
                    self.primary.insert(row);
                }
            }
        }
        debug!(undone, "write transaction rolled back");
    }
}
