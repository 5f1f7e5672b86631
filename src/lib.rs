//! Cellar – an embeddable, in-process row store answering boolean
//! predicate queries over typed, schema-fixed rows.
//!
//! A table is a [`registry::Registry`] built from a [`schema::Schema`]:
//! * A [`datatype::DataCell`] is a single typed scalar value.
//! * A [`construct::Row`] is a schema-ordered array of cells with an
//!   identity minted by the primary row set; its cell buffer is pooled.
//! * The [`construct::PrimaryRowSet`] keeps the canonical row universe and
//!   answers content-hash dedup.
//! * Each indexed column owns an [`index::ColumnIndex`]: an equality index
//!   (value → row bitmap) or a range index (an ordered B-tree multimap,
//!   [`ordered::CellTree`], supporting point and range scans).
//! * A [`plan::Plan`] is the compiled predicate: a prefix tree of
//!   intersect/union combinators over per-column filters, validated
//!   against the schema before any index is touched.
//! * The [`aggregate`] module evaluates plans with an explicit stack and
//!   absorbing set algebra over roaring bitmaps.
//!
//! ## Modules
//! * [`datatype`] – cell values and column types.
//! * [`schema`] – the fixed per-table column descriptors.
//! * [`construct`] – row identity, pooled buffers, the primary row set.
//! * [`ordered`] – the B-tree ordered multimap behind range indexes.
//! * [`index`] – the per-column index strategies.
//! * [`plan`] – the compiled predicate representation.
//! * [`aggregate`] – result sets and the plan evaluator.
//! * [`registry`] – the orchestrator: latches, transactions, operations.
//! * [`wire`] – row/predicate/command codecs for the boundary layers.
//! * [`settings`] – config-file settings and tracing setup.
//! * [`error`] – the crate error taxonomy.
//!
//! ## Concurrency
//! Synchronous and multi-threaded: readers take shared latches per index
//! for the duration of a scan, writers take the whole latch set in a
//! fixed order and commit or roll back as a unit. See
//! [`registry::Registry`] for the discipline.
//!
//! ## Quick Start
//! ```
//! use cellar::datatype::{ColumnType, DataCell};
//! use cellar::plan::{ComparisonOperator, Plan};
//! use cellar::registry::Registry;
//! use cellar::schema::{ColumnSchema, IndexKind, Schema};
//!
//! let schema = Schema::new(vec![
//!     ColumnSchema::new("quantity", ColumnType::Int32, IndexKind::Range, true),
//!     ColumnSchema::new("label", ColumnType::Text, IndexKind::Equality, true),
//! ], 8).unwrap();
//! let registry = Registry::new(schema);
//! registry.insert(vec![
//!     vec![DataCell::Int32(1), DataCell::Text("a".into())],
//!     vec![DataCell::Int32(2), DataCell::Text("b".into())],
//! ]).unwrap();
//! let plan = Plan::filter(registry.schema(), 0,
//!     ComparisonOperator::GreaterThan, DataCell::Int32(1), None).unwrap();
//! assert_eq!(registry.aggregate(&plan).unwrap().len(), 1);
//! ```

pub mod aggregate;
pub mod construct;
pub mod datatype;
pub mod error;
pub mod index;
pub mod ordered;
pub mod plan;
pub mod registry;
pub mod schema;
pub mod settings;
pub mod wire;
