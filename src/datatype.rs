// used to print out readable forms of cells and types
use std::fmt;
// cells need to be hashable so they can key equality indexes
// and contribute to a row's content hash
use std::hash::{Hash, Hasher};
// custom made total ordering over cells
use std::cmp::Ordering;

/// The closed set of logical column types. Each type carries a stable
/// one-byte identifier used in the wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ColumnType {
    Int32 = 1,
    Int64 = 2,
    Float32 = 3,
    Float64 = 4,
    Text = 5,
    Bytes = 6,
}

impl ColumnType {
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(ColumnType::Int32),
            2 => Some(ColumnType::Int64),
            3 => Some(ColumnType::Float32),
            4 => Some(ColumnType::Float64),
            5 => Some(ColumnType::Text),
            6 => Some(ColumnType::Bytes),
            _ => None,
        }
    }
    pub fn as_u8(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            ColumnType::Int32 => "Int32",
            ColumnType::Int64 => "Int64",
            ColumnType::Float32 => "Float32",
            ColumnType::Float64 => "Float64",
            ColumnType::Text => "Text",
            ColumnType::Bytes => "Bytes",
        };
        write!(f, "{}", name)
    }
}

/// A single typed scalar occupying one column of one row.
///
/// Equality is by value. Floats compare by bit pattern so that `Eq` and
/// `Hash` stay lawful and a cell can key a hash map; ordering uses
/// `total_cmp` so every float (NaN included) has a place in a range index.
/// Cells of different variants never meet in practice: the schema rejects
/// a mismatched cell before any index sees it.
#[derive(Debug, Clone)]
pub enum DataCell {
    Int32(i32),
    Int64(i64),
    Float32(f32),
    Float64(f64),
    Text(String),
    Bytes(Vec<u8>),
}

impl DataCell {
    pub fn column_type(&self) -> ColumnType {
        match self {
            DataCell::Int32(_) => ColumnType::Int32,
            DataCell::Int64(_) => ColumnType::Int64,
            DataCell::Float32(_) => ColumnType::Float32,
            DataCell::Float64(_) => ColumnType::Float64,
            DataCell::Text(_) => ColumnType::Text,
            DataCell::Bytes(_) => ColumnType::Bytes,
        }
    }
}

impl PartialEq for DataCell {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (DataCell::Int32(a), DataCell::Int32(b)) => a == b,
            (DataCell::Int64(a), DataCell::Int64(b)) => a == b,
            (DataCell::Float32(a), DataCell::Float32(b)) => a.to_bits() == b.to_bits(),
            (DataCell::Float64(a), DataCell::Float64(b)) => a.to_bits() == b.to_bits(),
            (DataCell::Text(a), DataCell::Text(b)) => a == b,
            (DataCell::Bytes(a), DataCell::Bytes(b)) => a == b,
            _ => false,
        }
    }
}
impl Eq for DataCell {}

impl Hash for DataCell {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.column_type().as_u8().hash(state);
        match self {
            DataCell::Int32(v) => v.hash(state),
            DataCell::Int64(v) => v.hash(state),
            DataCell::Float32(v) => v.to_bits().hash(state),
            DataCell::Float64(v) => v.to_bits().hash(state),
            DataCell::Text(v) => v.hash(state),
            DataCell::Bytes(v) => v.hash(state),
        }
    }
}

impl Ord for DataCell {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (DataCell::Int32(a), DataCell::Int32(b)) => a.cmp(b),
            (DataCell::Int64(a), DataCell::Int64(b)) => a.cmp(b),
            (DataCell::Float32(a), DataCell::Float32(b)) => a.total_cmp(b),
            (DataCell::Float64(a), DataCell::Float64(b)) => a.total_cmp(b),
            (DataCell::Text(a), DataCell::Text(b)) => a.as_bytes().cmp(b.as_bytes()),
            (DataCell::Bytes(a), DataCell::Bytes(b)) => a.cmp(b),
            // mixed variants are ranked by type tag; the schema keeps this
            // arm unreachable for any key stored in an index
            (a, b) => a.column_type().as_u8().cmp(&b.column_type().as_u8()),
        }
    }
}
impl PartialOrd for DataCell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for DataCell {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DataCell::Int32(v) => write!(f, "{}", v),
            DataCell::Int64(v) => write!(f, "{}", v),
            DataCell::Float32(v) => write!(f, "{}", v),
            DataCell::Float64(v) => write!(f, "{}", v),
            DataCell::Text(v) => write!(f, "\"{}\"", v),
            DataCell::Bytes(v) => write!(f, "0x{}", v.iter().map(|b| format!("{:02x}", b)).collect::<String>()),
        }
    }
}
