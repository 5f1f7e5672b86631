
use thiserror::Error;

use crate::datatype::ColumnType;

#[derive(Error, Debug)]
pub enum CellarError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Schema error: {0}")]
    Schema(String),
    #[error("Type mismatch in column {column}: expected {expected}, got {actual}")]
    TypeMismatch { column: usize, expected: ColumnType, actual: ColumnType },
    #[error("Operator {operator} not supported by the {strategy} strategy of column {column}")]
    UnsupportedOperator { column: usize, operator: &'static str, strategy: &'static str },
    #[error("Unsupported command code {0:#04x}")]
    UnsupportedCommand(u8),
    #[error("Write command in a read-only batch")]
    WriteNotAllowed,
    #[error("Wire error: {0}")]
    Wire(String),
    #[error("Malformed plan: {0}")]
    Plan(String),
    #[error("Internal invariant violated: {0}")]
    Invariant(String),
}

pub type Result<T> = std::result::Result<T, CellarError>;
