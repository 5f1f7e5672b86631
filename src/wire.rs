//! Wire forms consumed and produced at the registry boundary: the row
//! codec (cells in schema order, untagged since the schema is known), the
//! predicate bytecode, and the multiplexed command stream.
//!
//! The connection, authentication and compression layers above this sit
//! outside the crate; they hand in a decompressed byte stream and take
//! back a response buffer.

use bytes::{Buf, BufMut, BytesMut};
use tracing::warn;

use crate::datatype::{ColumnType, DataCell};
use crate::error::{CellarError, Result};
use crate::plan::{ComparisonOperator, Plan, PlanNode};
use crate::registry::Registry;
use crate::schema::Schema;

// plan node tags
const NODE_INTERSECT: u8 = 1;
const NODE_UNION: u8 = 2;
const NODE_FILTER: u8 = 3;

// command opcodes
pub const CMD_AGGREGATE: u8 = 0x01;
pub const CMD_INSERT: u8 = 0x02;
pub const CMD_DELETE_WHERE: u8 = 0x03;
pub const CMD_COUNT_ALL: u8 = 0x04;
pub const CMD_COUNT_WHERE: u8 = 0x05;
pub const CMD_CLEAR: u8 = 0x06;

// response framing
pub const STATUS_OK: u8 = 0x00;
pub const STATUS_FAULT: u8 = 0xFF;
pub const ROW_MARKER: u8 = 0x01;
pub const END_OF_SET: u8 = 0x00;

/// Batch header flag: this batch may carry write commands.
pub const FLAG_WRITES: u8 = 0x01;

fn need(buf: &impl Buf, bytes: usize, what: &str) -> Result<()> {
    if buf.remaining() < bytes {
        return Err(CellarError::Wire(format!(
            "truncated {}: {} byte(s) needed, {} left",
            what,
            bytes,
            buf.remaining()
        )));
    }
    Ok(())
}

// ------------- cells -------------

pub fn decode_cell(buf: &mut impl Buf, column_type: ColumnType) -> Result<DataCell> {
    match column_type {
        ColumnType::Int32 => {
            need(buf, 4, "Int32 cell")?;
            Ok(DataCell::Int32(buf.get_i32_le()))
        }
        ColumnType::Int64 => {
            need(buf, 8, "Int64 cell")?;
            Ok(DataCell::Int64(buf.get_i64_le()))
        }
        ColumnType::Float32 => {
            need(buf, 4, "Float32 cell")?;
            Ok(DataCell::Float32(buf.get_f32_le()))
        }
        ColumnType::Float64 => {
            need(buf, 8, "Float64 cell")?;
            Ok(DataCell::Float64(buf.get_f64_le()))
        }
        ColumnType::Text => {
            need(buf, 4, "Text length")?;
            let length = buf.get_u32_le() as usize;
            need(buf, length, "Text cell")?;
            let mut raw = vec![0u8; length];
            buf.copy_to_slice(&mut raw);
            let text = String::from_utf8(raw)
                .map_err(|e| CellarError::Wire(format!("Text cell is not UTF-8: {}", e)))?;
            Ok(DataCell::Text(text))
        }
        ColumnType::Bytes => {
            need(buf, 4, "Bytes length")?;
            let length = buf.get_u32_le() as usize;
            need(buf, length, "Bytes cell")?;
            let mut raw = vec![0u8; length];
            buf.copy_to_slice(&mut raw);
            Ok(DataCell::Bytes(raw))
        }
    }
}

pub fn encode_cell(out: &mut BytesMut, cell: &DataCell) {
    match cell {
        DataCell::Int32(v) => out.put_i32_le(*v),
        DataCell::Int64(v) => out.put_i64_le(*v),
        DataCell::Float32(v) => out.put_f32_le(*v),
        DataCell::Float64(v) => out.put_f64_le(*v),
        DataCell::Text(v) => {
            out.put_u32_le(v.len() as u32);
            out.put_slice(v.as_bytes());
        }
        DataCell::Bytes(v) => {
            out.put_u32_le(v.len() as u32);
            out.put_slice(v);
        }
    }
}

/// Predicate literals carry their own type tag so a mismatched literal is
/// caught by plan validation rather than misread.
fn decode_tagged_cell(buf: &mut impl Buf) -> Result<DataCell> {
    need(buf, 1, "cell type tag")?;
    let tag = buf.get_u8();
    let column_type = ColumnType::from_u8(tag)
        .ok_or_else(|| CellarError::Wire(format!("unknown cell type tag {:#04x}", tag)))?;
    decode_cell(buf, column_type)
}

fn encode_tagged_cell(out: &mut BytesMut, cell: &DataCell) {
    out.put_u8(cell.column_type().as_u8());
    encode_cell(out, cell);
}

// ------------- rows -------------

/// Decodes one row in schema column order into the provided (pooled)
/// buffer. The wire carries no per-cell tags; the declared types drive
/// the read, so a well-formed payload always yields a well-typed row.
pub fn decode_row_into(buf: &mut impl Buf, schema: &Schema, cells: &mut Vec<DataCell>) -> Result<()> {
    for column in schema.columns() {
        cells.push(decode_cell(buf, column.column_type())?);
    }
    Ok(())
}

pub fn encode_row(out: &mut BytesMut, cells: &[DataCell]) {
    for cell in cells {
        encode_cell(out, cell);
    }
}

// ------------- predicate bytecode -------------

pub fn decode_plan(buf: &mut impl Buf, schema: &Schema) -> Result<Plan> {
    need(buf, 2, "plan node count")?;
    let count = buf.get_u16_le() as usize;
    let mut nodes = Vec::with_capacity(count);
    for _ in 0..count {
        need(buf, 1, "plan node tag")?;
        let tag = buf.get_u8();
        let node = match tag {
            NODE_INTERSECT => PlanNode::Intersect,
            NODE_UNION => PlanNode::Union,
            NODE_FILTER => {
                need(buf, 5, "filter header")?;
                let offset = buf.get_i32_le();
                let column = usize::try_from(offset).map_err(|_| {
                    CellarError::Wire(format!("negative column offset {}", offset))
                })?;
                let operator_tag = buf.get_u8();
                let operator = ComparisonOperator::from_u8(operator_tag).ok_or_else(|| {
                    CellarError::Wire(format!("unknown operator byte {:#04x}", operator_tag))
                })?;
                let low = decode_tagged_cell(buf)?;
                let high = if operator.takes_pair() {
                    Some(decode_tagged_cell(buf)?)
                } else {
                    None
                };
                PlanNode::Filter { column, operator, low, high }
            }
            other => {
                return Err(CellarError::Wire(format!("unknown plan node tag {:#04x}", other)));
            }
        };
        nodes.push(node);
    }
    Plan::new(nodes, schema)
}

pub fn encode_plan(out: &mut BytesMut, plan: &Plan) {
    out.put_u16_le(plan.nodes().len() as u16);
    for node in plan.nodes() {
        match node {
            PlanNode::Intersect => out.put_u8(NODE_INTERSECT),
            PlanNode::Union => out.put_u8(NODE_UNION),
            PlanNode::Filter { column, operator, low, high } => {
                out.put_u8(NODE_FILTER);
                out.put_i32_le(*column as i32);
                out.put_u8(operator.as_u8());
                encode_tagged_cell(out, low);
                if let Some(high) = high {
                    encode_tagged_cell(out, high);
                }
            }
        }
    }
}

// ------------- command stream -------------

fn write_fault(out: &mut BytesMut, error: &CellarError) {
    let message = error.to_string();
    out.put_u8(STATUS_FAULT);
    out.put_u32_le(message.len() as u32);
    out.put_slice(message.as_bytes());
}

fn write_count(out: &mut BytesMut, status_payload: u64) {
    out.put_u8(STATUS_OK);
    out.put_u64_le(status_payload);
}

/// Decodes and executes one batch of commands, writing one response per
/// command.
///
/// The header carries the command count and whether writes are allowed.
/// A write-enabled batch holds the full latch set for its whole duration
/// and is atomic: any command's failure rolls every earlier mutation back,
/// a fault response is framed, and the remaining commands are abandoned.
/// A malformed header is reported as an error instead, since no response
/// can be framed for commands that were never delimited.
pub fn consume_command_stream(
    registry: &Registry,
    input: &mut impl Buf,
    output: &mut BytesMut,
) -> Result<()> {
    need(input, 3, "batch header")?;
    let flags = input.get_u8();
    let commands = input.get_u16_le();
    let writes_allowed = flags & FLAG_WRITES != 0;

    if writes_allowed {
        let mut txn = registry.begin_write();
        for position in 0..commands {
            if let Err(e) = write_command(registry, &mut txn, input, output) {
                warn!(position, error = %e, "write batch rolled back");
                txn.rollback();
                write_fault(output, &e);
                return Ok(());
            }
        }
        txn.commit();
    } else {
        for position in 0..commands {
            if let Err(e) = read_command(registry, input, output) {
                warn!(position, error = %e, "read batch aborted");
                write_fault(output, &e);
                return Ok(());
            }
        }
    }
    Ok(())
}

fn write_command(
    registry: &Registry,
    txn: &mut crate::registry::WriteTxn<'_>,
    input: &mut impl Buf,
    output: &mut BytesMut,
) -> Result<()> {
    need(input, 1, "command opcode")?;
    let opcode = input.get_u8();
    match opcode {
        CMD_AGGREGATE => {
            let plan = decode_plan(input, registry.schema())?;
            let ids = txn.ids_matching(&plan)?;
            output.put_u8(STATUS_OK);
            for id in ids.iter() {
                if let Some(cells) = txn.cells_of(id) {
                    output.put_u8(ROW_MARKER);
                    encode_row(output, cells);
                }
            }
            output.put_u8(END_OF_SET);
        }
        CMD_INSERT => {
            need(input, 4, "insert row count")?;
            let rows = input.get_u32_le();
            let mut inserted = 0u64;
            for _ in 0..rows {
                let mut cells = registry.pool().acquire();
                if let Err(e) = decode_row_into(input, registry.schema(), &mut cells) {
                    registry.pool().release(cells);
                    return Err(e);
                }
                if txn.insert_cells(cells)? {
                    inserted += 1;
                }
            }
            write_count(output, inserted);
        }
        CMD_DELETE_WHERE => {
            let plan = decode_plan(input, registry.schema())?;
            let deleted = txn.delete_matching(&plan)?;
            write_count(output, deleted);
        }
        CMD_COUNT_ALL => write_count(output, txn.count_all()),
        CMD_COUNT_WHERE => {
            let plan = decode_plan(input, registry.schema())?;
            let matched = txn.ids_matching(&plan)?.len();
            write_count(output, matched);
        }
        CMD_CLEAR => {
            let previous = txn.clear_all();
            write_count(output, previous);
        }
        other => return Err(CellarError::UnsupportedCommand(other)),
    }
    Ok(())
}

fn read_command(registry: &Registry, input: &mut impl Buf, output: &mut BytesMut) -> Result<()> {
    need(input, 1, "command opcode")?;
    let opcode = input.get_u8();
    match opcode {
        // writes fail fast before any payload is read or latch taken
        CMD_INSERT | CMD_DELETE_WHERE | CMD_CLEAR => Err(CellarError::WriteNotAllowed),
        CMD_AGGREGATE => {
            let plan = decode_plan(input, registry.schema())?;
            let txn = registry.begin_read();
            let ids = txn.ids_matching(&plan)?;
            output.put_u8(STATUS_OK);
            for id in ids.iter() {
                if let Some(row) = txn.primary.get(id) {
                    output.put_u8(ROW_MARKER);
                    encode_row(output, row.cells());
                }
            }
            output.put_u8(END_OF_SET);
            Ok(())
        }
        CMD_COUNT_ALL => {
            write_count(output, registry.begin_read().count_all());
            Ok(())
        }
        CMD_COUNT_WHERE => {
            let plan = decode_plan(input, registry.schema())?;
            let txn = registry.begin_read();
            write_count(output, txn.ids_matching(&plan)?.len());
            Ok(())
        }
        other => Err(CellarError::UnsupportedCommand(other)),
    }
}
