//! A write-enabled command batch is all-or-nothing: one bad command in
//! the middle undoes everything the batch already did.

use bytes::{Buf, BufMut, BytesMut};
use cellar::datatype::{ColumnType, DataCell};
use cellar::plan::Plan;
use cellar::registry::Registry;
use cellar::schema::{ColumnSchema, IndexKind, Schema};
use cellar::wire::{
    self, CMD_CLEAR, CMD_DELETE_WHERE, CMD_INSERT, FLAG_WRITES, STATUS_FAULT, STATUS_OK,
};

fn setup() -> Registry {
    let schema = Schema::new(
        vec![
            ColumnSchema::new("quantity", ColumnType::Int32, IndexKind::Range, true),
            ColumnSchema::new("label", ColumnType::Text, IndexKind::Equality, true),
        ],
        8,
    )
    .unwrap();
    Registry::new(schema)
}

fn put_header(out: &mut BytesMut, flags: u8, commands: u16) {
    out.put_u8(flags);
    out.put_u16_le(commands);
}

fn put_insert(out: &mut BytesMut, rows: &[(i32, &str)]) {
    out.put_u8(CMD_INSERT);
    out.put_u32_le(rows.len() as u32);
    for (quantity, label) in rows {
        wire::encode_row(
            out,
            &[DataCell::Int32(*quantity), DataCell::Text((*label).to_string())],
        );
    }
}

fn read_fault(buf: &mut impl Buf) -> String {
    assert_eq!(buf.get_u8(), STATUS_FAULT);
    let length = buf.get_u32_le() as usize;
    let mut raw = vec![0u8; length];
    buf.copy_to_slice(&mut raw);
    String::from_utf8(raw).unwrap()
}

#[test]
fn malformed_command_rolls_the_whole_batch_back() {
    let registry = setup();
    let mut input = BytesMut::new();
    put_header(&mut input, FLAG_WRITES, 3);
    put_insert(&mut input, &[(1, "a"), (2, "b")]);
    // second insert claims a Text cell far longer than the payload
    input.put_u8(CMD_INSERT);
    input.put_u32_le(1);
    input.put_i32_le(3);
    input.put_u32_le(u32::MAX);
    put_insert(&mut input, &[(4, "d")]);

    let mut output = BytesMut::new();
    wire::consume_command_stream(&registry, &mut input.freeze(), &mut output).unwrap();

    let mut response = output.freeze();
    assert_eq!(response.get_u8(), STATUS_OK);
    assert_eq!(response.get_u64_le(), 2, "first insert was acknowledged");
    let fault = read_fault(&mut response);
    assert!(fault.contains("truncated"), "got: {}", fault);
    assert!(!response.has_remaining(), "no response after the fault");

    assert_eq!(registry.count_all(), 0, "acknowledged rows were rolled back");
}

#[test]
fn unknown_opcode_undoes_earlier_deletes() {
    let registry = setup();
    registry
        .insert(vec![
            vec![DataCell::Int32(1), DataCell::Text("a".into())],
            vec![DataCell::Int32(2), DataCell::Text("b".into())],
            vec![DataCell::Int32(3), DataCell::Text("c".into())],
        ])
        .unwrap();

    let mut input = BytesMut::new();
    put_header(&mut input, FLAG_WRITES, 2);
    input.put_u8(CMD_DELETE_WHERE);
    wire::encode_plan(&mut input, &Plan::everything());
    input.put_u8(0x7E);

    let mut output = BytesMut::new();
    wire::consume_command_stream(&registry, &mut input.freeze(), &mut output).unwrap();

    let mut response = output.freeze();
    assert_eq!(response.get_u8(), STATUS_OK);
    assert_eq!(response.get_u64_le(), 3, "the delete saw every row");
    let fault = read_fault(&mut response);
    assert!(fault.contains("0x7e"), "got: {}", fault);

    assert_eq!(registry.count_all(), 3, "deleted rows were restored");
}

#[test]
fn clear_is_undone_with_the_rest() {
    let registry = setup();
    registry
        .insert(vec![vec![DataCell::Int32(9), DataCell::Text("keep".into())]])
        .unwrap();

    let mut input = BytesMut::new();
    put_header(&mut input, FLAG_WRITES, 2);
    input.put_u8(CMD_CLEAR);
    input.put_u8(0xEE);

    let mut output = BytesMut::new();
    wire::consume_command_stream(&registry, &mut input.freeze(), &mut output).unwrap();
    assert_eq!(registry.count_all(), 1);
}

#[test]
fn read_only_batch_rejects_writes_without_touching_payload() {
    let registry = setup();
    let mut input = BytesMut::new();
    put_header(&mut input, 0, 1);
    put_insert(&mut input, &[(1, "a")]);

    let mut output = BytesMut::new();
    wire::consume_command_stream(&registry, &mut input.freeze(), &mut output).unwrap();

    let fault = read_fault(&mut output.freeze());
    assert!(fault.contains("read-only"), "got: {}", fault);
    assert_eq!(registry.count_all(), 0);
}
