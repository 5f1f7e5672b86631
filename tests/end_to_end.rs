//! One full life cycle through the public surface: build a table, load
//! it, query it, delete from it, and check what remains.

use cellar::datatype::{ColumnType, DataCell};
use cellar::plan::{ComparisonOperator, Plan, PlanNode};
use cellar::registry::Registry;
use cellar::schema::{ColumnSchema, IndexKind, Schema};

fn setup() -> Registry {
    let schema = Schema::new(
        vec![
            ColumnSchema::new("amount", ColumnType::Int32, IndexKind::Range, true),
            ColumnSchema::new("note", ColumnType::Text, IndexKind::None, true),
            ColumnSchema::new("tag", ColumnType::Text, IndexKind::Equality, true),
        ],
        8,
    )
    .unwrap();
    Registry::new(schema)
}

fn row(amount: i32, note: &str, tag: &str) -> Vec<DataCell> {
    vec![
        DataCell::Int32(amount),
        DataCell::Text(note.into()),
        DataCell::Text(tag.into()),
    ]
}

#[test]
fn insert_query_delete_lifecycle() {
    let registry = setup();
    let inserted = registry
        .insert(vec![row(1, "a", "x"), row(2, "b", "y"), row(2, "c", "y")])
        .unwrap();
    assert_eq!(inserted, 3);
    assert_eq!(registry.count_all(), 3);

    let above_one = Plan::filter(
        registry.schema(),
        0,
        ComparisonOperator::GreaterThan,
        DataCell::Int32(1),
        None,
    )
    .unwrap();
    let matched = registry.aggregate(&above_one).unwrap();
    assert_eq!(matched.len(), 2);
    for cells in &matched {
        assert_eq!(cells[0], DataCell::Int32(2));
        assert_eq!(cells[2], DataCell::Text("y".into()));
    }

    let is_two = Plan::filter(
        registry.schema(),
        0,
        ComparisonOperator::Equal,
        DataCell::Int32(2),
        None,
    )
    .unwrap();
    assert_eq!(registry.delete(&is_two).unwrap(), 2);
    assert_eq!(registry.count_all(), 1);

    let remaining = registry.aggregate(&Plan::everything()).unwrap();
    assert_eq!(remaining, vec![row(1, "a", "x")]);
}

#[test]
fn combined_predicates_narrow_and_widen() {
    let registry = setup();
    registry
        .insert(vec![
            row(10, "n1", "red"),
            row(20, "n2", "red"),
            row(30, "n3", "blue"),
            row(40, "n4", "blue"),
        ])
        .unwrap();

    let red_and_small = Plan::new(
        vec![
            PlanNode::Intersect,
            PlanNode::Filter {
                column: 2,
                operator: ComparisonOperator::Equal,
                low: DataCell::Text("red".into()),
                high: None,
            },
            PlanNode::Filter {
                column: 0,
                operator: ComparisonOperator::LessOrEqual,
                low: DataCell::Int32(15),
                high: None,
            },
        ],
        registry.schema(),
    )
    .unwrap();
    let matched = registry.aggregate(&red_and_small).unwrap();
    assert_eq!(matched, vec![row(10, "n1", "red")]);

    let edges = Plan::new(
        vec![
            PlanNode::Union,
            PlanNode::Filter {
                column: 0,
                operator: ComparisonOperator::LessThan,
                low: DataCell::Int32(20),
                high: None,
            },
            PlanNode::Filter {
                column: 0,
                operator: ComparisonOperator::GreaterThan,
                low: DataCell::Int32(30),
                high: None,
            },
        ],
        registry.schema(),
    )
    .unwrap();
    assert_eq!(registry.conditional_count(&edges).unwrap(), 2);
}

#[test]
fn delete_then_reuse_identity() {
    let registry = setup();
    registry.insert(vec![row(5, "once", "t")]).unwrap();
    let plan = Plan::filter(
        registry.schema(),
        0,
        ComparisonOperator::Equal,
        DataCell::Int32(5),
        None,
    )
    .unwrap();
    assert_eq!(registry.delete(&plan).unwrap(), 1);
    // the content is free to come back and is queryable again
    assert_eq!(registry.insert(vec![row(5, "once", "t")]).unwrap(), 1);
    assert_eq!(registry.conditional_count(&plan).unwrap(), 1);
}
