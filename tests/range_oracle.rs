//! Range correctness against a brute-force oracle: for random values and
//! random bounds, the range index must agree with a linear scan.

use cellar::datatype::{ColumnType, DataCell};
use cellar::plan::{ComparisonOperator, Plan};
use cellar::registry::Registry;
use cellar::schema::{ColumnSchema, IndexKind, Schema};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn setup(fan_out: usize) -> Registry {
    let schema = Schema::new(
        vec![
            ColumnSchema::new("value", ColumnType::Int32, IndexKind::Range, true),
            // a unique discriminator so every row survives dedup
            ColumnSchema::new("seq", ColumnType::Int64, IndexKind::None, true),
        ],
        fan_out,
    )
    .unwrap();
    Registry::new(schema)
}

fn populate(registry: &Registry, rng: &mut StdRng, count: usize, spread: i32) -> Vec<i32> {
    let mut values = Vec::with_capacity(count);
    let rows = (0..count)
        .map(|seq| {
            let value = rng.gen_range(-spread..=spread);
            values.push(value);
            vec![DataCell::Int32(value), DataCell::Int64(seq as i64)]
        })
        .collect();
    assert_eq!(registry.insert(rows).unwrap(), count);
    values
}

fn count_matching(registry: &Registry, operator: ComparisonOperator, low: i32, high: Option<i32>) -> u64 {
    let plan = Plan::filter(
        registry.schema(),
        0,
        operator,
        DataCell::Int32(low),
        high.map(DataCell::Int32),
    )
    .unwrap();
    registry.conditional_count(&plan).unwrap()
}

#[test]
fn closed_between_matches_linear_scan() {
    let mut rng = StdRng::seed_from_u64(0x5eed);
    let registry = setup(3); // smallest legal degree, deepest tree
    let values = populate(&registry, &mut rng, 500, 100);
    for _ in 0..200 {
        let a = rng.gen_range(-110..=110);
        let b = rng.gen_range(-110..=110);
        let (low, high) = (a.min(b), a.max(b));
        let expected = values.iter().filter(|v| low <= **v && **v <= high).count() as u64;
        let actual = count_matching(&registry, ComparisonOperator::ClosedBetween, low, Some(high));
        assert_eq!(actual, expected, "ClosedBetween({}, {}) disagrees with the oracle", low, high);
    }
}

#[test]
fn open_comparisons_match_linear_scan() {
    let mut rng = StdRng::seed_from_u64(0xfacade);
    let registry = setup(8);
    let values = populate(&registry, &mut rng, 400, 50);
    for _ in 0..100 {
        let pivot = rng.gen_range(-60..=60);
        let cases: [(ComparisonOperator, Box<dyn Fn(&i32) -> bool>); 5] = [
            (ComparisonOperator::Equal, Box::new(move |v| *v == pivot)),
            (ComparisonOperator::GreaterThan, Box::new(move |v| *v > pivot)),
            (ComparisonOperator::GreaterOrEqual, Box::new(move |v| *v >= pivot)),
            (ComparisonOperator::LessThan, Box::new(move |v| *v < pivot)),
            (ComparisonOperator::LessOrEqual, Box::new(move |v| *v <= pivot)),
        ];
        for (operator, keep) in cases {
            let expected = values.iter().filter(|v| keep(v)).count() as u64;
            let actual = count_matching(&registry, operator, pivot, None);
            assert_eq!(actual, expected, "{:?} {} disagrees with the oracle", operator, pivot);
        }
    }
}

#[test]
fn inverted_bounds_yield_nothing() {
    let mut rng = StdRng::seed_from_u64(7);
    let registry = setup(4);
    populate(&registry, &mut rng, 100, 20);
    assert_eq!(
        count_matching(&registry, ComparisonOperator::ClosedBetween, 10, Some(-10)),
        0,
        "low > high is empty by contract, not an error"
    );
}

#[test]
fn range_survives_deletions() {
    let mut rng = StdRng::seed_from_u64(99);
    let registry = setup(3);
    let values = populate(&registry, &mut rng, 300, 40);
    // delete everything equal to a handful of pivots, then re-check
    let mut remaining: Vec<i32> = values;
    for pivot in [-10, 0, 7, 33] {
        let plan = Plan::filter(
            registry.schema(),
            0,
            ComparisonOperator::Equal,
            DataCell::Int32(pivot),
            None,
        )
        .unwrap();
        let expected = remaining.iter().filter(|v| **v == pivot).count() as u64;
        assert_eq!(registry.delete(&plan).unwrap(), expected);
        remaining.retain(|v| *v != pivot);
    }
    for _ in 0..100 {
        let a = rng.gen_range(-45..=45);
        let b = rng.gen_range(-45..=45);
        let (low, high) = (a.min(b), a.max(b));
        let expected = remaining.iter().filter(|v| low <= **v && **v <= high).count() as u64;
        let actual = count_matching(&registry, ComparisonOperator::ClosedBetween, low, Some(high));
        assert_eq!(actual, expected, "post-delete ClosedBetween({}, {})", low, high);
    }
}

#[test]
fn text_ranges_order_bytewise() {
    let schema = Schema::new(
        vec![ColumnSchema::new("word", ColumnType::Text, IndexKind::Range, true)],
        3,
    )
    .unwrap();
    let registry = Registry::new(schema);
    let words = ["apple", "banana", "cherry", "damson", "elder"];
    registry
        .insert(words.iter().map(|w| vec![DataCell::Text((*w).into())]).collect())
        .unwrap();
    let plan = Plan::filter(
        registry.schema(),
        0,
        ComparisonOperator::ClosedBetween,
        DataCell::Text("b".into()),
        Some(DataCell::Text("d".into())),
    )
    .unwrap();
    // "banana" and "cherry" sit between "b" and "d"; "damson" > "d"
    assert_eq!(registry.conditional_count(&plan).unwrap(), 2);
}
