//! Table reads against a small known dataset, plus append/read properties

use super::common::{append_scenario_rows, memory_file, scenario_schema};
use proptest::prelude::*;
use tabletree::{File, Slice, StoreConfig, TranslationMap, TreeError, Value};

fn scenario_file() -> File {
    let mut file = File::in_memory(TranslationMap::new()).unwrap();
    file.create_table("/", "t", scenario_schema(), "scenario").unwrap();
    append_scenario_rows(&mut file, "/t", &[(1, "aa"), (2, "bb"), (3, "cc")]);
    file.flush().unwrap();
    file
}

fn column_a(rows: &[tabletree::RowView]) -> Vec<Value> {
    rows.iter().map(|r| r.field("a").unwrap().clone()).collect()
}

#[test]
fn test_scenario_reads() {
    let file = scenario_file();
    let table = file.table("/t").unwrap();

    assert_eq!(table.nrows(), 3);
    assert_eq!(
        table.read_field(.., "a").unwrap(),
        vec![Value::Int16(1), Value::Int16(2), Value::Int16(3)]
    );

    let row = table.read_row(1).unwrap();
    assert_eq!(row.field("a").unwrap(), &Value::Int16(2));
    assert_eq!(row.field("b").unwrap(), &Value::from("bb"));

    assert_eq!(column_a(&table.read(-2..-1).unwrap()), vec![Value::Int16(2)]);
    assert_eq!(
        column_a(&table.read(Slice::new(0, 3, 2)).unwrap()),
        vec![Value::Int16(1), Value::Int16(3)]
    );
    assert_eq!(
        column_a(&table.read(Slice::all().step_by(-1)).unwrap()),
        vec![Value::Int16(3), Value::Int16(2), Value::Int16(1)]
    );
}

#[test]
fn test_metadata() {
    let file = scenario_file();
    let table = file.table("/t").unwrap();
    assert_eq!(table.name(), "t");
    assert_eq!(table.title(), "scenario");
    assert_eq!(table.colnames(), vec!["a", "b"]);
    assert_eq!(table.row_width(), 6);
    assert_eq!(
        table.column("b").unwrap().describe_type(),
        "String(4)".to_string()
    );
    assert!(matches!(table.column("c"), Err(TreeError::ColumnNotFound(_))));
    assert_eq!(table.to_string(), "/t (Table(3,)) 'scenario'");
}

#[test]
fn test_bad_reads() {
    let file = scenario_file();
    let table = file.table("/t").unwrap();
    assert!(matches!(
        table.read(Slice::all().step_by(0)),
        Err(TreeError::InvalidSlice(_))
    ));
    assert!(matches!(
        table.read_field(.., "missing"),
        Err(TreeError::ColumnNotFound(_))
    ));
    assert!(matches!(
        table.read_row(-4),
        Err(TreeError::IndexOutOfRange { index: -4, len: 3 })
    ));
    // an explicit stop of zero selects nothing
    assert!(table.read(Slice::new(0, 0, 1)).unwrap().is_empty());
}

#[test]
fn test_iteration_is_restartable() {
    let file = scenario_file();
    let table = file.table("/t").unwrap();
    let first: Vec<Value> = table.iterrows().map(|r| r.unwrap().values()[0].clone()).collect();
    let second: Vec<Value> = (&table)
        .into_iter()
        .map(|r| r.unwrap().values()[0].clone())
        .collect();
    assert_eq!(first, second);
    assert_eq!(first.len(), 3);

    let window: Vec<u64> = table
        .iterrows_range(1..)
        .unwrap()
        .map(|r| r.unwrap().row_index())
        .collect();
    assert_eq!(window, vec![1, 2]);
}

fn python_slice(len: i64, start: Option<i64>, stop: Option<i64>, step: i64) -> Vec<u64> {
    let norm = |v: i64| if v < 0 { (v + len).max(0) } else { v.min(len) };
    let start = start.map_or(0, norm);
    let stop = stop.map_or(len, norm);
    (start..stop).step_by(step as usize).map(|i| i as u64).collect()
}

fn small_buffer() -> StoreConfig {
    StoreConfig {
        buffer_rows: 7,
        read_chunk_rows: 5,
        sync_on_flush: false,
        ..StoreConfig::default()
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn appended_rows_read_back_in_order(
        rows in proptest::collection::vec((any::<i16>(), "[a-z]{0,4}"), 0..40)
    ) {
        let (mut file, _store) = memory_file(small_buffer());
        file.create_table("/", "t", scenario_schema(), "").unwrap();
        let borrowed: Vec<(i16, &str)> = rows.iter().map(|(a, b)| (*a, b.as_str())).collect();
        append_scenario_rows(&mut file, "/t", &borrowed);
        file.flush().unwrap();

        let table = file.table("/t").unwrap();
        prop_assert_eq!(table.nrows(), rows.len() as u64);
        let read = table.read(0..rows.len() as i64).unwrap();
        for ((a, b), row) in rows.iter().zip(&read) {
            prop_assert_eq!(row.field("a").unwrap(), &Value::Int16(*a));
            prop_assert_eq!(row.field("b").unwrap(), &Value::from(b.as_str()));
        }
        if !rows.is_empty() {
            let last = table.read_row(-1).unwrap();
            let tail = table.read(rows.len() as i64 - 1..rows.len() as i64).unwrap();
            prop_assert_eq!(vec![last], tail);
        }
    }

    #[test]
    fn slice_reads_match_python_ranges(
        n in 0i64..30,
        start in proptest::option::of(-40i64..40),
        stop in proptest::option::of(-40i64..40),
        step in 1i64..6,
    ) {
        let (mut file, _store) = memory_file(small_buffer());
        file.create_table("/", "t", scenario_schema(), "").unwrap();
        let rows: Vec<(i16, &str)> = (0..n).map(|i| (i as i16, "r")).collect();
        append_scenario_rows(&mut file, "/t", &rows);
        file.flush().unwrap();

        let table = file.table("/t").unwrap();
        let got: Vec<u64> = table
            .read(Slice::new(start, stop, step))
            .unwrap()
            .iter()
            .map(|r| r.row_index())
            .collect();
        prop_assert_eq!(got, python_slice(n, start, stop, step));
    }
}
