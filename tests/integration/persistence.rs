//! Close/reopen behaviour over the sled and memory stores

use super::common::{append_scenario_rows, memory_file, scenario_schema};
use std::io::Write;
use tabletree::{
    ArrayData, ByteOrder, ConfigLoader, File, OpenMode, ScalarType, StorageError, StoreConfig,
    TranslationMap, TreeError, Value,
};
use tempfile::TempDir;

#[test]
fn test_array_round_trip_is_bit_identical() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("arrays.db");
    let values = [0.1, -2.5e-300, f64::MAX, f64::MIN_POSITIVE, f64::NAN, -0.0];
    let data = ArrayData::new(
        ScalarType::Float64,
        vec![3, 2],
        values.iter().map(|v| Value::Float64(*v)).collect(),
    )
    .unwrap();

    {
        let mut file = File::open(&path, OpenMode::Write, TranslationMap::new()).unwrap();
        file.create_array("/", "grid", &data, "floats").unwrap();
        file.close().unwrap();
    }

    let file = File::open(&path, OpenMode::Read, TranslationMap::new()).unwrap();
    let array = file.array("/grid").unwrap();
    assert_eq!(array.shape(), &[3, 2]);
    assert_eq!(array.dtype(), ScalarType::Float64);
    assert_eq!(array.title(), "floats");

    let read = array.read().unwrap();
    let bits: Vec<u64> = read
        .values()
        .iter()
        .map(|v| match v {
            Value::Float64(f) => f.to_bits(),
            other => panic!("unexpected value {:?}", other),
        })
        .collect();
    let expected: Vec<u64> = values.iter().map(|v| v.to_bits()).collect();
    assert_eq!(bits, expected);

    let second_row = array.read_index(-2).unwrap();
    assert_eq!(
        second_row.as_list().unwrap()[0].as_scalar(),
        Some(&Value::Float64(f64::MAX))
    );
    assert!(matches!(
        array.read_index(3),
        Err(TreeError::IndexOutOfRange { .. })
    ));
}

#[test]
fn test_array_rewrite_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("arrays.db");
    let replacement = ArrayData::from_rows(vec![vec![10i64, 20, 30], vec![40, 50, 60]]).unwrap();

    {
        let mut file = File::open(&path, OpenMode::Write, TranslationMap::new()).unwrap();
        let initial = ArrayData::from_rows(vec![vec![1i64, 2, 3], vec![4, 5, 6]]).unwrap();
        file.create_array("/", "counts", &initial, "").unwrap();
        file.close().unwrap();
    }
    {
        let mut file = File::open(&path, OpenMode::Append, TranslationMap::new()).unwrap();
        file.array_mut("/counts").unwrap().write(&replacement).unwrap();
        assert!(matches!(
            file.array_mut("/counts")
                .unwrap()
                .write(&ArrayData::from_vec(vec![1i64, 2]).unwrap()),
            Err(TreeError::ShapeError(_))
        ));
        file.close().unwrap();
    }

    let mut file = File::open(&path, OpenMode::Read, TranslationMap::new()).unwrap();
    assert_eq!(file.array("/counts").unwrap().read().unwrap(), replacement);
    assert!(matches!(
        file.array_mut("/counts").unwrap().write(&replacement),
        Err(TreeError::ReadOnly)
    ));
}

#[test]
fn test_append_mode_continues_rows() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("rows.db");

    {
        let mut file = File::open(&path, OpenMode::Write, TranslationMap::new()).unwrap();
        file.create_table("/", "t", scenario_schema(), "").unwrap();
        append_scenario_rows(&mut file, "/t", &[(1, "aa"), (2, "bb")]);
        // rows still buffered here are flushed by close
        file.close().unwrap();
    }
    {
        let mut file = File::open(&path, OpenMode::Append, TranslationMap::new()).unwrap();
        assert_eq!(file.table("/t").unwrap().nrows(), 2);
        append_scenario_rows(&mut file, "/t", &[(3, "cc")]);
        // dropping closes the file
    }

    let file = File::open(&path, OpenMode::Read, TranslationMap::new()).unwrap();
    let table = file.table("/t").unwrap();
    assert_eq!(
        table.read_field(.., "a").unwrap(),
        vec![Value::Int16(1), Value::Int16(2), Value::Int16(3)]
    );
}

#[test]
fn test_read_mode_rejects_mutation() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("ro.db");
    assert!(matches!(
        File::open(&path, OpenMode::Read, TranslationMap::new()),
        Err(TreeError::StoreIOError(StorageError::Missing(_)))
    ));

    {
        let mut file = File::open(&path, OpenMode::Write, TranslationMap::new()).unwrap();
        file.create_table("/", "t", scenario_schema(), "").unwrap();
    }

    let mut file = File::open(&path, OpenMode::Read, TranslationMap::new()).unwrap();
    assert_eq!(file.mode(), OpenMode::Read);
    assert!(matches!(
        file.create_group("/", "g", ""),
        Err(TreeError::ReadOnly)
    ));
    assert!(matches!(file.remove_node("/t", false), Err(TreeError::ReadOnly)));
    let mut table = file.table_mut("/t").unwrap();
    assert!(matches!(
        table.append_row(&[Value::from(1), Value::from("x")]),
        Err(TreeError::ReadOnly)
    ));
    assert_eq!(file.flush().unwrap(), 0);
    file.close().unwrap();
}

#[test]
fn test_write_mode_starts_empty() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("fresh.db");
    {
        let mut file = File::open(&path, OpenMode::Write, TranslationMap::new()).unwrap();
        file.create_group("/", "g", "").unwrap();
    }
    let file = File::open(&path, OpenMode::Write, TranslationMap::new()).unwrap();
    assert!(file.root().children().is_empty());
}

#[test]
fn test_memory_store_reopen() {
    let (mut file, store) = memory_file(StoreConfig::default());
    file.create_group("/", "g", "kept").unwrap();
    file.close().unwrap();
    drop(file);

    let reopened = File::with_store(
        Box::new(store.reopen(OpenMode::Append)),
        "memory",
        TranslationMap::new(),
        StoreConfig::default(),
    )
    .unwrap();
    assert_eq!(reopened.get_node("/g").unwrap().title(), "kept");
}

#[test]
fn test_byteorder_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let config_path = temp_dir.path().join("tabletree.toml");
    let mut config_file = std::fs::File::create(&config_path).unwrap();
    writeln!(config_file, "default_byteorder = \"big\"").unwrap();
    writeln!(config_file, "buffer_rows = 2").unwrap();
    drop(config_file);

    let config = ConfigLoader::load_from_file(&config_path).unwrap();
    assert_eq!(config.buffer_rows, 2);

    let path = temp_dir.path().join("endian.db");
    {
        let mut file =
            File::open_with_config(&path, OpenMode::Write, TranslationMap::new(), &config).unwrap();
        file.create_table("/", "t", scenario_schema(), "").unwrap();
        append_scenario_rows(&mut file, "/t", &[(258, "ab"), (-2, "cd"), (7, "ef")]);
        // buffer_rows = 2 flushed the first pair already
        assert_eq!(file.table("/t").unwrap().nrows(), 2);
        file.create_array("/", "a", &ArrayData::from_vec(vec![1u16, 2]).unwrap(), "")
            .unwrap();
    }

    let file = File::open(&path, OpenMode::Read, TranslationMap::new()).unwrap();
    let table = file.table("/t").unwrap();
    assert_eq!(table.byteorder(), ByteOrder::Big);
    assert_eq!(
        table.read_field(.., "a").unwrap(),
        vec![Value::Int16(258), Value::Int16(-2), Value::Int16(7)]
    );
    let array = file.array("/a").unwrap();
    assert_eq!(array.byteorder(), ByteOrder::Big);
    assert_eq!(
        array.read().unwrap().values(),
        &[Value::UInt16(1), Value::UInt16(2)]
    );
}
