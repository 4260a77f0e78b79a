//! Shared fixtures

use tabletree::{
    File, MemoryBackingStore, ScalarType, SchemaDescriptor, StoreConfig, TranslationMap,
};

/// `{a: Int16, b: FixedString(4)}`
pub fn scenario_schema() -> SchemaDescriptor {
    SchemaDescriptor::builder()
        .field("a", ScalarType::Int16)
        .field("b", ScalarType::FixedString(4))
        .build()
        .unwrap()
}

pub fn particle_schema() -> SchemaDescriptor {
    SchemaDescriptor::builder()
        .field("ADCcount", ScalarType::Int16)
        .field("TDCcount", ScalarType::UInt8)
        .field("grid_i", ScalarType::Int32)
        .field("grid_j", ScalarType::Int32)
        .field("idnumber", ScalarType::Int64)
        .field("name", ScalarType::FixedString(16))
        .vector("pressure", ScalarType::Float32, 2)
        .field("temperature", ScalarType::Float64)
        .build()
        .unwrap()
}

pub fn translation() -> TranslationMap {
    TranslationMap::from_pairs([("detector", "for"), ("table", " 11 ")]).unwrap()
}

/// Memory-backed file plus a handle that can reopen the same contents
pub fn memory_file(config: StoreConfig) -> (File, MemoryBackingStore) {
    let store = MemoryBackingStore::new();
    let file = File::with_store(
        Box::new(store.clone()),
        "memory",
        TranslationMap::new(),
        config,
    )
    .unwrap();
    (file, store)
}

pub fn append_scenario_rows(file: &mut File, path: &str, rows: &[(i16, &str)]) {
    let mut table = file.table_mut(path).unwrap();
    let mut row = table.row();
    for (a, b) in rows {
        row.set("a", *a).unwrap().set("b", *b).unwrap();
        row.append().unwrap();
    }
}
