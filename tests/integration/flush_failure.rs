//! Flush behaviour when the backing store fails part way

use super::common::{append_scenario_rows, scenario_schema};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tabletree::{
    BackingStore, BlobHandle, File, MemoryBackingStore, OpenMode, StorageError, StoreConfig,
    TranslationMap, TreeError, Value,
};

/// Memory store whose writes, root updates or frees can be made to fail
struct FailingStore {
    inner: MemoryBackingStore,
    fail_writes: Arc<AtomicBool>,
    fail_root: Arc<AtomicBool>,
    fail_free: Arc<AtomicBool>,
}

fn injected() -> StorageError {
    StorageError::Io(std::io::Error::new(std::io::ErrorKind::Other, "injected failure"))
}

impl BackingStore for FailingStore {
    fn mode(&self) -> OpenMode {
        self.inner.mode()
    }

    fn allocate(&mut self, size: u64) -> Result<BlobHandle, StorageError> {
        self.inner.allocate(size)
    }

    fn read(&self, handle: BlobHandle, offset: u64, len: u64) -> Result<Vec<u8>, StorageError> {
        self.inner.read(handle, offset, len)
    }

    fn write(&mut self, handle: BlobHandle, offset: u64, bytes: &[u8]) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.write(handle, offset, bytes)
    }

    fn size(&self, handle: BlobHandle) -> Result<u64, StorageError> {
        self.inner.size(handle)
    }

    fn truncate(&mut self, handle: BlobHandle, len: u64) -> Result<(), StorageError> {
        self.inner.truncate(handle, len)
    }

    fn free(&mut self, handle: BlobHandle) -> Result<(), StorageError> {
        if self.fail_free.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.free(handle)
    }

    fn root(&self) -> Result<Option<BlobHandle>, StorageError> {
        self.inner.root()
    }

    fn set_root(&mut self, handle: BlobHandle) -> Result<(), StorageError> {
        if self.fail_root.load(Ordering::SeqCst) {
            return Err(injected());
        }
        self.inner.set_root(handle)
    }

    fn sync(&mut self) -> Result<(), StorageError> {
        self.inner.sync()
    }

    fn close(&mut self) -> Result<(), StorageError> {
        self.inner.close()
    }
}

struct Harness {
    file: File,
    store: MemoryBackingStore,
    fail_writes: Arc<AtomicBool>,
    fail_root: Arc<AtomicBool>,
    fail_free: Arc<AtomicBool>,
}

fn harness() -> Harness {
    harness_with(StoreConfig::default())
}

fn harness_with(config: StoreConfig) -> Harness {
    let store = MemoryBackingStore::new();
    let fail_writes = Arc::new(AtomicBool::new(false));
    let fail_root = Arc::new(AtomicBool::new(false));
    let fail_free = Arc::new(AtomicBool::new(false));
    let failing = FailingStore {
        inner: store.clone(),
        fail_writes: Arc::clone(&fail_writes),
        fail_root: Arc::clone(&fail_root),
        fail_free: Arc::clone(&fail_free),
    };
    let mut file = File::with_store(Box::new(failing), "failing", TranslationMap::new(), config)
        .unwrap();
    file.create_table("/", "t", scenario_schema(), "").unwrap();
    append_scenario_rows(&mut file, "/t", &[(1, "aa"), (2, "bb"), (3, "cc")]);
    file.flush().unwrap();
    Harness {
        file,
        store,
        fail_writes,
        fail_root,
        fail_free,
    }
}

/// Read-only view of what the store has durably committed
fn snapshot(store: &MemoryBackingStore) -> File {
    File::with_store(
        Box::new(store.reopen(OpenMode::Read)),
        "snapshot",
        TranslationMap::new(),
        StoreConfig::default(),
    )
    .unwrap()
}

fn counts(file: &File) -> (u64, usize) {
    let table = file.table("/t").unwrap();
    (table.nrows(), table.pending_rows())
}

#[test]
fn test_failed_data_write_keeps_rows_buffered() {
    let mut h = harness();
    append_scenario_rows(&mut h.file, "/t", &[(4, "dd"), (5, "ee")]);

    h.fail_writes.store(true, Ordering::SeqCst);
    assert!(matches!(h.file.flush(), Err(TreeError::StoreIOError(_))));
    assert_eq!(counts(&h.file), (3, 2));
    assert_eq!(h.file.table("/t").unwrap().read(..).unwrap().len(), 3);

    h.fail_writes.store(false, Ordering::SeqCst);
    assert_eq!(h.file.flush().unwrap(), 2);
    assert_eq!(counts(&h.file), (5, 0));
    assert_eq!(
        h.file.table("/t").unwrap().read_field(3.., "a").unwrap(),
        vec![Value::Int16(4), Value::Int16(5)]
    );
}

#[test]
fn test_failed_catalog_save_rolls_back_row_count() {
    let mut h = harness();
    append_scenario_rows(&mut h.file, "/t", &[(4, "dd")]);

    h.fail_root.store(true, Ordering::SeqCst);
    assert!(h.file.flush().is_err());
    assert_eq!(counts(&h.file), (3, 1));

    // the durable catalog still records three rows
    assert_eq!(snapshot(&h.store).table("/t").unwrap().nrows(), 3);

    h.fail_root.store(false, Ordering::SeqCst);
    assert_eq!(h.file.flush().unwrap(), 1);
    assert_eq!(counts(&h.file), (4, 0));
    assert_eq!(
        h.file.table("/t").unwrap().read_row(-1).unwrap().field("b").unwrap(),
        &Value::from("dd")
    );
}

#[test]
fn test_failed_close_can_be_retried() {
    let mut h = harness();
    append_scenario_rows(&mut h.file, "/t", &[(4, "dd")]);

    h.fail_writes.store(true, Ordering::SeqCst);
    assert!(h.file.close().is_err());
    assert!(!h.file.is_closed());

    h.fail_writes.store(false, Ordering::SeqCst);
    h.file.close().unwrap();
    assert!(h.file.is_closed());
}

#[test]
fn test_failed_auto_flush_does_not_keep_the_row() {
    let mut h = harness_with(StoreConfig {
        buffer_rows: 1,
        ..StoreConfig::default()
    });
    assert_eq!(counts(&h.file), (3, 0));

    h.fail_writes.store(true, Ordering::SeqCst);
    {
        let mut table = h.file.table_mut("/t").unwrap();
        let row = [Value::Int16(4), Value::from("dd")];
        assert!(table.append_row(&row).is_err());
        assert!(table.append_row(&row).is_err());
    }
    assert_eq!(counts(&h.file), (3, 0));

    h.fail_writes.store(false, Ordering::SeqCst);
    append_scenario_rows(&mut h.file, "/t", &[(4, "dd")]);
    h.file.flush().unwrap();
    assert_eq!(counts(&h.file), (4, 0));
    assert_eq!(
        h.file.table("/t").unwrap().read_field(.., "a").unwrap(),
        vec![Value::Int16(1), Value::Int16(2), Value::Int16(3), Value::Int16(4)]
    );
}

#[test]
fn test_failed_remove_keeps_node() {
    let mut h = harness();
    let blobs = h.store.blob_count();

    h.fail_root.store(true, Ordering::SeqCst);
    assert!(matches!(
        h.file.remove_node("/t", false),
        Err(TreeError::StoreIOError(_))
    ));
    assert!(h.file.get_node("/t").is_ok());
    assert_eq!(counts(&h.file), (3, 0));
    assert_eq!(h.store.blob_count(), blobs);
    assert!(snapshot(&h.store).get_node("/t").is_ok());

    h.fail_root.store(false, Ordering::SeqCst);
    h.file.remove_node("/t", false).unwrap();
    assert!(matches!(h.file.get_node("/t"), Err(TreeError::NotFound(_))));
    assert!(matches!(
        snapshot(&h.store).get_node("/t"),
        Err(TreeError::NotFound(_))
    ));
}

#[test]
fn test_commit_stands_when_freeing_old_blobs_fails() {
    let mut h = harness();
    append_scenario_rows(&mut h.file, "/t", &[(4, "dd")]);

    h.fail_free.store(true, Ordering::SeqCst);
    assert_eq!(h.file.flush().unwrap(), 1);
    assert_eq!(counts(&h.file), (4, 0));
    assert_eq!(snapshot(&h.store).table("/t").unwrap().nrows(), 4);

    h.file.remove_node("/t", false).unwrap();
    assert!(matches!(h.file.get_node("/t"), Err(TreeError::NotFound(_))));
    assert!(snapshot(&h.store).get_node("/t").is_err());
}
