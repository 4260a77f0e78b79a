//! Shared access to one session
//!
//! A `File` has a single writer. Threads that need to share it go through
//! [`SharedFile`], which serializes every operation behind one coarse lock.

use crate::error::TreeError;
use crate::session::File;
use parking_lot::Mutex;
use std::sync::Arc;

/// Cloneable handle to a session guarded by one mutex
#[derive(Clone)]
pub struct SharedFile {
    inner: Arc<Mutex<File>>,
}

impl SharedFile {
    pub fn new(file: File) -> Self {
        Self {
            inner: Arc::new(Mutex::new(file)),
        }
    }

    /// Run `f` with exclusive access to the session
    pub fn with<R>(&self, f: impl FnOnce(&mut File) -> R) -> R {
        let mut guard = self.inner.lock();
        f(&mut guard)
    }

    /// Flush every table
    pub fn flush(&self) -> Result<usize, TreeError> {
        self.with(File::flush)
    }

    /// Close the session; every clone observes the closed state
    pub fn close(&self) -> Result<(), TreeError> {
        self.with(File::close)
    }
}

impl From<File> for SharedFile {
    fn from(file: File) -> Self {
        Self::new(file)
    }
}
