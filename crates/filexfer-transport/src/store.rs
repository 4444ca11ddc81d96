//! File storage abstraction over a server- or client-side storage directory.
//!
//! Resolves a bare filename against a root directory the way the original
//! reference server does (`open(f"{storage}/{filename}", mode)`): uploads
//! append in binary mode (creating the file if absent), downloads read in
//! binary mode. A missing file on download is surfaced as `Ok(None)` rather
//! than an error — the dispatcher turns that into session teardown per the
//! finish-path policy, not into a distinct wire-level error.

use std::fs::{File, OpenOptions};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use filexfer_common::FileTransferError;

pub trait Store {
    /// Append `bytes` to the named file, creating it if it does not exist
    /// yet. Called once per received `Data` chunk — the store, not the
    /// caller, owns the file handle lifetime.
    fn append(&self, filename: &str, bytes: &[u8]) -> Result<(), FileTransferError>;

    /// Open the named file for binary read. `Ok(None)` means the file does
    /// not exist under this store's root.
    fn open_for_download(
        &self,
        filename: &str,
    ) -> Result<Option<Box<dyn Read + Send>>, FileTransferError>;
}

pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        FsStore { root: root.into() }
    }

    fn resolve(&self, filename: &str) -> PathBuf {
        self.root.join(Path::new(filename))
    }
}

impl Store for FsStore {
    fn append(&self, filename: &str, bytes: &[u8]) -> Result<(), FileTransferError> {
        let path = self.resolve(filename);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        use std::io::Write;
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        file.write_all(bytes)?;
        Ok(())
    }

    fn open_for_download(
        &self,
        filename: &str,
    ) -> Result<Option<Box<dyn Read + Send>>, FileTransferError> {
        match File::open(self.resolve(filename)) {
            Ok(file) => Ok(Some(Box::new(file))),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod fake {
    //! An in-memory store for tests, avoiding any real filesystem access.

    use super::*;
    use std::collections::HashMap;
    use std::io::Cursor;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct FakeStore {
        files: Mutex<HashMap<String, Vec<u8>>>,
        read_limits: Mutex<HashMap<String, usize>>,
    }

    impl FakeStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn seed(&self, filename: &str, contents: Vec<u8>) {
            self.files.lock().unwrap().insert(filename.to_owned(), contents);
        }

        /// Seed a file whose reader yields at most `max_read` bytes per
        /// `read()` call, regardless of the caller's buffer size — for
        /// exercising multi-chunk delivery of a file smaller than a single
        /// `Data` payload budget (a real socket or pipe can just as easily
        /// hand back a short read).
        pub fn seed_with_read_limit(&self, filename: &str, contents: Vec<u8>, max_read: usize) {
            self.seed(filename, contents);
            self.read_limits.lock().unwrap().insert(filename.to_owned(), max_read);
        }

        pub fn contents_of(&self, filename: &str) -> Option<Vec<u8>> {
            self.files.lock().unwrap().get(filename).cloned()
        }
    }

    impl Store for FakeStore {
        fn append(&self, filename: &str, bytes: &[u8]) -> Result<(), FileTransferError> {
            self.files
                .lock()
                .unwrap()
                .entry(filename.to_owned())
                .or_default()
                .extend_from_slice(bytes);
            Ok(())
        }

        fn open_for_download(
            &self,
            filename: &str,
        ) -> Result<Option<Box<dyn Read + Send>>, FileTransferError> {
            let limit = self.read_limits.lock().unwrap().get(filename).copied();
            match self.contents_of(filename) {
                Some(bytes) => match limit {
                    Some(max_read) => Ok(Some(Box::new(LimitedReader { inner: Cursor::new(bytes), max_read }))),
                    None => Ok(Some(Box::new(Cursor::new(bytes)))),
                },
                None => Ok(None),
            }
        }
    }

    /// Wraps a reader so each individual `read()` call returns at most
    /// `max_read` bytes, independent of the caller-supplied buffer size.
    struct LimitedReader<R> {
        inner: R,
        max_read: usize,
    }

    impl<R: Read> Read for LimitedReader<R> {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let cap = buf.len().min(self.max_read).max(1);
            self.inner.read(&mut buf[..cap])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fake::FakeStore;
    use super::*;

    #[test]
    fn append_accumulates_chunks() {
        let store = FakeStore::new();
        store.append("out.bin", b"hello ").unwrap();
        store.append("out.bin", b"world").unwrap();
        assert_eq!(store.contents_of("out.bin").unwrap(), b"hello world");
    }

    #[test]
    fn download_of_missing_file_is_none() {
        let store = FakeStore::new();
        assert!(store.open_for_download("missing.bin").unwrap().is_none());
    }

    #[test]
    fn download_reads_back_seeded_bytes() {
        let store = FakeStore::new();
        store.seed("hello.txt", b"abc".to_vec());
        let mut reader = store.open_for_download("hello.txt").unwrap().unwrap();
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).unwrap();
        assert_eq!(buf, b"abc");
    }

    #[test]
    fn read_limited_download_yields_one_byte_per_call() {
        let store = FakeStore::new();
        store.seed_with_read_limit("pq.bin", b"PQ".to_vec(), 1);
        let mut reader = store.open_for_download("pq.bin").unwrap().unwrap();
        let mut buf = [0u8; 16];
        assert_eq!(reader.read(&mut buf).unwrap(), 1);
        assert_eq!(&buf[..1], b"P");
        assert_eq!(reader.read(&mut buf).unwrap(), 1);
        assert_eq!(&buf[..1], b"Q");
        assert_eq!(reader.read(&mut buf).unwrap(), 0);
    }
}
