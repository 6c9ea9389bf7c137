//! Where image bytes come from.

#![allow(missing_docs)]

use std::fs;
use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

/// Reads the bytes of one image file.
pub trait ContentSource {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>>;
}

/// Reads straight from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsSource;

impl ContentSource for FsSource {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        fs::read(path)
    }
}

/// Wraps another source and counts every read attempt.
///
/// Lets callers verify that reused records cost no I/O.
#[derive(Debug, Default)]
pub struct CountingSource<S = FsSource> {
    inner: S,
    reads: AtomicU64,
}

impl<S: ContentSource> CountingSource<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            reads: AtomicU64::new(0),
        }
    }

    /// Reads attempted so far, failed ones included.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.reads.store(0, Ordering::Relaxed);
    }
}

impl<S: ContentSource> ContentSource for CountingSource<S> {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.inner.read(path)
    }
}

impl<S: ContentSource + ?Sized> ContentSource for &S {
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        (**self).read(path)
    }
}
