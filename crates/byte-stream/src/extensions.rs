//! Stream extensions: decorators that observe every `read`/`write` on a base
//! stream and perform a side effect, matching spec §4.1's "counter" and
//! "hasher" extensions. Extensions compose by stacking: each pass-through
//! delegates to the base stream before returning.

use crate::digest::Digest384;
use sha2::{Digest, Sha384};
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

/// Wraps a base stream and counts the bytes observed through it.
pub struct CountingStream<T> {
    inner: T,
    count: AtomicU64,
}

impl<T> CountingStream<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            count: AtomicU64::new(0),
        }
    }

    pub fn reset(&self) {
        self.count.store(0, Ordering::SeqCst);
    }

    pub fn get(&self) -> u64 {
        self.count.load(Ordering::SeqCst)
    }

    pub fn get_and_reset(&self) -> u64 {
        self.count.swap(0, Ordering::SeqCst)
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read> Read for CountingStream<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count.fetch_add(n as u64, Ordering::SeqCst);
        Ok(n)
    }
}

impl<T: Write> Write for CountingStream<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.count.fetch_add(n as u64, Ordering::SeqCst);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Wraps a base stream and feeds observed bytes into a running SHA-384 digest
/// while `start_hashing`/`finish_hashing` have gated hashing on.
pub struct HashingStream<T> {
    inner: T,
    hasher: Mutex<Option<Sha384>>,
}

impl<T> HashingStream<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            hasher: Mutex::new(None),
        }
    }

    /// Begins feeding subsequently observed bytes into the digest.
    pub fn start_hashing(&self) {
        *self.hasher.lock().expect("hasher mutex poisoned") = Some(Sha384::new());
    }

    /// Stops feeding bytes, returns the digest accumulated since
    /// `start_hashing`, and resets internal state so a later
    /// `start_hashing` begins a fresh digest.
    pub fn finish_hashing(&self) -> Option<Digest384> {
        let mut guard = self.hasher.lock().expect("hasher mutex poisoned");
        guard.take().map(|hasher| {
            let out = hasher.finalize();
            let mut bytes = [0u8; 48];
            bytes.copy_from_slice(&out);
            Digest384(bytes)
        })
    }

    fn observe(&self, bytes: &[u8]) {
        if let Some(hasher) = self.hasher.lock().expect("hasher mutex poisoned").as_mut() {
            hasher.update(bytes);
        }
    }

    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Read> Read for HashingStream<T> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.observe(&buf[..n]);
        Ok(n)
    }
}

impl<T: Write> Write for HashingStream<T> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.observe(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
