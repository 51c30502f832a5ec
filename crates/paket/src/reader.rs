//! Random-access retrieval from a container file.
//!
//! A [`ContainerReader`] is Open from construction until [`ContainerReader::close`],
//! then Closed for good. It is `Send + Sync`; share it behind an `Arc`.
//!
//! Concurrency:
//! - `get_file` holds the reader's handle lock for the whole
//!   seek → read → decrypt → verify sequence, so calls never interleave.
//! - `get_file_parallel` opens its own handle per call and only reads the
//!   key and index, which never change after construction.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, RwLock};

use tracing::{debug, info, warn};

use paket_core::{Index, Mode, PaketError, PaketResult, Record};
use paket_crypto::{decrypt, derive_key, digest_matches, DerivedKey};

use crate::options::ReaderOptions;

/// Bytes returned by [`ContainerReader::get_file`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retrieved {
    /// Plaintext, or raw ciphertext when decryption was not requested
    pub data: Vec<u8>,
    /// Digest comparison result. Always `false` when verification was not
    /// requested; that means "skipped", not "failed".
    pub hash_match: bool,
}

pub struct ContainerReader {
    path: PathBuf,
    mode: Mode,
    index: Index,
    /// Primary handle for the serialized path; `None` once closed
    handle: Mutex<Option<File>>,
    /// Operational key; cleared and dropped on close
    key: RwLock<Option<DerivedKey>>,
    closed: AtomicBool,
}

impl ContainerReader {
    /// Validate `options`, derive the key and open the container.
    ///
    /// Fails with `EmptyIndex` for an index without entries, `NotFound` when
    /// the container file is missing and `TooShort` when the file cannot hold
    /// even one record's overhead. A record that overflows or reaches past the
    /// end of the file is an `InvalidRecord`.
    pub fn open(options: ReaderOptions) -> PaketResult<Self> {
        let ReaderOptions {
            key,
            salt,
            iterations,
            container_path,
            mode,
            index,
        } = options;

        if index.is_empty() {
            return Err(PaketError::EmptyIndex);
        }
        index.validate(mode)?;

        let size = std::fs::metadata(&container_path)
            .map_err(|e| not_found_or_io(e, &container_path))?
            .len();
        let min = mode.min_ciphertext_len();
        if size < min as u64 {
            return Err(PaketError::TooShort {
                len: size as usize,
                min,
            });
        }
        index.check_bounds(size)?;

        let derived = derive_key(&key, &salt, iterations)?;
        let file =
            File::open(&container_path).map_err(|e| not_found_or_io(e, &container_path))?;

        info!(
            path = %container_path.display(),
            %mode,
            entries = index.len(),
            size,
            "container opened"
        );

        Ok(Self {
            path: container_path,
            mode,
            index,
            handle: Mutex::new(Some(file)),
            key: RwLock::new(Some(derived)),
            closed: AtomicBool::new(false),
        })
    }

    /// Read one record through the shared handle.
    ///
    /// With `decrypt`, the plaintext is returned and `verify_hash` compares it
    /// against the record's original digest; without it, the stored
    /// ciphertext is returned and compared against the encrypted digest.
    /// A mismatch is reported through [`Retrieved::hash_match`], not as an error.
    pub fn get_file(&self, name: &str, decrypt: bool, verify_hash: bool) -> PaketResult<Retrieved> {
        self.ensure_open()?;
        let record = self.index.record(name)?;

        let mut guard = self.handle.lock().map_err(|_| poisoned("container handle"))?;
        let file = guard.as_mut().ok_or(PaketError::Closed)?;

        debug!(
            name,
            start = record.start,
            len = record.encrypted_len,
            mode = %self.mode,
            "reading record"
        );
        let ciphertext = read_record(file, record)?;

        let (data, expected) = if decrypt {
            let plaintext = self.decrypt_record(record, &ciphertext)?;
            (plaintext, &record.original_hash)
        } else {
            (ciphertext, &record.encrypted_hash)
        };
        drop(guard);

        let hash_match = verify_hash && digest_matches(&data, expected);
        if verify_hash && !hash_match {
            warn!(name, decrypted = decrypt, "record digest mismatch");
        }

        Ok(Retrieved { data, hash_match })
    }

    /// Read and decrypt one record through a private, short-lived handle.
    ///
    /// Safe to call from any number of threads at once. No digest check.
    pub fn get_file_parallel(&self, name: &str) -> PaketResult<Vec<u8>> {
        self.ensure_open()?;
        let record = self.index.record(name)?;

        let (_, total_encrypted) = self.get_len()?;
        if record.encrypted_len > total_encrypted {
            return Err(PaketError::InvalidRecord {
                name: name.to_string(),
                reason: format!(
                    "length {} exceeds container total {total_encrypted}",
                    record.encrypted_len
                ),
            });
        }

        let ciphertext = {
            let mut file = File::open(&self.path).map_err(|e| not_found_or_io(e, &self.path))?;
            read_record(&mut file, record)?
        };
        debug!(name, len = record.encrypted_len, "parallel read");

        self.decrypt_record(record, &ciphertext)
    }

    /// Sum of original lengths and sum of encrypted lengths over the index.
    pub fn get_len(&self) -> PaketResult<(u64, u64)> {
        self.ensure_open()?;
        self.index.total_lengths()
    }

    /// Release the file handle and zero the key. Later calls return `Closed`.
    ///
    /// Waits for an in-flight `get_file` to finish. Zeroing covers the
    /// reader's own key buffer only.
    pub fn close(&self) -> PaketResult<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(PaketError::Closed);
        }

        let file = self
            .handle
            .lock()
            .map_err(|_| poisoned("container handle"))?
            .take();
        drop(file);

        if let Some(mut key) = self.key.write().map_err(|_| poisoned("key"))?.take() {
            key.clear();
        }

        info!(path = %self.path.display(), "container closed");
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Names in the index, ascending.
    pub fn names(&self) -> PaketResult<Vec<&str>> {
        self.ensure_open()?;
        Ok(self.index.names())
    }

    pub fn contains(&self, name: &str) -> PaketResult<bool> {
        self.ensure_open()?;
        Ok(self.index.contains(name))
    }

    pub fn index(&self) -> &Index {
        &self.index
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_open(&self) -> PaketResult<()> {
        if self.is_closed() {
            Err(PaketError::Closed)
        } else {
            Ok(())
        }
    }

    fn decrypt_record(&self, record: &Record, ciphertext: &[u8]) -> PaketResult<Vec<u8>> {
        let guard = self.key.read().map_err(|_| poisoned("key"))?;
        let key = guard.as_ref().ok_or(PaketError::Closed)?;
        decrypt(key, &record.nonce, ciphertext, self.mode)
    }
}

impl Drop for ContainerReader {
    fn drop(&mut self) {
        if !self.is_closed() {
            if let Err(e) = self.close() {
                warn!(path = %self.path.display(), error = %e, "close on drop failed");
            }
        }
    }
}

impl std::fmt::Debug for ContainerReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContainerReader")
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("entries", &self.index.len())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Seek to the record and read exactly its encrypted length.
fn read_record(file: &mut File, record: &Record) -> PaketResult<Vec<u8>> {
    let available = file.metadata()?.len();
    if record.end > available {
        return Err(PaketError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("record ends at {} but container holds {available} bytes", record.end),
        )));
    }
    let len = usize::try_from(record.encrypted_len).map_err(|_| {
        PaketError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("record length {} does not fit in memory", record.encrypted_len),
        ))
    })?;
    let mut buf = vec![0u8; len];
    file.seek(SeekFrom::Start(record.start))?;
    file.read_exact(&mut buf)?;
    Ok(buf)
}

fn not_found_or_io(e: io::Error, path: &Path) -> PaketError {
    match e.kind() {
        io::ErrorKind::NotFound => PaketError::NotFound(format!("container {}", path.display())),
        _ => PaketError::Io(e),
    }
}

fn poisoned(what: &str) -> PaketError {
    PaketError::Io(io::Error::other(format!("{what} lock poisoned")))
}
