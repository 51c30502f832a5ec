//! Producing a container and its index in one pass.
//!
//! Each payload is encrypted once, appended in call order, and described by
//! a [`Record`] with both digests. GCM records get a fresh random nonce;
//! reuse of a nonce under the same key is not detected.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use paket_core::{Index, Mode, PaketError, PaketResult, Record};
use paket_crypto::{digest, encrypt, DerivedKey};

pub struct ContainerWriter {
    path: PathBuf,
    file: BufWriter<File>,
    key: DerivedKey,
    mode: Mode,
    index: Index,
    offset: u64,
}

impl ContainerWriter {
    /// Create a new container at `path`. An existing file is never overwritten.
    pub fn create(path: impl AsRef<Path>, key: DerivedKey, mode: Mode) -> PaketResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)?;

        debug!(path = %path.display(), %mode, "container created");

        Ok(Self {
            path,
            file: BufWriter::new(file),
            key,
            mode,
            index: Index::new(),
            offset: 0,
        })
    }

    /// Encrypt `plaintext` and append it under `name`.
    pub fn append(&mut self, name: &str, plaintext: &[u8]) -> PaketResult<&Record> {
        if self.index.contains(name) {
            return Err(PaketError::InvalidRecord {
                name: name.to_string(),
                reason: "duplicate name".into(),
            });
        }

        let sealed = encrypt(&self.key, None, plaintext, self.mode)?;
        self.file.write_all(&sealed.data)?;

        let start = self.offset;
        let encrypted_len = sealed.data.len() as u64;
        self.offset += encrypted_len;

        let record = Record {
            start,
            end: self.offset,
            original_len: plaintext.len() as u64,
            encrypted_len,
            original_hash: digest(plaintext),
            encrypted_hash: digest(&sealed.data),
            nonce: sealed.nonce,
        };
        debug!(name, start, len = encrypted_len, "record appended");

        self.index.insert(name, record);
        self.index
            .get(name)
            .ok_or_else(|| PaketError::NotFound(name.to_string()))
    }

    /// Bytes written so far.
    pub fn len(&self) -> u64 {
        self.offset
    }

    pub fn is_empty(&self) -> bool {
        self.offset == 0
    }

    /// Flush to disk and hand back the index describing the container.
    pub fn finish(self) -> PaketResult<Index> {
        if self.index.is_empty() {
            return Err(PaketError::EmptyIndex);
        }
        let file = self
            .file
            .into_inner()
            .map_err(|e| PaketError::Io(e.into_error()))?;
        file.sync_all()?;

        info!(
            path = %self.path.display(),
            entries = self.index.len(),
            bytes = self.offset,
            mode = %self.mode,
            "container written"
        );
        Ok(self.index)
    }
}
