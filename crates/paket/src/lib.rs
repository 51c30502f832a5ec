//! paket: an append-only, single-file encrypted container
//!
//! A container is the raw concatenation of individually encrypted blobs. It
//! carries no header, magic or footer; an [`Index`] supplied out of band maps
//! each logical name to its byte range, lengths, SHA-256 digests and (for GCM)
//! nonce.
//!
//! ```no_run
//! use paket::{ContainerReader, Index, Mode, ReaderOptions};
//! use secrecy::SecretSlice;
//!
//! # fn main() -> paket::PaketResult<()> {
//! let index = Index::load(std::path::Path::new("data.index.json"))?;
//! let reader = ContainerReader::open(ReaderOptions {
//!     key: SecretSlice::from(b"passphrase".to_vec()),
//!     salt: b"salt".to_vec(),
//!     iterations: 4096,
//!     container_path: "data.pack".into(),
//!     mode: Mode::Ctr,
//!     index,
//! })?;
//!
//! let file = reader.get_file("a.txt", true, true)?;
//! assert!(file.hash_match);
//! reader.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! Two retrieval paths exist side by side. [`ContainerReader::get_file`]
//! serializes every call over the reader's one file handle and can verify
//! digests. [`ContainerReader::get_file_parallel`] opens a private handle per
//! call, so any number of threads can use it at once.

pub mod options;
pub mod reader;
pub mod writer;

pub use options::ReaderOptions;
pub use reader::{ContainerReader, Retrieved};
pub use writer::ContainerWriter;

pub use paket_core::{Digest, Index, Mode, PaketError, PaketResult, Record};
