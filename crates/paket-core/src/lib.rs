//! paket-core: shared vocabulary for the paket container family.
//!
//! A container is a single file holding concatenated ciphertext blobs. It has
//! no header and no embedded index: every blob is located through an
//! externally supplied [`Index`] mapping a logical name to a [`Record`].

pub mod config;
pub mod error;
pub mod types;

pub use error::{PaketError, PaketResult};
pub use types::{Digest, Index, Mode, Record, BLOCK_SIZE, DIGEST_SIZE, GCM_NONCE_SIZE, TAG_SIZE};
