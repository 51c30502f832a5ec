//! paket-crypto: the encryption engine behind paket containers
//!
//! Key handling:
//! ```text
//! passphrase + salt ──PBKDF2-HMAC-SHA256 (≥ 4096 rounds)──▶ 256-bit key
//!   └── AES-256 in one of CBC / CFB / CTR / OFB / GCM per container
//! ```
//!
//! Every record is encrypted independently: IV-based modes prefix a random
//! 16-byte IV, GCM appends a 16-byte tag and leaves its 12-byte nonce to the
//! index. SHA-256 digests of plaintext and ciphertext back the advisory
//! integrity check for the non-AEAD modes.

pub mod cipher;
pub mod hash;
pub mod kdf;
pub mod random;

pub use cipher::{decrypt, encrypt, Sealed};
pub use hash::{digest, digest_matches};
pub use kdf::{derive_key, effective_iterations, DerivedKey, MIN_ITERATIONS};
pub use random::{generate_nonce, random_bytes};

/// Size of a derived key in bytes (AES-256)
pub const KEY_SIZE: usize = 32;
