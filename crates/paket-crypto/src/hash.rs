//! SHA-256 digests for record integrity checks

use sha2::{Digest as _, Sha256};
use subtle::ConstantTimeEq;

use paket_core::Digest;

/// SHA-256 of `data`.
pub fn digest(data: &[u8]) -> Digest {
    Sha256::digest(data).into()
}

/// Whether `data` hashes to `expected`, compared in constant time.
pub fn digest_matches(data: &[u8], expected: &Digest) -> bool {
    digest(data).as_slice().ct_eq(expected.as_slice()).into()
}
