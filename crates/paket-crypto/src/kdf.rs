//! Key derivation: PBKDF2-HMAC-SHA256 passphrase → 256-bit AES key

use hmac::Hmac;
use secrecy::{ExposeSecret, SecretSlice};
use sha2::Sha256;
use zeroize::Zeroize;

use paket_core::{PaketError, PaketResult};

use crate::KEY_SIZE;

/// Lowest iteration count [`derive_key`] will run; smaller requests are raised to it.
pub const MIN_ITERATIONS: u32 = 4096;

/// A 256-bit key derived from a passphrase via PBKDF2.
///
/// Zeroized on drop and on [`DerivedKey::clear`]. Zeroing only covers this
/// buffer: copies made earlier (by the caller, the allocator, or swap) are
/// out of reach.
#[derive(Clone)]
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }

    /// Overwrite the key bytes with zeros.
    pub fn clear(&mut self) {
        self.bytes.zeroize();
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Iteration count actually used for a requested `iterations`.
pub fn effective_iterations(iterations: u32) -> u32 {
    iterations.max(MIN_ITERATIONS)
}

/// Derive a 256-bit key from a passphrase and salt using PBKDF2-HMAC-SHA256.
///
/// Deterministic for identical inputs. Iteration counts below
/// [`MIN_ITERATIONS`] are silently raised. The salt is opaque and may be any
/// length; keeping it unique per container is the caller's job.
pub fn derive_key(
    passphrase: &SecretSlice<u8>,
    salt: &[u8],
    iterations: u32,
) -> PaketResult<DerivedKey> {
    let rounds = effective_iterations(iterations);
    if rounds != iterations {
        tracing::debug!(requested = iterations, rounds, "raising PBKDF2 iterations to floor");
    }

    let mut key = [0u8; KEY_SIZE];
    pbkdf2::pbkdf2::<Hmac<Sha256>>(passphrase.expose_secret(), salt, rounds, &mut key)
        .map_err(|e| PaketError::Crypto(format!("PBKDF2 failed: {e}")))?;

    Ok(DerivedKey::from_bytes(key))
}
