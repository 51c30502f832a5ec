//! CSPRNG-backed key material, IVs and nonces

use rand::RngCore;

use paket_core::{PaketError, PaketResult, GCM_NONCE_SIZE};

/// Random bytes for IVs and fresh key material, `16 <= len <= 32`.
pub fn random_bytes(len: usize) -> PaketResult<Vec<u8>> {
    if !(16..=32).contains(&len) {
        return Err(PaketError::Crypto(format!(
            "random key material must be 16..=32 bytes, got {len}"
        )));
    }
    let mut bytes = vec![0u8; len];
    rand::thread_rng().fill_bytes(&mut bytes);
    Ok(bytes)
}

/// A fresh 12-byte GCM nonce.
pub fn generate_nonce() -> [u8; GCM_NONCE_SIZE] {
    let mut nonce = [0u8; GCM_NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce);
    nonce
}
