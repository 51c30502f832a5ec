//! AES-256 encryption/decryption dispatched over [`Mode`]
//!
//! Record layouts:
//! ```text
//! CBC      [16 bytes: IV][PKCS#7-padded ciphertext]
//! CFB/CTR/OFB  [16 bytes: IV][ciphertext, same length as plaintext]
//! GCM      [ciphertext][16 bytes: tag]      (12-byte nonce kept in the Record)
//! ```
//!
//! Only GCM authenticates. For the IV-based modes a wrong key or a flipped
//! byte decrypts to garbage without error; integrity there rests on the
//! digests stored in the index.
//!
//! Each GCM record must get its own nonce under a given key. Nothing here
//! detects reuse.

use aes::Aes256;
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use cfb_mode::cipher::AsyncStreamCipher;
use ctr::cipher::StreamCipher;

use paket_core::{Mode, PaketError, PaketResult, BLOCK_SIZE, GCM_NONCE_SIZE};

use crate::kdf::DerivedKey;
use crate::random::{generate_nonce, random_bytes};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;
type Aes256CfbEnc = cfb_mode::Encryptor<Aes256>;
type Aes256CfbDec = cfb_mode::Decryptor<Aes256>;
type Aes256Ctr = ctr::Ctr128BE<Aes256>;
type Aes256Ofb = ofb::Ofb<Aes256>;

/// Output of [`encrypt`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    /// Bytes to append to the container
    pub data: Vec<u8>,
    /// GCM nonce to store in the Record; empty for the IV-based modes
    pub nonce: Vec<u8>,
}

/// Encrypt `plaintext` under `key` in `mode`.
///
/// `iv_or_nonce` is the 16-byte IV for CBC/CFB/CTR/OFB or the 12-byte nonce
/// for GCM; `None` draws a fresh random one.
pub fn encrypt(
    key: &DerivedKey,
    iv_or_nonce: Option<&[u8]>,
    plaintext: &[u8],
    mode: Mode,
) -> PaketResult<Sealed> {
    match mode {
        Mode::Gcm => {
            let nonce = match iv_or_nonce {
                Some(nonce) => nonce.to_vec(),
                None => generate_nonce().to_vec(),
            };
            let data = gcm_seal(key, &nonce, plaintext)?;
            Ok(Sealed { data, nonce })
        }
        Mode::Cbc => {
            let iv = resolve_iv(iv_or_nonce)?;
            let body = Aes256CbcEnc::new_from_slices(key.as_bytes(), &iv)
                .map_err(construction_error)?
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext);
            Ok(iv_prefixed(iv, &body))
        }
        Mode::Cfb => {
            let iv = resolve_iv(iv_or_nonce)?;
            let mut buf = plaintext.to_vec();
            Aes256CfbEnc::new_from_slices(key.as_bytes(), &iv)
                .map_err(construction_error)?
                .encrypt(&mut buf);
            Ok(iv_prefixed(iv, &buf))
        }
        Mode::Ctr | Mode::Ofb => {
            let iv = resolve_iv(iv_or_nonce)?;
            let mut buf = plaintext.to_vec();
            apply_keystream(key, &iv, &mut buf, mode)?;
            Ok(iv_prefixed(iv, &buf))
        }
    }
}

/// Decrypt a record produced by [`encrypt`].
///
/// `nonce` is only read for GCM. Input shorter than
/// [`Mode::min_ciphertext_len`] fails with `TooShort` before any slicing.
pub fn decrypt(
    key: &DerivedKey,
    nonce: &[u8],
    ciphertext: &[u8],
    mode: Mode,
) -> PaketResult<Vec<u8>> {
    let min = mode.min_ciphertext_len();
    if ciphertext.len() < min {
        return Err(PaketError::TooShort {
            len: ciphertext.len(),
            min,
        });
    }

    match mode {
        Mode::Gcm => gcm_open(key, nonce, ciphertext),
        Mode::Cbc => {
            let (iv, body) = ciphertext.split_at(BLOCK_SIZE);
            Aes256CbcDec::new_from_slices(key.as_bytes(), iv)
                .map_err(construction_error)?
                .decrypt_padded_vec_mut::<Pkcs7>(body)
                .map_err(|_| {
                    PaketError::Crypto("CBC padding invalid: wrong key or corrupted data".into())
                })
        }
        Mode::Cfb => {
            let (iv, body) = ciphertext.split_at(BLOCK_SIZE);
            let mut buf = body.to_vec();
            Aes256CfbDec::new_from_slices(key.as_bytes(), iv)
                .map_err(construction_error)?
                .decrypt(&mut buf);
            Ok(buf)
        }
        Mode::Ctr | Mode::Ofb => {
            let (iv, body) = ciphertext.split_at(BLOCK_SIZE);
            let mut buf = body.to_vec();
            apply_keystream(key, iv, &mut buf, mode)?;
            Ok(buf)
        }
    }
}

/// The caller's IV, or a fresh random one. Must be exactly one block.
fn resolve_iv(iv: Option<&[u8]>) -> PaketResult<Vec<u8>> {
    let iv = match iv {
        Some(iv) => iv.to_vec(),
        None => random_bytes(BLOCK_SIZE)?,
    };
    if iv.len() != BLOCK_SIZE {
        return Err(PaketError::Crypto(format!(
            "IV must be {BLOCK_SIZE} bytes, got {}",
            iv.len()
        )));
    }
    Ok(iv)
}

fn iv_prefixed(mut iv: Vec<u8>, body: &[u8]) -> Sealed {
    iv.extend_from_slice(body);
    Sealed {
        data: iv,
        nonce: Vec::new(),
    }
}

/// CTR and OFB are symmetric: the same keystream XOR encrypts and decrypts.
fn apply_keystream(key: &DerivedKey, iv: &[u8], buf: &mut [u8], mode: Mode) -> PaketResult<()> {
    match mode {
        Mode::Ctr => Aes256Ctr::new_from_slices(key.as_bytes(), iv)
            .map_err(construction_error)?
            .apply_keystream(buf),
        Mode::Ofb => Aes256Ofb::new_from_slices(key.as_bytes(), iv)
            .map_err(construction_error)?
            .apply_keystream(buf),
        other => {
            return Err(PaketError::Crypto(format!("{other} is not a keystream mode")));
        }
    }
    Ok(())
}

fn gcm_cipher(key: &DerivedKey, nonce: &[u8]) -> PaketResult<Aes256Gcm> {
    if nonce.len() != GCM_NONCE_SIZE {
        return Err(PaketError::Crypto(format!(
            "GCM nonce must be {GCM_NONCE_SIZE} bytes, got {}",
            nonce.len()
        )));
    }
    Aes256Gcm::new_from_slice(key.as_bytes()).map_err(construction_error)
}

fn gcm_seal(key: &DerivedKey, nonce: &[u8], plaintext: &[u8]) -> PaketResult<Vec<u8>> {
    gcm_cipher(key, nonce)?
        .encrypt(Nonce::from_slice(nonce), plaintext)
        .map_err(|e| PaketError::Crypto(format!("GCM encryption failed: {e}")))
}

fn gcm_open(key: &DerivedKey, nonce: &[u8], ciphertext: &[u8]) -> PaketResult<Vec<u8>> {
    gcm_cipher(key, nonce)?
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| {
            PaketError::Crypto("GCM decryption failed: invalid key, nonce, or corrupted data".into())
        })
}

fn construction_error(e: impl std::fmt::Display) -> PaketError {
    PaketError::Crypto(format!("cipher construction failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KEY_SIZE;
    use paket_core::TAG_SIZE;
    use proptest::prelude::*;

    fn test_key() -> DerivedKey {
        DerivedKey::from_bytes([42u8; KEY_SIZE])
    }

    fn roundtrip(mode: Mode, plaintext: &[u8]) -> Vec<u8> {
        let key = test_key();
        let sealed = encrypt(&key, None, plaintext, mode).unwrap();
        decrypt(&key, &sealed.nonce, &sealed.data, mode).unwrap()
    }

    #[test]
    fn test_roundtrip_all_modes() {
        let plaintext = b"hello, encrypted world!";
        for mode in Mode::ALL {
            assert_eq!(roundtrip(mode, plaintext), plaintext, "{mode}");
        }
    }

    #[test]
    fn test_roundtrip_empty_and_single_byte() {
        for mode in Mode::ALL {
            assert_eq!(roundtrip(mode, b""), b"", "{mode} empty");
            assert_eq!(roundtrip(mode, b"x"), b"x", "{mode} single byte");
        }
    }

    #[test]
    fn test_encrypted_size_matches_overhead() {
        let key = test_key();
        for mode in Mode::ALL {
            for len in [0usize, 1, 15, 16, 17, 1000] {
                let sealed = encrypt(&key, None, &vec![0u8; len], mode).unwrap();
                assert_eq!(
                    Some(sealed.data.len() as u64),
                    mode.encrypted_len(len as u64),
                    "{mode} len {len}"
                );
            }
        }
    }

    #[test]
    fn test_gcm_nonce_not_embedded() {
        let key = test_key();
        let nonce = [9u8; GCM_NONCE_SIZE];
        let sealed = encrypt(&key, Some(&nonce), b"abc", Mode::Gcm).unwrap();

        assert_eq!(sealed.nonce, nonce);
        // ciphertext (3) + tag (16), no nonce prefix
        assert_eq!(sealed.data.len(), 3 + TAG_SIZE);
    }

    #[test]
    fn test_iv_modes_prefix_iv() {
        let key = test_key();
        let iv = [3u8; BLOCK_SIZE];
        for mode in [Mode::Cbc, Mode::Cfb, Mode::Ctr, Mode::Ofb] {
            let sealed = encrypt(&key, Some(&iv), b"prefix check", mode).unwrap();
            assert_eq!(&sealed.data[..BLOCK_SIZE], &iv);
            assert!(sealed.nonce.is_empty());
        }
    }

    #[test]
    fn test_random_iv_differs() {
        let key = test_key();
        let a = encrypt(&key, None, b"same", Mode::Ctr).unwrap();
        let b = encrypt(&key, None, b"same", Mode::Ctr).unwrap();
        assert_ne!(a.data, b.data);
    }

    #[test]
    fn test_modes_produce_distinct_ciphertext() {
        let key = test_key();
        let iv = [1u8; BLOCK_SIZE];
        let plaintext = [0x55u8; 40];
        let cfb = encrypt(&key, Some(&iv), &plaintext, Mode::Cfb).unwrap();
        let ctr = encrypt(&key, Some(&iv), &plaintext, Mode::Ctr).unwrap();
        let ofb = encrypt(&key, Some(&iv), &plaintext, Mode::Ofb).unwrap();
        assert_ne!(cfb.data, ctr.data);
        assert_ne!(ctr.data, ofb.data);
    }

    #[test]
    fn test_too_short() {
        let key = test_key();
        for mode in Mode::ALL {
            let result = decrypt(&key, &[0u8; GCM_NONCE_SIZE], &[0u8; 15], mode);
            assert!(
                matches!(result, Err(PaketError::TooShort { len: 15, min: 16 })),
                "{mode}"
            );
        }
    }

    #[test]
    fn test_bad_iv_length() {
        let key = test_key();
        for mode in [Mode::Cbc, Mode::Cfb, Mode::Ctr, Mode::Ofb] {
            let result = encrypt(&key, Some(&[0u8; GCM_NONCE_SIZE]), b"data", mode);
            assert!(matches!(result, Err(PaketError::Crypto(_))), "{mode}");
        }
    }

    #[test]
    fn test_minimum_length_input_every_mode() {
        // Exactly one block: empty body for the IV modes, bare tag for GCM
        let key = test_key();
        let block = [0u8; BLOCK_SIZE];
        for mode in Mode::ALL {
            match decrypt(&key, &[0u8; GCM_NONCE_SIZE], &block, mode) {
                Ok(plain) => assert!(plain.is_empty(), "{mode}"),
                Err(e) => assert!(matches!(e, PaketError::Crypto(_)), "{mode}: {e}"),
            }
        }
    }

    #[test]
    fn test_bad_nonce_length() {
        let key = test_key();
        assert!(matches!(
            encrypt(&key, Some(&[0u8; 16]), b"data", Mode::Gcm),
            Err(PaketError::Crypto(_))
        ));
        let sealed = encrypt(&key, None, b"data", Mode::Gcm).unwrap();
        assert!(matches!(
            decrypt(&key, &[], &sealed.data, Mode::Gcm),
            Err(PaketError::Crypto(_))
        ));
    }

    #[test]
    fn test_gcm_tampered_ciphertext() {
        let key = test_key();
        let mut sealed = encrypt(&key, None, b"secret data", Mode::Gcm).unwrap();
        sealed.data[0] ^= 0xFF;

        let result = decrypt(&key, &sealed.nonce, &sealed.data, Mode::Gcm);
        assert!(result.is_err(), "tampered ciphertext must fail");
    }

    #[test]
    fn test_gcm_wrong_key() {
        let sealed = encrypt(&test_key(), None, b"secret data", Mode::Gcm).unwrap();
        let other = DerivedKey::from_bytes([1u8; KEY_SIZE]);
        assert!(decrypt(&other, &sealed.nonce, &sealed.data, Mode::Gcm).is_err());
    }

    #[test]
    fn test_ctr_tamper_is_silent() {
        let key = test_key();
        let mut sealed = encrypt(&key, None, b"secret data", Mode::Ctr).unwrap();
        sealed.data[BLOCK_SIZE] ^= 0x01;

        // No authentication: decryption succeeds with a flipped bit
        let plaintext = decrypt(&key, &[], &sealed.data, Mode::Ctr).unwrap();
        assert_ne!(plaintext, b"secret data");
        assert_eq!(plaintext[0], b's' ^ 0x01);
    }

    #[test]
    fn test_cbc_rejects_unaligned_body() {
        let key = test_key();
        let mut sealed = encrypt(&key, None, b"cbc body", Mode::Cbc).unwrap();
        sealed.data.pop();
        assert!(matches!(
            decrypt(&key, &[], &sealed.data, Mode::Cbc),
            Err(PaketError::Crypto(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_roundtrip_every_mode(data in proptest::collection::vec(any::<u8>(), 0..300)) {
            for mode in Mode::ALL {
                prop_assert_eq!(roundtrip(mode, &data), data.clone());
            }
        }
    }
}
