use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::{PaketError, PaketResult};

/// AES block size; also the IV length for the IV-based modes.
pub const BLOCK_SIZE: usize = 16;

/// GCM authentication tag length.
pub const TAG_SIZE: usize = 16;

/// GCM nonce length (96-bit).
pub const GCM_NONCE_SIZE: usize = 12;

/// SHA-256 output length.
pub const DIGEST_SIZE: usize = 32;

/// A SHA-256 digest, serialized as 64 lowercase hex chars.
pub type Digest = [u8; DIGEST_SIZE];

/// Symmetric cipher mode used for every record of a container.
///
/// The explicit discriminants are the numeric tags callers persist.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Cbc = 1,
    Cfb = 2,
    #[default]
    Ctr = 3,
    Ofb = 4,
    Gcm = 5,
}

impl Mode {
    pub const ALL: [Mode; 5] = [Mode::Cbc, Mode::Cfb, Mode::Ctr, Mode::Ofb, Mode::Gcm];

    /// Numeric tag, as accepted by `Mode::try_from(u8)`.
    pub fn tag(self) -> u8 {
        self as u8
    }

    pub fn is_aead(self) -> bool {
        matches!(self, Mode::Gcm)
    }

    /// Nonce bytes a [`Record`] carries for this mode (0 or 12).
    pub fn nonce_len(self) -> usize {
        match self {
            Mode::Gcm => GCM_NONCE_SIZE,
            _ => 0,
        }
    }

    /// Smallest ciphertext the mode can decrypt: one block (the IV) for the
    /// IV-based modes, the tag for GCM.
    pub fn min_ciphertext_len(self) -> usize {
        match self {
            Mode::Gcm => TAG_SIZE,
            _ => BLOCK_SIZE,
        }
    }

    /// Exact number of bytes encryption adds to a plaintext of `original_len`.
    ///
    /// CBC pads with PKCS#7, so its overhead is the IV plus 1..=16 pad bytes.
    pub fn overhead(self, original_len: u64) -> u64 {
        let block = BLOCK_SIZE as u64;
        match self {
            Mode::Cbc => block + (block - original_len % block),
            Mode::Cfb | Mode::Ctr | Mode::Ofb => block,
            Mode::Gcm => TAG_SIZE as u64,
        }
    }

    /// Ciphertext length for a plaintext of `original_len`; `None` on overflow.
    pub fn encrypted_len(self, original_len: u64) -> Option<u64> {
        original_len.checked_add(self.overhead(original_len))
    }

    fn name(self) -> &'static str {
        match self {
            Mode::Cbc => "cbc",
            Mode::Cfb => "cfb",
            Mode::Ctr => "ctr",
            Mode::Ofb => "ofb",
            Mode::Gcm => "gcm",
        }
    }
}

impl TryFrom<u8> for Mode {
    type Error = PaketError;

    fn try_from(tag: u8) -> PaketResult<Self> {
        match tag {
            1 => Ok(Mode::Cbc),
            2 => Ok(Mode::Cfb),
            3 => Ok(Mode::Ctr),
            4 => Ok(Mode::Ofb),
            5 => Ok(Mode::Gcm),
            other => Err(PaketError::InvalidMode(other)),
        }
    }
}

impl FromStr for Mode {
    type Err = PaketError;

    fn from_str(s: &str) -> PaketResult<Self> {
        Mode::ALL
            .into_iter()
            .find(|m| m.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| PaketError::Config(format!("unknown cipher mode '{s}'")))
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name().to_ascii_uppercase())
    }
}

/// Location and integrity metadata of one blob inside a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Offset of the first ciphertext byte
    pub start: u64,
    /// Offset one past the last ciphertext byte
    pub end: u64,
    /// Plaintext length
    pub original_len: u64,
    /// Ciphertext length, always `end - start`
    pub encrypted_len: u64,
    /// SHA-256 of the plaintext
    #[serde(with = "hex_digest")]
    pub original_hash: Digest,
    /// SHA-256 of the ciphertext as stored
    #[serde(with = "hex_digest")]
    pub encrypted_hash: Digest,
    /// GCM nonce; empty for the IV-based modes
    #[serde(default, with = "hex_bytes", skip_serializing_if = "Vec::is_empty")]
    pub nonce: Vec<u8>,
}

impl Record {
    /// Check the record against the layout rules for `mode`.
    pub fn validate(&self, name: &str, mode: Mode) -> PaketResult<()> {
        if self.end <= self.start {
            return Err(PaketError::invalid_record(
                name,
                format!("end {} is not past start {}", self.end, self.start),
            ));
        }
        if self.encrypted_len != self.end - self.start {
            return Err(PaketError::invalid_record(
                name,
                format!(
                    "encrypted length {} does not match span {}..{}",
                    self.encrypted_len, self.start, self.end
                ),
            ));
        }
        let expected = mode.encrypted_len(self.original_len).ok_or_else(|| {
            PaketError::invalid_record(
                name,
                format!("original length {} overflows under {mode}", self.original_len),
            )
        })?;
        if self.encrypted_len != expected {
            return Err(PaketError::invalid_record(
                name,
                format!(
                    "encrypted length {} but {mode} over {} bytes yields {expected}",
                    self.encrypted_len, self.original_len
                ),
            ));
        }
        if self.nonce.len() != mode.nonce_len() {
            return Err(PaketError::invalid_record(
                name,
                format!(
                    "nonce is {} bytes, {mode} expects {}",
                    self.nonce.len(),
                    mode.nonce_len()
                ),
            ));
        }
        Ok(())
    }
}

/// Immutable name → [`Record`] mapping supplied alongside a container.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Index {
    records: BTreeMap<String, Record>,
}

impl Index {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a record, returning the previous one for `name`.
    pub fn insert(&mut self, name: impl Into<String>, record: Record) -> Option<Record> {
        self.records.insert(name.into(), record)
    }

    pub fn get(&self, name: &str) -> Option<&Record> {
        self.records.get(name)
    }

    /// Like [`Index::get`], but a miss is a typed `NotFound`.
    pub fn record(&self, name: &str) -> PaketResult<&Record> {
        self.records
            .get(name)
            .ok_or_else(|| PaketError::NotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Names in ascending order.
    pub fn names(&self) -> Vec<&str> {
        self.records.keys().map(String::as_str).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Record)> {
        self.records.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Sum of original lengths and sum of encrypted lengths.
    pub fn total_lengths(&self) -> PaketResult<(u64, u64)> {
        if self.records.is_empty() {
            return Err(PaketError::EmptyIndex);
        }
        self.records
            .iter()
            .try_fold((0u64, 0u64), |(orig, enc), (name, r)| {
                match (
                    orig.checked_add(r.original_len),
                    enc.checked_add(r.encrypted_len),
                ) {
                    (Some(orig), Some(enc)) => Ok((orig, enc)),
                    _ => Err(PaketError::invalid_record(name, "running length total overflows u64")),
                }
            })
    }

    /// Check that every record lies within a container of `container_len` bytes.
    pub fn check_bounds(&self, container_len: u64) -> PaketResult<()> {
        for (name, record) in &self.records {
            if record.end > container_len {
                return Err(PaketError::invalid_record(
                    name,
                    format!(
                        "ends at {} but the container holds {container_len} bytes",
                        record.end
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Validate every record for `mode`.
    pub fn validate(&self, mode: Mode) -> PaketResult<()> {
        if self.records.is_empty() {
            return Err(PaketError::EmptyIndex);
        }
        for (name, record) in &self.records {
            record.validate(name, mode)?;
        }
        self.total_lengths().map(|_| ())
    }

    pub fn to_json(&self) -> PaketResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| PaketError::Config(format!("index serialization: {e}")))
    }

    pub fn from_json(data: &str) -> PaketResult<Self> {
        serde_json::from_str(data)
            .map_err(|e| PaketError::Config(format!("index deserialization: {e}")))
    }

    pub fn load(path: &Path) -> PaketResult<Self> {
        let data = std::fs::read_to_string(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => {
                PaketError::NotFound(format!("index file {}", path.display()))
            }
            _ => PaketError::Io(e),
        })?;
        let index = Self::from_json(&data)?;
        tracing::debug!(path = %path.display(), entries = index.len(), "index loaded");
        Ok(index)
    }

    pub fn save(&self, path: &Path) -> PaketResult<()> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

impl FromIterator<(String, Record)> for Index {
    fn from_iter<I: IntoIterator<Item = (String, Record)>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

mod hex_digest {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    use super::{Digest, DIGEST_SIZE};

    pub fn serialize<S: Serializer>(digest: &Digest, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(digest))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Digest, D::Error> {
        let s = String::deserialize(d)?;
        let mut out = [0u8; DIGEST_SIZE];
        hex::decode_to_slice(&s, &mut out).map_err(D::Error::custom)?;
        Ok(out)
    }
}

mod hex_bytes {
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(d)?;
        hex::decode(s).map_err(D::Error::custom)
    }
}
