use secrecy::SecretSlice;
use std::path::PathBuf;

use paket_core::config::PaketConfig;
use paket_core::{Index, Mode};

/// Everything [`crate::ContainerReader::open`] needs, passed explicitly.
#[derive(Debug)]
pub struct ReaderOptions {
    /// Passphrase fed to PBKDF2
    pub key: SecretSlice<u8>,
    pub salt: Vec<u8>,
    /// PBKDF2 iterations, raised to 4096 if lower
    pub iterations: u32,
    pub container_path: PathBuf,
    pub mode: Mode,
    pub index: Index,
}

impl ReaderOptions {
    /// Build options from a loaded config, a runtime-supplied key and an index.
    pub fn from_config(config: &PaketConfig, key: SecretSlice<u8>, index: Index) -> Self {
        Self {
            key,
            salt: config.kdf.salt.as_bytes().to_vec(),
            iterations: config.kdf.iterations,
            container_path: config.container.path.clone(),
            mode: config.container.mode,
            index,
        }
    }
}
