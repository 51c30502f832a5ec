//! Shared fixtures: write a container with known contents, open a reader on it.

#![allow(dead_code)]

use paket::{ContainerReader, ContainerWriter, Index, Mode, ReaderOptions};
use paket_crypto::derive_key;
use secrecy::SecretSlice;
use std::path::{Path, PathBuf};

pub const KEY_MATERIAL: &[u8; 32] = b"0123456789abcdef0123456789abcdef";
pub const SALT: &[u8] = b"s";
pub const ITERATIONS: u32 = 4096;

pub fn passphrase() -> SecretSlice<u8> {
    SecretSlice::from(KEY_MATERIAL.to_vec())
}

/// Deterministic, non-repeating payload of `len` bytes.
pub fn payload(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i.wrapping_mul(31) as u8) ^ seed)
        .collect()
}

pub fn write_container(dir: &Path, mode: Mode, files: &[(&str, Vec<u8>)]) -> (PathBuf, Index) {
    let path = dir.join(format!("{}.pack", mode.to_string().to_lowercase()));
    let key = derive_key(&passphrase(), SALT, ITERATIONS).expect("derive key");
    let mut writer = ContainerWriter::create(&path, key, mode).expect("create container");
    for (name, data) in files {
        writer.append(name, data).expect("append record");
    }
    let index = writer.finish().expect("finish container");
    (path, index)
}

pub fn open_reader(path: PathBuf, mode: Mode, index: Index) -> ContainerReader {
    ContainerReader::open(ReaderOptions {
        key: passphrase(),
        salt: SALT.to_vec(),
        iterations: ITERATIONS,
        container_path: path,
        mode,
        index,
    })
    .expect("open reader")
}
