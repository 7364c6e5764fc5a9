//! Streaming digests for downloaded archives
//!
//! Upstream tarballs run to gigabytes, so files are hashed through a fixed
//! buffer rather than read into memory.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use sha2::{Digest, Sha256, Sha512};

use crate::error::{Error, Result};

const BUFFER_SIZE: usize = 64 * 1024;

/// Supported digest algorithms
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha256,
    Sha512,
}

impl HashAlgorithm {
    pub const ALL: [HashAlgorithm; 2] = [HashAlgorithm::Sha256, HashAlgorithm::Sha512];

    /// Key used in `downloads.ini`.
    pub fn as_str(self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha512 => "sha512",
        }
    }

    /// Length of the hex digest.
    pub fn hex_len(self) -> usize {
        match self {
            HashAlgorithm::Sha256 => 64,
            HashAlgorithm::Sha512 => 128,
        }
    }

    /// Hash everything `reader` yields.
    pub fn hash_reader<R: Read>(self, reader: R) -> std::io::Result<String> {
        match self {
            HashAlgorithm::Sha256 => hash_with::<Sha256, R>(reader),
            HashAlgorithm::Sha512 => hash_with::<Sha512, R>(reader),
        }
    }

    /// Hash an in-memory buffer.
    pub fn hash_bytes(self, bytes: &[u8]) -> String {
        match self {
            HashAlgorithm::Sha256 => to_hex(&Sha256::digest(bytes)),
            HashAlgorithm::Sha512 => to_hex(&Sha512::digest(bytes)),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The digest an archive must have
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpectedDigest {
    pub algorithm: HashAlgorithm,
    /// Lowercase hex
    pub hex: String,
}

impl ExpectedDigest {
    /// Validate and lowercase a declared hex digest.
    pub fn new(algorithm: HashAlgorithm, hex: &str) -> std::result::Result<Self, String> {
        let hex = hex.trim().to_ascii_lowercase();
        if hex.len() != algorithm.hex_len() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(format!(
                "{} digest must be {} hex characters",
                algorithm,
                algorithm.hex_len()
            ));
        }
        Ok(Self { algorithm, hex })
    }
}

fn hash_with<D: Digest, R: Read>(reader: R) -> std::io::Result<String> {
    let mut reader = BufReader::with_capacity(BUFFER_SIZE, reader);
    let mut hasher = D::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];
    loop {
        let read = reader.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(to_hex(&hasher.finalize()))
}

fn to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    bytes.iter().fold(String::with_capacity(bytes.len() * 2), |mut out, b| {
        let _ = write!(out, "{:02x}", b);
        out
    })
}

/// Hash a file on disk.
pub fn file_digest(path: &Path, algorithm: HashAlgorithm) -> Result<String> {
    let file = File::open(path)?;
    Ok(algorithm.hash_reader(file)?)
}

/// Check a file against its expected digest.
///
/// On mismatch the file is left in place for inspection.
pub fn verify_file(path: &Path, expected: &ExpectedDigest) -> Result<()> {
    let actual = file_digest(path, expected.algorithm)?;
    if actual != expected.hex {
        return Err(Error::HashMismatch {
            path: path.to_path_buf(),
            algorithm: expected.algorithm.to_string(),
            expected: expected.hex.clone(),
            actual,
        });
    }
    Ok(())
}
