//! Digest utilities for artifact verification and release checksums.
//!
//! This module provides:
//! - `Digest512`: a full SHA-512 digest rendered as uppercase hex
//! - `digest_reader()`: streaming digest over any reader in fixed-size blocks
//! - `digest_file()`: single file digest
//! - `digest_bytes()`: arbitrary byte digest

use std::fs;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};

use crate::consts::DIGEST_BLOCK_SIZE;

/// Number of hex characters in a SHA-512 digest.
pub const DIGEST_HEX_LEN: usize = 128;

/// A full SHA-512 digest.
///
/// # Format
///
/// Uppercase hexadecimal string (128 characters), matching the format used by
/// allow-list files and `.sha512` sidecars.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Digest512(pub String);

impl std::fmt::Display for Digest512 {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl Digest512 {
  /// Parse a digest from user-supplied text.
  ///
  /// Accepts either case and surrounding whitespace. Returns `None` unless the
  /// value is exactly 128 hex characters.
  pub fn parse(value: &str) -> Option<Self> {
    let trimmed = value.trim();
    if trimmed.len() != DIGEST_HEX_LEN || !trimmed.chars().all(|c| c.is_ascii_hexdigit()) {
      return None;
    }
    Some(Self(trimmed.to_ascii_uppercase()))
  }
}

/// Error while reading content for a digest.
#[derive(Debug, thiserror::Error)]
#[error("failed to read {path}: {source}")]
pub struct DigestError {
  pub path: String,
  #[source]
  pub source: std::io::Error,
}

/// Digest everything readable from `reader`.
///
/// Content is consumed in `DIGEST_BLOCK_SIZE` blocks so memory use does not
/// depend on the size of the input.
pub fn digest_reader<R: Read>(mut reader: R) -> std::io::Result<Digest512> {
  let mut hasher = Sha512::new();
  let mut buffer = [0u8; DIGEST_BLOCK_SIZE];

  loop {
    let bytes_read = reader.read(&mut buffer)?;
    if bytes_read == 0 {
      break;
    }
    hasher.update(&buffer[..bytes_read]);
  }

  Ok(Digest512(hex::encode_upper(hasher.finalize())))
}

/// Digest a file's contents.
pub fn digest_file(path: &Path) -> Result<Digest512, DigestError> {
  let to_err = |source| DigestError {
    path: path.display().to_string(),
    source,
  };
  let file = fs::File::open(path).map_err(to_err)?;
  digest_reader(file).map_err(to_err)
}

/// Digest arbitrary bytes.
pub fn digest_bytes(data: &[u8]) -> Digest512 {
  let mut hasher = Sha512::new();
  hasher.update(data);
  Digest512(hex::encode_upper(hasher.finalize()))
}
