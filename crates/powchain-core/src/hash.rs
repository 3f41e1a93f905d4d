//! Hash functions a chain can be pinned to.

use crate::{constants::HASH_SIZE, error::ConfigError};
use sha2::{Digest, Sha256};
use std::{fmt, str::FromStr};

pub type Hash = [u8; HASH_SIZE];

/// A deterministic, fixed-width one-way hash.
///
/// Every block of a chain is hashed with the same implementation; `id` names
/// the algorithm so a configuration can be checked against it.
pub trait HashFunction: Send + Sync {
    fn id(&self) -> &str;
    fn digest(&self, bytes: &[u8]) -> Hash;
}

#[inline]
pub fn sha256(data: &[u8]) -> Hash {
    let digest = Sha256::digest(data);
    let mut out = [0u8; HASH_SIZE];
    out.copy_from_slice(&digest[..]);
    out
}

/// SHA256(SHA256(data)).
#[inline]
pub fn double_sha256(data: &[u8]) -> Hash {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut out = [0u8; HASH_SIZE];
    out.copy_from_slice(&second[..]);
    out
}

/// The built-in algorithms, selectable by identifier.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    DoubleSha256,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::DoubleSha256 => "sha256d",
        }
    }
}

impl HashFunction for HashAlgorithm {
    fn id(&self) -> &str {
        self.as_str()
    }

    fn digest(&self, bytes: &[u8]) -> Hash {
        match self {
            HashAlgorithm::Sha256 => sha256(bytes),
            HashAlgorithm::DoubleSha256 => double_sha256(bytes),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sha256" | "sha-256" => Ok(HashAlgorithm::Sha256),
            "sha256d" | "double-sha256" => Ok(HashAlgorithm::DoubleSha256),
            _ => Err(ConfigError::UnknownHashAlgorithm(s.to_string())),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
