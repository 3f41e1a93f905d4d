use crate::{
    constants::HASH_SIZE,
    hash::{Hash, HashFunction},
};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds since the Unix epoch, or 0 if the clock reads before it.
pub fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

/// The byte string a block digest commits to.
///
/// Layout: index, timestamp and payload length as big-endian u64, the raw
/// payload, the 32-byte previous digest, then the nonce as big-endian u64.
pub fn canonical_bytes(
    index: u64,
    timestamp: u64,
    payload: &[u8],
    previous_digest: &Hash,
    nonce: u64,
) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(8 + 8 + 8 + payload.len() + 32 + 8);
    bytes.extend_from_slice(&index.to_be_bytes());
    bytes.extend_from_slice(&timestamp.to_be_bytes());
    bytes.extend_from_slice(&(payload.len() as u64).to_be_bytes());
    bytes.extend_from_slice(payload);
    bytes.extend_from_slice(previous_digest);
    bytes.extend_from_slice(&nonce.to_be_bytes());
    bytes
}

/// A block still being mined. Only the nonce (and with it the digest) changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnsealedBlock {
    index: u64,
    timestamp: u64,
    payload: Vec<u8>,
    previous_digest: Hash,
    nonce: u64,
    digest: Hash,
}

impl UnsealedBlock {
    pub fn new<H: HashFunction>(
        index: u64,
        timestamp: u64,
        payload: impl Into<Vec<u8>>,
        previous_digest: Hash,
        hasher: &H,
    ) -> Self {
        let mut block = Self {
            index,
            timestamp,
            payload: payload.into(),
            previous_digest,
            nonce: 0,
            digest: [0u8; HASH_SIZE],
        };
        block.recompute_digest(hasher);
        block
    }

    pub fn recompute_digest<H: HashFunction>(&mut self, hasher: &H) {
        self.digest = self.digest_with_nonce(hasher, self.nonce);
    }

    /// Digest this block would have with `nonce`, without touching it.
    pub fn digest_with_nonce<H: HashFunction>(&self, hasher: &H, nonce: u64) -> Hash {
        hasher.digest(&canonical_bytes(
            self.index,
            self.timestamp,
            &self.payload,
            &self.previous_digest,
            nonce,
        ))
    }

    /// Changes the nonce. The digest is stale until `recompute_digest`.
    pub fn set_nonce(&mut self, nonce: u64) {
        self.nonce = nonce;
    }

    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn previous_digest(&self) -> &Hash {
        &self.previous_digest
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn digest(&self) -> &Hash {
        &self.digest
    }

    /// Freezes the block. Only proof-of-work hands out sealed blocks.
    pub(crate) fn seal(self) -> Block {
        Block {
            index: self.index,
            timestamp: self.timestamp,
            payload: self.payload,
            previous_digest: self.previous_digest,
            nonce: self.nonce,
            digest: self.digest,
        }
    }
}

/// A mined block. Read-only once sealed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub(crate) index: u64,
    pub(crate) timestamp: u64,
    pub(crate) payload: Vec<u8>,
    pub(crate) previous_digest: Hash,
    pub(crate) nonce: u64,
    pub(crate) digest: Hash,
}

impl Block {
    pub fn index(&self) -> u64 {
        self.index
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn previous_digest(&self) -> &Hash {
        &self.previous_digest
    }

    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    pub fn digest(&self) -> &Hash {
        &self.digest
    }

    pub fn digest_hex(&self) -> String {
        hex::encode(self.digest)
    }

    pub fn hash_bytes(&self) -> Vec<u8> {
        canonical_bytes(
            self.index,
            self.timestamp,
            &self.payload,
            &self.previous_digest,
            self.nonce,
        )
    }

    /// Recomputes the digest from the current fields; the stored one is untouched.
    pub fn compute_digest<H: HashFunction>(&self, hasher: &H) -> Hash {
        hasher.digest(&self.hash_bytes())
    }
}
