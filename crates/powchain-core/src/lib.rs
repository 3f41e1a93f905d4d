//! A small proof-of-work blockchain.
//!
//! Blocks commit to their contents with a digest from an injected
//! [`HashFunction`], are sealed by a brute-force nonce search
//! ([`ProofOfWork`]) and appended to a [`Blockchain`] that can re-verify
//! every link, digest and difficulty claim in one pass.

pub mod block;
pub mod chain;
pub mod config;
pub mod constants;
pub mod error;
pub mod hash;
pub mod pow;

pub use block::{Block, UnsealedBlock};
pub use chain::Blockchain;
pub use config::ChainConfig;
pub use error::{ChainError, ConfigError, IntegrityViolation, MiningError, ViolationKind};
pub use hash::{Hash, HashAlgorithm, HashFunction};
pub use pow::{count_leading_zero_bits, is_valid, ProofOfWork};
