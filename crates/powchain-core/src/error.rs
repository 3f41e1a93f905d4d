use std::fmt;
use thiserror::Error;

/// Problems detected while building a chain. Fatal: no chain is created.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("difficulty {difficulty} exceeds the {max}-bit digest width")]
    DifficultyTooHigh { difficulty: u32, max: u32 },

    #[error("unknown hash algorithm: {0}")]
    UnknownHashAlgorithm(String),

    #[error("configured hash algorithm {configured} does not match the provided hasher {provided}")]
    HashAlgorithmMismatch { configured: String, provided: String },

    #[error("invalid configuration json: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MiningError {
    #[error("no nonce satisfied the difficulty after {attempts} attempts")]
    Exhausted { attempts: u64 },
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Mining(#[from] MiningError),

    #[error("a chain needs at least a genesis block")]
    EmptyChain,

    #[error("tip index {tip} has no successor")]
    IndexOverflow { tip: u64 },
}

/// Which chain invariant a block broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// Block 0 is not this chain's designated genesis block.
    GenesisMismatch,
    /// The block's index does not match its position.
    IndexMismatch,
    /// `previous_digest` does not match the predecessor's digest.
    BrokenLink,
    /// The stored digest differs from the recomputed one.
    DigestMismatch,
    /// The digest does not carry enough leading zero bits.
    InsufficientWork,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ViolationKind::GenesisMismatch => "genesis mismatch",
            ViolationKind::IndexMismatch => "index mismatch",
            ViolationKind::BrokenLink => "broken link",
            ViolationKind::DigestMismatch => "digest mismatch",
            ViolationKind::InsufficientWork => "insufficient work",
        };
        f.write_str(s)
    }
}

/// First integrity failure found by `Blockchain::validate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("integrity violation at block {index}: {kind}")]
pub struct IntegrityViolation {
    pub index: u64,
    pub kind: ViolationKind,
}

impl IntegrityViolation {
    pub fn new(index: u64, kind: ViolationKind) -> Self {
        Self { index, kind }
    }
}
