use crate::{
    constants::{DEFAULT_DIFFICULTY, DEFAULT_HASH_ALGORITHM, GENESIS_PAYLOAD},
    error::ConfigError,
    hash::{HashAlgorithm, HashFunction},
    pow::ProofOfWork,
};
use serde::{Deserialize, Serialize};

/// Tunables for one chain. Missing JSON fields fall back to the defaults.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Leading zero bits every block digest must carry, genesis included.
    pub difficulty: u32,
    pub genesis_payload: String,
    /// Identifier of the hash algorithm the chain is pinned to.
    pub hash_algorithm: String,
    /// Optional ceiling on digests tried per block before mining fails.
    pub max_attempts: Option<u64>,
    pub parallel_mining: bool,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            difficulty: DEFAULT_DIFFICULTY,
            genesis_payload: GENESIS_PAYLOAD.to_string(),
            hash_algorithm: DEFAULT_HASH_ALGORITHM.to_string(),
            max_attempts: None,
            parallel_mining: false,
        }
    }
}

impl ChainConfig {
    pub fn with_difficulty(difficulty: u32) -> Self {
        Self {
            difficulty,
            ..Self::default()
        }
    }

    /// Parses a JSON configuration and checks the difficulty.
    ///
    /// `hash_algorithm` is resolved when the chain is built: built-in ids by
    /// `Blockchain::new`, any other id against the hasher given to
    /// `Blockchain::with_hasher`.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.proof_of_work()?;
        Ok(config)
    }

    /// Checks the difficulty and that `hash_algorithm` is a built-in id.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.proof_of_work()?;
        self.algorithm()?;
        Ok(())
    }

    /// Checks the difficulty and that `hash_algorithm` names `hasher`.
    pub fn validate_for<H: HashFunction>(&self, hasher: &H) -> Result<(), ConfigError> {
        self.proof_of_work()?;
        let matches = match self.algorithm() {
            Ok(alg) => alg.id() == hasher.id(),
            Err(_) => self.hash_algorithm.eq_ignore_ascii_case(hasher.id()),
        };
        if !matches {
            return Err(ConfigError::HashAlgorithmMismatch {
                configured: self.hash_algorithm.clone(),
                provided: hasher.id().to_string(),
            });
        }
        Ok(())
    }

    pub fn algorithm(&self) -> Result<HashAlgorithm, ConfigError> {
        self.hash_algorithm.parse()
    }

    pub fn proof_of_work(&self) -> Result<ProofOfWork, ConfigError> {
        Ok(ProofOfWork::new(self.difficulty)?.with_max_attempts(self.max_attempts))
    }
}
