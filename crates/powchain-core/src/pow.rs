//! Nonce search and the leading-zero-bits difficulty predicate.

use crate::{
    block::{Block, UnsealedBlock},
    constants::{DIGEST_BITS, EXHAUSTION_WARNING_FACTOR},
    error::{ConfigError, MiningError},
    hash::{Hash, HashFunction},
};
use rayon::prelude::*;
use tracing::{info, warn};

pub fn count_leading_zero_bits(hash: &Hash) -> u32 {
    let mut total = 0u32;
    for b in hash {
        if *b == 0 {
            total += 8;
        } else {
            total += b.leading_zeros();
            break;
        }
    }
    total
}

/// True iff the first `difficulty` bits of `digest` are zero.
///
/// A difficulty wider than the digest can never be met.
pub fn is_valid(digest: &Hash, difficulty: u32) -> bool {
    difficulty <= DIGEST_BITS && count_leading_zero_bits(digest) >= difficulty
}

/// Mining parameters: the difficulty and an optional attempt ceiling.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProofOfWork {
    difficulty: u32,
    max_attempts: Option<u64>,
}

impl ProofOfWork {
    pub fn new(difficulty: u32) -> Result<Self, ConfigError> {
        if difficulty > DIGEST_BITS {
            return Err(ConfigError::DifficultyTooHigh {
                difficulty,
                max: DIGEST_BITS,
            });
        }
        Ok(Self {
            difficulty,
            max_attempts: None,
        })
    }

    /// Give up after `max_attempts` digests instead of searching the whole nonce space.
    pub fn with_max_attempts(mut self, max_attempts: Option<u64>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn max_attempts(&self) -> Option<u64> {
        self.max_attempts
    }

    pub fn is_satisfied_by(&self, digest: &Hash) -> bool {
        is_valid(digest, self.difficulty)
    }

    /// Mean number of digests needed to meet the difficulty: 2^difficulty.
    pub fn expected_attempts(&self) -> f64 {
        2f64.powi(self.difficulty as i32)
    }

    fn warning_threshold(&self) -> Option<u64> {
        1u64.checked_shl(self.difficulty)
            .and_then(|expected| expected.checked_mul(EXHAUSTION_WARNING_FACTOR))
    }

    fn warn_exhaustion(&self, index: u64, attempts: u64) {
        warn!(
            index,
            attempts,
            expected = self.expected_attempts(),
            "mining is far past the expected attempt count; check the hash function"
        );
    }

    /// Increments the nonce from its current value until the digest meets the
    /// difficulty, then seals the block.
    pub fn mine<H: HashFunction>(
        &self,
        mut block: UnsealedBlock,
        hasher: &H,
    ) -> Result<Block, MiningError> {
        let limit = self.max_attempts.unwrap_or(u64::MAX);
        let warn_at = self.warning_threshold();
        let mut attempts = 0u64;

        loop {
            if attempts == limit {
                warn!(
                    index = block.index(),
                    attempts, "mining gave up at the attempt ceiling"
                );
                return Err(MiningError::Exhausted { attempts });
            }
            attempts += 1;

            if self.is_satisfied_by(block.digest()) {
                info!(
                    "Mined block {} with nonce {} and hash {} after {} attempts",
                    block.index(),
                    block.nonce(),
                    hex::encode(block.digest()),
                    attempts
                );
                return Ok(block.seal());
            }

            if warn_at == Some(attempts) {
                self.warn_exhaustion(block.index(), attempts);
            }

            let next = block
                .nonce()
                .checked_add(1)
                .ok_or(MiningError::Exhausted { attempts })?;
            block.set_nonce(next);
            block.recompute_digest(hasher);
        }
    }

    /// Same search as `mine`, spread over the rayon pool.
    ///
    /// `find_first` keeps the result identical to the sequential search: the
    /// lowest satisfying nonce wins.
    pub fn mine_parallel<H: HashFunction>(
        &self,
        mut block: UnsealedBlock,
        hasher: &H,
    ) -> Result<Block, MiningError> {
        let start = block.nonce();
        let end = match self.max_attempts {
            Some(n) => start.saturating_add(n),
            None => u64::MAX,
        };

        let found = (start..end).into_par_iter().find_first(|nonce| {
            let digest = block.digest_with_nonce(hasher, *nonce);
            self.is_satisfied_by(&digest)
        });

        // Workers don't share a counter; judge the search by how far it got.
        let attempts = found.map_or(end - start, |nonce| nonce - start + 1);
        if self.warning_threshold().is_some_and(|t| attempts >= t) {
            self.warn_exhaustion(block.index(), attempts);
        }

        match found {
            Some(nonce) => {
                block.set_nonce(nonce);
                block.recompute_digest(hasher);
                info!(
                    "Mined block {} with nonce {} and hash {} (parallel)",
                    block.index(),
                    nonce,
                    hex::encode(block.digest())
                );
                Ok(block.seal())
            }
            None => {
                warn!(index = block.index(), attempts, "parallel mining gave up");
                Err(MiningError::Exhausted { attempts })
            }
        }
    }
}
