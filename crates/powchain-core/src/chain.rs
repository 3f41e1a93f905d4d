use crate::{
    block::{now_secs, Block, UnsealedBlock},
    config::ChainConfig,
    constants::{GENESIS_PREVIOUS_DIGEST, GENESIS_TIMESTAMP},
    error::{ChainError, ConfigError, IntegrityViolation, MiningError, ViolationKind},
    hash::{HashAlgorithm, HashFunction},
    pow::ProofOfWork,
};
use tracing::{debug, warn};

/// An append-only sequence of mined blocks, pinned to one hash function.
///
/// The sequence always starts with the genesis block and is never empty.
#[derive(Clone, Debug)]
pub struct Blockchain<H: HashFunction = HashAlgorithm> {
    hasher: H,
    config: ChainConfig,
    pow: ProofOfWork,
    blocks: Vec<Block>,
}

impl Blockchain<HashAlgorithm> {
    /// Builds a chain on the algorithm named by `config.hash_algorithm`.
    pub fn new(config: ChainConfig) -> Result<Self, ChainError> {
        let hasher = config.algorithm()?;
        Self::with_hasher(config, hasher)
    }
}

impl<H: HashFunction> Blockchain<H> {
    /// Builds a chain on an injected hash function and mines its genesis block.
    pub fn with_hasher(config: ChainConfig, hasher: H) -> Result<Self, ChainError> {
        let pow = check_config(&config, &hasher)?;
        let mut chain = Self {
            hasher,
            config,
            pow,
            blocks: Vec::with_capacity(1),
        };
        let genesis = chain.create_genesis()?;
        chain.blocks.push(genesis);
        Ok(chain)
    }

    /// Wraps blocks obtained elsewhere (e.g. deserialized). Nothing is
    /// checked beyond non-emptiness; run `validate` before trusting them.
    pub fn from_blocks(config: ChainConfig, hasher: H, blocks: Vec<Block>) -> Result<Self, ChainError> {
        let pow = check_config(&config, &hasher)?;
        if blocks.is_empty() {
            return Err(ChainError::EmptyChain);
        }
        Ok(Self {
            hasher,
            config,
            pow,
            blocks,
        })
    }

    fn create_genesis(&self) -> Result<Block, MiningError> {
        let candidate = UnsealedBlock::new(
            0,
            GENESIS_TIMESTAMP,
            self.config.genesis_payload.as_bytes(),
            GENESIS_PREVIOUS_DIGEST,
            &self.hasher,
        );
        let genesis = self.mine(candidate)?;
        debug!(digest = %genesis.digest_hex(), "genesis block created");
        Ok(genesis)
    }

    fn mine(&self, candidate: UnsealedBlock) -> Result<Block, MiningError> {
        if self.config.parallel_mining {
            self.pow.mine_parallel(candidate, &self.hasher)
        } else {
            self.pow.mine(candidate, &self.hasher)
        }
    }

    /// Mines `payload` on top of the tip, stamped with the current time.
    pub fn append(&mut self, payload: impl Into<Vec<u8>>) -> Result<&Block, ChainError> {
        self.append_at(payload, now_secs())
    }

    /// Like `append` with an explicit timestamp. A timestamp older than the
    /// tip's is raised to the tip's so timestamps never decrease.
    pub fn append_at(
        &mut self,
        payload: impl Into<Vec<u8>>,
        timestamp: u64,
    ) -> Result<&Block, ChainError> {
        let tip = self.tip();
        let index = tip
            .index()
            .checked_add(1)
            .ok_or(ChainError::IndexOverflow { tip: tip.index() })?;
        let candidate = UnsealedBlock::new(
            index,
            timestamp.max(tip.timestamp()),
            payload,
            *tip.digest(),
            &self.hasher,
        );
        let block = self.mine(candidate)?;
        self.blocks.push(block);
        Ok(self.tip())
    }

    /// Walks the chain once and reports the first broken invariant.
    ///
    /// Per block, in order: genesis identity (block 0) or linkage to the
    /// predecessor, index position, digest recomputation, difficulty.
    pub fn validate(&self) -> Result<(), IntegrityViolation> {
        for (position, block) in self.blocks.iter().enumerate() {
            let index = position as u64;
            let fail = |kind| {
                let violation = IntegrityViolation::new(index, kind);
                warn!(%violation, "chain validation failed");
                Err(violation)
            };

            if position == 0 {
                if !self.is_genesis(block) {
                    return fail(ViolationKind::GenesisMismatch);
                }
            } else if block.previous_digest() != self.blocks[position - 1].digest() {
                return fail(ViolationKind::BrokenLink);
            }
            if block.index() != index {
                return fail(ViolationKind::IndexMismatch);
            }
            if block.compute_digest(&self.hasher) != *block.digest() {
                return fail(ViolationKind::DigestMismatch);
            }
            if !self.pow.is_satisfied_by(block.digest()) {
                return fail(ViolationKind::InsufficientWork);
            }
        }
        debug!(blocks = self.blocks.len(), "chain validated");
        Ok(())
    }

    fn is_genesis(&self, block: &Block) -> bool {
        block.index() == 0
            && block.timestamp() == GENESIS_TIMESTAMP
            && *block.previous_digest() == GENESIS_PREVIOUS_DIGEST
            && block.payload() == self.config.genesis_payload.as_bytes()
    }

    pub fn tip(&self) -> &Block {
        // Constructors guarantee at least the genesis block.
        &self.blocks[self.blocks.len() - 1]
    }

    pub fn genesis(&self) -> &Block {
        &self.blocks[0]
    }

    pub fn get(&self, index: u64) -> Option<&Block> {
        usize::try_from(index).ok().and_then(|i| self.blocks.get(i))
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn difficulty(&self) -> u32 {
        self.pow.difficulty()
    }

    pub fn hasher(&self) -> &H {
        &self.hasher
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn into_blocks(self) -> Vec<Block> {
        self.blocks
    }
}

fn check_config<H: HashFunction>(config: &ChainConfig, hasher: &H) -> Result<ProofOfWork, ConfigError> {
    config.validate_for(hasher)?;
    config.proof_of_work()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{hash::Hash, pow::is_valid};

    /// FNV-1a with a murmur finalizer: cheap, deterministic, well mixed.
    #[derive(Debug)]
    struct FoldHash;

    impl HashFunction for FoldHash {
        fn id(&self) -> &str {
            "fold"
        }

        fn digest(&self, bytes: &[u8]) -> Hash {
            let mut out = [0u8; 32];
            for (lane, chunk) in out.chunks_mut(8).enumerate() {
                let mut h: u64 = 0xcbf2_9ce4_8422_2325 ^ lane as u64;
                for b in bytes {
                    h ^= *b as u64;
                    h = h.wrapping_mul(0x0000_0100_0000_01b3);
                }
                h ^= h >> 33;
                h = h.wrapping_mul(0xff51_afd7_ed55_8ccd);
                h ^= h >> 33;
                h = h.wrapping_mul(0xc4ce_b9fe_1a85_ec53);
                h ^= h >> 33;
                chunk.copy_from_slice(&h.to_be_bytes());
            }
            out
        }
    }

    fn fold_config(difficulty: u32) -> ChainConfig {
        ChainConfig {
            hash_algorithm: "fold".into(),
            ..ChainConfig::with_difficulty(difficulty)
        }
    }

    fn abc_chain() -> Blockchain {
        let mut chain = Blockchain::new(ChainConfig::with_difficulty(8)).unwrap();
        chain.append_at("a", 1_600_000_000).unwrap();
        chain.append_at("b", 1_600_000_100).unwrap();
        chain.append_at("c", 1_600_000_200).unwrap();
        chain
    }

    #[test]
    fn genesis_block_example() {
        let chain = Blockchain::new(ChainConfig::with_difficulty(8)).unwrap();
        let genesis = chain.tip();
        assert_eq!(chain.len(), 1);
        assert_eq!(genesis.index(), 0);
        assert_eq!(genesis.timestamp(), GENESIS_TIMESTAMP);
        assert_eq!(*genesis.previous_digest(), [0u8; 32]);
        assert_eq!(genesis.payload(), b"Genesis Block");
        assert!(is_valid(genesis.digest(), 8));
        assert!(chain.validate().is_ok());
    }

    #[test]
    fn genesis_is_a_fixed_point() {
        let a = Blockchain::new(ChainConfig::with_difficulty(8)).unwrap();
        let b = Blockchain::new(ChainConfig::with_difficulty(8)).unwrap();
        assert_eq!(a.genesis(), b.genesis());

        let other = Blockchain::new(ChainConfig {
            genesis_payload: "another origin".into(),
            ..ChainConfig::with_difficulty(8)
        })
        .unwrap();
        assert_ne!(a.genesis().digest(), other.genesis().digest());
    }

    #[test]
    fn append_links_to_tip() {
        let chain = abc_chain();
        assert_eq!(chain.tip().index(), 3);
        assert_eq!(chain.tip().payload(), b"c");
        for pair in chain.blocks().windows(2) {
            assert_eq!(pair[1].previous_digest(), pair[0].digest());
            assert_eq!(pair[1].index(), pair[0].index() + 1);
        }
        assert!(chain.validate().is_ok());
    }

    #[test]
    fn append_uses_current_time() {
        let mut chain = Blockchain::new(ChainConfig::with_difficulty(4)).unwrap();
        let before = now_secs();
        let ts = chain.append("now").unwrap().timestamp();
        assert!(ts >= before);
        assert!(chain.validate().is_ok());
    }

    #[test]
    fn timestamps_never_decrease() {
        let mut chain = Blockchain::new(ChainConfig::with_difficulty(4)).unwrap();
        chain.append_at("later", 1_700_000_000).unwrap();
        let block = chain.append_at("earlier", 1_600_000_000).unwrap();
        assert_eq!(block.timestamp(), 1_700_000_000);
    }

    #[test]
    fn end_to_end_bit_flip_is_reported_at_its_block() {
        let mut chain = abc_chain();
        assert!(chain.validate().is_ok());
        chain.blocks[2].payload[0] ^= 0x01;
        assert_eq!(
            chain.validate(),
            Err(IntegrityViolation::new(2, ViolationKind::DigestMismatch))
        );
    }

    #[test]
    fn nonce_tampering_is_detected() {
        let mut chain = abc_chain();
        chain.blocks[1].nonce += 1;
        assert_eq!(
            chain.validate(),
            Err(IntegrityViolation::new(1, ViolationKind::DigestMismatch))
        );
    }

    #[test]
    fn relinked_block_is_a_broken_link() {
        let mut chain = abc_chain();
        chain.blocks[2].previous_digest = [0xAB; 32];
        assert_eq!(
            chain.validate(),
            Err(IntegrityViolation::new(2, ViolationKind::BrokenLink))
        );
    }

    #[test]
    fn renumbered_block_is_an_index_mismatch() {
        let mut chain = abc_chain();
        chain.blocks[3].index = 7;
        assert_eq!(
            chain.validate(),
            Err(IntegrityViolation::new(3, ViolationKind::IndexMismatch))
        );
    }

    #[test]
    fn foreign_genesis_is_rejected() {
        let chain = abc_chain();
        let other = ChainConfig {
            genesis_payload: "not ours".into(),
            ..ChainConfig::with_difficulty(8)
        };
        let imported = Blockchain::from_blocks(other, HashAlgorithm::Sha256, chain.into_blocks()).unwrap();
        assert_eq!(
            imported.validate(),
            Err(IntegrityViolation::new(0, ViolationKind::GenesisMismatch))
        );
    }

    #[test]
    fn unmined_blocks_lack_work() {
        let cheap = Blockchain::new(ChainConfig::with_difficulty(0)).unwrap();
        let strict = Blockchain::from_blocks(
            ChainConfig::with_difficulty(32),
            HashAlgorithm::Sha256,
            cheap.into_blocks(),
        )
        .unwrap();
        assert_eq!(
            strict.validate(),
            Err(IntegrityViolation::new(0, ViolationKind::InsufficientWork))
        );
    }

    #[test]
    fn from_blocks_rejects_empty() {
        let err = Blockchain::from_blocks(ChainConfig::default(), HashAlgorithm::Sha256, vec![]).unwrap_err();
        assert!(matches!(err, ChainError::EmptyChain));
    }

    #[test]
    fn oversized_difficulty_fails_construction() {
        let err = Blockchain::new(ChainConfig::with_difficulty(257)).unwrap_err();
        assert!(matches!(
            err,
            ChainError::Config(ConfigError::DifficultyTooHigh { difficulty: 257, max: 256 })
        ));
    }

    #[test]
    fn unknown_algorithm_fails_construction() {
        let config = ChainConfig {
            hash_algorithm: "md5".into(),
            ..ChainConfig::default()
        };
        assert!(matches!(
            Blockchain::new(config),
            Err(ChainError::Config(ConfigError::UnknownHashAlgorithm(_)))
        ));
    }

    #[test]
    fn injected_hasher_must_match_config() {
        let err = Blockchain::with_hasher(ChainConfig::with_difficulty(4), FoldHash).unwrap_err();
        assert!(matches!(
            err,
            ChainError::Config(ConfigError::HashAlgorithmMismatch { .. })
        ));
    }

    #[test]
    fn injected_hasher_builds_valid_chain() {
        let mut chain = Blockchain::with_hasher(fold_config(8), FoldHash).unwrap();
        for payload in ["x", "y", "z"] {
            chain.append_at(payload, 1_600_000_000).unwrap();
        }
        assert_eq!(chain.hasher().id(), "fold");
        assert_eq!(chain.tip().index(), 3);
        assert!(chain.validate().is_ok());
    }

    #[test]
    fn mixing_hashers_breaks_validation() {
        let chain = abc_chain();
        let rehashed = Blockchain::from_blocks(
            ChainConfig {
                hash_algorithm: "sha256d".into(),
                ..ChainConfig::with_difficulty(8)
            },
            HashAlgorithm::DoubleSha256,
            chain.into_blocks(),
        )
        .unwrap();
        assert_eq!(
            rehashed.validate(),
            Err(IntegrityViolation::new(0, ViolationKind::DigestMismatch))
        );
    }

    #[test]
    fn genesis_exhaustion_fails_construction() {
        let config = ChainConfig {
            max_attempts: Some(10),
            ..ChainConfig::with_difficulty(256)
        };
        assert!(matches!(
            Blockchain::new(config),
            Err(ChainError::Mining(MiningError::Exhausted { attempts: 10 }))
        ));
    }

    #[test]
    fn append_exhaustion_leaves_chain_untouched() {
        let cheap = Blockchain::new(ChainConfig::with_difficulty(0)).unwrap();
        let mut strict = Blockchain::from_blocks(
            ChainConfig {
                max_attempts: Some(5),
                ..ChainConfig::with_difficulty(256)
            },
            HashAlgorithm::Sha256,
            cheap.into_blocks(),
        )
        .unwrap();
        let err = strict.append("never").unwrap_err();
        assert!(matches!(err, ChainError::Mining(MiningError::Exhausted { attempts: 5 })));
        assert_eq!(strict.len(), 1);
    }

    #[test]
    fn append_past_the_last_index_is_an_error() {
        let mut chain = Blockchain::new(ChainConfig::with_difficulty(0)).unwrap();
        chain.blocks[0].index = u64::MAX;
        let err = chain.append("x").unwrap_err();
        assert!(matches!(err, ChainError::IndexOverflow { tip: u64::MAX }));
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn json_config_names_injected_hasher() {
        let config = ChainConfig::from_json(r#"{"difficulty":4,"hash_algorithm":"fold"}"#).unwrap();
        let mut chain = Blockchain::with_hasher(config.clone(), FoldHash).unwrap();
        chain.append_at("injected", 1_600_000_000).unwrap();
        assert!(chain.validate().is_ok());
        assert!(matches!(
            Blockchain::new(config),
            Err(ChainError::Config(ConfigError::UnknownHashAlgorithm(id))) if id == "fold"
        ));
    }

    #[test]
    fn parallel_mining_builds_same_chain() {
        let parallel_config = ChainConfig {
            parallel_mining: true,
            ..ChainConfig::with_difficulty(8)
        };
        let mut parallel = Blockchain::new(parallel_config).unwrap();
        let mut sequential = Blockchain::new(ChainConfig::with_difficulty(8)).unwrap();
        for chain in [&mut parallel, &mut sequential] {
            chain.append_at("p", 1_600_000_000).unwrap();
        }
        assert_eq!(parallel.blocks(), sequential.blocks());
        assert!(parallel.validate().is_ok());
    }

    #[test]
    fn get_by_index() {
        let chain = abc_chain();
        assert_eq!(chain.get(2).map(|b| b.payload()), Some(&b"b"[..]));
        assert!(chain.get(4).is_none());
        assert!(!chain.is_empty());
        assert_eq!(chain.difficulty(), 8);
    }
}
