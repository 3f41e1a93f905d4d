pub const BYTE: u32 = 8;
pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const DIGEST_BITS: u32 = HASH_SIZE as u32 * BYTE;

/// Previous-digest sentinel carried by the genesis block.
pub const GENESIS_PREVIOUS_DIGEST: [u8; HASH_SIZE] = [0u8; HASH_SIZE];
pub const GENESIS_TIMESTAMP: u64 = 0;
pub const GENESIS_PAYLOAD: &str = "Genesis Block";

pub const DEFAULT_DIFFICULTY: u32 = 16;
pub const DEFAULT_HASH_ALGORITHM: &str = "sha256";

/// Searches running this many times past the expected attempt count log a warning.
pub const EXHAUSTION_WARNING_FACTOR: u64 = 32;
