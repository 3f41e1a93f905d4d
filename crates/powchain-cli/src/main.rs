use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use powchain_core::{Block, Blockchain, ChainConfig};
use serde::Serialize;
use std::{fs, path::PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "powchain")]
#[command(about = "Build, tamper with and validate a small proof-of-work chain")]
struct Cli {
    /// JSON chain configuration; missing fields use the defaults
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the configured difficulty (leading zero bits)
    #[arg(long, global = true)]
    difficulty: Option<u32>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Append payloads to a fresh chain, then validate it
    Run {
        /// Flip the low bit of this block's first payload byte before validating
        #[arg(long)]
        tamper: Option<u64>,
        /// Payloads to append, in order
        payloads: Vec<String>,
    },
    /// Print the genesis block for the configuration
    Genesis,
}

#[derive(Serialize)]
struct BlockRow {
    index: u64,
    timestamp: u64,
    nonce: u64,
    hash: String,
    previous_hash: String,
    payload: String,
}

impl From<&Block> for BlockRow {
    fn from(block: &Block) -> Self {
        Self {
            index: block.index(),
            timestamp: block.timestamp(),
            nonce: block.nonce(),
            hash: block.digest_hex(),
            previous_hash: hex::encode(block.previous_digest()),
            payload: String::from_utf8_lossy(block.payload()).into_owned(),
        }
    }
}

fn load_config(cli: &Cli) -> Result<ChainConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let json = fs::read_to_string(path)
                .with_context(|| format!("reading config {}", path.display()))?;
            ChainConfig::from_json(&json)?
        }
        None => ChainConfig::default(),
    };
    if let Some(difficulty) = cli.difficulty {
        config.difficulty = difficulty;
    }
    config.validate()?;
    Ok(config)
}

/// Rebuilds the chain with one payload bit flipped, bypassing mining.
fn tamper(chain: Blockchain, index: u64) -> Result<Blockchain> {
    let config = chain.config().clone();
    let hasher = *chain.hasher();
    let mut json = serde_json::to_value(chain.into_blocks())?;
    let Some(byte) = json
        .get_mut(index as usize)
        .and_then(|block| block.get_mut("payload"))
        .and_then(|payload| payload.get_mut(0usize))
    else {
        bail!("block {index} does not exist or has an empty payload");
    };
    let flipped = byte.as_u64().unwrap_or_default() ^ 0x01;
    *byte = flipped.into();
    Ok(Blockchain::from_blocks(config, hasher, serde_json::from_value(json)?)?)
}

fn print_blocks(blocks: &[Block]) -> Result<()> {
    let rows: Vec<BlockRow> = blocks.iter().map(BlockRow::from).collect();
    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;
    info!(
        difficulty = config.difficulty,
        algorithm = %config.hash_algorithm,
        "building chain"
    );

    match cli.cmd {
        Command::Genesis => {
            let chain = Blockchain::new(config)?;
            print_blocks(&chain.blocks()[..1])?;
        }
        Command::Run { tamper: target, payloads } => {
            let mut chain = Blockchain::new(config)?;
            for payload in payloads {
                chain.append(payload)?;
            }
            if let Some(index) = target {
                chain = tamper(chain, index)?;
            }
            print_blocks(chain.blocks())?;
            match chain.validate() {
                Ok(()) => println!("valid: {} blocks, tip {}", chain.len(), chain.tip().index()),
                Err(violation) => println!("invalid: {violation}"),
            }
        }
    }
    Ok(())
}
