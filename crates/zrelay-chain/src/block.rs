// Dash block decoding: 80-byte header followed by the transaction list.
use crate::reader::Reader;
use crate::tx::read_transaction;
use crate::{Result, reversed_hex};
use serde::Serialize;

// Smallest possible transaction: version, two zero counts, locktime.
const MIN_TX_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Block {
    pub version: u32,
    #[serde(rename = "versionHex")]
    pub version_hex: String,
    #[serde(rename = "previousblockhash")]
    pub previous_block_hash: String,
    #[serde(rename = "merkleroot")]
    pub merkle_root: String,
    pub time: u32,
    pub bits: String,
    pub nonce: u32,
    #[serde(rename = "nTx")]
    pub n_tx: usize,
    pub size: usize,
    pub tx: Vec<String>,
}

/// Parses exactly one serialized block.
///
/// The block hash itself is not computed: Dash headers are hashed with X11, not SHA-256.
pub fn parse_block(payload: &[u8]) -> Result<Block> {
    let mut reader = Reader::new(payload);
    let version = reader.u32_le()?;
    let previous = reader.hash()?;
    let merkle_root = reader.hash()?;
    let time = reader.u32_le()?;
    let bits = reader.u32_le()?;
    let nonce = reader.u32_le()?;

    let tx_count = reader.count("transaction", MIN_TX_LEN)?;
    let mut tx = Vec::with_capacity(tx_count);
    for _ in 0..tx_count {
        tx.push(read_transaction(&mut reader)?.txid);
    }
    reader.finish()?;

    Ok(Block {
        version,
        version_hex: format!("{version:08x}"),
        previous_block_hash: reversed_hex(&previous),
        merkle_root: reversed_hex(&merkle_root),
        time,
        bits: format!("{bits:08x}"),
        nonce,
        n_tx: tx.len(),
        size: payload.len(),
        tx,
    })
}
