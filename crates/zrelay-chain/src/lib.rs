// Decoders for Dash consensus-serialized payloads published on the node's raw topics.
// Documents mirror the field names of the node's JSON-RPC output where one exists.
mod block;
mod reader;
mod tx;

pub use block::{Block, parse_block};
pub use tx::{Script, Transaction, TxInput, TxOutput, parse_transaction};

use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use zrelay_hub::{Decoded, PayloadDecoder};

pub const RAW_TX_TOPIC: &str = "rawtx";
pub const RAW_BLOCK_TOPIC: &str = "rawblock";

pub type Result<T> = std::result::Result<T, DecodeError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("truncated input at offset {offset}: needed {needed} more bytes")]
    Truncated { offset: usize, needed: usize },
    #[error("non-canonical size prefix at offset {offset}")]
    NonCanonicalSize { offset: usize },
    #[error("{what} count {count} exceeds remaining input")]
    OversizeCount { what: &'static str, count: u64 },
    #[error("{0} trailing bytes after payload")]
    TrailingBytes(usize),
    #[error("document serialization failed: {0}")]
    Document(String),
}

/// Payload decoder for `rawtx` and `rawblock`; every other topic is left to the raw fallback.
#[derive(Debug, Clone, Copy, Default)]
pub struct DashDecoder;

impl PayloadDecoder for DashDecoder {
    fn decode(&self, topic: &str, payload: &[u8]) -> Decoded {
        let document = match topic {
            RAW_TX_TOPIC => parse_transaction(payload).and_then(|tx| to_document(&tx)),
            RAW_BLOCK_TOPIC => parse_block(payload).and_then(|block| to_document(&block)),
            _ => return Decoded::Unsupported,
        };
        match document {
            Ok(document) => Decoded::Document(document),
            Err(err) => Decoded::Failed(err.to_string()),
        }
    }
}

fn to_document<T: Serialize>(value: &T) -> Result<Map<String, Value>> {
    match serde_json::to_value(value) {
        Ok(Value::Object(document)) => Ok(document),
        Ok(other) => Err(DecodeError::Document(format!("expected object, got {other}"))),
        Err(err) => Err(DecodeError::Document(err.to_string())),
    }
}

/// Double SHA-256, rendered the way the node displays hashes (byte-reversed hex).
pub fn display_hash(bytes: &[u8]) -> String {
    let digest = Sha256::digest(Sha256::digest(bytes));
    reversed_hex(&digest)
}

pub(crate) fn reversed_hex(bytes: &[u8]) -> String {
    let mut reversed = bytes.to_vec();
    reversed.reverse();
    hex::encode(reversed)
}

#[cfg(test)]
pub(crate) mod fixtures {
    // Bitcoin-family genesis coinbase transaction and block; the serialization is shared
    // with Dash's legacy (version 1) transaction format.
    pub const GENESIS_COINBASE: &str = concat!(
        "01000000010000000000000000000000000000000000000000000000000000000000000000ffffffff",
        "4d04ffff001d0104455468652054696d65732030332f4a616e2f32303039204368616e63656c6c6f72",
        "206f6e206272696e6b206f66207365636f6e64206261696c6f757420666f722062616e6b73ffffffff",
        "0100f2052a01000000434104678afdb0fe5548271967f1a67130b7105cd6a828e03909a67962e0ea1f",
        "61deb649f6bc3f4cef38c4f35504e51ec112de5c384df7ba0b8d578a4c702b6bf11d5fac00000000",
    );
    pub const GENESIS_HEADER: &str = concat!(
        "0100000000000000000000000000000000000000000000000000000000000000000000003ba3edfd",
        "7a7b12b27ac72c3e67768f617fc81bc3888a51323a9fb8aa4b1e5e4a29ab5f49ffff001d1dac2b7c",
    );
    pub const GENESIS_TXID: &str =
        "4a5e1e4baab89f3a32518a88c31bc87f618f76673e2cc77ab2127b7afdeda33b";

    pub fn genesis_block() -> Vec<u8> {
        let mut block = hex::decode(GENESIS_HEADER).expect("header hex");
        block.push(0x01);
        block.extend(hex::decode(GENESIS_COINBASE).expect("tx hex"));
        block
    }
}
