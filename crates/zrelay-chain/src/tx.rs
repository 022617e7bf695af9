// Dash transaction decoding (classic layout plus the DIP2 special-transaction payload).
use crate::reader::Reader;
use crate::{Result, display_hash, reversed_hex};
use serde::Serialize;

const COIN: f64 = 100_000_000.0;
// Outpoint (36) + empty script length (1) + sequence (4).
const MIN_INPUT_LEN: usize = 41;
// Value (8) + empty script length (1).
const MIN_OUTPUT_LEN: usize = 9;
// Special transactions start at version 3 with a non-zero type in the high 16 bits.
const SPECIAL_TX_VERSION: u16 = 3;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Script {
    pub hex: String,
}

impl Script {
    fn from_bytes(bytes: &[u8]) -> Self {
        Self {
            hex: hex::encode(bytes),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TxInput {
    pub txid: String,
    pub index: u32,
    #[serde(rename = "scriptSig")]
    pub script_sig: Script,
    pub sequence: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TxOutput {
    pub value: f64,
    pub n: usize,
    #[serde(rename = "valueSat")]
    pub value_sat: i64,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: Script,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    pub txid: String,
    pub version: i32,
    #[serde(rename = "dashVersion")]
    pub dash_version: u16,
    #[serde(rename = "dashType")]
    pub dash_type: u16,
    pub vin: Vec<TxInput>,
    pub vout: Vec<TxOutput>,
    pub locktime: u32,
    pub size: usize,
    #[serde(rename = "extraPayload", skip_serializing_if = "Option::is_none")]
    pub extra_payload: Option<String>,
}

/// Parses exactly one serialized transaction.
pub fn parse_transaction(payload: &[u8]) -> Result<Transaction> {
    let mut reader = Reader::new(payload);
    let tx = read_transaction(&mut reader)?;
    reader.finish()?;
    Ok(tx)
}

pub(crate) fn read_transaction(reader: &mut Reader<'_>) -> Result<Transaction> {
    let start = reader.position();
    let version = reader.i32_le()?;
    let dash_version = (version as u32 & 0xffff) as u16;
    let dash_type = (version as u32 >> 16) as u16;

    let input_count = reader.count("input", MIN_INPUT_LEN)?;
    let mut vin = Vec::with_capacity(input_count);
    for _ in 0..input_count {
        let prev_hash = reader.hash()?;
        let index = reader.u32_le()?;
        let script_sig = Script::from_bytes(reader.var_bytes()?);
        let sequence = reader.u32_le()?;
        vin.push(TxInput {
            txid: reversed_hex(&prev_hash),
            index,
            script_sig,
            sequence,
        });
    }

    let output_count = reader.count("output", MIN_OUTPUT_LEN)?;
    let mut vout = Vec::with_capacity(output_count);
    for n in 0..output_count {
        let value_sat = reader.i64_le()?;
        let script_pub_key = Script::from_bytes(reader.var_bytes()?);
        vout.push(TxOutput {
            value: value_sat as f64 / COIN,
            n,
            value_sat,
            script_pub_key,
        });
    }

    let locktime = reader.u32_le()?;
    let extra_payload = if dash_version >= SPECIAL_TX_VERSION && dash_type != 0 {
        Some(hex::encode(reader.var_bytes()?))
    } else {
        None
    };

    let raw = reader.consumed_since(start);
    Ok(Transaction {
        txid: display_hash(raw),
        version,
        dash_version,
        dash_type,
        vin,
        vout,
        locktime,
        size: raw.len(),
        extra_payload,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DecodeError;
    use crate::fixtures::{GENESIS_COINBASE, GENESIS_TXID};

    #[test]
    fn genesis_coinbase_decodes() {
        let payload = hex::decode(GENESIS_COINBASE).expect("hex");
        let tx = parse_transaction(&payload).expect("tx");
        assert_eq!(tx.txid, GENESIS_TXID);
        assert_eq!(tx.size, 204);
        assert_eq!(tx.vin.len(), 1);
        assert_eq!(tx.vin[0].txid, "0".repeat(64));
        assert_eq!(tx.vin[0].index, u32::MAX);
        assert_eq!(tx.vin[0].sequence, u32::MAX);
        assert!(tx.vin[0].script_sig.hex.starts_with("04ffff001d"));
        assert_eq!(tx.vout.len(), 1);
        assert_eq!(tx.vout[0].n, 0);
        assert_eq!(tx.vout[0].value_sat, 5_000_000_000);
        assert!(tx.vout[0].script_pub_key.hex.ends_with("ac"));
        assert_eq!(tx.locktime, 0);
        assert_eq!(tx.extra_payload, None);
    }

    #[test]
    fn special_transaction_carries_extra_payload() {
        // Version 3, type 5 (coinbase payload), one input, no outputs.
        let mut payload = Vec::new();
        payload.extend(((5u32 << 16) | 3).to_le_bytes());
        payload.push(1);
        payload.extend([0u8; 32]);
        payload.extend(u32::MAX.to_le_bytes());
        payload.extend([2, 0x51, 0x52]);
        payload.extend(u32::MAX.to_le_bytes());
        payload.push(0);
        payload.extend(7u32.to_le_bytes());
        payload.extend([3, 0xaa, 0xbb, 0xcc]);

        let tx = parse_transaction(&payload).expect("tx");
        assert_eq!(tx.dash_version, 3);
        assert_eq!(tx.dash_type, 5);
        assert_eq!(tx.version, 0x0005_0003);
        assert_eq!(tx.vin[0].script_sig.hex, "5152");
        assert!(tx.vout.is_empty());
        assert_eq!(tx.locktime, 7);
        assert_eq!(tx.extra_payload.as_deref(), Some("aabbcc"));
        assert_eq!(tx.size, payload.len());
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut payload = hex::decode(GENESIS_COINBASE).expect("hex");
        payload.push(0);
        assert_eq!(
            parse_transaction(&payload),
            Err(DecodeError::TrailingBytes(1))
        );
    }

    #[test]
    fn absurd_input_count_is_rejected() {
        let mut payload = 1u32.to_le_bytes().to_vec();
        payload.extend([0xfe, 0xff, 0xff, 0xff, 0x7f]);
        assert_eq!(
            parse_transaction(&payload),
            Err(DecodeError::OversizeCount {
                what: "input",
                count: 0x7fff_ffff
            })
        );
    }
}
