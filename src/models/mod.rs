// Ledger rows as persisted by the db layer, plus the zatoshi amount helpers
// shared by the projector and the store.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub const ZATOSHIS_PER_ZEC: i64 = 100_000_000;

/// Converts an exact zatoshi amount to the ZEC value stored in the ledger.
pub fn zat_to_zec(zat: i64) -> f64 {
    zat as f64 / ZATOSHIS_PER_ZEC as f64
}

/// Reads a ZEC amount reported by the node (number or numeric string) as zatoshis.
pub fn zec_to_zat(value: &Value) -> Option<i64> {
    let zec = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    Some((zec * ZATOSHIS_PER_ZEC as f64).round() as i64)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub height: i64,
    pub hash: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxType {
    Reward,
    Shielded,
    Transfer,
}

impl TxType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TxType::Reward => "reward",
            TxType::Shielded => "shielded",
            TxType::Transfer => "transfer",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "reward" => Some(TxType::Reward),
            "shielded" => Some(TxType::Shielded),
            "transfer" => Some(TxType::Transfer),
            _ => None,
        }
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub txid: String,
    pub block_height: i64,
    pub version: i64,
    pub locktime: i64,
    pub fee: f64,
    pub tx_type: TxType,
    pub is_shielded: bool,
    /// Full node payload, kept for replay and debugging.
    pub raw: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Input {
    pub txid: String,
    pub prev_txid: String,
    pub prev_vout: i64,
    pub address: Option<String>,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Output {
    pub txid: String,
    pub vout_index: i64,
    pub value: f64,
    /// Textual form of `script_pub_key`.
    pub scriptpubkey: String,
    pub script_pub_key: Value,
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub address: String,
    pub first_seen: i64,
    pub last_seen: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedBlock {
    pub height: i64,
    pub attempts: i64,
    pub last_error: String,
    pub failed_at: i64,
}

/// Everything one source transaction writes to the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedTransaction {
    pub transaction: Transaction,
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    /// Block time, used for the address first/last seen markers.
    pub seen_at: i64,
}

impl ProjectedTransaction {
    /// Distinct addresses touched by the inputs and outputs, in first-seen order.
    pub fn addresses(&self) -> Vec<&str> {
        let mut seen: Vec<&str> = Vec::new();
        let candidates = self
            .inputs
            .iter()
            .filter_map(|i| i.address.as_deref())
            .chain(self.outputs.iter().filter_map(|o| o.address.as_deref()));
        for address in candidates {
            if !seen.contains(&address) {
                seen.push(address);
            }
        }
        seen
    }
}
