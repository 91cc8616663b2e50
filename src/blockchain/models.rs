// Node payloads as returned by `getblock <hash> 2`.

use crate::models::zec_to_zat;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A verbose block. Transactions stay as raw JSON so the original payload can
/// be stored verbatim next to its projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcBlock {
    pub hash: String,
    pub height: u64,
    pub time: i64,
    #[serde(default, rename = "previousblockhash")]
    pub previous_block_hash: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub tx: Vec<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcTransaction {
    pub txid: String,
    #[serde(default)]
    pub version: i64,
    #[serde(default)]
    pub locktime: i64,
    /// Explicit reward flag; zcashd instead marks the coinbase input.
    #[serde(default)]
    pub coinbase: Option<Value>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub vin: Vec<RpcInput>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub vout: Vec<RpcOutput>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub vjoinsplit: Vec<Value>,
    #[serde(default, rename = "vShieldedSpend", deserialize_with = "null_as_empty")]
    pub v_shielded_spend: Vec<Value>,
    #[serde(default, rename = "vShieldedOutput", deserialize_with = "null_as_empty")]
    pub v_shielded_output: Vec<Value>,
    #[serde(default)]
    pub orchard: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcInput {
    #[serde(default)]
    pub coinbase: Option<Value>,
    #[serde(default)]
    pub txid: Option<String>,
    #[serde(default)]
    pub vout: Option<i64>,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default, rename = "valueZat", alias = "valueSat")]
    pub value_zat: Option<i64>,
    /// Resolved previous output, when the node supplies it.
    #[serde(default)]
    pub prevout: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RpcOutput {
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default, rename = "valueZat", alias = "valueSat")]
    pub value_zat: Option<i64>,
    #[serde(default)]
    pub n: Option<i64>,
    #[serde(default, rename = "scriptPubKey", alias = "script_pub_key", alias = "scriptpubkey")]
    pub script_pub_key: Option<Value>,
}

impl RpcTransaction {
    pub fn is_coinbase(&self) -> bool {
        let flagged = match &self.coinbase {
            Some(Value::Bool(flag)) => *flag,
            _ => false,
        };
        flagged || self.vin.iter().any(RpcInput::is_coinbase)
    }

    pub fn has_joinsplits(&self) -> bool {
        !self.vjoinsplit.is_empty()
    }

    /// True when a Sapling or Orchard bundle carries any data.
    pub fn has_shielded_pool_data(&self) -> bool {
        !self.v_shielded_spend.is_empty()
            || !self.v_shielded_output.is_empty()
            || self.orchard.as_ref().is_some_and(orchard_is_non_empty)
    }
}

impl RpcInput {
    pub fn is_coinbase(&self) -> bool {
        self.coinbase.is_some()
    }

    /// Input value in zatoshis; unresolved inputs count as zero.
    pub fn value_zat(&self) -> i64 {
        self.value_zat
            .or_else(|| self.value.as_ref().and_then(zec_to_zat))
            .or_else(|| {
                let prevout = self.prevout.as_ref()?;
                prevout
                    .get("valueZat")
                    .and_then(Value::as_i64)
                    .or_else(|| prevout.get("value").and_then(zec_to_zat))
            })
            .unwrap_or(0)
    }
}

impl RpcOutput {
    pub fn value_zat(&self) -> i64 {
        self.value_zat
            .or_else(|| self.value.as_ref().and_then(zec_to_zat))
            .unwrap_or(0)
    }
}

// Absent and `null` lists both read as empty.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<Vec<T>>::deserialize(deserializer).map(Option::unwrap_or_default)
}

// zcashd reports an empty bundle as `{"actions": [], ...}` on every v5 transaction.
fn orchard_is_non_empty(orchard: &Value) -> bool {
    match orchard {
        Value::Object(map) => match map.get("actions") {
            Some(Value::Array(actions)) => !actions.is_empty(),
            Some(_) => false,
            None => !map.is_empty(),
        },
        Value::Array(items) => !items.is_empty(),
        _ => false,
    }
}
