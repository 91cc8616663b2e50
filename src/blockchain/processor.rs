use crate::blockchain::models::{RpcInput, RpcTransaction};
use crate::blockchain::script::ScriptPubKey;
use crate::models::{zat_to_zec, Block, Input, Output, ProjectedTransaction, Transaction, TxType};
use serde_json::Value;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProjectionError {
    #[error("Malformed transaction at position {index}: {source}")]
    Malformed {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("Amounts of transaction {txid} overflow the zatoshi range")]
    AmountOverflow { txid: String },
}

/// Classifies a transaction. The first matching rule wins: coinbase is a
/// reward, joinsplit or shielded-pool data makes it shielded, anything else
/// is a transfer.
pub fn classify(tx: &RpcTransaction) -> TxType {
    if tx.is_coinbase() {
        TxType::Reward
    } else if tx.has_joinsplits() || tx.has_shielded_pool_data() {
        TxType::Shielded
    } else {
        TxType::Transfer
    }
}

/// Maps one raw node transaction into the ledger rows it produces.
///
/// `index` is the transaction's position in the block and only feeds error
/// context.
pub fn project(raw: &Value, block: &Block, index: usize) -> Result<ProjectedTransaction, ProjectionError> {
    let tx: RpcTransaction =
        serde_json::from_value(raw.clone()).map_err(|source| ProjectionError::Malformed { index, source })?;

    let overflow = || ProjectionError::AmountOverflow { txid: tx.txid.clone() };
    let inputs_zat = total_zat(tx.vin.iter().map(RpcInput::value_zat)).ok_or_else(overflow)?;
    let outputs_zat = total_zat(tx.vout.iter().map(|o| o.value_zat())).ok_or_else(overflow)?;
    let fee_zat = inputs_zat.checked_sub(outputs_zat).ok_or_else(overflow)?;

    let inputs = tx
        .vin
        .iter()
        .filter(|vin| !vin.is_coinbase())
        .filter_map(|vin| project_input(&tx.txid, vin))
        .collect();

    let outputs = tx
        .vout
        .iter()
        .enumerate()
        .map(|(position, vout)| {
            let script = ScriptPubKey::from_field(vout.script_pub_key.as_ref()).normalize();
            Output {
                txid: tx.txid.clone(),
                vout_index: vout.n.unwrap_or(position as i64),
                value: zat_to_zec(vout.value_zat()),
                scriptpubkey: script.text,
                script_pub_key: script.structured,
                address: script.address,
            }
        })
        .collect();

    let transaction = Transaction {
        txid: tx.txid.clone(),
        block_height: block.height,
        version: tx.version,
        locktime: tx.locktime,
        fee: zat_to_zec(fee_zat),
        tx_type: classify(&tx),
        is_shielded: tx.has_joinsplits() || tx.has_shielded_pool_data(),
        raw: raw.clone(),
    };

    Ok(ProjectedTransaction {
        transaction,
        inputs,
        outputs,
        seen_at: block.timestamp,
    })
}

fn total_zat(mut values: impl Iterator<Item = i64>) -> Option<i64> {
    values.try_fold(0i64, i64::checked_add)
}

fn project_input(txid: &str, vin: &RpcInput) -> Option<Input> {
    // Only inputs spending a previous output become ledger rows
    let prev_txid = vin.txid.clone()?;
    let prev_vout = vin.vout?;

    let address = vin.address.clone().or_else(|| {
        let script = vin.prevout.as_ref()?.get("scriptPubKey")?;
        ScriptPubKey::from_field(Some(script)).normalize().address
    });

    Some(Input {
        txid: txid.to_string(),
        prev_txid,
        prev_vout,
        address,
        value: zat_to_zec(vin.value_zat()),
    })
}

