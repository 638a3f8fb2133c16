use crate::envelope::Envelope;
use crate::error::{Error, Result};
use crate::rpc::{ChainSource, Tx};
use crate::script;
use std::time::Duration;
use tokio::time::sleep;

/// Spending transaction located by the forward block scan.
#[derive(Debug, Clone)]
pub struct Spender {
    pub tx: Tx,
    pub vin_index: usize,
    pub height: u64,
}

/// Decode the envelope carried by a transaction's first input, if any.
/// Malformed scripts count as "no envelope"; the walk never aborts on one.
pub fn input_envelope(tx: &Tx) -> Option<Envelope> {
    let sig = tx.vin.first()?.script_sig.as_ref()?;
    let chunks = script::parse_hex(&sig.hex).ok()?;
    Envelope::decode(&chunks)
}

/// Walk backward through `vin[0]` to the genesis transaction.
///
/// Genesis is the earliest transaction bearing the ord marker on a contiguous
/// chain of envelope-bearing predecessors. A transaction with no inputs or no
/// first-input scriptSig terminates the walk; the caller handles a missing
/// envelope. Kept iterative so long inscription chains cannot blow the stack.
pub async fn find_genesis<S: ChainSource>(
    source: &S,
    txid: &str,
) -> Result<(Tx, Option<Envelope>)> {
    let mut cur = source.transaction(txid).await?;

    loop {
        let envelope = input_envelope(&cur);
        let parent_txid = cur.vin.first().and_then(|vin| vin.txid.clone());

        let Some(parent_txid) = parent_txid else {
            // Coinbase or inputless transaction: nothing further back.
            return Ok((cur, envelope));
        };

        match envelope {
            Some(envelope) => match source.transaction(&parent_txid).await {
                Ok(parent) if input_envelope(&parent).is_some() => cur = parent,
                Ok(_) => return Ok((cur, Some(envelope))),
                Err(err @ Error::NodeUnreachable(_)) => return Err(err),
                Err(err) => {
                    tracing::debug!("parent {} fetch failed: {}", parent_txid, err);
                    return Ok((cur, Some(envelope)));
                }
            },
            None => match source.transaction(&parent_txid).await {
                Ok(parent) => cur = parent,
                Err(err @ Error::NodeUnreachable(_)) => return Err(err),
                Err(err) => {
                    tracing::debug!("parent {} fetch failed: {}", parent_txid, err);
                    return Ok((cur, None));
                }
            },
        }
    }
}

/// Scan blocks `[start_height, start_height + max_depth]` for the transaction
/// spending `(txid, vout)`. Blocks are visited in strictly increasing height
/// order with `pace` between fetches to limit node load. A node error at a
/// height terminates the window and the caller proceeds with what it has; a
/// dead transport stays fatal.
pub async fn find_spender<S: ChainSource>(
    source: &S,
    txid: &str,
    vout: u32,
    start_height: u64,
    max_depth: u64,
    pace: Duration,
) -> Result<Option<Spender>> {
    for height in start_height..=start_height.saturating_add(max_depth) {
        if height > start_height && !pace.is_zero() {
            sleep(pace).await;
        }

        let hash = match source.block_hash(height).await {
            Ok(hash) => hash,
            Err(err @ Error::NodeUnreachable(_)) => return Err(err),
            Err(err) => {
                tracing::debug!("no block at height {}: {}", height, err);
                return Ok(None);
            }
        };
        let txs = match source.block_transactions(&hash).await {
            Ok(txs) => txs,
            Err(err @ Error::NodeUnreachable(_)) => return Err(err),
            Err(err) => {
                tracing::warn!("block {} fetch failed: {}", hash, err);
                return Ok(None);
            }
        };

        for tx in txs {
            let hit = tx
                .vin
                .iter()
                .position(|vin| vin.txid.as_deref() == Some(txid) && vin.vout == Some(vout));
            if let Some(vin_index) = hit {
                tracing::debug!("{}:{} spent by {} at height {}", txid, vout, tx.txid, height);
                return Ok(Some(Spender {
                    tx,
                    vin_index,
                    height,
                }));
            }
        }
    }

    Ok(None)
}
