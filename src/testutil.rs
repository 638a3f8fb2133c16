use crate::envelope::ORD_TAG;
use crate::error::{Error, Result};
use crate::rpc::{ChainSource, ScriptPubKey, ScriptSig, Tx, Vin, Vout};
use crate::script::{self, Chunk};
use async_trait::async_trait;
use serde_json::json;
use std::collections::HashMap;

/// A 64-char hex txid built by repeating the seed byte pair.
pub fn txid(seed: &str) -> String {
    seed.repeat(64 / seed.len().max(1))
}

/// ScriptSig hex for a full inscription envelope.
pub fn envelope_script_hex(total: u64, mime: &str, pieces: &[(u64, &[u8])]) -> String {
    let mut chunks = vec![
        Chunk::push(ORD_TAG.to_vec()),
        Chunk::push(vec![total as u8]),
        Chunk::push(mime.as_bytes().to_vec()),
    ];
    push_pairs(&mut chunks, pieces);
    hex::encode(script::encode(&chunks))
}

/// ScriptSig hex for a continuation carrying bare `(index, data)` pairs.
pub fn continuation_script_hex(pieces: &[(u64, &[u8])]) -> String {
    let mut chunks = Vec::new();
    push_pairs(&mut chunks, pieces);
    hex::encode(script::encode(&chunks))
}

/// An ordinary signature-and-pubkey style scriptSig.
pub fn plain_script_hex() -> String {
    let chunks = vec![Chunk::push(vec![0x30; 71]), Chunk::push(vec![0x02; 33])];
    hex::encode(script::encode(&chunks))
}

fn push_pairs(chunks: &mut Vec<Chunk>, pieces: &[(u64, &[u8])]) {
    for (index, data) in pieces {
        chunks.push(Chunk::push(vec![*index as u8]));
        chunks.push(Chunk::push(data.to_vec()));
    }
}

pub struct TxBuilder {
    tx: Tx,
}

impl TxBuilder {
    pub fn new(txid: &str) -> Self {
        Self {
            tx: Tx {
                txid: txid.to_string(),
                blockhash: None,
                vin: Vec::new(),
                vout: vec![Vout {
                    n: 0,
                    script_pub_key: ScriptPubKey {
                        hex: "76a9".to_string(),
                    },
                }],
            },
        }
    }

    pub fn blockhash(mut self, hash: &str) -> Self {
        self.tx.blockhash = Some(hash.to_string());
        self
    }

    pub fn input(mut self, prev_txid: &str, prev_vout: u32, script_hex: Option<String>) -> Self {
        self.tx.vin.push(Vin {
            txid: Some(prev_txid.to_string()),
            vout: Some(prev_vout),
            script_sig: script_hex.map(|hex| ScriptSig { hex }),
        });
        self
    }

    pub fn coinbase_input(mut self) -> Self {
        self.tx.vin.push(Vin {
            txid: None,
            vout: None,
            script_sig: None,
        });
        self
    }

    pub fn build(self) -> Tx {
        self.tx
    }
}

/// In-memory chain fixture backing the `ChainSource` trait.
#[derive(Default)]
pub struct MockChain {
    txs: HashMap<String, Tx>,
    blocks: HashMap<u64, (String, Vec<String>)>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_tx(&mut self, tx: Tx) {
        self.txs.insert(tx.txid.clone(), tx);
    }

    pub fn add_block(&mut self, height: u64, hash: &str, txids: &[&str]) {
        self.blocks.insert(
            height,
            (
                hash.to_string(),
                txids.iter().map(|id| id.to_string()).collect(),
            ),
        );
    }

    fn not_found(method: &str, param: &str) -> Error {
        Error::Rpc {
            method: method.to_string(),
            params: json!([param]),
            message: "not found".to_string(),
        }
    }
}

#[async_trait]
impl ChainSource for MockChain {
    async fn transaction(&self, txid: &str) -> Result<Tx> {
        self.txs
            .get(txid)
            .cloned()
            .ok_or_else(|| Self::not_found("getrawtransaction", txid))
    }

    async fn block_hash(&self, height: u64) -> Result<String> {
        self.blocks
            .get(&height)
            .map(|(hash, _)| hash.clone())
            .ok_or_else(|| Self::not_found("getblockhash", &height.to_string()))
    }

    async fn block_height(&self, hash: &str) -> Result<u64> {
        self.blocks
            .iter()
            .find(|(_, (block_hash, _))| block_hash == hash)
            .map(|(height, _)| *height)
            .ok_or_else(|| Self::not_found("getblock", hash))
    }

    async fn block_transactions(&self, hash: &str) -> Result<Vec<Tx>> {
        let (_, txids) = self
            .blocks
            .values()
            .find(|(block_hash, _)| block_hash == hash)
            .ok_or_else(|| Self::not_found("getblock", hash))?;
        Ok(txids
            .iter()
            .filter_map(|txid| self.txs.get(txid).cloned())
            .collect())
    }
}
