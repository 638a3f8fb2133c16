use crate::config::Config;
use crate::error::{Error, Result};
use crate::rawtx;
use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use serde_json::{json, Value};

/// Minimal projection of a decoded transaction: just the fields the
/// reconstruction walk consumes.
#[derive(Debug, Clone, Deserialize)]
pub struct Tx {
    pub txid: String,
    pub blockhash: Option<String>,
    #[serde(default)]
    pub vin: Vec<Vin>,
    #[serde(default)]
    pub vout: Vec<Vout>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Vin {
    pub txid: Option<String>,
    pub vout: Option<u32>,
    #[serde(rename = "scriptSig")]
    pub script_sig: Option<ScriptSig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScriptSig {
    pub hex: String,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Deserialize)]
pub struct Vout {
    pub n: u32,
    #[serde(rename = "scriptPubKey")]
    pub script_pub_key: ScriptPubKey,
}

#[allow(dead_code)]
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptPubKey {
    pub hex: String,
}

#[derive(Debug, Deserialize)]
struct BlockHeader {
    height: u64,
}

#[derive(Debug, Deserialize)]
struct Block {
    #[serde(default)]
    tx: Vec<Tx>,
}

/// The chain operations the walker and reconstructor consume. Implemented by
/// [`RpcClient`] against a live node and by in-memory fixtures in tests.
#[async_trait]
pub trait ChainSource: Send + Sync {
    async fn transaction(&self, txid: &str) -> Result<Tx>;
    async fn block_hash(&self, height: u64) -> Result<String>;
    async fn block_height(&self, hash: &str) -> Result<u64>;
    async fn block_transactions(&self, hash: &str) -> Result<Vec<Tx>>;
}

#[derive(Clone)]
pub struct RpcClient {
    url: String,
    client: reqwest::Client,
}

impl RpcClient {
    pub fn new(config: &Config) -> Self {
        let auth = format!("{}:{}", config.rpc_user, config.rpc_pass);
        let auth_header = format!("Basic {}", general_purpose::STANDARD.encode(auth.as_bytes()));

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::AUTHORIZATION,
            reqwest::header::HeaderValue::from_str(&auth_header).expect("Invalid auth header"),
        );
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to build client");

        tracing::info!("Initialized node RPC client: {}", config.rpc_url);

        Self {
            url: config.rpc_url.clone(),
            client,
        }
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let body = json!({
            "jsonrpc": "1.0",
            "id": "zordinals",
            "method": method,
            "params": params.clone()
        });

        let res = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(Error::NodeUnreachable)?
            .json::<Value>()
            .await
            .map_err(Error::NodeUnreachable)?;

        if let Some(err) = res.get("error") {
            if !err.is_null() {
                let message = err
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| err.to_string());
                return Err(Error::Rpc {
                    method: method.to_string(),
                    params,
                    message,
                });
            }
        }

        Ok(res.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Fetch a decoded transaction. Tries verbose form `1`, then `true`, and
    /// finally falls back to the raw hex with a local decode for nodes that
    /// reject verbosity altogether.
    pub async fn get_raw_transaction(&self, txid: &str) -> Result<Tx> {
        let verbose = match self.call("getrawtransaction", json!([txid, 1])).await {
            Ok(value) => Some(value),
            Err(Error::Rpc { message, .. }) => {
                tracing::debug!(
                    "getrawtransaction [{}, 1] rejected ({}); retrying with boolean verbosity",
                    txid,
                    message
                );
                match self.call("getrawtransaction", json!([txid, true])).await {
                    Ok(value) => Some(value),
                    Err(Error::Rpc { message, .. }) => {
                        tracing::debug!(
                            "getrawtransaction [{}, true] rejected ({}); falling back to raw hex",
                            txid,
                            message
                        );
                        None
                    }
                    Err(err) => return Err(err),
                }
            }
            Err(err) => return Err(err),
        };

        match verbose {
            Some(value) => serde_json::from_value(value).map_err(|err| Error::Rpc {
                method: "getrawtransaction".to_string(),
                params: json!([txid, 1]),
                message: format!("unexpected transaction shape: {err}"),
            }),
            None => {
                let raw = self.call("getrawtransaction", json!([txid])).await?;
                let raw_hex = raw.as_str().ok_or_else(|| Error::Rpc {
                    method: "getrawtransaction".to_string(),
                    params: json!([txid]),
                    message: "expected raw hex string".to_string(),
                })?;
                let bytes = hex::decode(raw_hex).map_err(|err| Error::Rpc {
                    method: "getrawtransaction".to_string(),
                    params: json!([txid]),
                    message: format!("invalid raw hex: {err}"),
                })?;
                rawtx::decode(txid, &bytes)
            }
        }
    }

    pub async fn get_block_hash(&self, height: u64) -> Result<String> {
        let res = self.call("getblockhash", json!([height])).await?;
        res.as_str().map(str::to_string).ok_or_else(|| Error::Rpc {
            method: "getblockhash".to_string(),
            params: json!([height]),
            message: "expected block hash string".to_string(),
        })
    }

    pub async fn get_block_height(&self, hash: &str) -> Result<u64> {
        let res = self.call("getblock", json!([hash])).await?;
        let header: BlockHeader = serde_json::from_value(res).map_err(|err| Error::Rpc {
            method: "getblock".to_string(),
            params: json!([hash]),
            message: format!("unexpected block shape: {err}"),
        })?;
        Ok(header.height)
    }

    pub async fn get_block_transactions(&self, hash: &str) -> Result<Vec<Tx>> {
        let res = self.call("getblock", json!([hash, 2])).await?;
        let block: Block = serde_json::from_value(res).map_err(|err| Error::Rpc {
            method: "getblock".to_string(),
            params: json!([hash, 2]),
            message: format!("unexpected block shape: {err}"),
        })?;
        Ok(block.tx)
    }
}

#[async_trait]
impl ChainSource for RpcClient {
    async fn transaction(&self, txid: &str) -> Result<Tx> {
        self.get_raw_transaction(txid).await
    }

    async fn block_hash(&self, height: u64) -> Result<String> {
        self.get_block_hash(height).await
    }

    async fn block_height(&self, hash: &str) -> Result<u64> {
        self.get_block_height(hash).await
    }

    async fn block_transactions(&self, hash: &str) -> Result<Vec<Tx>> {
        self.get_block_transactions(hash).await
    }
}
