use crate::error::{Error, Result};
use std::env;
use std::path::PathBuf;

pub const DEFAULT_SCAN_DEPTH: u64 = 2000;

#[derive(Debug, Clone)]
pub struct Config {
    pub rpc_url: String,
    pub rpc_user: String,
    pub rpc_pass: String,
    pub content_dir: PathBuf,
    pub scan_depth: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            rpc_url: require("NODE_RPC_URL")?,
            rpc_user: require("NODE_RPC_USER")?,
            rpc_pass: require("NODE_RPC_PASS")?,
            content_dir: env::var("CONTENT_DIR")
                .unwrap_or_else(|_| "./content".to_string())
                .into(),
            scan_depth: env::var("SCAN_DEPTH")
                .ok()
                .and_then(|value| value.parse().ok())
                .unwrap_or(DEFAULT_SCAN_DEPTH),
        })
    }
}

fn require(name: &'static str) -> Result<String> {
    env::var(name).map_err(|_| Error::ConfigMissing(name))
}
