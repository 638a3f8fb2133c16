use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("missing required environment variable {0}")]
    ConfigMissing(&'static str),

    #[error("node unreachable: {0}")]
    NodeUnreachable(#[source] reqwest::Error),

    #[error("rpc {method} {params} failed: {message}")]
    Rpc {
        method: String,
        params: serde_json::Value,
        message: String,
    },

    #[error("malformed script: {0}")]
    ScriptParse(String),

    #[error("no inscription found walking back from {0}")]
    NoInscription(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
