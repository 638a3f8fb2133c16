mod config;
mod deps;
mod envelope;
mod error;
mod mime;
mod rawtx;
mod reconstruct;
mod rpc;
mod script;
mod store;
#[cfg(test)]
mod testutil;
mod walker;

use anyhow::Result;
use std::env;
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let verbose = env::var("VERBOSE_LOGS")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let max_level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    let subscriber = FmtSubscriber::builder().with_max_level(max_level).finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    let Some(target) = env::args().nth(1) else {
        eprintln!("usage: zordinals <txid-or-inscription-id>");
        std::process::exit(2);
    };

    // Config
    let config = config::Config::from_env()?;

    // Components
    let rpc = rpc::RpcClient::new(&config);
    let store = store::ContentStore::new(&config.content_dir);
    let reconstructor = reconstruct::Reconstructor::new(rpc, store, config.scan_depth);

    let outcome = reconstructor.ensure_inscription(&target).await?;
    tracing::info!(
        "{} ({}) {}",
        outcome.inscription_id,
        outcome.mime_type,
        if outcome.from_cache {
            "served from cache"
        } else {
            "reconstructed"
        }
    );

    // HTML and SVG artifacts may pull in other inscriptions; make sure those
    // exist too before reporting success.
    deps::resolve_dependencies(&reconstructor, &outcome).await;

    Ok(())
}
