use crate::mime;
use crate::reconstruct::{base_txid, Reconstructed, Reconstructor};
use crate::rpc::ChainSource;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static CONTENT_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)/content/([0-9a-f]{64}i[0-9]+)").expect("valid reference regex"));

/// Only HTML and SVG artifacts can embed references to other inscriptions.
pub fn embeds_references(mime_type: &str) -> bool {
    matches!(mime::essence(mime_type), "text/html" | "image/svg+xml")
}

/// Unique `/content/<id>` references in document order.
pub fn extract_references(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut refs = Vec::new();
    for capture in CONTENT_REF.captures_iter(text) {
        let id = capture[1].to_lowercase();
        if seen.insert(id.clone()) {
            refs.push(id);
        }
    }
    refs
}

/// Make sure every inscription referenced from `root` (transitively) is
/// present in the content store. A visited set keyed by base txid keeps
/// cyclic references from recursing forever, and a failed dependency is
/// logged and skipped rather than aborting the traversal.
pub async fn resolve_dependencies<S: ChainSource>(
    reconstructor: &Reconstructor<S>,
    root: &Reconstructed,
) {
    if !embeds_references(&root.mime_type) {
        return;
    }

    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(base_txid(&root.inscription_id));

    let mut pending = match reconstructor.artifact_text(root) {
        Ok(text) => extract_references(&text),
        Err(err) => {
            tracing::warn!(
                "could not read {} for reference scan: {}",
                root.inscription_id,
                err
            );
            return;
        }
    };

    while let Some(dep_id) = pending.pop() {
        if !visited.insert(base_txid(&dep_id)) {
            continue;
        }

        match reconstructor.ensure_inscription(&dep_id).await {
            Ok(child) => {
                tracing::info!(
                    "dependency {} {}",
                    child.inscription_id,
                    if child.from_cache { "already cached" } else { "reconstructed" }
                );
                if embeds_references(&child.mime_type) {
                    match reconstructor.artifact_text(&child) {
                        Ok(text) => pending.extend(extract_references(&text)),
                        Err(err) => tracing::warn!(
                            "could not read {} for reference scan: {}",
                            child.inscription_id,
                            err
                        ),
                    }
                }
            }
            Err(err) => {
                tracing::warn!("dependency {} failed to resolve: {}", dep_id, err);
            }
        }
    }
}
