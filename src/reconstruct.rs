use crate::envelope;
use crate::error::{Error, Result};
use crate::mime;
use crate::rpc::ChainSource;
use crate::script;
use crate::store::{ContentRecord, ContentStore};
use crate::walker::{self, Spender};
use std::collections::HashMap;
use std::time::Duration;

const SCAN_PACE: Duration = Duration::from_secs(1);

/// Canonical inscription id: the bare txid with an `i0` suffix. Any existing
/// `i<n>` suffix is replaced.
pub fn normalize_id(input: &str) -> String {
    format!("{}i0", base_txid(input))
}

/// Strip an `i<n>` suffix from an id, leaving the bare txid. Hex txids never
/// contain `i`, so splitting on the first one is unambiguous.
pub fn base_txid(input: &str) -> String {
    let input = input.trim().to_lowercase();
    match input.split_once('i') {
        Some((base, rest)) if !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()) => {
            base.to_string()
        }
        _ => input,
    }
}

/// Outcome of [`Reconstructor::ensure_inscription`]. `buffer` is populated
/// only when the artifact was decoded on this call; cache hits are read from
/// disk on demand.
#[derive(Debug)]
pub struct Reconstructed {
    pub inscription_id: String,
    pub mime_type: String,
    pub buffer: Option<Vec<u8>>,
    pub from_cache: bool,
}

pub struct Reconstructor<S> {
    source: S,
    store: ContentStore,
    scan_depth: u64,
    pace: Duration,
}

impl<S: ChainSource> Reconstructor<S> {
    pub fn new(source: S, store: ContentStore, scan_depth: u64) -> Self {
        Self {
            source,
            store,
            scan_depth,
            pace: SCAN_PACE,
        }
    }

    /// Drop the pacing delay between block fetches; fixtures need no mercy.
    #[cfg(test)]
    pub fn without_pace(mut self) -> Self {
        self.pace = Duration::ZERO;
        self
    }

    /// Make sure the artifact for `id_or_txid` exists in the content store,
    /// decoding it from the chain when it is not already cached.
    pub async fn ensure_inscription(&self, id_or_txid: &str) -> Result<Reconstructed> {
        let inscription_id = normalize_id(id_or_txid);
        let base = base_txid(&inscription_id);

        // Indexed and still on disk: nothing to decode.
        if let Some(record) = self.store.master_entry(&inscription_id)? {
            if self.store.artifact_path(&record.filename).is_file() {
                tracing::debug!("{} found in master index", inscription_id);
                return Ok(Reconstructed {
                    inscription_id,
                    mime_type: record.mime_type,
                    buffer: None,
                    from_cache: true,
                });
            }
        }

        // On disk but never indexed: adopt the file.
        if let Some(path) = self.store.find_file(&inscription_id)? {
            tracing::info!(
                "{} present at {} but missing from master index; registering",
                inscription_id,
                path.display()
            );
            let record = self.store.register_existing(&inscription_id, &base, &path)?;
            return Ok(Reconstructed {
                inscription_id,
                mime_type: record.mime_type,
                buffer: None,
                from_cache: true,
            });
        }

        self.reconstruct(&inscription_id, &base).await
    }

    async fn reconstruct(&self, inscription_id: &str, base: &str) -> Result<Reconstructed> {
        tracing::info!("reconstructing {} from chain", inscription_id);

        let (genesis, genesis_envelope) = walker::find_genesis(&self.source, base).await?;
        let Some(header) = genesis_envelope else {
            return Err(Error::NoInscription(base.to_string()));
        };

        let total_pieces = header.total_pieces;
        let mime_type = header.mime_type;
        let mut pieces = header.pieces;
        tracing::info!(
            "genesis {} declares {} piece(s) of {}",
            genesis.txid,
            total_pieces,
            mime_type
        );

        // Unconfirmed genesis has no height; the spender search cannot start
        // and the artifact is emitted from the genesis pieces alone.
        let mut height = match &genesis.blockhash {
            Some(hash) => match self.source.block_height(hash).await {
                Ok(height) => Some(height),
                Err(err @ Error::NodeUnreachable(_)) => return Err(err),
                Err(err) => {
                    tracing::warn!("genesis block {} lookup failed: {}", hash, err);
                    None
                }
            },
            None => None,
        };

        let mut cur_txid = genesis.txid.clone();
        while !is_complete(&pieces, total_pieces) {
            let Some(cur_height) = height else { break };

            let spender = walker::find_spender(
                &self.source,
                &cur_txid,
                0,
                cur_height,
                self.scan_depth,
                self.pace,
            )
            .await?;
            let Some(spender) = spender else { break };

            if let Some(continuation) = decode_spender(&spender, total_pieces, &mime_type) {
                if continuation.total_pieces != total_pieces
                    || continuation.mime_type != mime_type
                {
                    tracing::debug!(
                        "continuation {} re-declares its envelope ({} piece(s) of {})",
                        spender.tx.txid,
                        continuation.total_pieces,
                        continuation.mime_type
                    );
                }
                for (index, data) in continuation.pieces {
                    // First writer wins; later claims on an index are ignored.
                    pieces.entry(index).or_insert(data);
                }
            }

            cur_txid = spender.tx.txid.clone();
            height = Some(spender.height);
        }

        let complete = is_complete(&pieces, total_pieces);
        if !complete {
            tracing::warn!(
                "{}: spender chain exhausted with {}/{} piece(s); emitting partial artifact",
                inscription_id,
                pieces.len(),
                total_pieces
            );
        }

        let buffer = assemble(&pieces, total_pieces);
        let ext = mime::extension_for(&mime_type);
        let filename = format!("{inscription_id}.{ext}");
        let size = self.store.write_artifact(&filename, &buffer)?;
        self.store.upsert_master_entry(ContentRecord {
            inscription_id: inscription_id.to_string(),
            txid: base.to_string(),
            filename,
            mime_type: mime_type.clone(),
            ext: ext.to_string(),
            size,
            created_at: String::new(),
            complete,
        })?;

        tracing::info!("{} written ({} bytes, {})", inscription_id, size, mime_type);
        Ok(Reconstructed {
            inscription_id: inscription_id.to_string(),
            mime_type,
            buffer: Some(buffer),
            from_cache: false,
        })
    }

    /// Artifact body as text, from the in-memory buffer when the artifact was
    /// just decoded or from disk for cache hits.
    pub fn artifact_text(&self, outcome: &Reconstructed) -> Result<String> {
        if let Some(buffer) = &outcome.buffer {
            return Ok(String::from_utf8_lossy(buffer).into_owned());
        }
        let bytes = match self.store.master_entry(&outcome.inscription_id)? {
            Some(record) => self.store.read_artifact(&record.filename)?,
            None => {
                let path = self
                    .store
                    .find_file(&outcome.inscription_id)?
                    .ok_or_else(|| {
                        std::io::Error::new(
                            std::io::ErrorKind::NotFound,
                            format!("artifact for {} not found", outcome.inscription_id),
                        )
                    })?;
                std::fs::read(path)?
            }
        };
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

fn decode_spender(
    spender: &Spender,
    total_pieces: u64,
    mime_type: &str,
) -> Option<envelope::Continuation> {
    let sig = spender.tx.vin.get(spender.vin_index)?.script_sig.as_ref()?;
    let chunks = script::parse_hex(&sig.hex).ok()?;
    envelope::decode_continuation(&chunks, total_pieces, mime_type)
}

fn is_complete(pieces: &HashMap<u64, Vec<u8>>, total_pieces: u64) -> bool {
    (0..total_pieces).all(|index| pieces.contains_key(&index))
}

/// Concatenate pieces in descending index order, the on-chain convention for
/// these artifacts. Missing indices contribute nothing.
fn assemble(pieces: &HashMap<u64, Vec<u8>>, total_pieces: u64) -> Vec<u8> {
    let mut buffer = Vec::new();
    for index in (0..total_pieces).rev() {
        if let Some(data) = pieces.get(&index) {
            buffer.extend_from_slice(data);
        }
    }
    buffer
}
