//! Fallback decode of raw transaction hex, used when the node rejects every
//! verbose `getrawtransaction` form. Only the transparent prelude is read:
//! enough to recover inputs, script sigs, and output scripts. Shielded
//! bundles past the transparent fields are ignored.

use crate::error::{Error, Result};
use crate::rpc::{ScriptPubKey, ScriptSig, Tx, Vin, Vout};

const OVERWINTER_FLAG: u32 = 1 << 31;

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8]> {
        let end = self
            .pos
            .checked_add(count)
            .filter(|&end| end <= self.bytes.len())
            .ok_or_else(|| {
                Error::ScriptParse(format!("raw transaction truncated at byte {}", self.pos))
            })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u32_le(&mut self) -> Result<u32> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn varint(&mut self) -> Result<u64> {
        let first = self.take(1)?[0];
        Ok(match first {
            0xfd => {
                let bytes = self.take(2)?;
                u64::from(u16::from_le_bytes([bytes[0], bytes[1]]))
            }
            0xfe => u64::from({
                let bytes = self.take(4)?;
                u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
            }),
            0xff => {
                let bytes = self.take(8)?;
                u64::from_le_bytes([
                    bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
                ])
            }
            small => u64::from(small),
        })
    }

    fn var_bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.varint()?;
        self.take(len as usize)
    }
}

/// Decode the transparent fields of a v1–v5 serialized transaction.
///
/// The v3/v4 layout puts the version group id right after the header; v5
/// (ZIP-225) additionally carries the consensus branch id, lock time, and
/// expiry height before the transparent bundle.
pub fn decode(txid: &str, raw: &[u8]) -> Result<Tx> {
    let mut cursor = Cursor::new(raw);

    let header = cursor.u32_le()?;
    let overwintered = header & OVERWINTER_FLAG != 0;
    let version = header & !OVERWINTER_FLAG;

    if overwintered {
        let _version_group_id = cursor.u32_le()?;
        if version >= 5 {
            let _consensus_branch_id = cursor.u32_le()?;
            let _lock_time = cursor.u32_le()?;
            let _expiry_height = cursor.u32_le()?;
        }
    }

    let vin_count = cursor.varint()?;
    let mut vin = Vec::new();
    for _ in 0..vin_count {
        let prev_hash = cursor.take(32)?;
        let prev_n = cursor.u32_le()?;
        let script = cursor.var_bytes()?;
        let _sequence = cursor.u32_le()?;

        // Null prevout marks the coinbase; verbose RPC omits txid/vout and
        // scriptSig there, so the local decode does the same.
        if prev_hash.iter().all(|&b| b == 0) && prev_n == u32::MAX {
            vin.push(Vin {
                txid: None,
                vout: None,
                script_sig: None,
            });
            continue;
        }

        let mut txid_bytes = prev_hash.to_vec();
        txid_bytes.reverse();
        vin.push(Vin {
            txid: Some(hex::encode(txid_bytes)),
            vout: Some(prev_n),
            script_sig: Some(ScriptSig {
                hex: hex::encode(script),
            }),
        });
    }

    let vout_count = cursor.varint()?;
    let mut vout = Vec::new();
    for n in 0..vout_count {
        let _value = cursor.take(8)?;
        let script = cursor.var_bytes()?;
        vout.push(Vout {
            n: n as u32,
            script_pub_key: ScriptPubKey {
                hex: hex::encode(script),
            },
        });
    }

    Ok(Tx {
        txid: txid.to_string(),
        blockhash: None,
        vin,
        vout,
    })
}
