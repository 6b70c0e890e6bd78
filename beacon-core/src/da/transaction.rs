// crates
use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;
// internal
use super::VersionedHash;

/// Type tag of blob carrying transactions.
pub const BLOB_TX_TYPE: u8 = 0x05;

/// Offset, within the signed message, of the field that locates the
/// versioned hash list.
const VERSIONED_HASHES_OFFSET_FIELD: usize = 188;
const OFFSET_SIZE: usize = 4;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TxParseError {
    #[error("transaction of {len} bytes is too short, {needed} bytes needed")]
    Truncated { len: usize, needed: usize },
    #[error("versioned hashes offset {offset} is out of bounds for {len} bytes")]
    OffsetOutOfBounds { offset: usize, len: usize },
    #[error("versioned hashes region of {0} bytes is not a multiple of 32")]
    Misaligned(usize),
}

fn read_offset(tx: &[u8], at: usize) -> Result<usize, TxParseError> {
    let end = at
        .checked_add(OFFSET_SIZE)
        .ok_or(TxParseError::OffsetOutOfBounds {
            offset: at,
            len: tx.len(),
        })?;
    let bytes = tx.get(at..end).ok_or(TxParseError::Truncated {
        len: tx.len(),
        needed: end,
    })?;
    let mut raw = [0u8; OFFSET_SIZE];
    raw.copy_from_slice(bytes);
    Ok(u32::from_le_bytes(raw) as usize)
}

/// Extract the versioned hashes embedded in a blob transaction.
///
/// The signed message starts at `1 + u32_le(tx[1..5])`; the message field at
/// byte 188 holds the offset, relative to the message, of the hash list,
/// which runs until the end of the transaction.
pub fn tx_peek_blob_versioned_hashes(tx: &[u8]) -> Result<Vec<VersionedHash>, TxParseError> {
    let message_offset = 1 + read_offset(tx, 1)?;
    let field = message_offset
        .checked_add(VERSIONED_HASHES_OFFSET_FIELD)
        .ok_or(TxParseError::OffsetOutOfBounds {
            offset: message_offset,
            len: tx.len(),
        })?;
    let hashes_offset = message_offset
        .checked_add(read_offset(tx, field)?)
        .filter(|offset| *offset <= tx.len())
        .ok_or(TxParseError::OffsetOutOfBounds {
            offset: message_offset,
            len: tx.len(),
        })?;
    let region = &tx[hashes_offset..];
    if region.len() % 32 != 0 {
        return Err(TxParseError::Misaligned(region.len()));
    }
    Ok(region
        .chunks_exact(32)
        .map(|chunk| {
            let mut hash = [0u8; 32];
            hash.copy_from_slice(chunk);
            VersionedHash(hash)
        })
        .collect())
}

/// Minimal blob transaction carrying `hashes`, laid out so that
/// [`tx_peek_blob_versioned_hashes`] finds them. Used to build test payloads.
pub fn encode_blob_transaction(hashes: &[VersionedHash]) -> Bytes {
    let mut tx = BytesMut::with_capacity(
        1 + OFFSET_SIZE + VERSIONED_HASHES_OFFSET_FIELD + OFFSET_SIZE + hashes.len() * 32,
    );
    tx.put_u8(BLOB_TX_TYPE);
    tx.put_u32_le(OFFSET_SIZE as u32);
    tx.put_bytes(0, VERSIONED_HASHES_OFFSET_FIELD);
    tx.put_u32_le((VERSIONED_HASHES_OFFSET_FIELD + OFFSET_SIZE) as u32);
    for hash in hashes {
        tx.put_slice(&hash.0);
    }
    tx.freeze()
}
