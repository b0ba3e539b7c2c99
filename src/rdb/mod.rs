//! Minimal RDB loader for startup bootstrap.
//!
//! Parses just enough of the RDB format to rehydrate string keys with
//! optional expiry: the header, AUX fields, SELECTDB/RESIZEDB blocks,
//! EXPIRETIME/EXPIRETIMEMS markers and String-typed key-value pairs. Any
//! other value type or length encoding aborts the load; a failed load is
//! logged and the server starts with whatever was decoded so far.

use std::path::PathBuf;

use thiserror::Error;
use tokio::sync::mpsc;

mod encoding;

use encoding::{byte_at, read_plain_length, read_string, slice_at};

const OPCODE_AUX: u8 = 0xFA;
const OPCODE_RESIZEDB: u8 = 0xFB;
const OPCODE_EXPIRETIME_MS: u8 = 0xFC;
const OPCODE_EXPIRETIME: u8 = 0xFD;
const OPCODE_SELECTDB: u8 = 0xFE;
const OPCODE_EOF: u8 = 0xFF;

const VALUE_TYPE_STRING: u8 = 0x00;

/// The contents of an empty RDB file, served to replicas on FULLRESYNC.
pub const EMPTY_RDB: &[u8] = &[
    0x52, 0x45, 0x44, 0x49, 0x53, 0x30, 0x30, 0x31, 0x31, 0xfa, 0x09, 0x72,
    0x65, 0x64, 0x69, 0x73, 0x2d, 0x76, 0x65, 0x72, 0x05, 0x37, 0x2e, 0x32,
    0x2e, 0x30, 0xfa, 0x0a, 0x72, 0x65, 0x64, 0x69, 0x73, 0x2d, 0x62, 0x69,
    0x74, 0x73, 0xc0, 0x40, 0xfa, 0x05, 0x63, 0x74, 0x69, 0x6d, 0x65, 0xc2,
    0x6d, 0x08, 0xbc, 0x65, 0xfa, 0x08, 0x75, 0x73, 0x65, 0x64, 0x2d, 0x6d,
    0x65, 0x6d, 0xc2, 0xb0, 0xc4, 0x10, 0x00, 0xfa, 0x08, 0x61, 0x6f, 0x66,
    0x2d, 0x62, 0x61, 0x73, 0x65, 0xc0, 0x00, 0xff, 0xf0, 0x6e, 0x3b, 0xfe,
    0xc0, 0xff, 0x5a, 0xa2,
];

/// Capacity of the loader's entry queue.
const ENTRY_QUEUE_CAPACITY: usize = 100;

/// Errors that abort an RDB load.
#[derive(Error, Debug, PartialEq)]
pub enum RdbError {
    #[error("unexpected end of RDB data")]
    UnexpectedEof,
    #[error("invalid RDB header")]
    InvalidHeader,
    #[error("unsupported length encoding ({0})")]
    UnsupportedLength(u8),
    #[error("expected a plain length encoding")]
    ExpectedPlainLength,
    #[error("unsupported value type 0x{0:02X}")]
    UnsupportedValueType(u8),
    #[error("missing RESIZEDB after SELECTDB")]
    MissingResizeDb,
    #[error("unknown opcode 0x{0:02X}")]
    UnknownOpcode(u8),
}

/// One decoded string key-value pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
    /// Absolute expiry in milliseconds since the epoch; `0` means none.
    pub expires_at_ms: u64,
}

/// Starts loading the file at `path` in a background task.
///
/// Decoded entries stream through the returned bounded channel; the caller
/// drains it into the store until it closes. Load errors are logged and
/// close the channel early without touching the caller.
pub fn load(path: PathBuf) -> mpsc::Receiver<Entry> {
    let (tx, rx) = mpsc::channel(ENTRY_QUEUE_CAPACITY);

    tokio::spawn(async move {
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) => {
                eprintln!("rdb: failed to read {}: {}", path.display(), e);
                return;
            }
        };

        if let Err(e) = parse(&bytes, &tx).await {
            eprintln!("rdb: load of {} aborted: {}", path.display(), e);
        }
    });

    rx
}

/// Parses a whole RDB image, sending each decoded string entry into `tx`.
pub async fn parse(bytes: &[u8], tx: &mpsc::Sender<Entry>) -> Result<(), RdbError> {
    let mut cursor = read_header(bytes)?;

    loop {
        let opcode = byte_at(bytes, cursor)?;
        cursor += 1;

        match opcode {
            OPCODE_AUX => {
                // Two length-prefixed strings: the AUX key and its value.
                for _ in 0..2 {
                    let (_, consumed) = read_string(bytes, cursor)?;
                    cursor += consumed;
                }
            }
            OPCODE_SELECTDB => {
                cursor = read_database(bytes, cursor, tx).await?;
            }
            OPCODE_EOF => return Ok(()),
            other => return Err(RdbError::UnknownOpcode(other)),
        }
    }
}

// Validates the 9-byte header (`REDIS` + 4 version digits) and returns the
// cursor past it.
fn read_header(bytes: &[u8]) -> Result<usize, RdbError> {
    let header = slice_at(bytes, 0, 9)?;

    if &header[0..5] != b"REDIS" {
        return Err(RdbError::InvalidHeader);
    }
    if !header[5..9].iter().all(|b| b.is_ascii_digit()) {
        return Err(RdbError::InvalidHeader);
    }

    Ok(9)
}

// Parses one SELECTDB block: the database number, the mandatory RESIZEDB
// sizes, then entries until the next EOF or SELECTDB opcode.
async fn read_database(
    bytes: &[u8],
    mut cursor: usize,
    tx: &mpsc::Sender<Entry>,
) -> Result<usize, RdbError> {
    let (_db_number, consumed) = read_plain_length(bytes, cursor)?;
    cursor += consumed;

    if byte_at(bytes, cursor)? != OPCODE_RESIZEDB {
        return Err(RdbError::MissingResizeDb);
    }
    cursor += 1;

    // Hash table size and expiry hash table size.
    for _ in 0..2 {
        let (_, consumed) = read_plain_length(bytes, cursor)?;
        cursor += consumed;
    }

    loop {
        match byte_at(bytes, cursor)? {
            OPCODE_EOF | OPCODE_SELECTDB => return Ok(cursor),
            _ => {
                let (entry, consumed) = read_entry(bytes, cursor)?;
                cursor += consumed;
                if tx.send(entry).await.is_err() {
                    // Receiver dropped; nothing left to load into.
                    return Ok(cursor);
                }
            }
        }
    }
}

// Parses one entry, optionally preceded by an expiry marker. Returns the
// entry and the number of bytes consumed.
fn read_entry(bytes: &[u8], cursor: usize) -> Result<(Entry, usize), RdbError> {
    let mut consumed = 1;
    let mut expires_at_ms = 0u64;

    let value_type = match byte_at(bytes, cursor)? {
        OPCODE_EXPIRETIME => {
            let raw = slice_at(bytes, cursor + consumed, 4)?;
            expires_at_ms =
                u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]) as u64 * 1000;
            consumed += 4;
            let t = byte_at(bytes, cursor + consumed)?;
            consumed += 1;
            t
        }
        OPCODE_EXPIRETIME_MS => {
            let raw = slice_at(bytes, cursor + consumed, 8)?;
            expires_at_ms = u64::from_le_bytes([
                raw[0], raw[1], raw[2], raw[3], raw[4], raw[5], raw[6], raw[7],
            ]);
            consumed += 8;
            let t = byte_at(bytes, cursor + consumed)?;
            consumed += 1;
            t
        }
        t => t,
    };

    if value_type != VALUE_TYPE_STRING {
        return Err(RdbError::UnsupportedValueType(value_type));
    }

    let (key, key_consumed) = read_string(bytes, cursor + consumed)?;
    consumed += key_consumed;
    let (value, value_consumed) = read_string(bytes, cursor + consumed)?;
    consumed += value_consumed;

    Ok((
        Entry {
            key,
            value,
            expires_at_ms,
        },
        consumed,
    ))
}
