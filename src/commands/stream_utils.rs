//! Shared parsing and encoding for the stream commands.

use bytes::{Bytes, BytesMut};

use crate::resp;
use crate::stream::{EntryId, StreamEntry, StreamError};

/// Parses an `XRANGE` bound: `-` is the minimum legal ID, `+` the maximum,
/// anything else an explicit ID.
pub fn parse_range_bound(bound: &str) -> Result<EntryId, StreamError> {
    match bound {
        "-" => Ok(EntryId::MIN),
        "+" => Ok(EntryId::MAX),
        other => EntryId::parse(other),
    }
}

/// Encodes entries as the nested array shape `XRANGE` and `XREAD` reply
/// with: an array of `[id, [field, value, ...]]` pairs.
pub fn encode_entries(entries: &[StreamEntry]) -> Bytes {
    let mut buf = BytesMut::new();
    buf.extend_from_slice(&resp::array_header(entries.len()));

    for entry in entries {
        buf.extend_from_slice(&resp::array_header(2));
        buf.extend_from_slice(&resp::bulk(entry.id.to_string().as_bytes()));

        let mut flat: Vec<&[u8]> = Vec::with_capacity(entry.fields.len() * 2);
        for (field, value) in &entry.fields {
            flat.push(field.as_bytes());
            flat.push(value.as_bytes());
        }
        buf.extend_from_slice(&resp::array(&flat));
    }

    buf.freeze()
}
