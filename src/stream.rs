//! Stream values: append-only sequences of entries keyed by `(ms, seq)` IDs.

use std::fmt;

use thiserror::Error;

use crate::util;

/// Errors raised while validating or generating stream entry IDs.
///
/// The display strings are the exact messages a client sees after the
/// `-ERR ` prefix.
#[derive(Error, Debug, PartialEq)]
pub enum StreamError {
    #[error("The ID specified in XADD must be greater than 0-0")]
    IdIllegal,
    #[error("The ID specified in XADD is equal or smaller than the target stream top item")]
    IdInvalid,
    #[error("Invalid stream ID specified as stream command argument")]
    Format,
}

/// A stream entry identifier: a millisecond timestamp paired with a sequence
/// number, ordered lexicographically.
///
/// `-1` in either field of a *request* ID means "unset, auto-generate".
/// Stored entry IDs are always fully resolved and non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryId {
    pub ms: i64,
    pub seq: i64,
}

impl EntryId {
    /// The minimum legal entry ID. `0-0` is forbidden, so ranges starting at
    /// `-` begin here.
    pub const MIN: EntryId = EntryId { ms: 0, seq: 1 };

    /// The maximum entry ID, used for `+` range bounds.
    pub const MAX: EntryId = EntryId {
        ms: i64::MAX,
        seq: i64::MAX,
    };

    /// A fully unset request ID, produced by a literal `*`.
    pub const ANY: EntryId = EntryId { ms: -1, seq: -1 };

    /// Parses a request ID: `*` for full auto-generation, `<ms>-*` for
    /// sequence auto-generation, `<ms>-<seq>` for an explicit ID.
    pub fn parse(id_str: &str) -> Result<EntryId, StreamError> {
        if id_str == "*" {
            return Ok(EntryId::ANY);
        }

        let (ms_part, seq_part) = id_str.split_once('-').ok_or(StreamError::Format)?;

        let ms = parse_part(ms_part)?;
        let seq = parse_part(seq_part)?;

        Ok(EntryId { ms, seq })
    }

    /// Whether both fields are resolved.
    pub fn is_complete(&self) -> bool {
        self.ms >= 0 && self.seq >= 0
    }

    /// Lexicographic less-than with the request-ID convention that an unset
    /// sequence on the left compares equal within its timestamp.
    pub fn less_than(&self, other: &EntryId) -> bool {
        if self.ms < other.ms {
            return true;
        }
        self.ms == other.ms && self.seq != -1 && self.seq < other.seq
    }

    /// Strict lexicographic greater-than.
    pub fn greater_than(&self, other: &EntryId) -> bool {
        self.ms > other.ms || (self.ms == other.ms && self.seq > other.seq)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

fn parse_part(part: &str) -> Result<i64, StreamError> {
    if part == "*" {
        return Ok(-1);
    }
    let v = part.parse::<i64>().map_err(|_| StreamError::Format)?;
    if v < 0 {
        return Err(StreamError::Format);
    }
    Ok(v)
}

/// One stream entry: its ID and the field-value pairs in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEntry {
    pub id: EntryId,
    pub fields: Vec<(String, String)>,
}

/// An append-only sequence of entries with strictly increasing IDs.
#[derive(Debug, Default)]
pub struct Stream {
    entries: Vec<StreamEntry>,
}

impl Stream {
    pub fn last_entry(&self) -> Option<&StreamEntry> {
        self.entries.last()
    }

    /// Resolves a request ID against this stream and validates it.
    ///
    /// Unset fields are filled in: the timestamp from the wall clock, the
    /// sequence from the last entry with the same timestamp (or `0`, except
    /// that an empty stream at timestamp `0` starts at `1` so the forbidden
    /// `0-0` is never generated). The result must be strictly greater than
    /// the last entry's ID.
    pub fn next_id(&self, request: EntryId) -> Result<EntryId, StreamError> {
        let ms = if request.ms == -1 {
            util::now_ms() as i64
        } else {
            request.ms
        };

        let seq = if request.seq == -1 {
            match self.last_entry() {
                Some(last) if last.id.ms == ms => last.id.seq + 1,
                Some(_) => 0,
                None if ms == 0 => 1,
                None => 0,
            }
        } else {
            request.seq
        };

        let id = EntryId { ms, seq };

        if id.ms == 0 && id.seq == 0 {
            return Err(StreamError::IdIllegal);
        }

        if let Some(last) = self.last_entry() {
            if !id.greater_than(&last.id) {
                return Err(StreamError::IdInvalid);
            }
        }

        Ok(id)
    }

    /// Appends an entry. The caller has already validated the ID with
    /// [`Stream::next_id`].
    pub fn add(&mut self, entry: StreamEntry) {
        self.entries.push(entry);
    }

    /// Returns the entries with `start <= id <= end` in stream order.
    pub fn range(&self, start: EntryId, end: EntryId) -> Vec<StreamEntry> {
        let mut result = Vec::new();
        for entry in &self.entries {
            if entry.id.less_than(&start) {
                continue;
            }
            if entry.id.greater_than(&end) {
                break;
            }
            result.push(entry.clone());
        }
        result
    }
}
