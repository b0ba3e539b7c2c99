//! The in-memory data store: expiring string keys and stream keys.
//!
//! The two namespaces live in separate maps. The string map sits behind a
//! single mutex held across every string operation; the stream map has its
//! own reader-writer lock, and `add_stream` holds the write lock across ID
//! generation and the append so IDs stay strictly monotone.

use std::collections::HashMap;

use tokio::sync::{Mutex, RwLock};

use crate::stream::{EntryId, Stream, StreamEntry, StreamError};
use crate::util;

/// A string value with an optional absolute expiry.
#[derive(Debug, Clone, PartialEq)]
pub struct StringValue {
    pub data: Vec<u8>,
    /// Absolute expiry in milliseconds since the epoch; `0` means never.
    pub expires_at_ms: u64,
}

impl StringValue {
    fn has_expired(&self, now_ms: u64) -> bool {
        self.expires_at_ms > 0 && self.expires_at_ms < now_ms
    }
}

/// The process-wide key space.
#[derive(Default)]
pub struct Store {
    strings: Mutex<HashMap<Vec<u8>, StringValue>>,
    streams: RwLock<HashMap<String, Stream>>,
}

impl Store {
    pub fn new() -> Self {
        Store::default()
    }

    /// Upserts a string key. `expires_at_ms` of `0` means no expiry; the
    /// `SET ... PX` handler converts its relative milliseconds to an
    /// absolute timestamp before calling this.
    pub async fn put(&self, key: Vec<u8>, value: Vec<u8>, expires_at_ms: u64) {
        let mut strings = self.strings.lock().await;
        strings.insert(
            key,
            StringValue {
                data: value,
                expires_at_ms,
            },
        );
    }

    /// Returns the live value for `key`. An expired value reads as absent
    /// and is deleted on the way out.
    pub async fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        let mut strings = self.strings.lock().await;
        let now = util::now_ms();

        let hit = strings.get(key).map(|value| {
            if value.has_expired(now) {
                None
            } else {
                Some(value.data.clone())
            }
        });

        match hit {
            Some(Some(data)) => Some(data),
            Some(None) => {
                strings.remove(key);
                None
            }
            None => None,
        }
    }

    /// Returns all live string keys, purging any expired entries met along
    /// the way.
    pub async fn scan(&self) -> Vec<Vec<u8>> {
        let mut strings = self.strings.lock().await;
        let now = util::now_ms();

        strings.retain(|_, value| !value.has_expired(now));
        strings.keys().cloned().collect()
    }

    /// The type of `key`: `"string"` if a live string exists, else
    /// `"stream"` if a stream exists, else `"none"`.
    pub async fn value_type(&self, key: &[u8]) -> &'static str {
        {
            let mut strings = self.strings.lock().await;
            let live = strings.get(key).map(|value| !value.has_expired(util::now_ms()));

            match live {
                Some(true) => return "string",
                Some(false) => {
                    strings.remove(key);
                }
                None => {}
            }
        }

        if let Ok(key) = std::str::from_utf8(key) {
            if self.streams.read().await.contains_key(key) {
                return "stream";
            }
        }

        "none"
    }

    /// Appends an entry to the stream at `key`, creating the stream if it
    /// does not exist.
    ///
    /// `id_str` may request auto-generation (`*` or `<ms>-*`). Returns the
    /// final ID in its string form.
    pub async fn add_stream(
        &self,
        key: &str,
        id_str: &str,
        fields: Vec<(String, String)>,
    ) -> Result<String, StreamError> {
        let request = EntryId::parse(id_str)?;

        let mut streams = self.streams.write().await;

        match streams.get_mut(key) {
            Some(stream) => {
                let id = stream.next_id(request)?;
                stream.add(StreamEntry { id, fields });
                Ok(id.to_string())
            }
            None => {
                // A rejected ID must not leave an empty stream behind.
                let mut stream = Stream::default();
                let id = stream.next_id(request)?;
                stream.add(StreamEntry { id, fields });
                streams.insert(key.to_string(), stream);
                Ok(id.to_string())
            }
        }
    }

    /// Returns the entries of `key` with `start <= id <= end` in stream
    /// order. A missing key reads as an empty stream.
    pub async fn get_stream(&self, key: &str, start: EntryId, end: EntryId) -> Vec<StreamEntry> {
        let streams = self.streams.read().await;

        match streams.get(key) {
            Some(stream) => stream.range(start, end),
            None => Vec::new(),
        }
    }

    /// The string form of the last entry's ID, or `"0-0"` for a missing or
    /// empty stream.
    pub async fn stream_newest_id(&self, key: &str) -> String {
        let streams = self.streams.read().await;

        streams
            .get(key)
            .and_then(|stream| stream.last_entry())
            .map(|entry| entry.id.to_string())
            .unwrap_or_else(|| "0-0".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = Store::new();
        store.put(b"foo".to_vec(), b"bar".to_vec(), 0).await;

        assert_eq!(store.get(b"foo").await, Some(b"bar".to_vec()));
        assert_eq!(store.get(b"missing").await, None);
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let store = Store::new();
        store.put(b"k".to_vec(), b"v1".to_vec(), 0).await;
        store.put(b"k".to_vec(), b"v2".to_vec(), 0).await;

        assert_eq!(store.get(b"k").await, Some(b"v2".to_vec()));
    }

    #[tokio::test]
    async fn test_expired_value_reads_as_absent_and_is_deleted() {
        let store = Store::new();
        let past = util::now_ms() - 100;
        store.put(b"k".to_vec(), b"v".to_vec(), past).await;

        assert_eq!(store.get(b"k").await, None);
        // The expired entry was removed, not just hidden.
        assert!(store.strings.lock().await.get(b"k".as_slice()).is_none());
    }

    #[tokio::test]
    async fn test_future_expiry_still_live() {
        let store = Store::new();
        let future = util::now_ms() + 60_000;
        store.put(b"k".to_vec(), b"v".to_vec(), future).await;

        assert_eq!(store.get(b"k").await, Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn test_scan_purges_expired() {
        let store = Store::new();
        store.put(b"live".to_vec(), b"v".to_vec(), 0).await;
        store
            .put(b"dead".to_vec(), b"v".to_vec(), util::now_ms() - 1)
            .await;

        let keys = store.scan().await;
        assert_eq!(keys, vec![b"live".to_vec()]);
        assert!(store.strings.lock().await.get(b"dead".as_slice()).is_none());
    }

    #[tokio::test]
    async fn test_value_type() {
        let store = Store::new();
        store.put(b"s".to_vec(), b"v".to_vec(), 0).await;
        store
            .add_stream("x", "1-1", vec![("a".to_string(), "1".to_string())])
            .await
            .unwrap();

        assert_eq!(store.value_type(b"s").await, "string");
        assert_eq!(store.value_type(b"x").await, "stream");
        assert_eq!(store.value_type(b"nope").await, "none");

        // An expired string no longer counts.
        store
            .put(b"gone".to_vec(), b"v".to_vec(), util::now_ms() - 1)
            .await;
        assert_eq!(store.value_type(b"gone").await, "none");
    }

    #[tokio::test]
    async fn test_add_stream_ids_are_strictly_increasing() {
        let store = Store::new();
        let fields = vec![("f".to_string(), "v".to_string())];

        assert_eq!(
            store.add_stream("s", "1-1", fields.clone()).await,
            Ok("1-1".to_string())
        );
        assert_eq!(
            store.add_stream("s", "1-*", fields.clone()).await,
            Ok("1-2".to_string())
        );
        assert_eq!(
            store.add_stream("s", "1-1", fields.clone()).await,
            Err(StreamError::IdInvalid)
        );
        assert_eq!(
            store.add_stream("s", "0-0", fields.clone()).await,
            Err(StreamError::IdIllegal)
        );
        assert_eq!(store.stream_newest_id("s").await, "1-2");
    }

    #[tokio::test]
    async fn test_rejected_first_add_leaves_no_stream() {
        let store = Store::new();
        let fields = vec![("f".to_string(), "v".to_string())];

        assert_eq!(
            store.add_stream("s", "0-0", fields).await,
            Err(StreamError::IdIllegal)
        );
        assert_eq!(store.value_type(b"s").await, "none");
    }

    #[tokio::test]
    async fn test_get_stream_missing_key_is_empty() {
        let store = Store::new();
        assert!(store
            .get_stream("nope", EntryId::MIN, EntryId::MAX)
            .await
            .is_empty());
        assert_eq!(store.stream_newest_id("nope").await, "0-0");
    }

    #[tokio::test]
    async fn test_string_and_stream_namespaces_are_separate() {
        let store = Store::new();
        store.put(b"k".to_vec(), b"v".to_vec(), 0).await;
        store
            .add_stream("k", "1-1", vec![("a".to_string(), "1".to_string())])
            .await
            .unwrap();

        // TYPE consults the string namespace first.
        assert_eq!(store.value_type(b"k").await, "string");
        assert_eq!(store.get(b"k").await, Some(b"v".to_vec()));
        assert_eq!(store.stream_newest_id("k").await, "1-1");
    }
}
