use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::time::sleep;

use crate::command::Command;
use crate::commands::stream_utils::encode_entries;
use crate::commands::{utf8_arg, CommandError, Outcome};
use crate::resp;
use crate::server::ServerState;
use crate::store::Store;
use crate::stream::{EntryId, StreamEntry};

/// Poll interval for `XREAD BLOCK 0`.
const BLOCK_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// `XREAD [BLOCK <ms>] STREAMS <key>... <id>...`.
///
/// For each requested stream, replies with the entries whose IDs are
/// strictly greater than the supplied ID. A `$` ID resolves once, at
/// request entry, to the stream's then-current newest ID. Without `BLOCK`
/// the streams are evaluated once; `BLOCK <ms>` sleeps for the duration and
/// then evaluates once; `BLOCK 0` polls until any requested stream has a
/// new entry. Streams with nothing new are omitted; if none has new data
/// the reply is a nil bulk.
pub async fn xread(cmd: &Command, state: &ServerState) -> Result<Outcome, CommandError> {
    let request = XreadRequest::parse(cmd, &state.store).await?;

    let results = match request.block_ms {
        None => evaluate(&state.store, &request).await,
        Some(0) => loop {
            let results = evaluate(&state.store, &request).await;
            if !results.is_empty() {
                break results;
            }
            sleep(BLOCK_POLL_INTERVAL).await;
        },
        Some(ms) => {
            sleep(Duration::from_millis(ms)).await;
            evaluate(&state.store, &request).await
        }
    };

    Ok(Outcome::Reply(encode_results(&results)))
}

struct XreadRequest {
    block_ms: Option<u64>,
    keys: Vec<String>,
    /// Resolved start IDs, one per key; entries must be strictly greater.
    ids: Vec<EntryId>,
}

impl XreadRequest {
    async fn parse(cmd: &Command, store: &Store) -> Result<XreadRequest, CommandError> {
        let mut pos = 1;

        let mut block_ms = None;
        if cmd.len() > pos && cmd.at(pos).eq_ignore_ascii_case(b"block") {
            if cmd.len() <= pos + 1 {
                return Err(CommandError::InvalidCommand);
            }
            let ms = utf8_arg(cmd.at(pos + 1))?
                .parse::<u64>()
                .map_err(|_| CommandError::InvalidCommand)?;
            block_ms = Some(ms);
            pos += 2;
        }

        if cmd.len() <= pos || !cmd.at(pos).eq_ignore_ascii_case(b"streams") {
            return Err(CommandError::InvalidCommand);
        }
        pos += 1;

        let rest = cmd.len() - pos;
        if rest == 0 || rest % 2 != 0 {
            return Err(CommandError::InvalidCommand);
        }
        let count = rest / 2;

        let mut keys = Vec::with_capacity(count);
        for i in 0..count {
            keys.push(utf8_arg(cmd.at(pos + i))?);
        }

        let mut ids = Vec::with_capacity(count);
        for i in 0..count {
            let raw = utf8_arg(cmd.at(pos + count + i))?;
            let id = if raw == "$" {
                // Resolved once here, so entries added while blocking are
                // seen as new.
                EntryId::parse(&store.stream_newest_id(&keys[i]).await)?
            } else {
                EntryId::parse(&raw)?
            };
            ids.push(id);
        }

        Ok(XreadRequest {
            block_ms,
            keys,
            ids,
        })
    }
}

// Evaluates every requested stream once, keeping only those with entries
// strictly greater than the supplied ID.
async fn evaluate(store: &Store, request: &XreadRequest) -> Vec<(String, Vec<StreamEntry>)> {
    let mut results = Vec::new();

    for (key, id) in request.keys.iter().zip(&request.ids) {
        let mut entries = store.get_stream(key, *id, EntryId::MAX).await;

        // The range is inclusive; drop the head to make it strictly greater.
        if entries.first().map(|e| e.id == *id).unwrap_or(false) {
            entries.remove(0);
        }

        if !entries.is_empty() {
            results.push((key.clone(), entries));
        }
    }

    results
}

fn encode_results(results: &[(String, Vec<StreamEntry>)]) -> Bytes {
    if results.is_empty() {
        return resp::nil_bulk();
    }

    let mut buf = BytesMut::new();
    buf.extend_from_slice(&resp::array_header(results.len()));

    for (key, entries) in results {
        buf.extend_from_slice(&resp::array_header(2));
        buf.extend_from_slice(&resp::bulk(key.as_bytes()));
        buf.extend_from_slice(&encode_entries(entries));
    }

    buf.freeze()
}
