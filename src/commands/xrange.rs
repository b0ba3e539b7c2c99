use crate::command::Command;
use crate::commands::stream_utils::{encode_entries, parse_range_bound};
use crate::commands::{utf8_arg, CommandError, Outcome};
use crate::server::ServerState;

/// `XRANGE <key> <start> <end>`.
///
/// Replies with the entries whose IDs fall inside the inclusive range, in
/// stream order, as an array of `[id, [field, value, ...]]` pairs. `-` and
/// `+` select the minimum and maximum bounds; a missing key reads as an
/// empty stream.
pub async fn xrange(cmd: &Command, state: &ServerState) -> Result<Outcome, CommandError> {
    if cmd.len() != 4 {
        return Err(CommandError::InvalidCommand);
    }

    let key = utf8_arg(cmd.at(1))?;
    let start = parse_range_bound(&utf8_arg(cmd.at(2))?)?;
    let end = parse_range_bound(&utf8_arg(cmd.at(3))?)?;

    let entries = state.store.get_stream(&key, start, end).await;

    Ok(Outcome::Reply(encode_entries(&entries)))
}
