use crate::command::Command;
use crate::commands::{CommandError, Outcome};
use crate::rdb;
use crate::resp;
use crate::server::ServerState;

/// `PSYNC <replid> <offset>`.
///
/// Only full resynchronization is supported: the reply is the
/// `+FULLRESYNC <repl_id> <repl_offset>` status followed by an empty RDB
/// payload frame, after which the dispatcher promotes the connection to a
/// replica link and never reads from it again.
pub async fn psync(cmd: &Command, state: &ServerState) -> Result<Outcome, CommandError> {
    if cmd.len() != 3 {
        return Err(CommandError::InvalidCommand);
    }

    // A replica asking for a full resync sends `?`; anything else must name
    // this master's replication ID.
    let repl = state.repl.read().await;

    if cmd.at(1) != b"?" && cmd.at(1) != repl.repl_id.as_bytes() {
        return Err(CommandError::InvalidCommand);
    }

    if std::str::from_utf8(cmd.at(2))
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .is_none()
    {
        return Err(CommandError::InvalidCommand);
    }

    let header = resp::status(&format!(
        "FULLRESYNC {} {}",
        repl.repl_id, repl.repl_offset
    ));

    Ok(Outcome::FullResync {
        header,
        rdb: rdb::EMPTY_RDB,
    })
}
