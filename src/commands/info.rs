use crate::command::Command;
use crate::commands::{CommandError, Outcome};
use crate::resp;
use crate::server::ServerState;

/// `INFO [replication]`. Replies with a multi-line bulk string.
///
/// Every role reports `role:<role>`; a master additionally reports its
/// replication ID and offset.
pub async fn info(cmd: &Command, state: &ServerState) -> Result<Outcome, CommandError> {
    if cmd.len() > 2 {
        return Err(CommandError::InvalidCommand);
    }
    if cmd.len() == 2 && !cmd.at(1).eq_ignore_ascii_case(b"replication") {
        return Err(CommandError::InvalidCommand);
    }

    let mut lines = vec![format!("role:{}", state.role.as_str())];

    if state.is_master() {
        let repl = state.repl.read().await;
        lines.push(format!("master_replid:{}", repl.repl_id));
        lines.push(format!("master_repl_offset:{}", repl.repl_offset));
    }

    Ok(Outcome::Reply(resp::bulk(lines.join("\r\n").as_bytes())))
}
