use crate::command::Command;
use crate::commands::{CommandError, Outcome};
use crate::resp;
use crate::server::ServerState;

/// `GET <key>`. Replies with the value as a bulk string, or a nil bulk if
/// the key is absent or expired.
pub async fn get(cmd: &Command, state: &ServerState) -> Result<Outcome, CommandError> {
    if cmd.len() != 2 {
        return Err(CommandError::InvalidCommand);
    }

    let reply = match state.store.get(cmd.at(1)).await {
        Some(value) => resp::bulk(&value),
        None => resp::nil_bulk(),
    };

    Ok(Outcome::Reply(reply))
}
