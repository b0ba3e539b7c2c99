use crate::command::Command;
use crate::commands::{CommandError, Outcome};
use crate::resp;

/// `REPLCONF <option> <value> ...` as received by a master during the
/// replica handshake (`listening-port`, `capa`). Always replies `+OK`.
///
/// The `GETACK` direction is master-to-replica and is handled by the
/// replica's apply loop, not here.
pub fn replconf(cmd: &Command) -> Result<Outcome, CommandError> {
    if cmd.len() < 2 {
        return Err(CommandError::InvalidCommand);
    }

    Ok(Outcome::Reply(resp::status("OK")))
}
