use crate::command::Command;
use crate::commands::{CommandError, Outcome};
use crate::resp;
use crate::server::ServerState;

/// `CONFIG GET <dir|dbfilename>`. Replies with a two-element array of the
/// parameter name and its configured value.
pub fn config_get(cmd: &Command, state: &ServerState) -> Result<Outcome, CommandError> {
    if cmd.len() != 3 || !cmd.at(1).eq_ignore_ascii_case(b"GET") {
        return Err(CommandError::InvalidCommand);
    }

    let param = cmd.at(2).to_ascii_lowercase();
    let value = match param.as_slice() {
        b"dir" => state.config.dir.clone().unwrap_or_default(),
        b"dbfilename" => state.config.dbfilename.clone().unwrap_or_default(),
        _ => return Err(CommandError::InvalidCommand),
    };

    Ok(Outcome::Reply(resp::array(&[param, value.into_bytes()])))
}
