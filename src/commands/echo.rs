use crate::command::Command;
use crate::commands::{CommandError, Outcome};
use crate::resp;

/// `ECHO <message>`. Replies with the message as a bulk string.
pub fn echo(cmd: &Command) -> Result<Outcome, CommandError> {
    if cmd.len() != 2 {
        return Err(CommandError::InvalidCommand);
    }

    Ok(Outcome::Reply(resp::bulk(cmd.at(1))))
}
