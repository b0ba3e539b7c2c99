use crate::command::Command;
use crate::commands::{utf8_arg, CommandError, Outcome};
use crate::resp;
use crate::server::ServerState;

/// `XADD <key> <id> <field> <value> [<field> <value> ...]`.
///
/// Appends an entry to the stream, creating it on first use. The ID may
/// request auto-generation (`*` or `<ms>-*`); the resolved ID must be
/// strictly greater than the stream's newest entry and `0-0` is always
/// rejected. Replies with the final ID as a bulk string.
pub async fn xadd(cmd: &Command, state: &ServerState) -> Result<Outcome, CommandError> {
    // Name, key, id, then a non-empty sequence of field-value pairs.
    if cmd.len() < 5 || cmd.len() % 2 == 0 {
        return Err(CommandError::InvalidCommand);
    }

    let key = utf8_arg(cmd.at(1))?;
    let id_str = utf8_arg(cmd.at(2))?;

    let mut fields = Vec::with_capacity((cmd.len() - 3) / 2);
    for pair in cmd.args()[3..].chunks(2) {
        fields.push((utf8_arg(&pair[0])?, utf8_arg(&pair[1])?));
    }

    let id = state.store.add_stream(&key, &id_str, fields).await?;

    Ok(Outcome::Reply(resp::bulk(id.as_bytes())))
}
