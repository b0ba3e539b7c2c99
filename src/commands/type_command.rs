use crate::command::Command;
use crate::commands::{CommandError, Outcome};
use crate::resp;
use crate::server::ServerState;

/// `TYPE <key>`. Replies with a status of `string`, `stream` or `none`.
///
/// The string namespace is consulted first.
pub async fn type_command(cmd: &Command, state: &ServerState) -> Result<Outcome, CommandError> {
    if cmd.len() != 2 {
        return Err(CommandError::InvalidCommand);
    }

    let kind = state.store.value_type(cmd.at(1)).await;

    Ok(Outcome::Reply(resp::status(kind)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::master_state;

    #[tokio::test]
    async fn test_type_command() {
        let state = master_state();
        state.store.put(b"s".to_vec(), b"v".to_vec(), 0).await;
        state
            .store
            .add_stream("x", "1-1", vec![("a".to_string(), "1".to_string())])
            .await
            .unwrap();

        let test_cases = vec![("s", "string"), ("x", "stream"), ("nope", "none")];

        for (key, expected) in test_cases {
            let outcome = type_command(&Command::from_strs(&["TYPE", key]), &state)
                .await
                .unwrap();
            assert_eq!(outcome, Outcome::Reply(resp::status(expected)), "TYPE {}", key);
        }
    }
}
