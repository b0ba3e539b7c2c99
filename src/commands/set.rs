use crate::command::Command;
use crate::commands::{CommandError, Outcome};
use crate::resp;
use crate::server::ServerState;
use crate::store::Store;
use crate::util;

/// `SET <key> <value> [PX <ms>]`. Replies `+OK` on success.
///
/// On a master the command is also enqueued for propagation to attached
/// replicas after the store mutation; the replication offset advances at
/// enqueue time. On an arity or option error the handler replies `-ERR`
/// only, with no trailing `OK`.
pub async fn set(cmd: &Command, state: &ServerState) -> Result<Outcome, CommandError> {
    apply(&state.store, cmd).await?;
    state.propagate(cmd.clone()).await;

    Ok(Outcome::Reply(resp::status("OK")))
}

/// Parses and applies a `SET` against the store without replying or
/// propagating. The replica apply loop uses this directly.
pub async fn apply(store: &Store, cmd: &Command) -> Result<(), CommandError> {
    if cmd.len() != 3 && cmd.len() != 5 {
        return Err(CommandError::InvalidCommand);
    }

    let mut expires_at_ms = 0u64;

    if cmd.len() == 5 {
        let px = cmd
            .search_option("px")
            .ok_or(CommandError::InvalidCommand)?;
        let relative_ms = std::str::from_utf8(px)
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or(CommandError::InvalidCommand)?;

        // The wire option is relative; the store holds absolute expiries.
        expires_at_ms = util::now_ms() + relative_ms;
    }

    store
        .put(cmd.at(1).to_vec(), cmd.at(2).to_vec(), expires_at_ms)
        .await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::master_state;

    #[tokio::test]
    async fn test_set() {
        let state = master_state();

        let outcome = set(&Command::from_strs(&["SET", "foo", "bar"]), &state)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Reply(resp::status("OK")));
        assert_eq!(state.store.get(b"foo").await, Some(b"bar".to_vec()));
    }

    #[tokio::test]
    async fn test_set_with_px_stores_absolute_expiry() {
        let state = master_state();

        set(
            &Command::from_strs(&["SET", "k", "v", "PX", "60000"]),
            &state,
        )
        .await
        .unwrap();

        // Still live well before the expiry.
        assert_eq!(state.store.get(b"k").await, Some(b"v".to_vec()));
    }

    #[tokio::test]
    async fn test_set_errors() {
        let state = master_state();

        let test_cases = vec![
            vec!["SET", "k"],
            vec!["SET", "k", "v", "PX"],
            vec!["SET", "k", "v", "EX", "100"],
            vec!["SET", "k", "v", "PX", "abc"],
        ];

        for args in test_cases {
            assert_eq!(
                set(&Command::from_strs(&args), &state).await,
                Err(CommandError::InvalidCommand),
                "expected error for {:?}",
                args
            );
        }

        // The failed SETs left nothing behind.
        assert_eq!(state.store.get(b"k").await, None);
    }
}
