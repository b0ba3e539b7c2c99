use crate::command::Command;
use crate::commands::{CommandError, Outcome};
use crate::resp;
use crate::server::ServerState;

/// `KEYS <pattern>`. Replies with every live string key as an array of bulk
/// strings.
///
/// The pattern argument is accepted but not used for filtering; expired
/// entries found during the scan are purged.
pub async fn keys(cmd: &Command, state: &ServerState) -> Result<Outcome, CommandError> {
    if cmd.len() != 2 {
        return Err(CommandError::InvalidCommand);
    }

    let keys = state.store.scan().await;

    Ok(Outcome::Reply(resp::array(&keys)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::master_state;
    use crate::resp::{Reply, RespReader};

    #[tokio::test]
    async fn test_keys_returns_all_live_keys() {
        let state = master_state();
        state.store.put(b"a".to_vec(), b"1".to_vec(), 0).await;
        state.store.put(b"b".to_vec(), b"2".to_vec(), 0).await;

        // The pattern is ignored; a non-matching pattern still returns
        // everything.
        let Outcome::Reply(frame) = keys(&Command::from_strs(&["KEYS", "zzz*"]), &state)
            .await
            .unwrap()
        else {
            panic!("expected a reply");
        };

        let reply = RespReader::new(&frame[..]).read_reply().await.unwrap();
        let Reply::Array(items) = reply else {
            panic!("expected an array, got {:?}", reply);
        };

        let mut names: Vec<Vec<u8>> = items
            .into_iter()
            .map(|item| match item {
                Reply::Bulk(b) => b,
                other => panic!("expected bulk, got {:?}", other),
            })
            .collect();
        names.sort();
        assert_eq!(names, vec![b"a".to_vec(), b"b".to_vec()]);
    }
}
