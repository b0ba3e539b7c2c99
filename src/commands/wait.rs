use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::command::Command;
use crate::commands::{utf8_arg, CommandError, Outcome};
use crate::replication;
use crate::resp;
use crate::server::ServerState;

/// `WAIT <numreplicas> <timeout_ms>`. Replies with the number of replicas
/// that acknowledged the master's current offset.
///
/// With a zero replication offset the reply is the attached-replica count
/// and no probing happens. Otherwise one `REPLCONF GETACK *` probe runs per
/// replica in parallel, each bounded by an absolute read deadline; the call
/// waits for every probe to report and returns the actual count of
/// acknowledgements, not capped at `numreplicas`. The GETACK frame itself
/// advances the replication offset afterwards.
pub async fn wait(cmd: &Command, state: &ServerState) -> Result<Outcome, CommandError> {
    if cmd.len() != 3 {
        return Err(CommandError::InvalidCommand);
    }

    let numreplicas = parse_int(cmd, 1)?;
    let timeout_ms = parse_int(cmd, 2)?;

    let offset = state.repl.read().await.repl_offset;

    if offset == 0 {
        return Ok(Outcome::Reply(resp::integer(state.replicas.len() as i64)));
    }

    if numreplicas <= 0 || timeout_ms <= 0 {
        return Ok(Outcome::Reply(resp::integer(0)));
    }

    let replicas = state.replicas.snapshot();
    let deadline = Instant::now() + Duration::from_millis(timeout_ms as u64);

    let getack_len = Command::from_strs(&["REPLCONF", "GETACK", "*"]).resp_len() as u64;

    let (tx, mut rx) = mpsc::channel(replicas.len().max(1));

    for replica in replicas {
        let tx = tx.clone();
        tokio::spawn(async move {
            let acked = replication::probe_replica(replica, deadline, offset).await;
            let _ = tx.send(acked).await;
        });
    }
    drop(tx);

    let mut acked = 0i64;
    while let Some(ok) = rx.recv().await {
        if ok {
            acked += 1;
        }
    }

    // The probe itself was propagated bytes.
    state.repl.write().await.repl_offset += getack_len;

    Ok(Outcome::Reply(resp::integer(acked)))
}

fn parse_int(cmd: &Command, pos: usize) -> Result<i64, CommandError> {
    utf8_arg(cmd.at(pos))?
        .parse::<i64>()
        .map_err(|_| CommandError::InvalidCommand)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::master_state;

    #[tokio::test]
    async fn test_wait_with_zero_offset_reports_replica_count() {
        let state = master_state();

        let outcome = wait(&Command::from_strs(&["WAIT", "3", "100"]), &state)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Reply(resp::integer(0)));
    }

    #[tokio::test]
    async fn test_wait_with_non_positive_arguments() {
        let state = master_state();
        state.repl.write().await.repl_offset = 31;

        let test_cases = vec![
            vec!["WAIT", "0", "100"],
            vec!["WAIT", "-1", "100"],
            vec!["WAIT", "2", "0"],
            vec!["WAIT", "2", "-100"],
        ];

        for args in test_cases {
            let outcome = wait(&Command::from_strs(&args), &state).await.unwrap();
            assert_eq!(outcome, Outcome::Reply(resp::integer(0)), "for {:?}", args);
        }
    }

    #[tokio::test]
    async fn test_wait_advances_offset_by_getack_frame() {
        let state = master_state();
        state.repl.write().await.repl_offset = 31;

        // No replicas attached: no probes run, the reply is 0 and the
        // offset still advances by the GETACK frame length.
        let outcome = wait(&Command::from_strs(&["WAIT", "1", "50"]), &state)
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Reply(resp::integer(0)));
        assert_eq!(state.repl.read().await.repl_offset, 31 + 37);
    }

    #[tokio::test]
    async fn test_wait_errors() {
        let state = master_state();

        let test_cases = vec![
            vec!["WAIT"],
            vec!["WAIT", "1"],
            vec!["WAIT", "x", "100"],
            vec!["WAIT", "1", "x"],
        ];

        for args in test_cases {
            assert_eq!(
                wait(&Command::from_strs(&args), &state).await,
                Err(CommandError::InvalidCommand),
                "for {:?}",
                args
            );
        }
    }
}
