//! Master-replica replication.
//!
//! The master side: attached replica links, the propagation task that fans
//! write commands out to them, and the GETACK probe used by `WAIT`. The
//! replica side: the outbound handshake against the master and the apply
//! loop that consumes the propagated command stream.

use std::sync::Arc;

use regex::Regex;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::time::Instant;

use crate::command::Command;
use crate::commands::set;
use crate::connection::Connection;
use crate::resp::RespError;
use crate::server::ServerState;

/// A replica link shared between the propagation task and WAIT probes. The
/// mutex serializes all access, so the connection still has a single writer
/// at any point in time.
pub type ReplicaHandle = Arc<Mutex<Connection>>;

/// The list of attached replica links.
///
/// A connection joins the list after serving `PSYNC` and stays until its
/// socket dies. The internal lock supports append, length and
/// snapshot-clone; holders of a snapshot lock each connection individually.
#[derive(Default)]
pub struct ReplicaSet {
    inner: std::sync::Mutex<Vec<ReplicaHandle>>,
}

impl ReplicaSet {
    pub fn new() -> Self {
        ReplicaSet::default()
    }

    pub fn append(&self, replica: ReplicaHandle) {
        self.inner.lock().unwrap().push(replica);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clones the current list of handles.
    pub fn snapshot(&self) -> Vec<ReplicaHandle> {
        self.inner.lock().unwrap().clone()
    }
}

/// Drains the propagation queue, writing each command to every attached
/// replica in enqueue order.
///
/// Write failures are logged and skipped; a dead replica link is detected by
/// its socket, not here.
pub async fn propagation_loop(mut rx: mpsc::Receiver<Command>, state: Arc<ServerState>) {
    while let Some(cmd) = rx.recv().await {
        let replicas = state.replicas.snapshot();

        for replica in replicas {
            let mut conn = replica.lock().await;
            if let Err(e) = conn.write_command(&cmd).await {
                eprintln!("replication: propagation write failed: {}", e);
            }
        }
    }
}

/// Dials the master, runs the handshake and then applies the inbound
/// command stream until the link dies.
pub async fn run_replica_link(master_addr: &str, state: Arc<ServerState>) {
    let stream = match TcpStream::connect(master_addr).await {
        Ok(stream) => stream,
        Err(e) => {
            eprintln!("replication: failed to connect to master {}: {}", master_addr, e);
            return;
        }
    };

    let mut conn = Connection::new(stream);

    if let Err(e) = handshake(&mut conn, &state).await {
        eprintln!("replication: handshake with {} failed: {}", master_addr, e);
        return;
    }

    println!("replication: synchronized with master {}", master_addr);

    apply_loop(conn, state).await;
}

/// Drives the replica side of the handshake:
///
/// 1. `PING`, expect `PONG`
/// 2. `REPLCONF listening-port <port>`, expect `OK`
/// 3. `REPLCONF capa psync2`, expect `OK`
/// 4. `PSYNC ? -1`, expect `FULLRESYNC <40-char id> <offset>`, then the RDB
///    payload frame (accepted, not applied)
///
/// Status comparisons are case-insensitive. The advertised replication ID
/// and offset are recorded as this replica's own.
pub async fn handshake(conn: &mut Connection, state: &ServerState) -> Result<(), RespError> {
    expect_string_reply(conn, &Command::from_strs(&["PING"]), "PONG").await?;

    let port = state.config.port.to_string();
    expect_string_reply(
        conn,
        &Command::from_strs(&["REPLCONF", "listening-port", &port]),
        "OK",
    )
    .await?;

    expect_string_reply(
        conn,
        &Command::from_strs(&["REPLCONF", "capa", "psync2"]),
        "OK",
    )
    .await?;

    conn.write_command(&Command::from_strs(&["PSYNC", "?", "-1"]))
        .await
        .map_err(|e| RespError::Io(e.to_string()))?;
    let reply = conn.read_status_reply().await?;

    let parts: Vec<&str> = reply.split_whitespace().collect();
    if parts.len() != 3 || !parts[0].eq_ignore_ascii_case("FULLRESYNC") {
        return Err(RespError::InvalidReply(reply.clone()));
    }
    if !is_valid_repl_id(parts[1]) {
        return Err(RespError::InvalidReply(reply.clone()));
    }
    let offset = parts[2]
        .parse::<u64>()
        .map_err(|_| RespError::InvalidReply(reply.clone()))?;

    {
        let mut repl = state.repl.write().await;
        repl.repl_id = parts[1].to_string();
        repl.repl_offset = offset;
    }

    conn.read_rdb().await?;

    Ok(())
}

/// Applies commands streamed by the master.
///
/// `SET` is applied locally without a reply; `REPLCONF GETACK *` is answered
/// with `[REPLCONF, ACK, <offset>]` where the offset does not yet include
/// the GETACK frame itself; everything else is ignored. After each inbound
/// command, GETACK included, the offset advances by the command's encoded
/// length.
pub async fn apply_loop(mut conn: Connection, state: Arc<ServerState>) {
    loop {
        let cmd = match conn.read_command().await {
            Ok(cmd) => cmd,
            Err(RespError::ConnectionClosed) => break,
            Err(e) => {
                eprintln!("replication: master link read error: {}", e);
                break;
            }
        };

        let frame_len = cmd.resp_len() as u64;

        match cmd.name().as_str() {
            "set" => {
                if let Err(e) = set::apply(&state.store, &cmd).await {
                    eprintln!("replication: failed to apply SET: {}", e);
                }
            }
            "replconf" => {
                if cmd.len() >= 2 && cmd.at(1).eq_ignore_ascii_case(b"GETACK") {
                    let offset = state.repl.read().await.repl_offset;
                    let ack = [
                        b"REPLCONF".to_vec(),
                        b"ACK".to_vec(),
                        offset.to_string().into_bytes(),
                    ];
                    if let Err(e) = conn.write_slice(&ack).await {
                        eprintln!("replication: failed to write ACK: {}", e);
                        break;
                    }
                }
            }
            _ => {}
        }

        state.repl.write().await.repl_offset += frame_len;
    }

    println!("replication: master link closed");
}

/// Sends `REPLCONF GETACK *` to one replica and waits until `deadline` for
/// an acknowledgement at or past `min_offset`.
///
/// Counts as acknowledged only for a reply of exactly
/// `[REPLCONF, ACK, n >= min_offset]`; timeouts, malformed replies and
/// stale offsets all count as not acknowledged.
pub async fn probe_replica(
    replica: ReplicaHandle,
    deadline: Instant,
    min_offset: u64,
) -> bool {
    let mut conn = replica.lock().await;

    if conn
        .write_command(&Command::from_strs(&["REPLCONF", "GETACK", "*"]))
        .await
        .is_err()
    {
        return false;
    }

    conn.set_read_deadline(deadline);
    let reply = conn.read_slice_reply().await;
    conn.reset_read_deadline();

    match reply {
        Ok(args) => {
            args.len() == 3
                && args[0].eq_ignore_ascii_case(b"REPLCONF")
                && args[1].eq_ignore_ascii_case(b"ACK")
                && std::str::from_utf8(&args[2])
                    .ok()
                    .and_then(|s| s.parse::<u64>().ok())
                    .map_or(false, |n| n >= min_offset)
        }
        Err(_) => false,
    }
}

async fn expect_string_reply(
    conn: &mut Connection,
    cmd: &Command,
    expected: &str,
) -> Result<(), RespError> {
    conn.write_command(cmd)
        .await
        .map_err(|e| RespError::Io(e.to_string()))?;

    let reply = conn.read_string_reply().await?;
    if !reply.eq_ignore_ascii_case(expected) {
        return Err(RespError::InvalidReply(reply));
    }
    Ok(())
}

fn is_valid_repl_id(repl_id: &str) -> bool {
    let re = Regex::new(r"^[a-zA-Z0-9]{40}$").unwrap();
    re.is_match(repl_id)
}
