//! Shared helpers for the integration tests: spawning real servers on
//! ephemeral ports and talking to them over framed connections.
#![allow(dead_code)]

use std::net::SocketAddr;

use redis_lite::command::Command;
use redis_lite::connection::Connection;
use redis_lite::resp::Reply;
use redis_lite::server::{Config, Server};

/// A config bound to an ephemeral loopback port.
pub fn test_config(replica_of: Option<String>) -> Config {
    Config {
        network: "tcp".to_string(),
        port: 0,
        addr: "127.0.0.1:0".to_string(),
        replica_of,
        dir: Some("/tmp/redis-lite-test-files".to_string()),
        dbfilename: Some("dump.rdb".to_string()),
    }
}

pub async fn spawn_server(config: Config) -> SocketAddr {
    let server = Server::bind(config).await.unwrap();
    let addr = server.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.serve().await;
    });
    addr
}

pub async fn spawn_master() -> SocketAddr {
    spawn_server(test_config(None)).await
}

pub async fn spawn_replica(master: SocketAddr) -> SocketAddr {
    spawn_server(test_config(Some(master.to_string()))).await
}

pub async fn client(addr: SocketAddr) -> Connection {
    Connection::connect(&addr.to_string()).await.unwrap()
}

/// Sends a command and returns the decoded reply.
pub async fn send(conn: &mut Connection, args: &[&str]) -> Reply {
    conn.send_command(&Command::from_strs(args))
        .await
        .unwrap_or_else(|e| panic!("command {:?} failed: {}", args, e))
}

/// Runs the full replica handshake against a master, returning the
/// FULLRESYNC status line. The connection is attached as a replica link on
/// the master afterwards.
pub async fn fake_replica_handshake(conn: &mut Connection) -> String {
    assert_eq!(send(conn, &["PING"]).await, Reply::Bulk(b"PONG".to_vec()));
    assert_eq!(
        send(conn, &["REPLCONF", "listening-port", "6380"]).await,
        Reply::Status("OK".to_string())
    );
    assert_eq!(
        send(conn, &["REPLCONF", "capa", "psync2"]).await,
        Reply::Status("OK".to_string())
    );

    conn.write_command(&Command::from_strs(&["PSYNC", "?", "-1"]))
        .await
        .unwrap();
    let status = conn.read_status_reply().await.unwrap();

    let rdb = conn.read_rdb().await.unwrap();
    assert_eq!(&rdb[0..5], b"REDIS");

    status
}
