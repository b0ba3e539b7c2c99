//! End-to-end test of the startup RDB bootstrap: a server pointed at a
//! real file on disk serves the keys it contains.

mod common;

use std::io::Write;

use redis_lite::resp::Reply;
use redis_lite::server::Config;

use common::{client, send, spawn_server};

// A minimal RDB image: header, one db with two live keys and one already
// expired key.
fn rdb_image() -> Vec<u8> {
    let mut bytes = Vec::new();
    bytes.extend_from_slice(b"REDIS0011");
    bytes.push(0xFE); // SELECTDB
    bytes.push(0x00);
    bytes.push(0xFB); // RESIZEDB
    bytes.push(0x03);
    bytes.push(0x01);
    // foo -> bar
    bytes.push(0x00);
    bytes.extend_from_slice(b"\x03foo\x03bar");
    // count -> integer-encoded 64
    bytes.push(0x00);
    bytes.extend_from_slice(b"\x05count");
    bytes.extend_from_slice(&[0xC0, 0x40]);
    // stale -> v, expired in 2015 (ms precision)
    bytes.push(0xFC);
    bytes.extend_from_slice(&1_420_070_400_000u64.to_le_bytes());
    bytes.push(0x00);
    bytes.extend_from_slice(b"\x05stale\x01v");
    bytes.push(0xFF); // EOF
    bytes
}

#[tokio::test]
async fn test_server_bootstraps_string_keys_from_rdb() {
    let dir = std::env::temp_dir().join(format!("redis-lite-rdb-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("bootstrap.rdb");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(&rdb_image()).unwrap();
    drop(file);

    let config = Config {
        network: "tcp".to_string(),
        port: 0,
        addr: "127.0.0.1:0".to_string(),
        replica_of: None,
        dir: Some(dir.to_string_lossy().into_owned()),
        dbfilename: Some("bootstrap.rdb".to_string()),
    };

    let addr = spawn_server(config).await;
    let mut conn = client(addr).await;

    assert_eq!(
        send(&mut conn, &["GET", "foo"]).await,
        Reply::Bulk(b"bar".to_vec())
    );
    assert_eq!(
        send(&mut conn, &["GET", "count"]).await,
        Reply::Bulk(b"64".to_vec())
    );
    // The expired key loaded with its old absolute expiry and reads as gone.
    assert_eq!(send(&mut conn, &["GET", "stale"]).await, Reply::Nil);

    let _ = std::fs::remove_dir_all(&dir);
}

#[tokio::test]
async fn test_server_starts_when_rdb_is_missing() {
    let config = Config {
        network: "tcp".to_string(),
        port: 0,
        addr: "127.0.0.1:0".to_string(),
        replica_of: None,
        dir: Some("/tmp/redis-lite-does-not-exist".to_string()),
        dbfilename: Some("nope.rdb".to_string()),
    };

    let addr = spawn_server(config).await;
    let mut conn = client(addr).await;

    assert_eq!(send(&mut conn, &["PING"]).await, Reply::Bulk(b"PONG".to_vec()));
}
