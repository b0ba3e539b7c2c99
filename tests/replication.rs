//! End-to-end replication tests: the handshake, command propagation, WAIT
//! probing and a real master-replica pair.

mod common;

use std::time::Duration;

use tokio::time::{sleep, timeout, Instant};

use redis_lite::resp::Reply;

use common::{client, fake_replica_handshake, send, spawn_master, spawn_replica};

#[tokio::test]
async fn test_handshake_and_propagation() {
    let addr = spawn_master().await;

    let mut replica = client(addr).await;
    let status = fake_replica_handshake(&mut replica).await;

    let parts: Vec<&str> = status.split_whitespace().collect();
    assert_eq!(parts.len(), 3, "status: {:?}", status);
    assert_eq!(parts[0], "FULLRESYNC");
    assert_eq!(parts[1].len(), 40, "repl id: {:?}", parts[1]);
    assert!(parts[1].chars().all(|c| c.is_ascii_alphanumeric()));
    assert_eq!(parts[2], "0");

    // Let the master finish registering the replica link.
    sleep(Duration::from_millis(200)).await;

    let mut writer = client(addr).await;
    assert_eq!(
        send(&mut writer, &["SET", "a", "1"]).await,
        Reply::Status("OK".to_string())
    );

    let propagated = timeout(Duration::from_secs(2), replica.read_command())
        .await
        .expect("no propagated command arrived")
        .unwrap();
    assert_eq!(
        propagated.args(),
        &[b"SET".to_vec(), b"a".to_vec(), b"1".to_vec()]
    );
}

#[tokio::test]
async fn test_propagation_preserves_order() {
    let addr = spawn_master().await;

    let mut replica = client(addr).await;
    fake_replica_handshake(&mut replica).await;
    sleep(Duration::from_millis(200)).await;

    let mut writer = client(addr).await;
    for i in 0..5 {
        let value = i.to_string();
        send(&mut writer, &["SET", "k", &value]).await;
    }

    for i in 0..5 {
        let propagated = timeout(Duration::from_secs(2), replica.read_command())
            .await
            .expect("propagation stalled")
            .unwrap();
        assert_eq!(
            propagated.args(),
            &[b"SET".to_vec(), b"k".to_vec(), i.to_string().into_bytes()],
            "command {} out of order",
            i
        );
    }
}

#[tokio::test]
async fn test_wait_times_out_without_acks() {
    let addr = spawn_master().await;

    // A replica that attaches but never answers GETACK.
    let mut replica = client(addr).await;
    fake_replica_handshake(&mut replica).await;
    sleep(Duration::from_millis(200)).await;

    let mut writer = client(addr).await;
    send(&mut writer, &["SET", "foo", "bar"]).await; // 31 bytes encoded
    send(&mut writer, &["SET", "baz", "qux"]).await; // 31 bytes encoded

    let started = Instant::now();
    let reply = send(&mut writer, &["WAIT", "2", "100"]).await;
    let elapsed = started.elapsed();

    assert_eq!(reply, Reply::Int(0));
    assert!(
        elapsed >= Duration::from_millis(100),
        "WAIT returned early: {:?}",
        elapsed
    );

    // The replica saw both SETs and then the probe.
    for expected in [["SET", "foo", "bar"], ["SET", "baz", "qux"]] {
        let cmd = timeout(Duration::from_secs(2), replica.read_command())
            .await
            .unwrap()
            .unwrap();
        let expected: Vec<Vec<u8>> =
            expected.iter().map(|s| s.as_bytes().to_vec()).collect();
        assert_eq!(cmd.args(), &expected[..]);
    }
    let probe = timeout(Duration::from_secs(2), replica.read_command())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        probe.args(),
        &[b"REPLCONF".to_vec(), b"GETACK".to_vec(), b"*".to_vec()]
    );

    // Offset: two SETs (31 bytes each) plus the GETACK frame (37 bytes).
    let Reply::Bulk(body) = send(&mut writer, &["INFO", "replication"]).await else {
        panic!("expected bulk");
    };
    let body = String::from_utf8(body).unwrap();
    assert!(
        body.contains("master_repl_offset:99"),
        "unexpected offset: {}",
        body
    );
}

#[tokio::test]
async fn test_real_replica_applies_and_acknowledges() {
    let master = spawn_master().await;
    let replica_addr = spawn_replica(master).await;

    // Give the replica time to finish its handshake.
    sleep(Duration::from_millis(300)).await;

    let mut master_client = client(master).await;
    assert_eq!(
        send(&mut master_client, &["SET", "foo", "bar"]).await,
        Reply::Status("OK".to_string())
    );

    // The write becomes visible on the replica once applied.
    let mut replica_client = client(replica_addr).await;
    let deadline = Instant::now() + Duration::from_secs(3);
    loop {
        match send(&mut replica_client, &["GET", "foo"]).await {
            Reply::Bulk(value) => {
                assert_eq!(value, b"bar".to_vec());
                break;
            }
            Reply::Nil if Instant::now() < deadline => {
                sleep(Duration::from_millis(25)).await;
            }
            other => panic!("replica never applied the SET: {:?}", other),
        }
    }

    // The replica has applied everything, so it acknowledges the master's
    // offset inside the timeout and WAIT counts it.
    assert_eq!(
        send(&mut master_client, &["WAIT", "1", "1000"]).await,
        Reply::Int(1)
    );

    // The replica reports its role.
    let Reply::Bulk(body) = send(&mut replica_client, &["INFO", "replication"]).await
    else {
        panic!("expected bulk");
    };
    assert!(String::from_utf8(body).unwrap().contains("role:slave"));
}

#[tokio::test]
async fn test_wait_with_zero_offset_reports_replica_count() {
    let addr = spawn_master().await;

    let mut replica = client(addr).await;
    fake_replica_handshake(&mut replica).await;
    sleep(Duration::from_millis(200)).await;

    // Nothing propagated yet: WAIT answers with the replica count without
    // probing, well inside the timeout.
    let mut writer = client(addr).await;
    let started = Instant::now();
    let reply = send(&mut writer, &["WAIT", "5", "5000"]).await;

    assert_eq!(reply, Reply::Int(1));
    assert!(started.elapsed() < Duration::from_millis(500));
}
