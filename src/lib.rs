//! A Redis-compatible in-memory key-value server.
//!
//! This crate implements the core of a Redis-compatible server:
//!
//! - The RESP wire codec (framed reader and writer over buffered streams)
//! - Per-connection command dispatch (PING, ECHO, SET, GET, KEYS, TYPE,
//!   CONFIG GET, INFO, XADD, XRANGE, XREAD)
//! - An in-memory store with expiring string keys and ordered stream keys
//! - Master-replica replication (handshake, FULLRESYNC, command propagation,
//!   REPLCONF GETACK/ACK, WAIT quorum)
//! - A minimal RDB loader used to bootstrap string keys on startup
//!
//! Connections are handled concurrently with async/await on Tokio; one task
//! owns each accepted socket.

pub mod command;
pub mod commands;
pub mod connection;
pub mod dispatcher;
pub mod rdb;
pub mod replication;
pub mod resp;
pub mod server;
pub mod store;
pub mod stream;
pub mod util;
