//! Per-connection command loop and routing.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::command::Command;
use crate::commands::{self, CommandError, Outcome};
use crate::connection::Connection;
use crate::resp::RespError;
use crate::server::ServerState;

/// The closed set of commands the dispatcher routes. Anything else maps to
/// [`CommandKind::Unknown`] and is silently ignored.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum CommandKind {
    Ping,
    Echo,
    Set,
    Get,
    Info,
    Replconf,
    Psync,
    Wait,
    Config,
    Keys,
    Type,
    Xadd,
    Xrange,
    Xread,
    Unknown,
}

impl CommandKind {
    /// Maps a lower-cased command name to its kind.
    pub fn from_name(name: &str) -> CommandKind {
        match name {
            "ping" => CommandKind::Ping,
            "echo" => CommandKind::Echo,
            "set" => CommandKind::Set,
            "get" => CommandKind::Get,
            "info" => CommandKind::Info,
            "replconf" => CommandKind::Replconf,
            "psync" => CommandKind::Psync,
            "wait" => CommandKind::Wait,
            "config" => CommandKind::Config,
            "keys" => CommandKind::Keys,
            "type" => CommandKind::Type,
            "xadd" => CommandKind::Xadd,
            "xrange" => CommandKind::Xrange,
            "xread" => CommandKind::Xread,
            _ => CommandKind::Unknown,
        }
    }
}

/// Routes one command to its handler.
pub async fn dispatch(cmd: &Command, state: &ServerState) -> Result<Outcome, CommandError> {
    match CommandKind::from_name(&cmd.name()) {
        CommandKind::Ping => commands::ping::ping(cmd),
        CommandKind::Echo => commands::echo::echo(cmd),
        CommandKind::Set => commands::set::set(cmd, state).await,
        CommandKind::Get => commands::get::get(cmd, state).await,
        CommandKind::Info => commands::info::info(cmd, state).await,
        CommandKind::Replconf => commands::replconf::replconf(cmd),
        CommandKind::Psync => commands::psync::psync(cmd, state).await,
        CommandKind::Wait => commands::wait::wait(cmd, state).await,
        CommandKind::Config => commands::config_get::config_get(cmd, state),
        CommandKind::Keys => commands::keys::keys(cmd, state).await,
        CommandKind::Type => commands::type_command::type_command(cmd, state).await,
        CommandKind::Xadd => commands::xadd::xadd(cmd, state).await,
        CommandKind::Xrange => commands::xrange::xrange(cmd, state).await,
        CommandKind::Xread => commands::xread::xread(cmd, state).await,
        CommandKind::Unknown => Ok(Outcome::Silent),
    }
}

/// Serves one client connection until it closes.
///
/// A clean EOF closes silently; any other read error is logged and closes.
/// Command-level errors reply `-ERR` and keep the connection alive. A
/// connection that serves `PSYNC` is promoted to a replica link: it joins
/// the replica set, is never read again, and escapes the close path here.
pub async fn handle_connection(mut conn: Connection, state: Arc<ServerState>, peer: String) {
    loop {
        let cmd = match conn.read_command().await {
            Ok(cmd) => cmd,
            Err(RespError::ConnectionClosed) => break,
            Err(e) => {
                eprintln!("connection {}: read error: {}", peer, e);
                break;
            }
        };

        match dispatch(&cmd, &state).await {
            Ok(Outcome::Silent) => {}
            Ok(Outcome::Reply(frame)) => {
                if let Err(e) = conn.write_raw_bytes(&frame).await {
                    eprintln!("connection {}: write error: {}", peer, e);
                    break;
                }
            }
            Ok(Outcome::FullResync { header, rdb }) => {
                if let Err(e) = conn.write_raw_bytes(&header).await {
                    eprintln!("connection {}: write error: {}", peer, e);
                    break;
                }
                if let Err(e) = conn.write_rdb(rdb).await {
                    eprintln!("connection {}: write error: {}", peer, e);
                    break;
                }

                state.replicas.append(Arc::new(Mutex::new(conn)));
                println!("replication: replica {} attached", peer);
                return;
            }
            Err(e) => {
                if let Err(e) = conn.write_raw_bytes(&e.to_frame()).await {
                    eprintln!("connection {}: write error: {}", peer, e);
                    break;
                }
            }
        }
    }

    if let Err(e) = conn.close().await {
        eprintln!("connection {}: close error: {}", peer, e);
    }
}
