//! Server configuration and assembly.
//!
//! [`Config`] is parsed from command-line arguments; [`Server::bind`] turns
//! it into a running state (replication identity, RDB bootstrap, bound
//! listener) and [`Server::serve`] runs the accept loop, spawning one task
//! per connection plus the replication tasks the role requires.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, RwLock};

use crate::command::Command;
use crate::connection::Connection;
use crate::dispatcher;
use crate::rdb;
use crate::replication::{self, ReplicaSet};
use crate::store::Store;
use crate::util;

/// Capacity of the master's propagation queue. A full queue backpressures
/// write handlers until the propagation task catches up.
const PROPAGATION_QUEUE_CAPACITY: usize = 10;

/// Errors from command-line argument parsing.
#[derive(Error, Debug, PartialEq, Clone)]
pub enum CliError {
    #[error("missing value for flag {0}")]
    MissingFlagValue(String),
    #[error("invalid port: {0}")]
    InvalidPort(String),
}

/// The role of a server instance.
#[derive(Debug, PartialEq, Clone)]
pub enum Role {
    /// Accepts writes and fans them out to attached replicas.
    Master,
    /// Follows the master at the given `host:port` address.
    Replica(String),
}

impl Role {
    /// The role name as reported by `INFO replication`. Replicas report
    /// `slave`, the protocol's historical name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Master => "master",
            Role::Replica(_) => "slave",
        }
    }
}

/// Static server configuration.
#[derive(Debug, PartialEq, Clone)]
pub struct Config {
    pub network: String,
    pub port: u16,
    /// The listener bind address.
    pub addr: String,
    /// The master address when running as a replica.
    pub replica_of: Option<String>,
    pub dir: Option<String>,
    pub dbfilename: Option<String>,
}

impl Config {
    /// Parses command-line arguments.
    ///
    /// Flags are matched case-insensitively on their suffix, so `--port` and
    /// `-port` both work: `port <n>`, `replicaof <host> <port>`,
    /// `dir <path>`, `dbfilename <name>`. Defaults are `tcp`, port `6379`
    /// and bind address `0.0.0.0:<port>`. Absence of `replicaof` makes the
    /// server a master.
    pub fn from_args<I: IntoIterator<Item = String>>(args: I) -> Result<Self, CliError> {
        let mut iter = args.into_iter().skip(1);

        let mut port: Option<u16> = None;
        let mut replica_of: Option<String> = None;
        let mut dir: Option<String> = None;
        let mut dbfilename: Option<String> = None;

        while let Some(arg) = iter.next() {
            let flag = arg.to_ascii_lowercase();

            if flag.ends_with("replicaof") {
                let host = iter
                    .next()
                    .ok_or_else(|| CliError::MissingFlagValue(arg.clone()))?;
                let master_port = iter
                    .next()
                    .ok_or_else(|| CliError::MissingFlagValue(arg.clone()))?;
                replica_of = Some(format!("{}:{}", host, master_port));
            } else if flag.ends_with("port") {
                let value = iter
                    .next()
                    .ok_or_else(|| CliError::MissingFlagValue(arg.clone()))?;
                let parsed = value
                    .parse::<u16>()
                    .map_err(|_| CliError::InvalidPort(value.clone()))?;
                if parsed == 0 {
                    return Err(CliError::InvalidPort(value));
                }
                port = Some(parsed);
            } else if flag.ends_with("dbfilename") {
                dbfilename = Some(
                    iter.next()
                        .ok_or_else(|| CliError::MissingFlagValue(arg.clone()))?,
                );
            } else if flag.ends_with("dir") {
                dir = Some(
                    iter.next()
                        .ok_or_else(|| CliError::MissingFlagValue(arg.clone()))?,
                );
            }
        }

        let port = port.unwrap_or(6379);

        Ok(Config {
            network: "tcp".to_string(),
            port,
            addr: format!("0.0.0.0:{}", port),
            replica_of,
            dir,
            dbfilename,
        })
    }

    /// The role this configuration implies.
    pub fn role(&self) -> Role {
        match &self.replica_of {
            Some(addr) => Role::Replica(addr.clone()),
            None => Role::Master,
        }
    }
}

/// The replication identity of this instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Replication {
    /// 40-character random alphanumeric ID.
    pub repl_id: String,
    /// Byte count of RESP-encoded commands propagated (master) or received
    /// (replica) so far.
    pub repl_offset: u64,
}

/// Shared state every connection task holds an `Arc` of.
pub struct ServerState {
    pub config: Config,
    pub role: Role,
    pub repl: RwLock<Replication>,
    pub store: Store,
    /// Attached replica links. Populated on masters only.
    pub replicas: ReplicaSet,
    /// The propagation queue sender. `None` on replicas.
    pub propagation: Option<mpsc::Sender<Command>>,
}

impl ServerState {
    pub fn is_master(&self) -> bool {
        self.role == Role::Master
    }

    /// Enqueues a write command for fan-out to attached replicas and
    /// advances the replication offset by the command's encoded length.
    ///
    /// The offset advances at enqueue time regardless of downstream
    /// delivery. On a replica this is a no-op.
    pub async fn propagate(&self, cmd: Command) {
        let Some(tx) = &self.propagation else {
            return;
        };

        let frame_len = cmd.resp_len() as u64;

        if tx.send(cmd).await.is_ok() {
            self.repl.write().await.repl_offset += frame_len;
        }
    }
}

/// A bound server, ready to accept connections.
pub struct Server {
    state: Arc<ServerState>,
    listener: TcpListener,
    propagation_rx: Option<mpsc::Receiver<Command>>,
}

impl Server {
    /// Builds the server state from `config`, loads the RDB bootstrap if one
    /// is configured, and binds the listener.
    pub async fn bind(config: Config) -> anyhow::Result<Server> {
        let role = config.role();

        let (propagation_tx, propagation_rx) = match role {
            Role::Master => {
                let (tx, rx) = mpsc::channel(PROPAGATION_QUEUE_CAPACITY);
                (Some(tx), Some(rx))
            }
            Role::Replica(_) => (None, None),
        };

        let store = Store::new();
        load_rdb_bootstrap(&config, &store).await;

        let state = Arc::new(ServerState {
            role,
            repl: RwLock::new(Replication {
                repl_id: util::random_alphanumeric(40),
                repl_offset: 0,
            }),
            store,
            replicas: ReplicaSet::new(),
            propagation: propagation_tx,
            config,
        });

        let listener = TcpListener::bind(&state.config.addr).await?;

        Ok(Server {
            state,
            listener,
            propagation_rx,
        })
    }

    /// The address the listener is bound to. Tests bind port `0` and read
    /// the ephemeral port back from here.
    pub fn local_addr(&self) -> tokio::io::Result<std::net::SocketAddr> {
        self.listener.local_addr()
    }

    /// Runs the server: the propagation task on a master, the outbound
    /// master link on a replica, then the accept loop.
    pub async fn serve(mut self) -> anyhow::Result<()> {
        if let Some(rx) = self.propagation_rx.take() {
            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                replication::propagation_loop(rx, state).await;
            });
        }

        if let Role::Replica(master_addr) = &self.state.role {
            let master_addr = master_addr.clone();
            let state = Arc::clone(&self.state);
            tokio::spawn(async move {
                replication::run_replica_link(&master_addr, state).await;
            });
        }

        println!("listening on {}", self.state.config.addr);

        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let state = Arc::clone(&self.state);
                    tokio::spawn(async move {
                        dispatcher::handle_connection(
                            Connection::new(stream),
                            state,
                            peer.to_string(),
                        )
                        .await;
                    });
                }
                Err(e) => {
                    eprintln!("accept error: {}", e);
                    return Err(e.into());
                }
            }
        }
    }
}

// Loads string keys from `<dir>/<dbfilename>` when both are configured and
// the file exists. Loader failures are logged inside the loader and leave
// the store partially populated.
async fn load_rdb_bootstrap(config: &Config, store: &Store) {
    let (Some(dir), Some(dbfilename)) = (&config.dir, &config.dbfilename) else {
        return;
    };

    let path = Path::new(dir).join(dbfilename);
    if !path.exists() {
        return;
    }

    println!("loading RDB bootstrap from {}", path.display());

    let mut entries = rdb::load(path);
    while let Some(entry) = entries.recv().await {
        store.put(entry.key, entry.value, entry.expires_at_ms).await;
    }
}
