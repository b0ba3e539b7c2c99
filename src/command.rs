//! The parsed command record.

use crate::resp;

/// A command decoded from an array-of-bulk frame: the raw argv plus a few
/// helpers for routing and replication accounting.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    args: Vec<Vec<u8>>,
}

impl Command {
    pub fn new(args: Vec<Vec<u8>>) -> Self {
        Command { args }
    }

    /// Builds a command from string literals. Used for handshake and probe
    /// commands the server originates itself.
    pub fn from_strs(args: &[&str]) -> Self {
        Command {
            args: args.iter().map(|s| s.as_bytes().to_vec()).collect(),
        }
    }

    pub fn args(&self) -> &[Vec<u8>] {
        &self.args
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// The lower-cased ASCII name of the command, or empty if the argv is
    /// empty.
    pub fn name(&self) -> String {
        match self.args.first() {
            Some(arg) => String::from_utf8_lossy(arg).to_ascii_lowercase(),
            None => String::new(),
        }
    }

    /// The argument at `pos`.
    ///
    /// Out-of-range access is a programming error and panics; handlers check
    /// arity before indexing.
    pub fn at(&self, pos: usize) -> &[u8] {
        &self.args[pos]
    }

    /// Scans `args[3..]` for a case-insensitive match of `name` and returns
    /// the argument following it, if any.
    ///
    /// This is the shape of trailing command options such as `SET key value
    /// PX <ms>`.
    pub fn search_option(&self, name: &str) -> Option<&[u8]> {
        for i in 3..self.args.len() {
            if self.args[i].eq_ignore_ascii_case(name.as_bytes()) && i + 1 < self.args.len() {
                return Some(&self.args[i + 1]);
            }
        }
        None
    }

    /// The exact number of bytes this command occupies when encoded as an
    /// array-of-bulk frame.
    ///
    /// The replication offset advances by this amount when the command is
    /// propagated or received.
    pub fn resp_len(&self) -> usize {
        resp::array(&self.args).len()
    }
}
