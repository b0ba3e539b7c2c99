use crate::command::Command;
use crate::commands::{CommandError, Outcome};
use crate::resp;

/// `PING`. Replies with a bulk `PONG`.
pub fn ping(_cmd: &Command) -> Result<Outcome, CommandError> {
    Ok(Outcome::Reply(resp::bulk(b"PONG")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ping() {
        let outcome = ping(&Command::from_strs(&["PING"])).unwrap();
        assert_eq!(outcome, Outcome::Reply(resp::bulk(b"PONG")));
    }
}
