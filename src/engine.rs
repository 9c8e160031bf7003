use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use shakmaty::uci::UciMove;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::ledger::MoveLedger;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);
/// Slack past the think budget before a search is considered hung.
const SEARCH_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("failed to start engine process `{path}`: {source}")]
    Spawn {
        path: String,
        source: std::io::Error,
    },
    #[error("engine process has no {0} pipe")]
    MissingPipe(&'static str),
    #[error("engine never answered `{0}`")]
    Handshake(&'static str),
    #[error("engine closed its output stream")]
    Closed,
    #[error("engine exceeded its thinking budget")]
    Timeout,
    #[error("engine reported unparseable best move `{0}`")]
    BadMove(String),
    #[error("engine i/o failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Produces at most one move for the position reached by a move ledger.
#[async_trait]
pub trait MoveEngine: Send {
    /// The engine's chosen move, or `None` when it has none to offer (the
    /// game is already decided by its own reckoning).
    async fn best_move(
        &mut self,
        ledger: &MoveLedger,
        think_time: Duration,
    ) -> Result<Option<UciMove>, EngineError>;
}

/// A UCI engine running as a child process, driven over stdin/stdout.
///
/// The process is killed when the handle is dropped, so cancellation at any
/// await point still releases it; `quit` is the orderly variant.
pub struct UciEngine {
    child: Child,
    stdin: ChildStdin,
    stdout: Lines<BufReader<ChildStdout>>,
}

impl UciEngine {
    pub async fn spawn(path: &Path) -> Result<Self, EngineError> {
        let mut child = Command::new(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| EngineError::Spawn {
                path: path.display().to_string(),
                source,
            })?;
        let stdin = child.stdin.take().ok_or(EngineError::MissingPipe("stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or(EngineError::MissingPipe("stdout"))?;
        let mut engine = Self {
            child,
            stdin,
            stdout: BufReader::new(stdout).lines(),
        };
        engine.send("uci").await?;
        engine.wait_for("uciok").await?;
        engine.send("isready").await?;
        engine.wait_for("readyok").await?;
        Ok(engine)
    }

    async fn send(&mut self, command: &str) -> Result<(), EngineError> {
        debug!(command, "-> engine");
        self.stdin.write_all(command.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn next_line(&mut self) -> Result<String, EngineError> {
        match self.stdout.next_line().await? {
            Some(line) => Ok(line),
            None => Err(EngineError::Closed),
        }
    }

    async fn wait_for(&mut self, token: &'static str) -> Result<(), EngineError> {
        let wait = async {
            loop {
                if self.next_line().await?.trim() == token {
                    return Ok(());
                }
            }
        };
        timeout(HANDSHAKE_TIMEOUT, wait)
            .await
            .map_err(|_| EngineError::Handshake(token))?
    }

    async fn read_best_move(&mut self) -> Result<Option<UciMove>, EngineError> {
        loop {
            let line = self.next_line().await?;
            if let Some(rest) = line.strip_prefix("bestmove") {
                return parse_best_move(rest);
            }
        }
    }

    /// Orderly shutdown. The process is killed on drop regardless, so every
    /// exit path releases it.
    pub async fn quit(mut self) {
        if self.send("quit").await.is_err() {
            return;
        }
        if timeout(Duration::from_secs(2), self.child.wait())
            .await
            .is_err()
        {
            warn!("engine ignored quit, killing process");
        }
    }
}

#[async_trait]
impl MoveEngine for UciEngine {
    async fn best_move(
        &mut self,
        ledger: &MoveLedger,
        think_time: Duration,
    ) -> Result<Option<UciMove>, EngineError> {
        if ledger.is_empty() {
            self.send("position startpos").await?;
        } else {
            self.send(&format!("position startpos moves {ledger}"))
                .await?;
        }
        self.send(&format!("go movetime {}", think_time.as_millis()))
            .await?;
        match timeout(think_time + SEARCH_GRACE, self.read_best_move()).await {
            Ok(result) => result,
            Err(_) => {
                // Abandon the search and drain the late bestmove, if any,
                // so the next turn starts from a clean protocol state.
                let _ = self.send("stop").await;
                let _ = timeout(Duration::from_secs(1), self.read_best_move()).await;
                Err(EngineError::Timeout)
            }
        }
    }
}

fn parse_best_move(rest: &str) -> Result<Option<UciMove>, EngineError> {
    let token = rest.split_whitespace().next().unwrap_or("");
    match token {
        "" | "(none)" | "0000" => Ok(None),
        token => token
            .parse::<UciMove>()
            .map(Some)
            .map_err(|_| EngineError::BadMove(token.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_best_move_with_ponder_suffix() {
        let parsed = parse_best_move(" e2e4 ponder e7e5").unwrap();
        assert_eq!(parsed, Some("e2e4".parse().unwrap()));
    }

    #[test]
    fn treats_none_and_null_as_no_move() {
        assert_eq!(parse_best_move(" (none)").unwrap(), None);
        assert_eq!(parse_best_move(" 0000").unwrap(), None);
        assert_eq!(parse_best_move("").unwrap(), None);
    }

    #[test]
    fn rejects_garbage_best_move() {
        assert!(matches!(
            parse_best_move(" not-a-move"),
            Err(EngineError::BadMove(_))
        ));
    }
}
