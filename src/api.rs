use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use shakmaty::uci::UciMove;
use tracing::warn;

use crate::config::{ColorPreference, SeekSettings, Variant};
use crate::game::MoveSink;
use crate::types::{Account, Challenge, Challenges, GameEvent, GameId, OngoingGames};

const BASE_URL: &str = "https://lichess.org";

/// Authenticated client for the subset of the Board API the bot needs.
pub struct LichessClient {
    http: reqwest::Client,
    token: String,
}

impl LichessClient {
    pub fn new(token: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            token,
        }
    }

    pub async fn account(&self) -> anyhow::Result<Account> {
        let account = self
            .http
            .get(format!("{BASE_URL}/api/account"))
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()
            .context("account request rejected")?
            .json()
            .await?;
        Ok(account)
    }

    pub async fn first_ongoing_game(&self) -> anyhow::Result<Option<GameId>> {
        let games: OngoingGames = self
            .http
            .get(format!("{BASE_URL}/api/account/playing"))
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(games.now_playing.into_iter().next().map(|game| game.game_id))
    }

    pub async fn stream_game(&self, game_id: &GameId) -> anyhow::Result<GameEventStream> {
        let response = self
            .http
            .get(format!("{BASE_URL}/api/board/game/stream/{}", game_id.0))
            .bearer_auth(&self.token)
            .header("Accept", "application/x-ndjson")
            .send()
            .await?
            .error_for_status()
            .context("game stream request rejected")?;
        Ok(GameEventStream {
            response,
            buf: Vec::new(),
        })
    }

    pub async fn seek(&self, settings: &SeekSettings) -> anyhow::Result<()> {
        let response = self
            .http
            .post(format!("{BASE_URL}/api/board/seek"))
            .bearer_auth(&self.token)
            .form(&SeekRequest::from(settings))
            .send()
            .await?
            .error_for_status()
            .context("seek rejected")?;
        // The server keeps the response open while the seek is pending;
        // hanging up early cancels it.
        let _ = response.text().await;
        Ok(())
    }

    pub async fn incoming_challenges(&self) -> anyhow::Result<Vec<Challenge>> {
        let challenges: Challenges = self
            .http
            .get(format!("{BASE_URL}/api/challenge"))
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(challenges.incoming)
    }

    pub async fn accept_challenge(&self, challenge_id: &str) -> anyhow::Result<()> {
        self.http
            .post(format!("{BASE_URL}/api/challenge/{challenge_id}/accept"))
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()
            .context("challenge accept rejected")?;
        Ok(())
    }
}

#[async_trait]
impl MoveSink for LichessClient {
    async fn submit(&self, game_id: &GameId, uci: &UciMove) -> anyhow::Result<()> {
        self.http
            .post(format!("{BASE_URL}/api/board/game/{}/move/{uci}", game_id.0))
            .bearer_auth(&self.token)
            .send()
            .await?
            .error_for_status()
            .with_context(|| format!("server rejected move {uci}"))?;
        Ok(())
    }
}

#[derive(Serialize)]
struct SeekRequest {
    time: u32,
    increment: u32,
    variant: Variant,
    color: ColorPreference,
    rated: bool,
}

impl From<&SeekSettings> for SeekRequest {
    fn from(settings: &SeekSettings) -> Self {
        Self {
            time: settings.clock_limit_minutes,
            increment: settings.clock_increment_secs,
            variant: settings.variant,
            color: settings.color,
            rated: settings.rated,
        }
    }
}

/// Incremental ndjson reader over a live game stream.
pub struct GameEventStream {
    response: reqwest::Response,
    buf: Vec<u8>,
}

impl GameEventStream {
    /// The next decoded event, or `Ok(None)` once the server closes the
    /// stream. A closed or dropped stream means the game state is unknown,
    /// not that the game is over.
    pub async fn next_event(&mut self) -> anyhow::Result<Option<GameEvent>> {
        loop {
            if let Some(end) = self.buf.iter().position(|&b| b == b'\n') {
                let raw: Vec<u8> = self.buf.drain(..=end).collect();
                if let Some(event) = decode_line(&String::from_utf8_lossy(&raw)) {
                    return Ok(Some(event));
                }
                continue;
            }
            match self.response.chunk().await.context("game stream broke")? {
                Some(chunk) => self.buf.extend_from_slice(&chunk),
                None => return Ok(None),
            }
        }
    }
}

/// Blank lines are keep-alives; anything else that fails to parse is logged
/// and dropped so one bad event cannot end the stream.
fn decode_line(line: &str) -> Option<GameEvent> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str(line) {
        Ok(event) => Some(event),
        Err(err) => {
            warn!(%err, line, "skipping unparseable event");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_alive_lines_decode_to_nothing() {
        assert!(decode_line("").is_none());
        assert!(decode_line("   \r").is_none());
    }

    #[test]
    fn garbage_lines_are_dropped_not_fatal() {
        assert!(decode_line("{not json").is_none());
        assert!(decode_line(r#"{"type": "gameState""#).is_none());
    }

    #[test]
    fn well_formed_lines_decode() {
        let event = decode_line(r#"{"type": "gameState", "moves": "e2e4", "status": "started"}"#);
        assert!(matches!(event, Some(GameEvent::GameState(_))));
    }
}
