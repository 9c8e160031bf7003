use anyhow::Context;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::api::LichessClient;
use crate::color;
use crate::config::BotConfig;
use crate::engine::UciEngine;
use crate::game::GameSession;
use crate::types::{Account, GameEvent, GameId};

/// Supervising loop: keeps at most one game going at a time, attaching to
/// whatever the account is already playing before seeking anything new.
pub struct LichessBot {
    client: LichessClient,
    engine: UciEngine,
    account: Account,
    config: BotConfig,
}

impl LichessBot {
    /// Connects and starts the engine. Either failing is fatal: without an
    /// authenticated account or an engine there is nothing to play with.
    pub async fn new(config: BotConfig) -> anyhow::Result<Self> {
        let client = LichessClient::new(config.token()?);
        let account = client
            .account()
            .await
            .context("could not authenticate with lichess")?;
        info!(username = %account.username, "connected to lichess");

        let engine = UciEngine::spawn(&config.engine.path)
            .await
            .with_context(|| {
                format!(
                    "cannot start UCI engine {}",
                    config.engine.path.display()
                )
            })?;
        info!(path = %config.engine.path.display(), "engine ready");

        Ok(Self {
            client,
            engine,
            account,
            config,
        })
    }

    /// Runs until cancelled. Per-game and per-turn failures are contained in
    /// here; only startup-class errors escape.
    pub async fn run(&mut self) -> anyhow::Result<()> {
        loop {
            match self.client.first_ongoing_game().await {
                Ok(Some(game_id)) => {
                    info!(game_id = %game_id, "attaching to ongoing game");
                    self.play_game(&game_id).await;
                    sleep(self.config.backoff()).await;
                }
                Ok(None) => {
                    self.try_start_game().await;
                    sleep(self.config.backoff()).await;
                }
                Err(err) => {
                    warn!(%err, "could not query ongoing games");
                    sleep(self.config.backoff()).await;
                }
            }
        }
    }

    /// Consumes one game stream to its end, one event at a time. A dropped
    /// stream leaves the game in an unknown state; the supervising loop will
    /// re-attach and the fresh session resynchronizes from the full history.
    async fn play_game(&mut self, game_id: &GameId) {
        let mut stream = match self.client.stream_game(game_id).await {
            Ok(stream) => stream,
            Err(err) => {
                warn!(game_id = %game_id, %err, "could not open game stream");
                return;
            }
        };
        let mut session: Option<GameSession> = None;
        loop {
            let event = match stream.next_event().await {
                Ok(Some(event)) => event,
                Ok(None) => {
                    info!(game_id = %game_id, "game stream closed");
                    return;
                }
                Err(err) => {
                    warn!(game_id = %game_id, %err, "game stream dropped, state unknown");
                    return;
                }
            };
            match event {
                GameEvent::GameFull {
                    id,
                    white,
                    black,
                    state,
                } => {
                    let my_color = color::resolve(
                        &self.account.id,
                        white.id.as_deref(),
                        black.id.as_deref(),
                        self.config.fallback_color(),
                    );
                    info!(game_id = %id, ?my_color, "game started");
                    let mut started = GameSession::new(id, my_color, self.config.think_time());
                    started
                        .on_state(&state, &mut self.engine, &self.client)
                        .await;
                    if started.is_finished() {
                        return;
                    }
                    session = Some(started);
                }
                GameEvent::GameState(state) => {
                    let Some(session) = session.as_mut() else {
                        debug!(game_id = %game_id, "state update before game start, ignoring");
                        continue;
                    };
                    session
                        .on_state(&state, &mut self.engine, &self.client)
                        .await;
                    if session.is_finished() {
                        return;
                    }
                }
                GameEvent::ChatLine { username, text } => {
                    debug!(game_id = %game_id, %username, %text, "chat");
                }
                GameEvent::OpponentGone { gone } => {
                    debug!(game_id = %game_id, gone, "opponent gone notice");
                }
            }
        }
    }

    async fn try_start_game(&self) {
        info!("no ongoing game, seeking a new one");
        if let Err(err) = self.client.seek(&self.config.seek).await {
            warn!(%err, "seek failed, looking for an incoming challenge instead");
            if let Err(err) = self.accept_any_challenge().await {
                warn!(%err, "could not accept a challenge");
            }
        }
    }

    async fn accept_any_challenge(&self) -> anyhow::Result<()> {
        for challenge in self.client.incoming_challenges().await? {
            let challenger = challenge
                .challenger
                .as_ref()
                .and_then(|player| player.id.as_deref());
            if challenge.status == "created" && challenger != Some(self.account.id.as_str()) {
                self.client.accept_challenge(&challenge.id).await?;
                info!(challenge = %challenge.id, from = ?challenger, "accepted challenge");
                return Ok(());
            }
        }
        Ok(())
    }

    /// Orderly engine release; dropping the bot kills the process anyway.
    pub async fn shutdown(self) {
        self.engine.quit().await;
    }
}
