use std::time::Duration;

use async_trait::async_trait;
use shakmaty::uci::UciMove;
use shakmaty::{Chess, Color, Position};
use tracing::{debug, info, warn};

use crate::board;
use crate::engine::MoveEngine;
use crate::ledger::MoveLedger;
use crate::types::{GameId, GameState};

/// Accepts moves for delivery to the server.
#[async_trait]
pub trait MoveSink: Send + Sync {
    async fn submit(&self, game_id: &GameId, uci: &UciMove) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    AwaitingOpponent,
    OurTurn,
    Finished,
}

/// Turn-taking state machine for a single game.
///
/// Consumes server state updates strictly in delivery order, keeps the local
/// position reconciled with the server's complete move history, and asks the
/// engine for a move exactly once per position in which it is our turn. Our
/// side is fixed at construction and never changes.
pub struct GameSession {
    game_id: GameId,
    my_color: Color,
    position: Chess,
    ledger: MoveLedger,
    phase: Phase,
    /// Ply at which the last move request was issued. Re-delivery of the
    /// same position compares equal here and triggers nothing.
    last_move_request: Option<usize>,
    think_time: Duration,
}

impl GameSession {
    pub fn new(game_id: GameId, my_color: Color, think_time: Duration) -> Self {
        Self {
            game_id,
            my_color,
            position: Chess::default(),
            ledger: MoveLedger::default(),
            phase: Phase::AwaitingOpponent,
            last_move_request: None,
            think_time,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    /// Reconciles the session with a full server state and, when it puts us
    /// on move in a position we have not acted on yet, requests and submits
    /// one move. Every per-turn failure is contained here: the session stays
    /// usable and resynchronizes on the next update.
    pub async fn on_state(
        &mut self,
        state: &GameState,
        engine: &mut dyn MoveEngine,
        sink: &dyn MoveSink,
    ) {
        if self.phase == Phase::Finished {
            debug!(game_id = %self.game_id, "ignoring event for finished game");
            return;
        }

        let replay = board::replay_history(&state.moves);
        self.position = replay.position;
        self.ledger = replay.ledger;

        if !state.status.is_ongoing() || self.position.is_game_over() {
            self.phase = Phase::Finished;
            info!(
                game_id = %self.game_id,
                status = ?state.status,
                winner = ?state.winner,
                "game finished"
            );
            return;
        }

        if self.position.turn() != self.my_color {
            self.phase = Phase::AwaitingOpponent;
            return;
        }

        let ply = self.ledger.len();
        if self.last_move_request == Some(ply) {
            debug!(game_id = %self.game_id, ply, "already acted on this position");
            return;
        }

        self.phase = Phase::OurTurn;
        self.last_move_request = Some(ply);
        self.play_turn(engine, sink).await;
        self.phase = Phase::AwaitingOpponent;
    }

    async fn play_turn(&mut self, engine: &mut dyn MoveEngine, sink: &dyn MoveSink) {
        let uci = match engine.best_move(&self.ledger, self.think_time).await {
            Ok(Some(uci)) => uci,
            Ok(None) => {
                warn!(game_id = %self.game_id, "engine offered no move");
                return;
            }
            Err(err) => {
                warn!(game_id = %self.game_id, %err, "engine move request failed, skipping turn");
                return;
            }
        };
        let m = match uci.to_move(&self.position) {
            Ok(m) => m,
            Err(err) => {
                warn!(
                    game_id = %self.game_id,
                    %uci,
                    %err,
                    "engine returned an illegal move, not submitting"
                );
                return;
            }
        };
        // Apply locally before submitting so the position stays authoritative
        // while the server confirmation is in flight.
        match self.position.clone().play(&m) {
            Ok(next) => {
                self.position = next;
                self.ledger.push(uci.clone());
            }
            Err(err) => {
                warn!(game_id = %self.game_id, %uci, %err, "engine move rejected by the board");
                return;
            }
        }
        info!(game_id = %self.game_id, %uci, "submitting move");
        if let Err(err) = sink.submit(&self.game_id, &uci).await {
            warn!(
                game_id = %self.game_id,
                %err,
                "move submission failed, awaiting next server update"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineError;
    use crate::types::GameStatus;
    use std::sync::Mutex;

    struct ScriptedEngine {
        replies: Vec<Option<&'static str>>,
        calls: usize,
    }

    impl ScriptedEngine {
        fn new(replies: Vec<Option<&'static str>>) -> Self {
            Self { replies, calls: 0 }
        }
    }

    #[async_trait]
    impl MoveEngine for ScriptedEngine {
        async fn best_move(
            &mut self,
            _ledger: &MoveLedger,
            _think_time: Duration,
        ) -> Result<Option<UciMove>, EngineError> {
            let reply = self.replies.get(self.calls).copied().flatten();
            self.calls += 1;
            Ok(reply.map(|uci| uci.parse().unwrap()))
        }
    }

    struct FailingEngine;

    #[async_trait]
    impl MoveEngine for FailingEngine {
        async fn best_move(
            &mut self,
            _ledger: &MoveLedger,
            _think_time: Duration,
        ) -> Result<Option<UciMove>, EngineError> {
            Err(EngineError::Timeout)
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        submitted: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        fn submitted(&self) -> Vec<String> {
            self.submitted.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MoveSink for RecordingSink {
        async fn submit(&self, _game_id: &GameId, uci: &UciMove) -> anyhow::Result<()> {
            self.submitted.lock().unwrap().push(uci.to_string());
            Ok(())
        }
    }

    fn state(moves: &str, status: GameStatus) -> GameState {
        GameState {
            moves: moves.to_string(),
            status,
            winner: None,
        }
    }

    fn session(my_color: Color) -> GameSession {
        GameSession::new(
            GameId("testgame".to_string()),
            my_color,
            Duration::from_millis(10),
        )
    }

    #[tokio::test]
    async fn white_moves_first_without_any_prior_update() {
        let mut session = session(Color::White);
        let mut engine = ScriptedEngine::new(vec![Some("e2e4")]);
        let sink = RecordingSink::default();

        session
            .on_state(&state("", GameStatus::Started), &mut engine, &sink)
            .await;

        assert_eq!(engine.calls, 1);
        assert_eq!(sink.submitted(), vec!["e2e4"]);
        assert_eq!(session.phase, Phase::AwaitingOpponent);
    }

    #[tokio::test]
    async fn black_waits_for_the_opponent() {
        let mut session = session(Color::Black);
        let mut engine = ScriptedEngine::new(vec![Some("e7e5")]);
        let sink = RecordingSink::default();

        session
            .on_state(&state("", GameStatus::Started), &mut engine, &sink)
            .await;

        assert_eq!(engine.calls, 0);
        assert!(sink.submitted().is_empty());
        assert_eq!(session.phase, Phase::AwaitingOpponent);
    }

    #[tokio::test]
    async fn duplicate_update_submits_at_most_once() {
        let mut session = session(Color::White);
        let mut engine = ScriptedEngine::new(vec![Some("g1f3"), Some("g1f3")]);
        let sink = RecordingSink::default();
        let update = state("e2e4 e7e5", GameStatus::Started);

        session.on_state(&update, &mut engine, &sink).await;
        session.on_state(&update, &mut engine, &sink).await;

        assert_eq!(engine.calls, 1);
        assert_eq!(sink.submitted(), vec!["g1f3"]);
    }

    #[tokio::test]
    async fn terminal_status_finishes_and_absorbs_all_later_events() {
        let mut session = session(Color::White);
        let mut engine = ScriptedEngine::new(vec![Some("e2e4")]);
        let sink = RecordingSink::default();

        session
            .on_state(&state("", GameStatus::Resign), &mut engine, &sink)
            .await;
        assert!(session.is_finished());

        // Even an update that would put us on move changes nothing now.
        session
            .on_state(&state("", GameStatus::Started), &mut engine, &sink)
            .await;

        assert_eq!(engine.calls, 0);
        assert!(sink.submitted().is_empty());
        assert!(session.is_finished());
    }

    #[tokio::test]
    async fn checkmate_on_the_board_finishes_even_when_status_lags() {
        let mut session = session(Color::White);
        let mut engine = ScriptedEngine::new(vec![Some("e2e4")]);
        let sink = RecordingSink::default();

        session
            .on_state(
                &state("f2f3 e7e5 g2g4 d8h4", GameStatus::Started),
                &mut engine,
                &sink,
            )
            .await;

        assert!(session.is_finished());
        assert_eq!(engine.calls, 0);
        assert!(sink.submitted().is_empty());
    }

    #[tokio::test]
    async fn illegal_engine_move_is_not_submitted() {
        let mut session = session(Color::White);
        let mut engine = ScriptedEngine::new(vec![Some("e2e5")]);
        let sink = RecordingSink::default();

        session
            .on_state(&state("", GameStatus::Started), &mut engine, &sink)
            .await;

        assert_eq!(engine.calls, 1);
        assert!(sink.submitted().is_empty());
        assert!(!session.is_finished());
    }

    #[tokio::test]
    async fn engine_without_a_move_submits_nothing() {
        let mut session = session(Color::White);
        let mut engine = ScriptedEngine::new(vec![None]);
        let sink = RecordingSink::default();

        session
            .on_state(&state("", GameStatus::Started), &mut engine, &sink)
            .await;

        assert!(sink.submitted().is_empty());
        assert_eq!(session.phase, Phase::AwaitingOpponent);
    }

    #[tokio::test]
    async fn engine_failure_is_contained_and_later_turns_still_play() {
        let mut session = session(Color::White);
        let sink = RecordingSink::default();

        let mut failing = FailingEngine;
        session
            .on_state(&state("", GameStatus::Started), &mut failing, &sink)
            .await;
        assert!(sink.submitted().is_empty());
        assert!(!session.is_finished());

        // The opponent's reply arrives after our skipped turn was played out
        // of band; the session resynchronizes and acts on the new position.
        let mut engine = ScriptedEngine::new(vec![Some("g1f3")]);
        session
            .on_state(&state("e2e4 e7e5", GameStatus::Started), &mut engine, &sink)
            .await;

        assert_eq!(sink.submitted(), vec!["g1f3"]);
    }

    #[tokio::test]
    async fn malformed_history_tokens_do_not_block_play() {
        let mut session = session(Color::White);
        let mut engine = ScriptedEngine::new(vec![Some("g1f3")]);
        let sink = RecordingSink::default();

        // Two applied moves survive, so it is White's turn again.
        session
            .on_state(
                &state("e2e4 z9z9 e7e5", GameStatus::Started),
                &mut engine,
                &sink,
            )
            .await;

        assert_eq!(sink.submitted(), vec!["g1f3"]);
    }
}
