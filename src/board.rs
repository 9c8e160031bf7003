use shakmaty::uci::UciMove;
use shakmaty::{Chess, Position};
use tracing::warn;

use crate::ledger::MoveLedger;

/// Position and ledger reached by replaying a server move history.
pub struct Replay {
    pub position: Chess,
    pub ledger: MoveLedger,
}

/// Rebuilds the board from the start position by applying the complete,
/// space-separated move history the server sent.
///
/// This is a pure function of the move string and is re-run on every server
/// update rather than patching the previous position incrementally, so the
/// local board always equals the server's authoritative record. Tokens that
/// do not parse or are illegal in the current position are reported and
/// skipped; replay continues with the remaining tokens.
pub fn replay_history(moves: &str) -> Replay {
    let mut position = Chess::default();
    let mut ledger = MoveLedger::default();
    for token in moves.split_whitespace() {
        let uci = match token.parse::<UciMove>() {
            Ok(uci) => uci,
            Err(err) => {
                warn!(token, %err, "skipping unparseable move token");
                continue;
            }
        };
        let m = match uci.to_move(&position) {
            Ok(m) => m,
            Err(err) => {
                warn!(token, %err, "skipping illegal move token");
                continue;
            }
        };
        match position.clone().play(&m) {
            Ok(next) => {
                position = next;
                ledger.push(uci);
            }
            Err(err) => {
                warn!(token, %err, "skipping rejected move token");
            }
        }
    }
    Replay { position, ledger }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shakmaty::Color;

    #[test]
    fn empty_history_is_start_position_with_white_to_move() {
        let replay = replay_history("");
        assert_eq!(replay.position, Chess::default());
        assert!(replay.ledger.is_empty());
        assert_eq!(replay.position.turn(), Color::White);
    }

    #[test]
    fn turn_follows_applied_move_count_parity() {
        assert_eq!(replay_history("e2e4").position.turn(), Color::Black);
        assert_eq!(replay_history("e2e4 e7e5").position.turn(), Color::White);
        assert_eq!(
            replay_history("e2e4 e7e5 g1f3").position.turn(),
            Color::Black
        );
        assert_eq!(
            replay_history("e2e4 e7e5 g1f3 b8c6").position.turn(),
            Color::White
        );
    }

    #[test]
    fn replay_is_deterministic() {
        let history = "e2e4 c7c5 g1f3 d7d6 d2d4 c5d4";
        let first = replay_history(history);
        let second = replay_history(history);
        assert_eq!(first.position, second.position);
        assert_eq!(first.ledger, second.ledger);
    }

    #[test]
    fn unparseable_token_is_skipped_and_replay_continues() {
        let replay = replay_history("e2e4 z9z9 e7e5");
        assert_eq!(replay.ledger.len(), 2);
        assert_eq!(replay.position, replay_history("e2e4 e7e5").position);
    }

    #[test]
    fn illegal_token_is_skipped_and_replay_continues() {
        // e2e4 is no longer available once the pawn has moved.
        let replay = replay_history("e2e4 e2e4 e7e5");
        assert_eq!(replay.ledger.len(), 2);
        assert_eq!(replay.position, replay_history("e2e4 e7e5").position);
    }

    #[test]
    fn checkmate_is_terminal() {
        let replay = replay_history("f2f3 e7e5 g2g4 d8h4");
        assert!(replay.position.is_game_over());
        assert_eq!(replay.ledger.len(), 4);
    }

    #[test]
    fn ongoing_position_is_not_terminal() {
        assert!(!replay_history("e2e4 e7e5").position.is_game_over());
    }
}
