use shakmaty::Color;
use tracing::{debug, warn};

/// Determines which side of the board belongs to us for one game.
///
/// Player ids are compared case-insensitively against our own account id.
/// When white is unidentified but black is someone else, we must be white.
/// When neither side can be identified the configured fallback is used and a
/// warning names the choice; this never fails, so a malformed game start
/// event cannot take the bot down.
pub fn resolve(
    self_id: &str,
    white: Option<&str>,
    black: Option<&str>,
    fallback: Color,
) -> Color {
    if let Some(white) = white {
        if white.eq_ignore_ascii_case(self_id) {
            return Color::White;
        }
    }
    if let Some(black) = black {
        if black.eq_ignore_ascii_case(self_id) {
            return Color::Black;
        }
    }
    if white.is_none() && black.is_some() {
        debug!(self_id, "white side unidentified, inferring it from unmatched black");
        return Color::White;
    }
    warn!(
        self_id,
        ?fallback,
        "could not determine own side from game start data, using fallback"
    );
    fallback
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_white_case_insensitively() {
        assert_eq!(
            resolve("bob", Some("Bob"), Some("alice"), Color::Black),
            Color::White
        );
    }

    #[test]
    fn matches_black_case_insensitively() {
        assert_eq!(
            resolve("bob", Some("alice"), Some("BOB"), Color::Black),
            Color::Black
        );
    }

    #[test]
    fn white_match_takes_priority() {
        assert_eq!(
            resolve("bob", Some("bob"), Some("bob"), Color::Black),
            Color::White
        );
    }

    #[test]
    fn infers_white_when_only_black_is_present_and_unmatched() {
        assert_eq!(
            resolve("bob", None, Some("alice"), Color::Black),
            Color::White
        );
    }

    #[test]
    fn falls_back_when_neither_side_is_identifiable() {
        assert_eq!(resolve("bob", None, None, Color::Black), Color::Black);
        assert_eq!(resolve("bob", None, None, Color::White), Color::White);
    }

    #[test]
    fn falls_back_when_both_sides_are_someone_else() {
        assert_eq!(
            resolve("bob", Some("alice"), Some("carol"), Color::Black),
            Color::Black
        );
    }

    #[test]
    fn falls_back_when_only_white_is_present_and_unmatched() {
        assert_eq!(
            resolve("bob", Some("alice"), None, Color::Black),
            Color::Black
        );
    }
}
