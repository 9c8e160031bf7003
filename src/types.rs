use std::fmt;

use serde::Deserialize;

#[derive(Deserialize, Debug, Hash, Clone, PartialEq, Eq)]
pub struct GameId(pub String);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One event from the Board API game stream.
///
/// `gameFull` opens every stream (also when attaching to a game already in
/// progress) and embeds the current state; `gameState` carries the complete
/// move history from the start position, never a delta.
#[derive(Deserialize, Debug)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GameEvent {
    GameFull {
        id: GameId,
        #[serde(default)]
        white: PlayerRef,
        #[serde(default)]
        black: PlayerRef,
        #[serde(default)]
        state: GameState,
    },
    GameState(GameState),
    ChatLine {
        username: String,
        text: String,
    },
    OpponentGone {
        #[serde(default)]
        gone: bool,
    },
}

/// One side of a game. Every field is optional: AI opponents carry only
/// `aiLevel`, and degenerate events have been observed with no data at all.
#[derive(Deserialize, Debug, Default, Clone)]
pub struct PlayerRef {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "aiLevel")]
    pub ai_level: Option<u32>,
}

#[derive(Deserialize, Debug, Default, Clone)]
pub struct GameState {
    #[serde(default)]
    pub moves: String,
    #[serde(default)]
    pub status: GameStatus,
    #[serde(default)]
    pub winner: Option<String>,
}

#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum GameStatus {
    Created,
    #[default]
    Started,
    Aborted,
    Mate,
    Resign,
    Stalemate,
    Timeout,
    Draw,
    Outoftime,
    Cheat,
    NoStart,
    UnknownFinish,
    VariantEnd,
    #[serde(other)]
    Unknown,
}

impl GameStatus {
    /// Statuses under which the game is still being played. Anything else,
    /// including statuses this build does not know, ends the session.
    pub fn is_ongoing(self) -> bool {
        matches!(self, GameStatus::Created | GameStatus::Started)
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct Account {
    pub id: String,
    pub username: String,
}

#[derive(Deserialize, Debug)]
pub struct OngoingGames {
    #[serde(rename = "nowPlaying", default)]
    pub now_playing: Vec<OngoingGame>,
}

#[derive(Deserialize, Debug)]
pub struct OngoingGame {
    #[serde(rename = "gameId")]
    pub game_id: GameId,
}

#[derive(Deserialize, Debug)]
pub struct Challenges {
    #[serde(rename = "in", default)]
    pub incoming: Vec<Challenge>,
}

#[derive(Deserialize, Debug)]
pub struct Challenge {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub challenger: Option<PlayerRef>,
}
