use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use serde::{Deserialize, Serialize};
use shakmaty::Color;

/// Parsing for the command line at startup.
#[derive(Parser, Debug)]
#[command(author, version, about = "Plays on lichess with a local UCI engine", long_about = None)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "bot.toml")]
    pub config: PathBuf,
}

/// Everything the bot needs for one run. Threaded explicitly into the
/// components that use it; changing the file takes effect on restart.
#[derive(Deserialize, Debug, Clone)]
pub struct BotConfig {
    /// API token. The LICHESS_API_TOKEN environment variable wins over this.
    token: Option<String>,
    pub engine: EngineConfig,
    #[serde(default)]
    pub seek: SeekSettings,
    /// Side assumed when a game start event identifies neither player as us.
    #[serde(default)]
    fallback_color: FallbackColor,
    /// Seconds to sleep between idle matchmaking attempts.
    #[serde(default = "default_backoff_secs")]
    backoff_secs: u64,
}

impl BotConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read config file {}", path.display()))?;
        toml::from_str(&text).with_context(|| format!("cannot parse config file {}", path.display()))
    }

    pub fn token(&self) -> anyhow::Result<String> {
        env::var("LICHESS_API_TOKEN")
            .ok()
            .or_else(|| self.token.clone())
            .context("no API token: set LICHESS_API_TOKEN or `token` in the config file")
    }

    pub fn think_time(&self) -> Duration {
        Duration::from_secs_f64(self.engine.think_time_secs)
    }

    pub fn backoff(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }

    pub fn fallback_color(&self) -> Color {
        match self.fallback_color {
            FallbackColor::White => Color::White,
            FallbackColor::Black => Color::Black,
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
pub struct EngineConfig {
    /// Path to a UCI engine binary, e.g. stockfish.
    pub path: PathBuf,
    /// Thinking budget per move, in seconds.
    #[serde(default = "default_think_time_secs")]
    pub think_time_secs: f64,
}

/// What kind of games to ask the server for.
#[derive(Deserialize, Debug, Clone)]
pub struct SeekSettings {
    #[serde(default = "default_clock_limit_minutes")]
    pub clock_limit_minutes: u32,
    #[serde(default)]
    pub clock_increment_secs: u32,
    #[serde(default)]
    pub variant: Variant,
    #[serde(default)]
    pub color: ColorPreference,
    #[serde(default = "default_rated")]
    pub rated: bool,
}

impl Default for SeekSettings {
    fn default() -> Self {
        Self {
            clock_limit_minutes: default_clock_limit_minutes(),
            clock_increment_secs: 0,
            variant: Variant::default(),
            color: ColorPreference::default(),
            rated: default_rated(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Variant {
    #[default]
    Standard,
    Chess960,
    Crazyhouse,
    Antichess,
    Atomic,
    Horde,
    KingOfTheHill,
    RacingKings,
    ThreeCheck,
}

#[derive(Serialize, Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ColorPreference {
    White,
    Black,
    #[default]
    Random,
}

#[derive(Deserialize, Debug, Default, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum FallbackColor {
    White,
    #[default]
    Black,
}

fn default_backoff_secs() -> u64 {
    5
}

fn default_think_time_secs() -> f64 {
    2.0
}

fn default_clock_limit_minutes() -> u32 {
    10
}

fn default_rated() -> bool {
    true
}
