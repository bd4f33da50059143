//! Game catalog and per-(tournament, game) scheduling state (spec §3).

use crate::{CoreResult, utils::validation::FieldError};
use std::time::Duration;
use uuid::Uuid;

/// A registered game. The short name is the stable key used by the
/// executor registry (design note §9: "a tagged configuration attached
/// to each Game", not an inheritance hierarchy).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Game {
    pub id: Uuid,
    pub short_name: String,
    pub display_name: String,
    pub rules_text: String,
}

impl Game {
    pub fn validate(&self) -> CoreResult<()> {
        if self.short_name.is_empty()
            || !self
                .short_name
                .bytes()
                .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
        {
            return Err(FieldError::builder()
                .set_field("short_name")
                .add_invalid_format()
                .add_message("short_name must match [a-z0-9_]+")
                .build()
                .into());
        }
        Ok(())
    }
}

/// Tagged executor configuration for a game (design note §9). Looked up
/// by short name in a registry rather than dispatched through an
/// inheritance hierarchy.
#[derive(Debug, Clone)]
pub struct GameConfig {
    pub short_name: String,
    pub executor_timeout: Duration,
    pub iterations: Option<u32>,
}

/// Per-(tournament, game) scheduling state (spec §3).
#[derive(Debug, Clone, Copy)]
pub struct TournamentGame {
    pub tournament_id: Uuid,
    pub game_id: Uuid,
    pub is_active: bool,
    pub current_round: u32,
    pub round_completed: bool,
}

impl TournamentGame {
    pub fn new(tournament_id: Uuid, game_id: Uuid) -> Self {
        TournamentGame {
            tournament_id,
            game_id,
            is_active: true,
            current_round: 0,
            round_completed: true,
        }
    }
}
