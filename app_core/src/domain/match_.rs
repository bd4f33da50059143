//! Match (spec §3): state moves only `pending -> running -> {completed, failed}`,
//! with `ResetFailedMatches` the sole exception (`failed -> pending`).

use crate::CoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MatchPriority {
    Low,
    Medium,
    High,
}

impl MatchPriority {
    /// Priority assigned by index within a sorted game list (spec §4.1 Start,
    /// step 2): index 0 -> high, index 1 -> medium, otherwise -> low.
    pub fn by_index(index: usize) -> Self {
        match index {
            0 => MatchPriority::High,
            1 => MatchPriority::Medium,
            _ => MatchPriority::Low,
        }
    }
}

/// `match.winner`: 0 = draw, 1 = program1, 2 = program2 (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Winner {
    Draw,
    Program1,
    Program2,
}

impl Winner {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Winner::Draw),
            1 => Some(Winner::Program1),
            2 => Some(Winner::Program2),
            _ => None,
        }
    }
    pub fn to_code(self) -> u8 {
        match self {
            Winner::Draw => 0,
            Winner::Program1 => 1,
            Winner::Program2 => 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Match {
    pub id: Uuid,
    pub tournament_id: Uuid,
    pub game_id: Uuid,
    pub program1_id: Uuid,
    pub program2_id: Uuid,
    pub status: MatchStatus,
    pub priority: MatchPriority,
    pub round_number: u32,
    pub score1: Option<i32>,
    pub score2: Option<i32>,
    pub winner: Option<Winner>,
    pub error_code: Option<i32>,
    pub error_message: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Result posted by the executor adapter after a successful run (spec §6).
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub score1: i32,
    pub score2: i32,
    pub winner: Winner,
    pub duration: std::time::Duration,
}

impl Match {
    pub fn new(
        tournament_id: Uuid,
        game_id: Uuid,
        program1_id: Uuid,
        program2_id: Uuid,
        priority: MatchPriority,
        round_number: u32,
        created_at: DateTime<Utc>,
    ) -> Result<Self, CoreError> {
        if program1_id == program2_id {
            return Err(CoreError::Validation(
                crate::utils::validation::FieldError::builder()
                    .set_field("program2_id")
                    .add_user_defined_code("duplicate_program")
                    .add_message("a match cannot pair a program against itself")
                    .build()
                    .into(),
            ));
        }
        Ok(Match {
            id: Uuid::nil(),
            tournament_id,
            game_id,
            program1_id,
            program2_id,
            status: MatchStatus::Pending,
            priority,
            round_number,
            score1: None,
            score2: None,
            winner: None,
            error_code: None,
            error_message: None,
            started_at: None,
            completed_at: None,
            created_at,
        })
    }

    /// `pending -> running` (spec §4.3 step 3). Fails if not currently pending
    /// so a concurrent worker loses the race cleanly.
    pub fn start_running(&mut self, now: DateTime<Utc>) -> Result<(), CoreError> {
        if self.status != MatchStatus::Pending {
            return Err(CoreError::Conflict(
                "match is not pending".to_string(),
            ));
        }
        self.status = MatchStatus::Running;
        self.started_at = Some(now);
        Ok(())
    }

    /// `running -> completed` with the executor's result (spec §4.3 step 6).
    pub fn complete(&mut self, result: &MatchResult, now: DateTime<Utc>) -> Result<(), CoreError> {
        if self.status != MatchStatus::Running {
            return Err(CoreError::Conflict(
                "match is not running".to_string(),
            ));
        }
        self.status = MatchStatus::Completed;
        self.score1 = Some(result.score1);
        self.score2 = Some(result.score2);
        self.winner = Some(result.winner);
        self.completed_at = Some(now);
        Ok(())
    }

    /// `running -> failed` (spec §4.3 step 7).
    pub fn fail(&mut self, error_code: Option<i32>, error_message: String, now: DateTime<Utc>) -> Result<(), CoreError> {
        if self.status != MatchStatus::Running {
            return Err(CoreError::Conflict(
                "match is not running".to_string(),
            ));
        }
        self.status = MatchStatus::Failed;
        self.error_code = error_code;
        self.error_message = Some(error_message);
        self.completed_at = Some(now);
        Ok(())
    }

    /// `failed -> pending`, the sole exception to forward-only transitions
    /// (spec §3, `RetryFailedMatches`).
    pub fn reset_to_pending(&mut self) -> Result<(), CoreError> {
        if self.status != MatchStatus::Failed {
            return Err(CoreError::Conflict("match is not failed".to_string()));
        }
        self.status = MatchStatus::Pending;
        self.error_code = None;
        self.error_message = None;
        self.started_at = None;
        self.completed_at = None;
        Ok(())
    }
}
