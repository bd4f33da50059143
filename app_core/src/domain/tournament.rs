//! Tournament aggregate (spec §3): lifecycle `pending -> active -> {completed, cancelled}`.

use crate::{
    CoreError, CoreResult,
    utils::{id_version::IdVersion, traits::ObjectIdVersion, validation::FieldError},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TournamentStatus {
    Pending,
    Active,
    Completed,
    Cancelled,
}

impl TournamentStatus {
    /// Whether `self -> next` is an allowed transition (spec §3 invariant).
    pub fn can_transition_to(self, next: TournamentStatus) -> bool {
        use TournamentStatus::*;
        matches!(
            (self, next),
            (Pending, Active) | (Pending, Cancelled) | (Active, Completed) | (Active, Cancelled)
        )
    }
}

/// Tournament aggregate. Fields are private; mutation happens through
/// dedicated methods so that invariants (status monotonicity, `start_time`
/// set exactly on activation) cannot be bypassed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tournament {
    id_version: IdVersion,
    code: String,
    status: TournamentStatus,
    max_participants: Option<u32>,
    max_team_size: u32,
    start_time: Option<DateTime<Utc>>,
    end_time: Option<DateTime<Utc>>,
    creator: Option<Uuid>,
    metadata: HashMap<String, String>,
}

impl ObjectIdVersion for Tournament {
    fn get_id_version(&self) -> IdVersion {
        self.id_version
    }
}

impl Tournament {
    pub fn new(code: String, max_team_size: u32) -> Self {
        Tournament {
            id_version: IdVersion::New,
            code,
            status: TournamentStatus::Pending,
            max_participants: None,
            max_team_size,
            start_time: None,
            end_time: None,
            creator: None,
            metadata: HashMap::new(),
        }
    }

    pub fn from_parts(
        id_version: IdVersion,
        code: String,
        status: TournamentStatus,
        max_participants: Option<u32>,
        max_team_size: u32,
        start_time: Option<DateTime<Utc>>,
        end_time: Option<DateTime<Utc>>,
        creator: Option<Uuid>,
        metadata: HashMap<String, String>,
    ) -> Self {
        Tournament {
            id_version,
            code,
            status,
            max_participants,
            max_team_size,
            start_time,
            end_time,
            creator,
            metadata,
        }
    }

    pub fn id(&self) -> Option<Uuid> {
        self.id_version.get_id()
    }
    pub fn id_version(&self) -> IdVersion {
        self.id_version
    }
    pub fn set_id_version(&mut self, id_version: IdVersion) -> &mut Self {
        self.id_version = id_version;
        self
    }
    pub fn code(&self) -> &str {
        &self.code
    }
    pub fn status(&self) -> TournamentStatus {
        self.status
    }
    pub fn max_participants(&self) -> Option<u32> {
        self.max_participants
    }
    pub fn set_max_participants(&mut self, n: Option<u32>) -> &mut Self {
        self.max_participants = n;
        self
    }
    pub fn max_team_size(&self) -> u32 {
        self.max_team_size
    }
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }
    pub fn creator(&self) -> Option<Uuid> {
        self.creator
    }
    pub fn set_creator(&mut self, creator: Option<Uuid>) -> &mut Self {
        self.creator = creator;
        self
    }
    pub fn metadata(&self) -> &HashMap<String, String> {
        &self.metadata
    }
    pub fn set_metadata(&mut self, metadata: HashMap<String, String>) -> &mut Self {
        self.metadata = metadata;
        self
    }

    pub fn is_pending(&self) -> bool {
        self.status == TournamentStatus::Pending
    }
    pub fn is_active(&self) -> bool {
        self.status == TournamentStatus::Active
    }

    /// Validate the static fields of a tournament (spec §3/§7 `Validation`).
    pub fn validate(&self) -> CoreResult<()> {
        if self.code.len() < 6 || self.code.len() > 8 {
            return Err(FieldError::builder()
                .set_field("code")
                .add_invalid_format()
                .add_message("tournament code must be 6-8 characters")
                .build()
                .into());
        }
        if self.max_team_size < 1 {
            return Err(FieldError::builder()
                .set_field("max_team_size")
                .add_user_defined_code("out_of_range")
                .add_message("max_team_size must be >= 1")
                .build()
                .into());
        }
        if let Some(max) = self.max_participants
            && max == 0
        {
            return Err(FieldError::builder()
                .set_field("max_participants")
                .add_user_defined_code("out_of_range")
                .add_message("max_participants must be >= 1 when set")
                .build()
                .into());
        }
        Ok(())
    }

    /// Transition to `Active`, setting `start_time = now` (spec §3, §4.1 Start).
    pub fn activate(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        self.transition(TournamentStatus::Active)?;
        self.start_time = Some(now);
        Ok(())
    }

    /// Transition to `Completed`, setting `end_time = now` (spec §4.1 Complete).
    pub fn complete(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        self.transition(TournamentStatus::Completed)?;
        self.end_time = Some(now);
        Ok(())
    }

    pub fn cancel(&mut self) -> CoreResult<()> {
        self.transition(TournamentStatus::Cancelled)
    }

    fn transition(&mut self, next: TournamentStatus) -> CoreResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::Conflict(format!(
                "cannot move tournament from {:?} to {next:?}",
                self.status
            )));
        }
        self.status = next;
        Ok(())
    }
}

/// Request DTO for `TournamentService::create` (spec §4.1 Create).
#[derive(Debug, Clone)]
pub struct CreateTournamentRequest {
    pub max_participants: Option<u32>,
    pub max_team_size: u32,
    pub creator: Option<Uuid>,
    pub metadata: HashMap<String, String>,
}

/// 32-character confusables-free alphabet (spec §6): no I, O, 0, 1.
pub const TOURNAMENT_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
