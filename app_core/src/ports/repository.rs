//! Repository port (spec §6 "Repository (outbound)"). The repository is
//! the single source of truth; every mutation write-throughs here first,
//! caches are only ever invalidated or refreshed afterwards (spec §5).

use crate::domain::{
    CrossGameLeaderboardEntry, Game, LatestParticipant, LeaderboardEntry, Match, MatchPriority,
    MatchStatus, Program, RatingHistory, Team, TeamMember, Tournament, TournamentGame,
    TournamentParticipant,
};
use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DbError {
    /// update could not find a row matching id + version
    #[error("optimistic lock conflict")]
    OptimisticLockConflict,

    /// id does not exist
    #[error("entity not found")]
    NotFound,

    /// constraint name if returned from the database
    #[error("unique violation{0:?}")]
    UniqueViolation(Option<String>),

    /// constraint name if returned from the database
    #[error("foreign key violation{0:?}")]
    ForeignKeyViolation(Option<String>),

    /// constraint name if returned from the database
    #[error("check violation{0:?}")]
    CheckViolation(Option<String>),

    /// transient db problem; retry may work
    #[error("serialization failure")]
    SerializationFailure,

    /// connection, pool, or other db errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type DbResult<T> = Result<T, DbError>;

/// Filter accepted by `TournamentRepository::list`.
#[derive(Debug, Clone, Default)]
pub struct TournamentFilter {
    pub status: Option<crate::domain::TournamentStatus>,
    pub creator: Option<Uuid>,
}

#[async_trait]
pub trait TournamentRepository: Send + Sync {
    async fn create_tournament(&self, tournament: &Tournament) -> DbResult<Tournament>;
    async fn get_tournament(&self, id: Uuid) -> DbResult<Option<Tournament>>;
    /// Optimistic-concurrency update: fails with `OptimisticLockConflict`
    /// unless `tournament.id_version()` matches the stored version exactly.
    async fn update_tournament(&self, tournament: &Tournament) -> DbResult<Tournament>;
    async fn update_tournament_status(
        &self,
        id: Uuid,
        status: crate::domain::TournamentStatus,
    ) -> DbResult<Tournament>;
    async fn delete_tournament(&self, id: Uuid) -> DbResult<()>;
    async fn list_tournaments(&self, filter: &TournamentFilter) -> DbResult<Vec<Tournament>>;
    async fn code_exists(&self, code: &str) -> DbResult<bool>;

    async fn get_participants_count(&self, tournament_id: Uuid) -> DbResult<u32>;
    async fn get_participants(&self, tournament_id: Uuid) -> DbResult<Vec<TournamentParticipant>>;
    async fn get_participant(
        &self,
        tournament_id: Uuid,
        program_id: Uuid,
    ) -> DbResult<Option<TournamentParticipant>>;
    async fn add_participant(
        &self,
        participant: &TournamentParticipant,
    ) -> DbResult<TournamentParticipant>;

    /// Latest (highest-version) program per (team, game), flattened across
    /// all games of the tournament.
    async fn get_latest_participants(&self, tournament_id: Uuid) -> DbResult<Vec<LatestParticipant>>;
    /// Same, grouped by game short name for deterministic iteration (spec
    /// §4.1 Start, step 1: games sorted lexicographically).
    async fn get_latest_participants_grouped_by_game(
        &self,
        tournament_id: Uuid,
    ) -> DbResult<Vec<(Game, Vec<LatestParticipant>)>>;

    async fn get_leaderboard(&self, tournament_id: Uuid, limit: u32) -> DbResult<Vec<LeaderboardEntry>>;
    async fn get_cross_game_leaderboard(
        &self,
        tournament_id: Uuid,
    ) -> DbResult<Vec<CrossGameLeaderboardEntry>>;

    async fn get_tournament_games(&self, tournament_id: Uuid) -> DbResult<Vec<TournamentGame>>;
    async fn upsert_tournament_game(&self, tg: &TournamentGame) -> DbResult<TournamentGame>;
}

#[async_trait]
pub trait MatchRepository: Send + Sync {
    async fn create_match(&self, m: &Match) -> DbResult<Match>;
    async fn create_matches_batch(&self, matches: &[Match]) -> DbResult<Vec<Match>>;
    async fn get_match(&self, id: Uuid) -> DbResult<Option<Match>>;
    async fn get_matches_by_tournament(&self, tournament_id: Uuid) -> DbResult<Vec<Match>>;
    async fn get_pending_by_tournament(&self, tournament_id: Uuid) -> DbResult<Vec<Match>>;
    async fn get_pending_by_tournament_and_game(
        &self,
        tournament_id: Uuid,
        game_id: Uuid,
    ) -> DbResult<Vec<Match>>;
    /// Atomically flips every `failed` match of the tournament back to
    /// `pending`, clears error fields, and returns the reset count.
    async fn reset_failed_matches(&self, tournament_id: Uuid) -> DbResult<u32>;
    async fn get_next_round_number(&self, tournament_id: Uuid) -> DbResult<u32>;
    async fn get_next_round_number_by_game(&self, tournament_id: Uuid, game_id: Uuid) -> DbResult<u32>;
    async fn get_matches_by_rounds(
        &self,
        tournament_id: Uuid,
        game_id: Uuid,
        rounds: &[u32],
    ) -> DbResult<Vec<Match>>;

    /// `pending -> running`; fails if the match is not currently pending so
    /// a racing worker drops it (spec §4.3 step 3).
    async fn transition_to_running(&self, id: Uuid) -> DbResult<Match>;
    /// `running -> {completed, failed}` with the outcome fields set.
    async fn finish_match(&self, m: &Match) -> DbResult<Match>;
    /// Recovery sweep (spec §4.3): reset any `running` match older than
    /// `older_than_secs` back to `pending`. Returns the reset matches so the
    /// caller can re-enqueue them (a `running` match was already removed
    /// from the queue when a worker claimed it).
    async fn reset_stale_running(&self, older_than_secs: i64) -> DbResult<Vec<Match>>;

    async fn get_match_status(&self, id: Uuid) -> DbResult<Option<MatchStatus>>;
}

#[async_trait]
pub trait RatingRepository: Send + Sync {
    /// Insert the history row and update the participant's rating/stats in
    /// one transaction (spec §4.4 step 3). Returns `Ok(false)` without
    /// writing anything if a history row already exists for this
    /// (program, match) pair (spec §8 property 8, idempotent application).
    async fn record_rating_change(
        &self,
        history: &RatingHistory,
        won: bool,
        draw: bool,
    ) -> DbResult<bool>;
    async fn get_history_by_program(&self, program_id: Uuid) -> DbResult<Vec<RatingHistory>>;
    async fn history_exists_for_match(&self, program_id: Uuid, match_id: Uuid) -> DbResult<bool>;
}

#[async_trait]
pub trait GameRepository: Send + Sync {
    async fn get_game(&self, id: Uuid) -> DbResult<Option<Game>>;
    async fn get_game_by_short_name(&self, short_name: &str) -> DbResult<Option<Game>>;
    async fn list_games(&self) -> DbResult<Vec<Game>>;
}

#[async_trait]
pub trait TeamRepository: Send + Sync {
    async fn get_team(&self, id: Uuid) -> DbResult<Option<Team>>;
    async fn get_team_members(&self, team_id: Uuid) -> DbResult<Vec<TeamMember>>;
    async fn get_team_for_user(&self, tournament_id: Uuid, user_id: Uuid) -> DbResult<Option<Team>>;
}

#[async_trait]
pub trait ProgramRepository: Send + Sync {
    async fn get_program(&self, id: Uuid) -> DbResult<Option<Program>>;
    async fn get_programs_for_tournament_and_game(
        &self,
        tournament_id: Uuid,
        game_id: Uuid,
    ) -> DbResult<Vec<Program>>;
}

/// Umbrella trait implemented once by the concrete repository adapter so
/// callers can depend on a single `Arc<dyn RepositoryPort>` instead of six.
pub trait RepositoryPort:
    TournamentRepository + MatchRepository + RatingRepository + GameRepository + TeamRepository + ProgramRepository
{
}

impl<T> RepositoryPort for T where
    T: TournamentRepository + MatchRepository + RatingRepository + GameRepository + TeamRepository + ProgramRepository
{
}

pub(crate) fn priority_rank(p: MatchPriority) -> u8 {
    match p {
        MatchPriority::High => 0,
        MatchPriority::Medium => 1,
        MatchPriority::Low => 2,
    }
}
