//! Tournament orchestration (spec §4.1, §4.3, §4.4): the one place that
//! knows how repository, queue, caches, lock and broadcaster compose. Match
//! workers and the admin CLI both drive the core exclusively through this
//! service, never touching a port directly.

use crate::domain::{
    CreateTournamentRequest, CrossGameLeaderboardEntry, LeaderboardEntry, Match, MatchPriority,
    MatchResult, Tournament, TournamentGame, TournamentParticipant, TournamentStatus,
    TOURNAMENT_CODE_ALPHABET,
};
use crate::ports::{
    Broadcaster, CacheError, DbError, DistributedLock, LeaderboardCache, MessageType,
    PriorityQueue, QueueError, RepositoryPort, TournamentCache, with_lock,
};
use crate::service::code_gen::generate_code;
use crate::service::rating::rate_match;
use crate::service::scheduling::{newcomer_pairs, round_robin_pairs};
use crate::{CoreError, CoreResult};
use chrono::{DateTime, Utc};
use rand::thread_rng;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

const CODE_LEN: usize = 8;
const CODE_GEN_ATTEMPTS: u32 = 10;
const TOURNAMENT_CACHE_TTL: Duration = Duration::from_secs(300);
const LOCK_TTL: Duration = Duration::from_secs(30);

fn map_db_err(e: DbError) -> CoreError {
    match e {
        DbError::NotFound => CoreError::NotFound("entity not found".to_string()),
        DbError::OptimisticLockConflict => {
            CoreError::Conflict("the record changed concurrently, retry".to_string())
        }
        DbError::UniqueViolation(c) => {
            CoreError::Conflict(format!("unique constraint violated{c:?}"))
        }
        DbError::ForeignKeyViolation(c) => {
            CoreError::Conflict(format!("foreign key constraint violated{c:?}"))
        }
        DbError::CheckViolation(c) => CoreError::Conflict(format!("check constraint violated{c:?}")),
        DbError::SerializationFailure => CoreError::Conflict("transient write conflict, retry".to_string()),
        DbError::Other(e) => CoreError::Internal(e.to_string()),
    }
}

fn map_queue_err(e: QueueError) -> CoreError {
    CoreError::Internal(e.to_string())
}

/// Cache errors never abort a domain operation (spec §7): log and move on.
fn log_cache_err(op: &str, e: CacheError) {
    tracing::warn!(error = %e, operation = op, "cache operation failed, continuing without it");
}

pub struct TournamentService {
    repository: Arc<dyn RepositoryPort>,
    queue: Arc<dyn PriorityQueue>,
    tournament_cache: Arc<dyn TournamentCache>,
    leaderboard_cache: Arc<dyn LeaderboardCache>,
    lock: Arc<dyn DistributedLock>,
    broadcaster: Arc<dyn Broadcaster>,
}

impl TournamentService {
    pub fn new(
        repository: Arc<dyn RepositoryPort>,
        queue: Arc<dyn PriorityQueue>,
        tournament_cache: Arc<dyn TournamentCache>,
        leaderboard_cache: Arc<dyn LeaderboardCache>,
        lock: Arc<dyn DistributedLock>,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> Self {
        TournamentService {
            repository,
            queue,
            tournament_cache,
            leaderboard_cache,
            lock,
            broadcaster,
        }
    }

    /// Create a tournament with a fresh, unique, confusables-free code
    /// (spec §4.1 Create, §8 property 7).
    #[tracing::instrument(skip(self, req))]
    pub async fn create_tournament(&self, req: CreateTournamentRequest) -> CoreResult<Tournament> {
        let mut rng = thread_rng();
        let mut code = generate_code(&mut rng, CODE_LEN);
        for _ in 0..CODE_GEN_ATTEMPTS {
            if !self.repository.code_exists(&code).await.map_err(map_db_err)? {
                break;
            }
            code = generate_code(&mut rng, CODE_LEN);
        }

        let mut tournament = Tournament::new(code, req.max_team_size);
        tournament.set_max_participants(req.max_participants);
        tournament.set_creator(req.creator);
        tournament.set_metadata(req.metadata);
        tournament.validate()?;

        let created = self
            .repository
            .create_tournament(&tournament)
            .await
            .map_err(map_db_err)?;

        self.broadcast_tournament_update(&created).await;
        Ok(created)
    }

    /// Cache-first lookup (spec §4.5): serve from cache, backfill from the
    /// repository on miss.
    #[tracing::instrument(skip(self))]
    pub async fn get_tournament(&self, id: Uuid) -> CoreResult<Tournament> {
        match self.tournament_cache.get_tournament(id).await {
            Ok(Some(t)) => return Ok(t),
            Ok(None) => {}
            Err(e) => log_cache_err("get_tournament", e),
        }

        let tournament = self
            .repository
            .get_tournament(id)
            .await
            .map_err(map_db_err)?
            .ok_or_else(|| CoreError::NotFound(format!("tournament {id}")))?;

        if let Err(e) = self
            .tournament_cache
            .put_tournament(&tournament, TOURNAMENT_CACHE_TTL)
            .await
        {
            log_cache_err("put_tournament", e);
        }
        Ok(tournament)
    }

    /// Register `program_id` as a participant of `tournament_id` (spec §4.1
    /// Join). Runs under lock key `tournament:join:{tid}` (TTL 5s): rejects
    /// unless the tournament is `pending`, and unless `max_participants` is
    /// unset or the current count is below it.
    #[tracing::instrument(skip(self))]
    pub async fn join_tournament(&self, tournament_id: Uuid, program_id: Uuid) -> CoreResult<TournamentParticipant> {
        let lock_key = format!("tournament:join:{tournament_id}");
        let repository = Arc::clone(&self.repository);

        let participant = with_lock(self.lock.as_ref(), &lock_key, Duration::from_secs(5), move || {
            let repository = Arc::clone(&repository);
            async move {
                let tournament = repository
                    .get_tournament(tournament_id)
                    .await
                    .map_err(|e| crate::ports::LockError::Cache(CacheError::Backend(anyhow::anyhow!(e.to_string()))))?
                    .ok_or_else(|| crate::ports::LockError::Cache(CacheError::Backend(anyhow::anyhow!("tournament not found"))))?;

                if tournament.status() != TournamentStatus::Pending {
                    return Err(crate::ports::LockError::Cache(CacheError::Backend(anyhow::anyhow!("tournament already started"))));
                }

                if let Some(limit) = tournament.max_participants() {
                    let count = repository
                        .get_participants_count(tournament_id)
                        .await
                        .map_err(|e| crate::ports::LockError::Cache(CacheError::Backend(anyhow::anyhow!(e.to_string()))))?;
                    if count >= limit {
                        return Err(crate::ports::LockError::Cache(CacheError::Backend(anyhow::anyhow!("tournament is full"))));
                    }
                }

                let participant = TournamentParticipant::new(tournament_id, program_id);
                repository
                    .add_participant(&participant)
                    .await
                    .map_err(|e| crate::ports::LockError::Cache(CacheError::Backend(anyhow::anyhow!(e.to_string()))))
            }
        })
        .await
        .map_err(|e| match e {
            crate::ports::LockError::Busy(key) => CoreError::Conflict(format!("join already in progress: {key}")),
            crate::ports::LockError::Cache(CacheError::Backend(inner)) => {
                let msg = inner.to_string();
                if msg == "tournament is full" {
                    CoreError::TournamentFull
                } else if msg == "tournament already started" {
                    CoreError::TournamentStarted
                } else if msg == "tournament not found" {
                    CoreError::NotFound(format!("tournament {tournament_id}"))
                } else {
                    CoreError::Internal(msg)
                }
            }
            crate::ports::LockError::Cache(other) => CoreError::Internal(other.to_string()),
        })?;

        if let Err(e) = self.tournament_cache.invalidate_tournament(tournament_id).await {
            log_cache_err("invalidate_tournament", e);
        }
        if let Err(e) = self
            .leaderboard_cache
            .upsert_rating(tournament_id, program_id, participant.rating)
            .await
        {
            log_cache_err("upsert_rating", e);
        }

        Ok(participant)
    }

    /// `pending -> active`, then generate and enqueue the full round-robin
    /// schedule for every registered game (spec §4.1 Start).
    #[tracing::instrument(skip(self))]
    pub async fn start_tournament(&self, id: Uuid, now: DateTime<Utc>) -> CoreResult<Tournament> {
        let lock_key = format!("tournament:start:{id}");
        with_lock(self.lock.as_ref(), &lock_key, LOCK_TTL, || async {
            self.start_tournament_locked(id, now).await.map_err(|e| match e {
                CoreError::Internal(msg) => crate::ports::LockError::Cache(CacheError::Backend(
                    anyhow::anyhow!(msg),
                )),
                other => crate::ports::LockError::Cache(CacheError::Backend(anyhow::anyhow!(
                    other.to_string()
                ))),
            })
        })
        .await
        .map_err(|e| match e {
            crate::ports::LockError::Busy(key) => CoreError::Conflict(format!("tournament start already in progress: {key}")),
            crate::ports::LockError::Cache(_) => CoreError::Internal("lock backend unavailable".to_string()),
        })
    }

    async fn start_tournament_locked(&self, id: Uuid, now: DateTime<Utc>) -> CoreResult<Tournament> {
        let mut tournament = self
            .repository
            .get_tournament(id)
            .await
            .map_err(map_db_err)?
            .ok_or_else(|| CoreError::NotFound(format!("tournament {id}")))?;

        if tournament.status() != TournamentStatus::Pending {
            return Err(CoreError::TournamentStarted);
        }
        tournament.activate(now)?;
        let updated = self
            .repository
            .update_tournament(&tournament)
            .await
            .map_err(map_db_err)?;

        let grouped = self
            .repository
            .get_latest_participants_grouped_by_game(id)
            .await
            .map_err(map_db_err)?;

        for (index, (game, participants)) in grouped.into_iter().enumerate() {
            let priority = MatchPriority::by_index(index);
            let program_ids: Vec<Uuid> = participants.iter().map(|p| p.program.id).collect();
            let pairs = round_robin_pairs(&program_ids);

            let matches: Vec<Match> = pairs
                .into_iter()
                .map(|(p1, p2)| Match::new(id, game.id, p1, p2, priority, 1, now))
                .collect::<Result<_, _>>()?;

            if matches.is_empty() {
                continue;
            }

            let created = self
                .repository
                .create_matches_batch(&matches)
                .await
                .map_err(map_db_err)?;

            for m in &created {
                self.queue.enqueue(m.id, m.priority).await.map_err(map_queue_err)?;
            }

            self.repository
                .upsert_tournament_game(&TournamentGame {
                    tournament_id: id,
                    game_id: game.id,
                    is_active: true,
                    current_round: 1,
                    round_completed: false,
                })
                .await
                .map_err(map_db_err)?;

            self.broadcaster
                .broadcast(
                    id,
                    MessageType::MatchesCreated,
                    serde_json::json!({ "game_id": game.id, "count": created.len() }),
                )
                .await;
        }

        if let Err(e) = self.tournament_cache.invalidate_tournament(id).await {
            log_cache_err("invalidate_tournament", e);
        }
        self.broadcast_tournament_update(&updated).await;
        Ok(updated)
    }

    /// `active -> completed` (spec §4.1 Complete).
    #[tracing::instrument(skip(self))]
    pub async fn complete_tournament(&self, id: Uuid, now: DateTime<Utc>) -> CoreResult<Tournament> {
        let mut tournament = self
            .repository
            .get_tournament(id)
            .await
            .map_err(map_db_err)?
            .ok_or_else(|| CoreError::NotFound(format!("tournament {id}")))?;

        tournament.complete(now)?;
        let updated = self
            .repository
            .update_tournament(&tournament)
            .await
            .map_err(map_db_err)?;

        if let Err(e) = self.tournament_cache.invalidate_tournament(id).await {
            log_cache_err("invalidate_tournament", e);
        }
        self.broadcast_tournament_update(&updated).await;
        Ok(updated)
    }

    #[tracing::instrument(skip(self))]
    pub async fn cancel_tournament(&self, id: Uuid) -> CoreResult<Tournament> {
        let mut tournament = self
            .repository
            .get_tournament(id)
            .await
            .map_err(map_db_err)?
            .ok_or_else(|| CoreError::NotFound(format!("tournament {id}")))?;

        tournament.cancel()?;
        let updated = self
            .repository
            .update_tournament(&tournament)
            .await
            .map_err(map_db_err)?;

        if let Err(e) = self.tournament_cache.invalidate_tournament(id).await {
            log_cache_err("invalidate_tournament", e);
        }
        self.broadcast_tournament_update(&updated).await;
        Ok(updated)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_tournament(&self, id: Uuid) -> CoreResult<()> {
        self.repository.delete_tournament(id).await.map_err(map_db_err)?;
        if let Err(e) = self.tournament_cache.invalidate_tournament(id).await {
            log_cache_err("invalidate_tournament", e);
        }
        if let Err(e) = self.leaderboard_cache.invalidate(id).await {
            log_cache_err("invalidate_leaderboard", e);
        }
        self.queue.clear().await.map_err(map_queue_err)?;
        Ok(())
    }

    /// `failed -> pending` for every match of the tournament, then
    /// re-enqueue every currently pending match (spec §4.3 `RetryFailedMatches`;
    /// enqueue is idempotent so matches already queued are unaffected).
    #[tracing::instrument(skip(self))]
    pub async fn retry_failed_matches(&self, tournament_id: Uuid) -> CoreResult<u32> {
        let reset = self
            .repository
            .reset_failed_matches(tournament_id)
            .await
            .map_err(map_db_err)?;

        let pending = self
            .repository
            .get_pending_by_tournament(tournament_id)
            .await
            .map_err(map_db_err)?;

        for m in &pending {
            self.queue.enqueue(m.id, m.priority).await.map_err(map_queue_err)?;
        }
        Ok(reset)
    }

    /// Admin trigger (spec §4.1 `RunAllMatches`): re-enqueue any pending
    /// matches if there are some, otherwise generate a fresh round-robin
    /// round across every active game at `Medium` priority.
    #[tracing::instrument(skip(self))]
    pub async fn run_all_matches(&self, tournament_id: Uuid, now: DateTime<Utc>) -> CoreResult<u32> {
        let pending = self
            .repository
            .get_pending_by_tournament(tournament_id)
            .await
            .map_err(map_db_err)?;
        if !pending.is_empty() {
            for m in &pending {
                self.queue.enqueue(m.id, m.priority).await.map_err(map_queue_err)?;
            }
            return Ok(pending.len() as u32);
        }

        self.require_active(tournament_id).await?;

        let grouped = self
            .repository
            .get_latest_participants_grouped_by_game(tournament_id)
            .await
            .map_err(map_db_err)?;

        let mut total = 0u32;
        for (game, participants) in grouped {
            total += self
                .generate_and_enqueue_round(tournament_id, &game, &participants, MatchPriority::Medium, now)
                .await?;
        }
        Ok(total)
    }

    /// Admin trigger (spec §4.1 `RunGameMatches`): same as `run_all_matches`
    /// but scoped to one game; freshly generated rounds carry `High`
    /// priority (explicit admin intent).
    #[tracing::instrument(skip(self))]
    pub async fn run_game_matches(
        &self,
        tournament_id: Uuid,
        game_id: Uuid,
        now: DateTime<Utc>,
    ) -> CoreResult<u32> {
        let pending = self
            .repository
            .get_pending_by_tournament_and_game(tournament_id, game_id)
            .await
            .map_err(map_db_err)?;
        if !pending.is_empty() {
            for m in &pending {
                self.queue.enqueue(m.id, m.priority).await.map_err(map_queue_err)?;
            }
            return Ok(pending.len() as u32);
        }

        self.require_active(tournament_id).await?;

        let game = self
            .repository
            .get_game(game_id)
            .await
            .map_err(map_db_err)?
            .ok_or_else(|| CoreError::NotFound(format!("game {game_id}")))?;

        let participants: Vec<crate::domain::LatestParticipant> = self
            .repository
            .get_latest_participants(tournament_id)
            .await
            .map_err(map_db_err)?
            .into_iter()
            .filter(|p| p.game_id == game_id)
            .collect();

        self.generate_and_enqueue_round(tournament_id, &game, &participants, MatchPriority::High, now)
            .await
    }

    async fn require_active(&self, tournament_id: Uuid) -> CoreResult<()> {
        let tournament = self
            .repository
            .get_tournament(tournament_id)
            .await
            .map_err(map_db_err)?
            .ok_or_else(|| CoreError::NotFound(format!("tournament {tournament_id}")))?;
        if tournament.status() != TournamentStatus::Active {
            return Err(CoreError::Conflict("tournament is not active".to_string()));
        }
        Ok(())
    }

    async fn generate_and_enqueue_round(
        &self,
        tournament_id: Uuid,
        game: &crate::domain::Game,
        participants: &[crate::domain::LatestParticipant],
        priority: MatchPriority,
        now: DateTime<Utc>,
    ) -> CoreResult<u32> {
        let program_ids: Vec<Uuid> = participants.iter().map(|p| p.program.id).collect();
        let pairs = round_robin_pairs(&program_ids);
        if pairs.is_empty() {
            return Ok(0);
        }

        let round_number = self
            .repository
            .get_next_round_number_by_game(tournament_id, game.id)
            .await
            .map_err(map_db_err)?;

        let matches: Vec<Match> = pairs
            .into_iter()
            .map(|(p1, p2)| Match::new(tournament_id, game.id, p1, p2, priority, round_number, now))
            .collect::<Result<_, _>>()?;

        let created = self
            .repository
            .create_matches_batch(&matches)
            .await
            .map_err(map_db_err)?;

        for m in &created {
            self.queue.enqueue(m.id, m.priority).await.map_err(map_queue_err)?;
        }

        self.repository
            .upsert_tournament_game(&TournamentGame {
                tournament_id,
                game_id: game.id,
                is_active: true,
                current_round: round_number,
                round_completed: false,
            })
            .await
            .map_err(map_db_err)?;

        self.broadcaster
            .broadcast(
                tournament_id,
                MessageType::MatchesCreated,
                serde_json::json!({ "game_id": game.id, "count": created.len() }),
            )
            .await;

        Ok(created.len() as u32)
    }

    /// Schedule a new program (fresh upload or late join) against every
    /// participant already competing in `game_id` (spec §4.1
    /// `ScheduleNewProgramMatches`).
    #[tracing::instrument(skip(self))]
    pub async fn schedule_new_program_matches(
        &self,
        tournament_id: Uuid,
        game_id: Uuid,
        program_id: Uuid,
        now: DateTime<Utc>,
    ) -> CoreResult<u32> {
        let lock_key = format!("tournament:schedule:{tournament_id}:{game_id}");
        let repository = Arc::clone(&self.repository);
        let queue = Arc::clone(&self.queue);
        let broadcaster = Arc::clone(&self.broadcaster);

        with_lock(self.lock.as_ref(), &lock_key, LOCK_TTL, move || {
            let repository = Arc::clone(&repository);
            let queue = Arc::clone(&queue);
            let broadcaster = Arc::clone(&broadcaster);
            async move {
                let uploader = repository
                    .get_program(program_id)
                    .await
                    .map_err(|e| crate::ports::LockError::Cache(CacheError::Backend(anyhow::anyhow!(e.to_string()))))?
                    .ok_or_else(|| crate::ports::LockError::Cache(CacheError::Backend(anyhow::anyhow!("program not found"))))?;

                let existing = repository
                    .get_programs_for_tournament_and_game(tournament_id, game_id)
                    .await
                    .map_err(|e| crate::ports::LockError::Cache(CacheError::Backend(anyhow::anyhow!(e.to_string()))))?
                    .into_iter()
                    .filter(|p| p.team_id != uploader.team_id)
                    .map(|p| p.id)
                    .collect::<Vec<_>>();

                let pairs = newcomer_pairs(program_id, &existing);
                if pairs.is_empty() {
                    return Ok(0u32);
                }

                let round_number = repository
                    .get_next_round_number_by_game(tournament_id, game_id)
                    .await
                    .map_err(|e| crate::ports::LockError::Cache(CacheError::Backend(anyhow::anyhow!(e.to_string()))))?;

                let matches: Vec<Match> = pairs
                    .into_iter()
                    .map(|(p1, p2)| Match::new(tournament_id, game_id, p1, p2, MatchPriority::High, round_number, now))
                    .collect::<Result<_, _>>()
                    .map_err(|e: CoreError| crate::ports::LockError::Cache(CacheError::Backend(anyhow::anyhow!(e.to_string()))))?;

                let created = repository
                    .create_matches_batch(&matches)
                    .await
                    .map_err(|e| crate::ports::LockError::Cache(CacheError::Backend(anyhow::anyhow!(e.to_string()))))?;

                for m in &created {
                    queue
                        .enqueue(m.id, m.priority)
                        .await
                        .map_err(|e| crate::ports::LockError::Cache(CacheError::Backend(anyhow::anyhow!(e.to_string()))))?;
                }

                broadcaster
                    .broadcast(
                        tournament_id,
                        MessageType::MatchesCreated,
                        serde_json::json!({ "game_id": game_id, "count": created.len() }),
                    )
                    .await;

                Ok(created.len() as u32)
            }
        })
        .await
        .map_err(|e| match e {
            crate::ports::LockError::Busy(key) => CoreError::Conflict(format!("scheduling already in progress: {key}")),
            crate::ports::LockError::Cache(_) => CoreError::Internal("scheduling failed".to_string()),
        })
    }

    /// Record a completed match's outcome, update both participants' ELO
    /// ratings, and fan out the result (spec §4.3 step 6, §4.4).
    #[tracing::instrument(skip(self, result))]
    pub async fn apply_match_result(
        &self,
        match_id: Uuid,
        result: MatchResult,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        let mut m = self
            .repository
            .get_match(match_id)
            .await
            .map_err(map_db_err)?
            .ok_or_else(|| CoreError::NotFound(format!("match {match_id}")))?;

        m.complete(&result, now)?;
        let m = self.repository.finish_match(&m).await.map_err(map_db_err)?;

        let p1 = self
            .repository
            .get_participant(m.tournament_id, m.program1_id)
            .await
            .map_err(map_db_err)?
            .ok_or_else(|| CoreError::NotFound(format!("participant {}", m.program1_id)))?;
        let p2 = self
            .repository
            .get_participant(m.tournament_id, m.program2_id)
            .await
            .map_err(map_db_err)?
            .ok_or_else(|| CoreError::NotFound(format!("participant {}", m.program2_id)))?;

        let winner = m.winner.expect("match just transitioned to completed");
        let update = rate_match(
            match_id,
            p1.program_id,
            p1.rating,
            p2.program_id,
            p2.rating,
            winner,
            now,
        );

        use crate::domain::Winner;
        let (won1, draw1) = match winner {
            Winner::Program1 => (true, false),
            Winner::Program2 => (false, false),
            Winner::Draw => (false, true),
        };

        let wrote1 = self
            .repository
            .record_rating_change(&update.history1, won1, draw1)
            .await
            .map_err(map_db_err)?;
        let wrote2 = self
            .repository
            .record_rating_change(&update.history2, !won1 && !draw1, draw1)
            .await
            .map_err(map_db_err)?;

        if wrote1 {
            if let Err(e) = self
                .leaderboard_cache
                .upsert_rating(m.tournament_id, p1.program_id, update.program1_rating)
                .await
            {
                log_cache_err("upsert_rating", e);
            }
        }
        if wrote2 {
            if let Err(e) = self
                .leaderboard_cache
                .upsert_rating(m.tournament_id, p2.program_id, update.program2_rating)
                .await
            {
                log_cache_err("upsert_rating", e);
            }
        }

        self.broadcaster
            .broadcast(
                m.tournament_id,
                MessageType::MatchCompleted,
                serde_json::json!({
                    "match_id": m.id,
                    "score1": m.score1,
                    "score2": m.score2,
                    "winner": winner.to_code(),
                }),
            )
            .await;

        if wrote1 || wrote2 {
            self.broadcaster
                .broadcast(m.tournament_id, MessageType::LeaderboardUpdate, serde_json::json!({}))
                .await;
        }

        Ok(())
    }

    /// `running -> failed` (spec §4.3 step 7); no rating change.
    #[tracing::instrument(skip(self))]
    pub async fn apply_match_failure(
        &self,
        match_id: Uuid,
        error_code: Option<i32>,
        error_message: String,
        now: DateTime<Utc>,
    ) -> CoreResult<()> {
        let mut m = self
            .repository
            .get_match(match_id)
            .await
            .map_err(map_db_err)?
            .ok_or_else(|| CoreError::NotFound(format!("match {match_id}")))?;

        m.fail(error_code, error_message, now)?;
        let m = self.repository.finish_match(&m).await.map_err(map_db_err)?;

        self.broadcaster
            .broadcast(
                m.tournament_id,
                MessageType::MatchCompleted,
                serde_json::json!({ "match_id": m.id, "failed": true, "error_code": m.error_code }),
            )
            .await;
        Ok(())
    }

    /// Cache-first leaderboard read with repository backfill (spec §4.1
    /// `GetLeaderboard`).
    #[tracing::instrument(skip(self))]
    pub async fn get_leaderboard(&self, tournament_id: Uuid, limit: u32) -> CoreResult<Vec<LeaderboardEntry>> {
        match self.leaderboard_cache.top_n(tournament_id, limit).await {
            Ok(rows) if !rows.is_empty() => return Ok(rows),
            Ok(_) => {}
            Err(e) => log_cache_err("leaderboard_top_n", e),
        }

        let rows = self
            .repository
            .get_leaderboard(tournament_id, limit)
            .await
            .map_err(map_db_err)?;

        if let Err(e) = self.leaderboard_cache.replace_all(tournament_id, &rows).await {
            log_cache_err("leaderboard_replace_all", e);
        }
        Ok(rows)
    }

    /// Always computed fresh from the repository (spec §4.1
    /// `GetCrossGameLeaderboard`): per-team aggregation across games isn't
    /// incrementally maintainable in a simple sorted-set cache.
    #[tracing::instrument(skip(self))]
    pub async fn get_cross_game_leaderboard(&self, tournament_id: Uuid) -> CoreResult<Vec<CrossGameLeaderboardEntry>> {
        self.repository
            .get_cross_game_leaderboard(tournament_id)
            .await
            .map_err(map_db_err)
    }

    async fn broadcast_tournament_update(&self, tournament: &Tournament) {
        if let Some(id) = tournament.id() {
            self.broadcaster
                .broadcast(
                    id,
                    MessageType::TournamentUpdate,
                    serde_json::json!({ "status": tournament.status() }),
                )
                .await;
        }
    }
}

#[allow(dead_code)]
fn _assert_alphabet_len() {
    debug_assert_eq!(TOURNAMENT_CODE_ALPHABET.len(), 32);
}
