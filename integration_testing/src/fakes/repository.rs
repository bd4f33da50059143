//! In-memory `RepositoryPort` fake. Single `Mutex`-guarded state; every
//! method takes the lock, mutates a `HashMap`, and returns — there is no
//! concurrency *inside* the fake, only between the callers racing to take
//! the lock, which is exactly the property the concurrency tests exercise.

use app_core::domain::*;
use app_core::ports::{
    DbError, DbResult, GameRepository, MatchRepository, ProgramRepository, RatingRepository,
    TeamRepository, TournamentFilter, TournamentRepository,
};
use app_core::utils::id_version::IdVersion;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct State {
    tournaments: HashMap<Uuid, Tournament>,
    participants: HashMap<(Uuid, Uuid), TournamentParticipant>,
    matches: HashMap<Uuid, Match>,
    rating_history: Vec<RatingHistory>,
    games: HashMap<Uuid, Game>,
    teams: HashMap<Uuid, Team>,
    team_members: HashMap<Uuid, Vec<TeamMember>>,
    programs: HashMap<Uuid, Program>,
    tournament_games: HashMap<(Uuid, Uuid), TournamentGame>,
}

#[derive(Default)]
pub struct FakeRepository {
    state: Mutex<State>,
}

impl FakeRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_game(&self, game: Game) {
        self.state.lock().unwrap().games.insert(game.id, game);
    }

    pub fn seed_team(&self, team: Team) {
        self.state.lock().unwrap().teams.insert(team.id, team);
    }

    pub fn seed_program(&self, program: Program) {
        self.state.lock().unwrap().programs.insert(program.id, program);
    }

    /// Directly insert a participant without going through `join_tournament`
    /// (tests that only need fixtures, not lock/capacity behavior).
    pub fn seed_participant(&self, p: TournamentParticipant) {
        self.state.lock().unwrap().participants.insert((p.tournament_id, p.program_id), p);
    }

    /// Force a match straight to `completed`, bypassing `running` (tests
    /// that only need "this match is already settled", not the worker's
    /// transition sequence).
    pub fn finish_match_for_test(&self, match_id: Uuid) {
        let mut state = self.state.lock().unwrap();
        let m = state.matches.get_mut(&match_id).expect("match must be seeded first");
        m.status = MatchStatus::Completed;
        m.winner = Some(Winner::Draw);
        m.score1 = Some(0);
        m.score2 = Some(0);
        m.completed_at = Some(chrono::Utc::now());
    }

    /// Force a match straight to `failed` (see `finish_match_for_test`).
    pub fn fail_match_for_test(&self, match_id: Uuid) {
        let mut state = self.state.lock().unwrap();
        let m = state.matches.get_mut(&match_id).expect("match must be seeded first");
        m.status = MatchStatus::Failed;
        m.error_code = Some(1);
        m.error_message = Some("forced failure for test".to_string());
        m.completed_at = Some(chrono::Utc::now());
    }

    /// Push `started_at` back by `age` so `reset_stale_running` treats the
    /// match as abandoned without actually sleeping in the test.
    pub fn backdate_started_at_for_test(&self, match_id: Uuid, age: chrono::Duration) {
        let mut state = self.state.lock().unwrap();
        let m = state.matches.get_mut(&match_id).expect("match must be seeded first");
        m.started_at = Some(chrono::Utc::now() - age);
    }
}

#[async_trait]
impl TournamentRepository for FakeRepository {
    async fn create_tournament(&self, tournament: &Tournament) -> DbResult<Tournament> {
        let mut state = self.state.lock().unwrap();
        let id = Uuid::new_v4();
        let mut t = tournament.clone();
        t.set_id_version(IdVersion::existing(id, 0));
        state.tournaments.insert(id, t.clone());
        Ok(t)
    }

    async fn get_tournament(&self, id: Uuid) -> DbResult<Option<Tournament>> {
        Ok(self.state.lock().unwrap().tournaments.get(&id).cloned())
    }

    async fn update_tournament(&self, tournament: &Tournament) -> DbResult<Tournament> {
        let mut state = self.state.lock().unwrap();
        let id = tournament.id().ok_or(DbError::NotFound)?;
        let current = state.tournaments.get(&id).ok_or(DbError::NotFound)?;
        if current.id_version() != tournament.id_version() {
            return Err(DbError::OptimisticLockConflict);
        }
        let mut updated = tournament.clone();
        let next_version = tournament.id_version().next_version();
        updated.set_id_version(IdVersion::existing(id, next_version));
        state.tournaments.insert(id, updated.clone());
        Ok(updated)
    }

    async fn update_tournament_status(&self, id: Uuid, status: TournamentStatus) -> DbResult<Tournament> {
        let mut state = self.state.lock().unwrap();
        let current = state.tournaments.get(&id).ok_or(DbError::NotFound)?.clone();
        let next_version = current.id_version().next_version();
        let (start_time, end_time) = match status {
            TournamentStatus::Active => (current.start_time().or(Some(chrono::Utc::now())), current.end_time()),
            TournamentStatus::Completed => (current.start_time(), current.end_time().or(Some(chrono::Utc::now()))),
            _ => (current.start_time(), current.end_time()),
        };
        let updated = Tournament::from_parts(
            IdVersion::existing(id, next_version),
            current.code().to_string(),
            status,
            current.max_participants(),
            current.max_team_size(),
            start_time,
            end_time,
            current.creator(),
            current.metadata().clone(),
        );
        state.tournaments.insert(id, updated.clone());
        Ok(updated)
    }

    async fn delete_tournament(&self, id: Uuid) -> DbResult<()> {
        let mut state = self.state.lock().unwrap();
        state.tournaments.remove(&id);
        state.participants.retain(|(tid, _), _| *tid != id);
        state.matches.retain(|_, m| m.tournament_id != id);
        Ok(())
    }

    async fn list_tournaments(&self, filter: &TournamentFilter) -> DbResult<Vec<Tournament>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .tournaments
            .values()
            .filter(|t| filter.status.is_none_or(|s| t.status() == s))
            .filter(|t| filter.creator.is_none() || t.creator() == filter.creator)
            .cloned()
            .collect())
    }

    async fn code_exists(&self, code: &str) -> DbResult<bool> {
        Ok(self.state.lock().unwrap().tournaments.values().any(|t| t.code() == code))
    }

    async fn get_participants_count(&self, tournament_id: Uuid) -> DbResult<u32> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .participants
            .keys()
            .filter(|(tid, _)| *tid == tournament_id)
            .count() as u32)
    }

    async fn get_participants(&self, tournament_id: Uuid) -> DbResult<Vec<TournamentParticipant>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .participants
            .iter()
            .filter(|((tid, _), _)| *tid == tournament_id)
            .map(|(_, p)| *p)
            .collect())
    }

    async fn get_participant(&self, tournament_id: Uuid, program_id: Uuid) -> DbResult<Option<TournamentParticipant>> {
        Ok(self.state.lock().unwrap().participants.get(&(tournament_id, program_id)).copied())
    }

    async fn add_participant(&self, participant: &TournamentParticipant) -> DbResult<TournamentParticipant> {
        let mut state = self.state.lock().unwrap();
        let key = (participant.tournament_id, participant.program_id);
        if state.participants.contains_key(&key) {
            return Err(DbError::UniqueViolation(Some("tournament_participant_pkey".to_string())));
        }
        state.participants.insert(key, *participant);
        Ok(*participant)
    }

    async fn get_latest_participants(&self, tournament_id: Uuid) -> DbResult<Vec<LatestParticipant>> {
        let state = self.state.lock().unwrap();
        Ok(latest_participants(&state, tournament_id))
    }

    async fn get_latest_participants_grouped_by_game(
        &self,
        tournament_id: Uuid,
    ) -> DbResult<Vec<(Game, Vec<LatestParticipant>)>> {
        let state = self.state.lock().unwrap();
        let latest = latest_participants(&state, tournament_id);
        let mut by_game: HashMap<Uuid, Vec<LatestParticipant>> = HashMap::new();
        for p in latest {
            by_game.entry(p.game_id).or_default().push(p);
        }
        let mut games: Vec<Game> = by_game.keys().filter_map(|id| state.games.get(id).cloned()).collect();
        games.sort_by(|a, b| a.short_name.cmp(&b.short_name));
        Ok(games
            .into_iter()
            .map(|g| {
                let participants = by_game.remove(&g.id).unwrap_or_default();
                (g, participants)
            })
            .collect())
    }

    async fn get_leaderboard(&self, tournament_id: Uuid, limit: u32) -> DbResult<Vec<LeaderboardEntry>> {
        let state = self.state.lock().unwrap();
        let rows: Vec<(Uuid, i32, u32, u32, u32)> = state
            .participants
            .iter()
            .filter(|((tid, _), _)| *tid == tournament_id)
            .map(|(_, p)| (p.program_id, p.rating, p.wins, p.losses, p.draws))
            .collect();
        let mut ranked = rank_by_rating(rows, tournament_id);
        ranked.truncate(limit as usize);
        Ok(ranked)
    }

    async fn get_cross_game_leaderboard(&self, tournament_id: Uuid) -> DbResult<Vec<CrossGameLeaderboardEntry>> {
        let state = self.state.lock().unwrap();
        let mut by_team: HashMap<Uuid, Vec<GameSubEntry>> = HashMap::new();
        for ((tid, program_id), p) in state.participants.iter() {
            if *tid != tournament_id {
                continue;
            }
            let Some(program) = state.programs.get(program_id) else { continue };
            by_team.entry(program.team_id).or_default().push(GameSubEntry {
                game_id: program.game_id,
                rating: p.rating,
                wins: p.wins,
                losses: p.losses,
                draws: p.draws,
            });
        }
        let mut rows: Vec<CrossGameLeaderboardEntry> = by_team
            .into_iter()
            .map(|(team_id, per_game)| CrossGameLeaderboardEntry {
                rank: 0,
                tournament_id,
                team_id,
                total_rating: per_game.iter().map(|g| g.rating as i64).sum(),
                per_game,
            })
            .collect();
        rows.sort_by(|a, b| b.total_rating.cmp(&a.total_rating).then_with(|| a.team_id.cmp(&b.team_id)));
        for (idx, row) in rows.iter_mut().enumerate() {
            row.rank = idx as u32 + 1;
        }
        Ok(rows)
    }

    async fn get_tournament_games(&self, tournament_id: Uuid) -> DbResult<Vec<TournamentGame>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .tournament_games
            .iter()
            .filter(|((tid, _), _)| *tid == tournament_id)
            .map(|(_, tg)| *tg)
            .collect())
    }

    async fn upsert_tournament_game(&self, tg: &TournamentGame) -> DbResult<TournamentGame> {
        let mut state = self.state.lock().unwrap();
        state.tournament_games.insert((tg.tournament_id, tg.game_id), *tg);
        Ok(*tg)
    }
}

fn latest_participants(state: &State, tournament_id: Uuid) -> Vec<LatestParticipant> {
    let mut best: HashMap<(Uuid, Uuid), Program> = HashMap::new();
    for (tid, program_id) in state.participants.keys() {
        if *tid != tournament_id {
            continue;
        }
        let Some(program) = state.programs.get(program_id) else { continue };
        let key = (program.team_id, program.game_id);
        match best.get(&key) {
            Some(existing) if existing.version >= program.version => {}
            _ => {
                best.insert(key, program.clone());
            }
        }
    }
    best.into_values()
        .map(|program| LatestParticipant { team_id: program.team_id, game_id: program.game_id, program })
        .collect()
}

#[async_trait]
impl MatchRepository for FakeRepository {
    async fn create_match(&self, m: &Match) -> DbResult<Match> {
        let mut state = self.state.lock().unwrap();
        let mut created = m.clone();
        created.id = Uuid::new_v4();
        state.matches.insert(created.id, created.clone());
        Ok(created)
    }

    async fn create_matches_batch(&self, matches: &[Match]) -> DbResult<Vec<Match>> {
        let mut state = self.state.lock().unwrap();
        let mut out = Vec::with_capacity(matches.len());
        for m in matches {
            let mut created = m.clone();
            created.id = Uuid::new_v4();
            state.matches.insert(created.id, created.clone());
            out.push(created);
        }
        Ok(out)
    }

    async fn get_match(&self, id: Uuid) -> DbResult<Option<Match>> {
        Ok(self.state.lock().unwrap().matches.get(&id).cloned())
    }

    async fn get_matches_by_tournament(&self, tournament_id: Uuid) -> DbResult<Vec<Match>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .matches
            .values()
            .filter(|m| m.tournament_id == tournament_id)
            .cloned()
            .collect())
    }

    async fn get_pending_by_tournament(&self, tournament_id: Uuid) -> DbResult<Vec<Match>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .matches
            .values()
            .filter(|m| m.tournament_id == tournament_id && m.status == MatchStatus::Pending)
            .cloned()
            .collect())
    }

    async fn get_pending_by_tournament_and_game(&self, tournament_id: Uuid, game_id: Uuid) -> DbResult<Vec<Match>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .matches
            .values()
            .filter(|m| m.tournament_id == tournament_id && m.game_id == game_id && m.status == MatchStatus::Pending)
            .cloned()
            .collect())
    }

    async fn reset_failed_matches(&self, tournament_id: Uuid) -> DbResult<u32> {
        let mut state = self.state.lock().unwrap();
        let mut count = 0u32;
        for m in state.matches.values_mut() {
            if m.tournament_id == tournament_id && m.status == MatchStatus::Failed {
                m.reset_to_pending().expect("status checked above");
                count += 1;
            }
        }
        Ok(count)
    }

    async fn get_next_round_number(&self, tournament_id: Uuid) -> DbResult<u32> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .matches
            .values()
            .filter(|m| m.tournament_id == tournament_id)
            .map(|m| m.round_number)
            .max()
            .map(|n| n + 1)
            .unwrap_or(1))
    }

    async fn get_next_round_number_by_game(&self, tournament_id: Uuid, game_id: Uuid) -> DbResult<u32> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .matches
            .values()
            .filter(|m| m.tournament_id == tournament_id && m.game_id == game_id)
            .map(|m| m.round_number)
            .max()
            .map(|n| n + 1)
            .unwrap_or(1))
    }

    async fn get_matches_by_rounds(&self, tournament_id: Uuid, game_id: Uuid, rounds: &[u32]) -> DbResult<Vec<Match>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .matches
            .values()
            .filter(|m| m.tournament_id == tournament_id && m.game_id == game_id && rounds.contains(&m.round_number))
            .cloned()
            .collect())
    }

    async fn transition_to_running(&self, id: Uuid) -> DbResult<Match> {
        let mut state = self.state.lock().unwrap();
        let m = state.matches.get_mut(&id).ok_or(DbError::NotFound)?;
        m.start_running(chrono::Utc::now()).map_err(|_| DbError::OptimisticLockConflict)?;
        Ok(m.clone())
    }

    async fn finish_match(&self, m: &Match) -> DbResult<Match> {
        let mut state = self.state.lock().unwrap();
        state.matches.insert(m.id, m.clone());
        Ok(m.clone())
    }

    async fn reset_stale_running(&self, older_than_secs: i64) -> DbResult<Vec<Match>> {
        let mut state = self.state.lock().unwrap();
        let cutoff = chrono::Utc::now() - chrono::Duration::seconds(older_than_secs);
        let mut reset = Vec::new();
        for m in state.matches.values_mut() {
            if m.status == MatchStatus::Running && m.started_at.is_some_and(|s| s < cutoff) {
                m.status = MatchStatus::Pending;
                m.started_at = None;
                reset.push(m.clone());
            }
        }
        Ok(reset)
    }

    async fn get_match_status(&self, id: Uuid) -> DbResult<Option<MatchStatus>> {
        Ok(self.state.lock().unwrap().matches.get(&id).map(|m| m.status))
    }
}

#[async_trait]
impl RatingRepository for FakeRepository {
    async fn record_rating_change(&self, history: &RatingHistory, won: bool, draw: bool) -> DbResult<bool> {
        let mut state = self.state.lock().unwrap();
        if state
            .rating_history
            .iter()
            .any(|h| h.program_id == history.program_id && h.match_id == history.match_id)
        {
            return Ok(false);
        }
        state.rating_history.push(*history);
        let key = state
            .participants
            .keys()
            .find(|(_, pid)| *pid == history.program_id)
            .copied();
        if let Some(key) = key {
            let p = state.participants.get_mut(&key).expect("key just found");
            p.rating = history.new_rating;
            if won {
                p.wins += 1;
            } else if draw {
                p.draws += 1;
            } else {
                p.losses += 1;
            }
        }
        Ok(true)
    }

    async fn get_history_by_program(&self, program_id: Uuid) -> DbResult<Vec<RatingHistory>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .rating_history
            .iter()
            .filter(|h| h.program_id == program_id)
            .copied()
            .collect())
    }

    async fn history_exists_for_match(&self, program_id: Uuid, match_id: Uuid) -> DbResult<bool> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .rating_history
            .iter()
            .any(|h| h.program_id == program_id && h.match_id == match_id))
    }
}

#[async_trait]
impl GameRepository for FakeRepository {
    async fn get_game(&self, id: Uuid) -> DbResult<Option<Game>> {
        Ok(self.state.lock().unwrap().games.get(&id).cloned())
    }

    async fn get_game_by_short_name(&self, short_name: &str) -> DbResult<Option<Game>> {
        Ok(self.state.lock().unwrap().games.values().find(|g| g.short_name == short_name).cloned())
    }

    async fn list_games(&self) -> DbResult<Vec<Game>> {
        Ok(self.state.lock().unwrap().games.values().cloned().collect())
    }
}

#[async_trait]
impl TeamRepository for FakeRepository {
    async fn get_team(&self, id: Uuid) -> DbResult<Option<Team>> {
        Ok(self.state.lock().unwrap().teams.get(&id).cloned())
    }

    async fn get_team_members(&self, team_id: Uuid) -> DbResult<Vec<TeamMember>> {
        Ok(self.state.lock().unwrap().team_members.get(&team_id).cloned().unwrap_or_default())
    }

    async fn get_team_for_user(&self, tournament_id: Uuid, user_id: Uuid) -> DbResult<Option<Team>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .teams
            .values()
            .find(|t| t.tournament_id == tournament_id && t.leader_user_id == user_id)
            .cloned())
    }
}

#[async_trait]
impl ProgramRepository for FakeRepository {
    async fn get_program(&self, id: Uuid) -> DbResult<Option<Program>> {
        Ok(self.state.lock().unwrap().programs.get(&id).cloned())
    }

    async fn get_programs_for_tournament_and_game(&self, tournament_id: Uuid, game_id: Uuid) -> DbResult<Vec<Program>> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .programs
            .values()
            .filter(|p| p.tournament_id == Some(tournament_id) && p.game_id == game_id)
            .cloned()
            .collect())
    }
}
