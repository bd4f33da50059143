//! Wires the in-memory fakes into a real `TournamentService`, the same way
//! `server::main` wires the Postgres/Redis adapters (spec §4 orchestration
//! surface). Every scenario test starts from `Harness::new`.

use crate::fakes::{FakeLeaderboardCache, FakeLock, FakeQueue, FakeRepository, FakeTournamentCache};
use app_core::domain::{Game, Program, Team};
use app_core::service::TournamentService;
use cr_single_instance::CrSingleInstance;
use std::sync::Arc;
use uuid::Uuid;

pub struct Harness {
    pub repository: Arc<FakeRepository>,
    pub queue: Arc<FakeQueue>,
    pub tournament_cache: Arc<FakeTournamentCache>,
    pub leaderboard_cache: Arc<FakeLeaderboardCache>,
    pub lock: Arc<FakeLock>,
    pub broadcaster: Arc<CrSingleInstance>,
    pub service: TournamentService,
}

impl Harness {
    pub fn new() -> Self {
        let repository = Arc::new(FakeRepository::new());
        let queue = Arc::new(FakeQueue::new());
        let tournament_cache = Arc::new(FakeTournamentCache::new());
        let leaderboard_cache = Arc::new(FakeLeaderboardCache::new());
        let lock = Arc::new(FakeLock::new());
        let broadcaster = Arc::new(CrSingleInstance::new());

        let service = TournamentService::new(
            repository.clone(),
            queue.clone(),
            tournament_cache.clone(),
            leaderboard_cache.clone(),
            lock.clone(),
            broadcaster.clone(),
        );

        Harness { repository, queue, tournament_cache, leaderboard_cache, lock, broadcaster, service }
    }

    /// Register a game and one team+program per participant, so tests can
    /// go straight to `join_tournament`/`start_tournament` without hand
    /// building the team/program graph every time.
    pub fn seed_game(&self, short_name: &str) -> Game {
        let game = Game {
            id: Uuid::new_v4(),
            short_name: short_name.to_string(),
            display_name: short_name.to_string(),
            rules_text: String::new(),
        };
        self.repository.seed_game(game.clone());
        game
    }

    /// One team with a solo leader, one program version 1 for `game_id`.
    /// Returns the program id -- the id tests join/enqueue against.
    pub fn seed_team_program(&self, tournament_id: Uuid, game_id: Uuid) -> Uuid {
        let team = Team { id: Uuid::new_v4(), tournament_id, join_code: Uuid::new_v4().to_string(), leader_user_id: Uuid::new_v4() };
        self.repository.seed_team(team.clone());
        let program = Program {
            id: Uuid::new_v4(),
            team_id: team.id,
            game_id,
            tournament_id: Some(tournament_id),
            version: 1,
            file_path: format!("/bots/{}", team.id),
        };
        self.repository.seed_program(program.clone());
        program.id
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
