// contains core functionality

mod errors;

pub mod domain;
pub mod ports;
pub mod service;
pub mod utils;

pub use errors::*;

use ports::{Broadcaster, DistributedLock, LeaderboardCache, PriorityQueue, RepositoryPort, TournamentCache};
use service::TournamentService;
use std::sync::Arc;

/// Core holds connections to every outbound port (repository, queue,
/// caches, lock, broadcaster) and hands out the domain services built on
/// top of them. A typestate `CoreBuilder` assembles one port at a time so
/// a missing wire-up is a compile error rather than a runtime panic.
pub struct Core<S> {
    state: S,
    pub repository: Arc<dyn RepositoryPort>,
    pub queue: Arc<dyn PriorityQueue>,
    pub tournament_cache: Arc<dyn TournamentCache>,
    pub leaderboard_cache: Arc<dyn LeaderboardCache>,
    pub lock: Arc<dyn DistributedLock>,
    pub broadcaster: Arc<dyn Broadcaster>,
}

impl<S> Core<S> {
    fn switch_state<N>(&self, new_state: N) -> Core<N> {
        Core {
            state: new_state,
            repository: self.repository.clone(),
            queue: self.queue.clone(),
            tournament_cache: self.tournament_cache.clone(),
            leaderboard_cache: self.leaderboard_cache.clone(),
            lock: self.lock.clone(),
            broadcaster: self.broadcaster.clone(),
        }
    }
}

pub struct InitState {}
pub type CoreState = Arc<Core<InitState>>;

impl Core<InitState> {
    /// Build the `TournamentService` that exposes `Core`'s ports as the
    /// single orchestration surface used by the admin CLI, the HTTP edge,
    /// and the match worker pool.
    pub fn tournament_service(&self) -> TournamentService {
        TournamentService::new(
            self.repository.clone(),
            self.queue.clone(),
            self.tournament_cache.clone(),
            self.leaderboard_cache.clone(),
            self.lock.clone(),
            self.broadcaster.clone(),
        )
    }
}

pub struct NoRepository {}
pub struct NoQueue {}
pub struct NoTournamentCache {}
pub struct NoLeaderboardCache {}
pub struct NoLock {}
pub struct NoBroadcaster {}

pub struct DynRepository(Arc<dyn RepositoryPort>);
pub struct DynQueue(Arc<dyn PriorityQueue>);
pub struct DynTournamentCache(Arc<dyn TournamentCache>);
pub struct DynLeaderboardCache(Arc<dyn LeaderboardCache>);
pub struct DynLock(Arc<dyn DistributedLock>);
pub struct DynBroadcaster(Arc<dyn Broadcaster>);

pub struct CoreBuilder<Repo, Q, TC, LC, L, B> {
    state_repo: Repo,
    state_queue: Q,
    state_tournament_cache: TC,
    state_leaderboard_cache: LC,
    state_lock: L,
    state_broadcaster: B,
}

impl CoreBuilder<NoRepository, NoQueue, NoTournamentCache, NoLeaderboardCache, NoLock, NoBroadcaster> {
    pub fn new() -> Self {
        CoreBuilder {
            state_repo: NoRepository {},
            state_queue: NoQueue {},
            state_tournament_cache: NoTournamentCache {},
            state_leaderboard_cache: NoLeaderboardCache {},
            state_lock: NoLock {},
            state_broadcaster: NoBroadcaster {},
        }
    }
}

impl Default for CoreBuilder<NoRepository, NoQueue, NoTournamentCache, NoLeaderboardCache, NoLock, NoBroadcaster> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Repo, Q, TC, LC, L, B> CoreBuilder<Repo, Q, TC, LC, L, B> {
    pub fn set_repository(self, repository: Arc<dyn RepositoryPort>) -> CoreBuilder<DynRepository, Q, TC, LC, L, B> {
        CoreBuilder {
            state_repo: DynRepository(repository),
            state_queue: self.state_queue,
            state_tournament_cache: self.state_tournament_cache,
            state_leaderboard_cache: self.state_leaderboard_cache,
            state_lock: self.state_lock,
            state_broadcaster: self.state_broadcaster,
        }
    }

    pub fn set_queue(self, queue: Arc<dyn PriorityQueue>) -> CoreBuilder<Repo, DynQueue, TC, LC, L, B> {
        CoreBuilder {
            state_repo: self.state_repo,
            state_queue: DynQueue(queue),
            state_tournament_cache: self.state_tournament_cache,
            state_leaderboard_cache: self.state_leaderboard_cache,
            state_lock: self.state_lock,
            state_broadcaster: self.state_broadcaster,
        }
    }

    pub fn set_tournament_cache(
        self,
        tournament_cache: Arc<dyn TournamentCache>,
    ) -> CoreBuilder<Repo, Q, DynTournamentCache, LC, L, B> {
        CoreBuilder {
            state_repo: self.state_repo,
            state_queue: self.state_queue,
            state_tournament_cache: DynTournamentCache(tournament_cache),
            state_leaderboard_cache: self.state_leaderboard_cache,
            state_lock: self.state_lock,
            state_broadcaster: self.state_broadcaster,
        }
    }

    pub fn set_leaderboard_cache(
        self,
        leaderboard_cache: Arc<dyn LeaderboardCache>,
    ) -> CoreBuilder<Repo, Q, TC, DynLeaderboardCache, L, B> {
        CoreBuilder {
            state_repo: self.state_repo,
            state_queue: self.state_queue,
            state_tournament_cache: self.state_tournament_cache,
            state_leaderboard_cache: DynLeaderboardCache(leaderboard_cache),
            state_lock: self.state_lock,
            state_broadcaster: self.state_broadcaster,
        }
    }

    pub fn set_lock(self, lock: Arc<dyn DistributedLock>) -> CoreBuilder<Repo, Q, TC, LC, DynLock, B> {
        CoreBuilder {
            state_repo: self.state_repo,
            state_queue: self.state_queue,
            state_tournament_cache: self.state_tournament_cache,
            state_leaderboard_cache: self.state_leaderboard_cache,
            state_lock: DynLock(lock),
            state_broadcaster: self.state_broadcaster,
        }
    }

    pub fn set_broadcaster(self, broadcaster: Arc<dyn Broadcaster>) -> CoreBuilder<Repo, Q, TC, LC, L, DynBroadcaster> {
        CoreBuilder {
            state_repo: self.state_repo,
            state_queue: self.state_queue,
            state_tournament_cache: self.state_tournament_cache,
            state_leaderboard_cache: self.state_leaderboard_cache,
            state_lock: self.state_lock,
            state_broadcaster: DynBroadcaster(broadcaster),
        }
    }
}

impl CoreBuilder<DynRepository, DynQueue, DynTournamentCache, DynLeaderboardCache, DynLock, DynBroadcaster> {
    pub fn build(self) -> Core<InitState> {
        Core {
            state: InitState {},
            repository: self.state_repo.0,
            queue: self.state_queue.0,
            tournament_cache: self.state_tournament_cache.0,
            leaderboard_cache: self.state_leaderboard_cache.0,
            broadcaster: self.state_broadcaster.0,
            lock: self.state_lock.0,
        }
    }
}
