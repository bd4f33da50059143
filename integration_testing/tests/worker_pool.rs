//! End-to-end match worker pool test: dequeue -> run executor -> settle,
//! wired through the same `MatchWorkerPool` the server binary runs (spec
//! §4.3, §8 scenario F "retry cycle").

use app_core::domain::{CreateTournamentRequest, MatchStatus};
use app_core::ports::{ExecutorAdapter, ExecutorError, ExecutorInput, ExecutorOutput, ExecutorResult};
use async_trait::async_trait;
use chrono::Utc;
use integration_testing::harness::Harness;
use match_worker::{MatchWorkerPool, WorkerPoolConfig};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Always reports program1 winning 2-0.
struct ScriptedExecutor {
    calls: AtomicUsize,
}

impl ScriptedExecutor {
    fn always_wins() -> Self {
        Self { calls: AtomicUsize::new(0) }
    }
}

#[async_trait]
impl ExecutorAdapter for ScriptedExecutor {
    async fn run(&self, _input: ExecutorInput) -> ExecutorResult<ExecutorOutput> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ExecutorOutput { winner: 1, score1: 2, score2: 0, error_code: 0, stderr_tail: String::new(), duration: Duration::from_millis(10) })
    }
}

struct AlwaysTimesOut;

#[async_trait]
impl ExecutorAdapter for AlwaysTimesOut {
    async fn run(&self, _input: ExecutorInput) -> ExecutorResult<ExecutorOutput> {
        Err(ExecutorError::Timeout(Duration::from_secs(1)))
    }
}

fn create_req() -> CreateTournamentRequest {
    CreateTournamentRequest { max_participants: None, max_team_size: 1, creator: None, metadata: HashMap::new() }
}

async fn wait_until_completed(h: &Harness, match_id: uuid::Uuid) {
    for _ in 0..200 {
        if let Ok(Some(m)) = h.repository.get_match(match_id).await
            && m.status == MatchStatus::Completed
        {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("match never settled to completed");
}

#[tokio::test]
async fn worker_pool_drains_the_queue_and_settles_matches_as_completed() {
    let h = Harness::new();
    let tournament = h.service.create_tournament(create_req()).await.unwrap();
    let tid = tournament.id().unwrap();
    let game = h.seed_game("chess");
    let p1 = h.seed_team_program(tid, game.id);
    let p2 = h.seed_team_program(tid, game.id);
    h.service.join_tournament(tid, p1).await.unwrap();
    h.service.join_tournament(tid, p2).await.unwrap();
    h.service.start_tournament(tid, Utc::now()).await.unwrap();

    let executor = Arc::new(ScriptedExecutor::always_wins());
    let pool = Arc::new(MatchWorkerPool::new(
        h.repository.clone(),
        h.queue.clone(),
        executor,
        Arc::new(app_core::service::TournamentService::new(
            h.repository.clone(),
            h.queue.clone(),
            h.tournament_cache.clone(),
            h.leaderboard_cache.clone(),
            h.lock.clone(),
            h.broadcaster.clone(),
        )),
        WorkerPoolConfig { pool_size: 2, match_timeout: Duration::from_secs(5), stale_running_after_secs: 600 },
    ));

    let cancel = CancellationToken::new();
    let handles = pool.spawn(cancel.clone()).await;

    let m = h.repository.get_matches_by_tournament(tid).await.unwrap().remove(0);
    wait_until_completed(&h, m.id).await;

    cancel.cancel();
    for handle in handles {
        let _ = handle.await;
    }

    let settled = h.repository.get_match(m.id).await.unwrap().unwrap();
    assert_eq!(settled.status, MatchStatus::Completed);
    assert_eq!(settled.score1, Some(2));
}

#[tokio::test]
async fn a_failing_judge_marks_the_match_failed_without_touching_ratings() {
    let h = Harness::new();
    let tournament = h.service.create_tournament(create_req()).await.unwrap();
    let tid = tournament.id().unwrap();
    let game = h.seed_game("chess");
    let p1 = h.seed_team_program(tid, game.id);
    let p2 = h.seed_team_program(tid, game.id);
    h.service.join_tournament(tid, p1).await.unwrap();
    h.service.join_tournament(tid, p2).await.unwrap();
    h.service.start_tournament(tid, Utc::now()).await.unwrap();

    let executor = Arc::new(AlwaysTimesOut);
    let pool = Arc::new(MatchWorkerPool::new(
        h.repository.clone(),
        h.queue.clone(),
        executor,
        Arc::new(app_core::service::TournamentService::new(
            h.repository.clone(),
            h.queue.clone(),
            h.tournament_cache.clone(),
            h.leaderboard_cache.clone(),
            h.lock.clone(),
            h.broadcaster.clone(),
        )),
        WorkerPoolConfig { pool_size: 1, match_timeout: Duration::from_secs(5), stale_running_after_secs: 600 },
    ));

    let cancel = CancellationToken::new();
    let handles = pool.spawn(cancel.clone()).await;

    let m = h.repository.get_matches_by_tournament(tid).await.unwrap().remove(0);
    tokio::time::sleep(Duration::from_millis(100)).await;
    cancel.cancel();
    for handle in handles {
        let _ = handle.await;
    }

    let settled = h.repository.get_match(m.id).await.unwrap().unwrap();
    assert_eq!(settled.status, MatchStatus::Failed);
    let p1_row = h.repository.get_participant(tid, m.program1_id).await.unwrap().unwrap();
    assert_eq!(p1_row.rating, 1500);
}
