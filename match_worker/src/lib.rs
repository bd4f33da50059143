//! Match worker pool (spec §4.3): a fixed number of cooperative loops that
//! dequeue, run, and settle matches. Rating and cache/broadcast fan-out are
//! delegated to `TournamentService::apply_match_result` -- this crate only
//! owns the dequeue -> run-executor -> settle cycle and the startup
//! recovery sweep.

use app_core::domain::{MatchStatus, MatchResult, Winner};
use app_core::ports::{ExecutorAdapter, ExecutorError, ExecutorInput, PriorityQueue, RepositoryPort};
use app_core::service::TournamentService;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub pool_size: usize,
    /// Passed through to the executor adapter as the per-match timeout.
    pub match_timeout: Duration,
    /// A `running` match whose `started_at` is older than this is assumed
    /// orphaned by a crashed worker (spec §4.3 recovery sweep).
    pub stale_running_after_secs: i64,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            pool_size: 4,
            match_timeout: Duration::from_secs(30),
            stale_running_after_secs: 600,
        }
    }
}

pub struct MatchWorkerPool {
    repository: Arc<dyn RepositoryPort>,
    queue: Arc<dyn PriorityQueue>,
    executor: Arc<dyn ExecutorAdapter>,
    service: Arc<TournamentService>,
    config: WorkerPoolConfig,
}

impl MatchWorkerPool {
    pub fn new(
        repository: Arc<dyn RepositoryPort>,
        queue: Arc<dyn PriorityQueue>,
        executor: Arc<dyn ExecutorAdapter>,
        service: Arc<TournamentService>,
        config: WorkerPoolConfig,
    ) -> Self {
        Self { repository, queue, executor, service, config }
    }

    /// Run the startup recovery sweep, then spawn `pool_size` worker loops.
    /// Each loop runs until `cancel` fires; the returned handles let the
    /// caller await a clean shutdown.
    pub async fn spawn(self: Arc<Self>, cancel: CancellationToken) -> Vec<JoinHandle<()>> {
        self.recover_stale().await;

        (0..self.config.pool_size)
            .map(|idx| {
                let this = Arc::clone(&self);
                let cancel = cancel.clone();
                tokio::spawn(async move { this.worker_loop(idx, cancel).await })
            })
            .collect()
    }

    #[instrument(name = "worker.recover_stale", skip(self))]
    async fn recover_stale(&self) {
        let reset = match self.repository.reset_stale_running(self.config.stale_running_after_secs).await {
            Ok(matches) => matches,
            Err(e) => {
                error!(error = %e, "recovery sweep failed, starting without it");
                return;
            }
        };
        if reset.is_empty() {
            return;
        }
        info!(count = reset.len(), "recovered orphaned running matches, re-enqueueing");
        for m in &reset {
            if let Err(e) = self.queue.enqueue(m.id, m.priority).await {
                warn!(match_id = %m.id, error = %e, "failed to re-enqueue recovered match");
            }
        }
    }

    async fn worker_loop(&self, idx: usize, cancel: CancellationToken) {
        info!(worker = idx, "worker started");
        loop {
            match self.queue.dequeue(&cancel).await {
                Ok(Some(match_id)) => self.process(match_id).await,
                Ok(None) => break,
                Err(e) => {
                    error!(worker = idx, error = %e, "dequeue failed");
                    if cancel.is_cancelled() {
                        break;
                    }
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
            }
        }
        info!(worker = idx, "worker stopped");
    }

    #[instrument(name = "worker.process", skip(self))]
    async fn process(&self, match_id: Uuid) {
        let m = match self.repository.get_match(match_id).await {
            Ok(Some(m)) => m,
            Ok(None) => {
                warn!(%match_id, "dequeued match no longer exists, dropping");
                return;
            }
            Err(e) => {
                error!(%match_id, error = %e, "failed to load match, dropping");
                return;
            }
        };
        if m.status != MatchStatus::Pending {
            return;
        }

        let m = match self.repository.transition_to_running(match_id).await {
            Ok(m) => m,
            Err(_) => return, // lost the race to another worker
        };

        let game = match self.repository.get_game(m.game_id).await {
            Ok(Some(g)) => g,
            _ => {
                self.fail(match_id, None, "game not found".to_string()).await;
                return;
            }
        };
        let (program1, program2) = match (
            self.repository.get_program(m.program1_id).await,
            self.repository.get_program(m.program2_id).await,
        ) {
            (Ok(Some(p1)), Ok(Some(p2))) => (p1, p2),
            _ => {
                self.fail(match_id, None, "program not found".to_string()).await;
                return;
            }
        };

        let input = ExecutorInput {
            match_id,
            game_short_name: game.short_name,
            program1_path: program1.file_path,
            program2_path: program2.file_path,
            iterations: None,
            timeout: self.config.match_timeout,
        };

        match self.executor.run(input).await {
            Ok(output) if output.error_code == 0 => {
                let Some(winner) = Winner::from_code(output.winner) else {
                    self.fail(match_id, None, format!("invalid winner code {}", output.winner)).await;
                    return;
                };
                let result = MatchResult { score1: output.score1, score2: output.score2, winner, duration: output.duration };
                if let Err(e) = self.service.apply_match_result(match_id, result, Utc::now()).await {
                    error!(%match_id, error = %e, "failed to apply match result");
                }
            }
            Ok(output) => {
                let message = if output.stderr_tail.is_empty() {
                    format!("judge exited with code {}", output.error_code)
                } else {
                    format!("judge exited with code {}: {}", output.error_code, output.stderr_tail)
                };
                self.fail(match_id, Some(output.error_code), message).await;
            }
            Err(ExecutorError::Timeout(d)) => {
                self.fail(match_id, None, format!("executor timed out after {d:?}")).await;
            }
            Err(ExecutorError::Adapter(msg)) => {
                self.fail(match_id, None, msg).await;
            }
        }
    }

    async fn fail(&self, match_id: Uuid, error_code: Option<i32>, message: String) {
        if let Err(e) = self.service.apply_match_failure(match_id, error_code, message, Utc::now()).await {
            error!(%match_id, error = %e, "failed to record match failure");
        }
    }
}
