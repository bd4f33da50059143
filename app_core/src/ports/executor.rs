//! Executor adapter port (spec §6): invokes the out-of-process judge
//! binary that actually plays a match. Synchronous from the worker's
//! perspective — `run` is awaited to completion (or timeout) before the
//! worker proceeds.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ExecutorInput {
    pub match_id: Uuid,
    pub game_short_name: String,
    pub program1_path: String,
    pub program2_path: String,
    pub iterations: Option<u32>,
    pub timeout: Duration,
}

/// Raw outcome of one executor invocation (spec §6). Exit code 0 means the
/// remaining fields describe a valid result; non-zero means `error_code`
/// holds the exit code and the match becomes `failed`.
#[derive(Debug, Clone)]
pub struct ExecutorOutput {
    pub winner: u8,
    pub score1: i32,
    pub score2: i32,
    pub error_code: i32,
    pub stderr_tail: String,
    pub duration: Duration,
}

#[derive(Debug, Error)]
pub enum ExecutorError {
    /// the adapter process exceeded its per-game-type timeout
    #[error("executor timed out after {0:?}")]
    Timeout(Duration),

    /// the adapter could not be spawned or its output could not be parsed
    #[error("executor failed: {0}")]
    Adapter(String),
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;

#[async_trait]
pub trait ExecutorAdapter: Send + Sync {
    async fn run(&self, input: ExecutorInput) -> ExecutorResult<ExecutorOutput>;
}
