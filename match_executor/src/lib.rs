//! `ExecutorAdapter` implementation that shells out to a judge binary per
//! match (spec §6): one subprocess invocation, a per-game-type timeout, and
//! a JSON result on stdout.

use app_core::ports::{ExecutorAdapter, ExecutorError, ExecutorInput, ExecutorOutput, ExecutorResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Instant;
use tokio::process::Command;
use tracing::{instrument, warn};

/// Last N bytes of captured stderr kept for diagnostics; the adapter may be
/// chatty and we never want to hold a multi-megabyte blob in memory.
const STDERR_TAIL_LEN: usize = 2000;

#[derive(Debug, Deserialize)]
struct AdapterStdout {
    winner: u8,
    score1: i32,
    score2: i32,
}

/// Invokes `judge_binary` as: `judge_binary --game <name> --p1 <path> --p2
/// <path> --match-id <uuid> [--iterations <n>]`. Exit code 0 with a JSON
/// object on stdout is a valid result; any other exit code is still an
/// `Ok(ExecutorOutput)` carrying that code (spec §6: non-zero ⇒ failed
/// match, not an adapter error).
pub struct ProcessExecutorAdapter {
    judge_binary: PathBuf,
}

impl ProcessExecutorAdapter {
    pub fn new(judge_binary: PathBuf) -> Self {
        Self { judge_binary }
    }
}

fn tail(bytes: &[u8]) -> String {
    let start = bytes.len().saturating_sub(STDERR_TAIL_LEN);
    String::from_utf8_lossy(&bytes[start..]).into_owned()
}

#[async_trait]
impl ExecutorAdapter for ProcessExecutorAdapter {
    #[instrument(name = "executor.run", skip(self), fields(match_id = %input.match_id))]
    async fn run(&self, input: ExecutorInput) -> ExecutorResult<ExecutorOutput> {
        let mut cmd = Command::new(&self.judge_binary);
        cmd.arg("--game")
            .arg(&input.game_short_name)
            .arg("--p1")
            .arg(&input.program1_path)
            .arg("--p2")
            .arg(&input.program2_path)
            .arg("--match-id")
            .arg(input.match_id.to_string())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(iterations) = input.iterations {
            cmd.arg("--iterations").arg(iterations.to_string());
        }

        let started = Instant::now();
        let child = cmd.spawn().map_err(|e| ExecutorError::Adapter(format!("failed to spawn judge binary: {e}")))?;

        let output = match tokio::time::timeout(input.timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(ExecutorError::Adapter(format!("judge process error: {e}"))),
            Err(_) => return Err(ExecutorError::Timeout(input.timeout)),
        };
        let duration = started.elapsed();
        let stderr_tail = tail(&output.stderr);

        let Some(code) = output.status.code() else {
            return Err(ExecutorError::Adapter("judge process terminated by signal".into()));
        };

        if code != 0 {
            warn!(match_id = %input.match_id, code, "judge binary exited non-zero");
            return Ok(ExecutorOutput { winner: 0, score1: 0, score2: 0, error_code: code, stderr_tail, duration });
        }

        let parsed: AdapterStdout = serde_json::from_slice(&output.stdout)
            .map_err(|e| ExecutorError::Adapter(format!("invalid judge output: {e}")))?;

        Ok(ExecutorOutput {
            winner: parsed.winner,
            score1: parsed.score1,
            score2: parsed.score2,
            error_code: 0,
            stderr_tail,
            duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn input(timeout: std::time::Duration) -> ExecutorInput {
        ExecutorInput {
            match_id: Uuid::new_v4(),
            game_short_name: "tictactoe".into(),
            program1_path: "/bin/true".into(),
            program2_path: "/bin/true".into(),
            iterations: None,
            timeout,
        }
    }

    #[tokio::test]
    async fn non_zero_exit_is_a_failed_outcome_not_an_error() {
        let adapter = ProcessExecutorAdapter::new(PathBuf::from("/bin/false"));
        let result = adapter.run(input(std::time::Duration::from_secs(5))).await.unwrap();
        assert_ne!(result.error_code, 0);
    }

    #[tokio::test]
    async fn missing_binary_is_an_adapter_error() {
        let adapter = ProcessExecutorAdapter::new(PathBuf::from("/no/such/judge-binary"));
        let err = adapter.run(input(std::time::Duration::from_secs(5))).await.unwrap_err();
        assert!(matches!(err, ExecutorError::Adapter(_)));
    }

    #[tokio::test]
    async fn non_json_stdout_on_success_is_an_adapter_error() {
        // /bin/true exits 0 but prints nothing, which isn't valid JSON.
        let adapter = ProcessExecutorAdapter::new(PathBuf::from("/bin/true"));
        let err = adapter.run(input(std::time::Duration::from_secs(5))).await.unwrap_err();
        assert!(matches!(err, ExecutorError::Adapter(_)));
    }
}
