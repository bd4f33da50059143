//! Admin CLI surface (spec §6): commands map 1-to-1 onto service operations.
//! Exit codes follow `CoreError::cli_exit_code`; 0 on success.

use crate::config::ServerConfig;
use clap::{Parser, Subcommand};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "botarena-admin", about = "Tournament engine admin CLI")]
pub struct Cli {
    #[command(flatten)]
    pub config: ServerConfig,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the match worker pool and the health-check HTTP edge.
    Serve,
    /// Transition a tournament from pending to active and schedule round 1.
    Start { tournament_id: Uuid },
    /// Transition a tournament from active to completed.
    Complete { tournament_id: Uuid },
    /// Re-enqueue pending matches, or generate and enqueue a new round across
    /// every active game if none are pending.
    RunAll { tournament_id: Uuid },
    /// Same as run-all but scoped to a single game (by short name).
    RunGame {
        tournament_id: Uuid,
        game: String,
    },
    /// Flip every failed match of a tournament back to pending and re-enqueue.
    RetryFailed { tournament_id: Uuid },
    /// Remove queue entries whose match no longer exists or is no longer pending.
    PurgeQueue,
    /// Drop every queued match id.
    ClearQueue,
}
