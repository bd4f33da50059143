//! Environment-sourced configuration, read once at startup (spec §6 ambient
//! config surface). All values are required; `clap`'s `env` integration
//! reports a clear error naming the missing variable instead of panicking
//! deep inside a connection pool.

use clap::Args;
use std::net::SocketAddr;

#[derive(Debug, Args)]
pub struct ServerConfig {
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: url::Url,

    #[arg(long, env = "REDIS_URL")]
    pub redis_url: String,

    #[arg(long, env = "JUDGE_BINARY")]
    pub judge_binary: std::path::PathBuf,

    #[arg(long, env = "HEALTH_ADDR", default_value = "0.0.0.0:8080")]
    pub health_addr: SocketAddr,

    #[arg(long, env = "WORKER_POOL_SIZE", default_value_t = 4)]
    pub worker_pool_size: usize,

    #[arg(long, env = "MATCH_TIMEOUT_SECS", default_value_t = 30)]
    pub match_timeout_secs: u64,

    #[arg(long, env = "STALE_RUNNING_AFTER_SECS", default_value_t = 600)]
    pub stale_running_after_secs: i64,
}
