mod cli;
mod config;

use anyhow::{Context, Result, anyhow};
use app_core::CoreBuilder;
use axum::{Router, http::StatusCode, response::IntoResponse, routing::get};
use cache_redis::RedisPool;
use clap::Parser;
use cli::Command;
use cr_single_instance::CrSingleInstance;
use db_postgres::PgDb;
use match_executor::ProcessExecutorAdapter;
use match_worker::{MatchWorkerPool, WorkerPoolConfig};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument};
use tracing_bunyan_formatter::{BunyanFormattingLayer, JsonStorageLayer};
use tracing_error::ErrorLayer;
use tracing_log::LogTracer;
use tracing_subscriber::{EnvFilter, Registry, prelude::*};

fn init_tracing_bunyan() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let formatting_layer = BunyanFormattingLayer::new("botarena".into(), std::io::stdout);
    let subscriber = Registry::default()
        .with(env_filter)
        .with(JsonStorageLayer)
        .with(formatting_layer)
        .with(ErrorLayer::default());
    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

#[instrument(name = "health")]
async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    match dotenvy::dotenv() {
        Ok(_) | Err(dotenvy::Error::Io(_)) => {}
        Err(e) => return Err(e.into()),
    }
    LogTracer::init()?;
    init_tracing_bunyan()?;

    let cli = cli::Cli::parse();
    let config = cli.config;

    let db = PgDb::new(config.database_url.clone()).await.context("connecting to postgres")?;
    db.run_migration().await.map_err(|e| anyhow!(e.to_string()))?;
    let queue = Arc::new(db_postgres::PgPriorityQueue::new(db.clone()));

    let redis = RedisPool::connect(&config.redis_url).await.context("connecting to redis")?;
    let broadcaster = Arc::new(CrSingleInstance::new());

    let core = CoreBuilder::new()
        .set_repository(Arc::new(db.clone()))
        .set_queue(queue.clone())
        .set_tournament_cache(Arc::new(redis.tournament_cache()))
        .set_leaderboard_cache(Arc::new(redis.leaderboard_cache()))
        .set_lock(Arc::new(redis.lock()))
        .set_broadcaster(broadcaster)
        .build();
    let service = Arc::new(core.tournament_service());

    let exit_code = match cli.command {
        Command::Serve => {
            serve(&core, service, queue, config).await?;
            0
        }
        Command::Start { tournament_id } => {
            run(service.start_tournament(tournament_id, chrono::Utc::now()).await.map(|t| {
                format!("tournament {tournament_id} active, status {:?}", t.status())
            }))
        }
        Command::Complete { tournament_id } => {
            run(service.complete_tournament(tournament_id, chrono::Utc::now()).await.map(|t| {
                format!("tournament {tournament_id} completed, status {:?}", t.status())
            }))
        }
        Command::RunAll { tournament_id } => {
            run(service
                .run_all_matches(tournament_id, chrono::Utc::now())
                .await
                .map(|n| format!("enqueued {n} match(es)")))
        }
        Command::RunGame { tournament_id, game } => {
            let game_id = match core.repository.get_game_by_short_name(&game).await {
                Ok(Some(g)) => g.id,
                Ok(None) => {
                    eprintln!("game not found: {game}");
                    std::process::exit(4);
                }
                Err(e) => {
                    eprintln!("internal error: {e}");
                    std::process::exit(1);
                }
            };
            run(service
                .run_game_matches(tournament_id, game_id, chrono::Utc::now())
                .await
                .map(|n| format!("enqueued {n} match(es)")))
        }
        Command::RetryFailed { tournament_id } => {
            run(service
                .retry_failed_matches(tournament_id)
                .await
                .map(|n| format!("reset {n} failed match(es)")))
        }
        Command::PurgeQueue => {
            let tournaments = match core.repository.list_tournaments(&Default::default()).await {
                Ok(t) => t,
                Err(e) => {
                    eprintln!("internal error: {e}");
                    std::process::exit(1);
                }
            };
            let mut still_valid: HashSet<uuid::Uuid> = HashSet::new();
            for t in &tournaments {
                let Some(id) = t.id() else { continue };
                match core.repository.get_pending_by_tournament(id).await {
                    Ok(pending) => still_valid.extend(pending.into_iter().map(|m| m.id)),
                    Err(e) => {
                        eprintln!("internal error: {e}");
                        std::process::exit(1);
                    }
                }
            }
            match core.queue.purge_invalid(&still_valid).await {
                Ok(n) => {
                    println!("purged {n} stale queue entries");
                    0
                }
                Err(e) => {
                    eprintln!("internal error: {e}");
                    1
                }
            }
        }
        Command::ClearQueue => match core.queue.clear().await {
            Ok(()) => {
                println!("queue cleared");
                0
            }
            Err(e) => {
                eprintln!("internal error: {e}");
                1
            }
        },
    };

    std::process::exit(exit_code);
}

fn run(result: app_core::CoreResult<String>) -> i32 {
    match result {
        Ok(msg) => {
            println!("{msg}");
            0
        }
        Err(e) => {
            eprintln!("{e}");
            e.cli_exit_code()
        }
    }
}

async fn serve(
    core: &app_core::Core<app_core::InitState>,
    service: Arc<app_core::service::TournamentService>,
    queue: Arc<db_postgres::PgPriorityQueue>,
    config: config::ServerConfig,
) -> Result<()> {
    let executor = Arc::new(ProcessExecutorAdapter::new(config.judge_binary.clone()));
    let pool = Arc::new(MatchWorkerPool::new(
        core.repository.clone(),
        queue,
        executor,
        service,
        WorkerPoolConfig {
            pool_size: config.worker_pool_size,
            match_timeout: std::time::Duration::from_secs(config.match_timeout_secs),
            stale_running_after_secs: config.stale_running_after_secs,
        },
    ));

    let cancel = CancellationToken::new();
    let worker_handles = pool.spawn(cancel.clone()).await;

    let app = Router::new().route("/health", get(health));
    let listener = tokio::net::TcpListener::bind(&config.health_addr).await?;
    info!(addr = %config.health_addr, "listening on health http server");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await?;

    cancel.cancel();
    for handle in worker_handles {
        let _ = handle.await;
    }
    Ok(())
}
