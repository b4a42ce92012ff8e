//! Airline Market Simulation - Entry Point
//!
//! Hosts one game session and plays its rounds on a wall-clock schedule.
//! Runs until the configured rounds are done or SIGINT arrives.
//!
//! Wiring sequence:
//! 1. Load config.toml (or the path given as first argument) + validate
//! 2. Init tracing (JSON structured logging)
//! 3. Open the data directory (JSONL results + session snapshots)
//! 4. Create or resume the session in the registry
//! 5. Spawn health server (/live + /ready) and Prometheus exporter
//! 6. Spawn the round scheduler
//! 7. Wait for SIGINT or scheduler completion → force-finalize, save, exit

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use airline_market_sim::adapters::metrics::{HealthServer, HealthState, MetricsRegistry};
use airline_market_sim::adapters::persistence::RepositoryImpl;
use airline_market_sim::config::{self, AppConfig};
use airline_market_sim::domain::session::{Phase, Session};
use airline_market_sim::ports::repository::RoundRepository;
use airline_market_sim::usecases::registry::{SessionId, SessionRegistry};
use airline_market_sim::usecases::scheduler::RoundScheduler;

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Load configuration ───────────────────────────────
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".to_string());
    let config = config::loader::load_config(&config_path)
        .context("Failed to load configuration")?;

    // ── 2. Initialize structured JSON logging ───────────────
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| {
                    tracing_subscriber::EnvFilter::new(&config.service.log_level)
                }),
        )
        .json()
        .init();

    info!(
        name = %config.service.name,
        version = env!("CARGO_PKG_VERSION"),
        teams = config.teams.len(),
        rounds = config.scheduler.rounds,
        seeded = config.service.seed.is_some(),
        "Starting airline market simulation"
    );

    // ── 3. Shutdown channel + persistence ───────────────────
    let (shutdown_tx, _shutdown_rx) = broadcast::channel::<()>(4);

    let repo = Arc::new(
        RepositoryImpl::from_data_dir(&config.persistence.data_dir)
            .await
            .context("Failed to open data directory")?,
    );

    // ── 4. Create or resume the session ─────────────────────
    let registry = Arc::new(SessionRegistry::new());
    let session_id = open_session(&config, &registry, repo.as_ref()).await?;

    // ── 5. Health + metrics servers ─────────────────────────
    let health = Arc::new(HealthState::new());
    health.set_repository_healthy(repo.is_healthy().await);

    let health_server = HealthServer::new(Arc::clone(&health), config.metrics.health_port);
    let health_handle = tokio::spawn(health_server.run(shutdown_tx.subscribe()));

    let metrics = Arc::new(MetricsRegistry::new().context("Failed to create metrics registry")?);
    let metrics_handle = if config.metrics.enabled {
        let server = Arc::clone(&metrics);
        let bind = config.metrics.bind_address.clone();
        Some(tokio::spawn(server.serve(bind, shutdown_tx.subscribe())))
    } else {
        None
    };

    // ── 6. Spawn the round scheduler ────────────────────────
    let scheduler = RoundScheduler::new(
        Arc::clone(&registry),
        Arc::clone(&repo),
        Arc::clone(&metrics),
        session_id.clone(),
        config.scheduler.clone(),
    )
    .with_snapshot_cadence(config.persistence.snapshot_every_ticks);

    let scheduler_shutdown = shutdown_tx.subscribe();
    let scheduler_health = Arc::clone(&health);
    scheduler_health.set_scheduler_running(true);
    let mut scheduler_handle = tokio::spawn(async move {
        let outcome = scheduler.run(scheduler_shutdown).await;
        scheduler_health.set_scheduler_running(false);
        outcome
    });

    info!(session_id = %session_id, "All tasks spawned - simulation is running");

    // ── 7. Wait for SIGINT or scheduler completion ──────────
    let finished = tokio::select! {
        _ = signal::ctrl_c() => {
            info!("SIGINT received, initiating graceful shutdown");
            None
        }
        joined = &mut scheduler_handle => Some(joined),
    };

    // ── Graceful shutdown (signal → finalize → save → exit) ──
    let _ = shutdown_tx.send(());
    info!("Shutdown signal broadcast to all tasks");

    let joined = match finished {
        Some(joined) => Some(joined),
        None => tokio::time::timeout(Duration::from_secs(30), scheduler_handle)
            .await
            .ok(),
    };
    match joined {
        Some(Ok(Ok(report))) => info!(
            rounds = report.rounds_completed,
            stopped_early = report.stopped_early,
            results = report.results.len(),
            "Scheduler stopped"
        ),
        Some(Ok(Err(e))) => error!(error = %e, "Scheduler failed"),
        Some(Err(e)) => error!(error = %e, "Scheduler task panicked"),
        None => warn!("Scheduler did not stop within 30s"),
    }

    let _ = tokio::time::timeout(Duration::from_secs(5), health_handle).await;
    if let Some(handle) = metrics_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }

    info!("Shutdown complete");
    Ok(())
}

/// Resume the configured session from its snapshot, or create a fresh one
/// with the configured teams.
///
/// A snapshot taken mid-round is force-finalized so the scheduler always
/// starts from pre-purchase.
async fn open_session(
    config: &AppConfig,
    registry: &SessionRegistry,
    repo: &RepositoryImpl,
) -> Result<SessionId> {
    if let Some(resume_id) = &config.service.resume_session {
        let snapshot = repo
            .load_snapshot(resume_id)
            .await?
            .with_context(|| format!("No snapshot found for session {resume_id}"))?;
        let session =
            Session::from_snapshot(snapshot).context("Failed to restore session snapshot")?;
        let mid_round = session.phase == Phase::Simulation;
        info!(
            session_id = %session.id,
            round = session.round,
            teams = session.teams.len(),
            mid_round,
            "Resuming session from snapshot"
        );
        let id = session.id.clone();
        registry.insert(session, config.service.seed).await;

        if mid_round {
            let results = registry.end_phase_now(&id).await?;
            repo.save_round_results(&id, &results)
                .await
                .context("Failed to persist force-finalized round")?;
            warn!(session_id = %id, results = results.len(), "Interrupted round force-finalized");
        }
        for team in &config.teams {
            if registry
                .add_team(&id, &team.id, team.display_name(), team.decisions())
                .await
                .is_ok()
            {
                info!(session_id = %id, team = %team.id, "Configured team added on resume");
            }
        }
        return Ok(id);
    }

    let id = registry
        .create(config.simulation.clone(), config.service.seed)
        .await
        .context("Failed to create session")?;
    for team in &config.teams {
        registry
            .add_team(&id, &team.id, team.display_name(), team.decisions())
            .await
            .with_context(|| format!("Failed to register team {}", team.id))?;
    }
    Ok(id)
}
