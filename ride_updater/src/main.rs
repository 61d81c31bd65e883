#![warn(clippy::pedantic)]
use axum::Router;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use ride_updater::error::{MainError, TickError};
use ride_updater::fetch::QueueTimesClient;
use ride_updater::store::client::StoreClient;
use ride_updater::sync::run_tick;
use shared::error::InitializationError;
use shared::queue_times::PARKS;
use shared::{DEFAULT_TICK_INTERVAL_SECONDS, load_config, shutdown_listener};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
struct SchedulerState {
    interval_seconds: u64,
    last_attempted_tick: Arc<RwLock<Option<DateTime<Utc>>>>,
    last_successful_tick: Arc<RwLock<Option<DateTime<Utc>>>>,
    last_error: Arc<RwLock<Option<TickError>>>,
}

#[tokio::main]
async fn main() -> Result<(), MainError> {
    let subscriber = tracing_subscriber::fmt()
        .compact()
        .with_file(true)
        .with_line_number(true)
        .with_env_filter(EnvFilter::from_default_env())
        .finish();

    tracing::subscriber::set_global_default(subscriber).map_err(InitializationError::Tracing)?;

    // Set up config
    let config = load_config().map_err(InitializationError::from)?;
    info!(store_url = config.store.url, "config loaded");

    let interval_seconds = config
        .scheduler
        .as_ref()
        .map_or(DEFAULT_TICK_INTERVAL_SECONDS, |c| c.interval_seconds);

    let store = StoreClient::new(&config.store);
    let upstream = QueueTimesClient::new();

    let state = SchedulerState {
        interval_seconds,
        last_attempted_tick: Arc::new(RwLock::new(None)),
        last_successful_tick: Arc::new(RwLock::new(None)),
        last_error: Arc::new(RwLock::new(None)),
    };

    // Cancellation token shared across tasks; listener cancels on SIGINT/SIGTERM.
    let shutdown_token = CancellationToken::new();
    let signal_handle = tokio::spawn(shutdown_listener(Some(shutdown_token.clone())));

    let axum_handle = tokio::spawn(run_health_server(state.clone(), shutdown_token.clone()));

    let scheduler_handle = tokio::spawn(scheduler_loop(
        state,
        upstream,
        store,
        shutdown_token.clone(),
    ));

    tokio::select! {
        res = axum_handle => {
            shutdown_token.cancel();
            res??;
        }
        res = scheduler_handle => {
            shutdown_token.cancel();
            res?;
        }
        res = signal_handle => {
            shutdown_token.cancel();
            res?;
        }
    }

    Ok(())
}

async fn scheduler_loop(
    state: SchedulerState,
    upstream: QueueTimesClient,
    store: StoreClient,
    shutdown: CancellationToken,
) {
    info!(
        interval_seconds = state.interval_seconds,
        "initialized wait-time scheduler"
    );
    let mut initial_loop = true;
    loop {
        if initial_loop {
            initial_loop = false;
        } else {
            tokio::select! {
                _ = sleep(Duration::from_secs(state.interval_seconds)) => {},
                _ = shutdown.cancelled() => {
                    info!("shutdown requested, exiting scheduler loop");
                    break;
                }
            }
        }

        let now = Utc::now();
        *state.last_attempted_tick.write() = Some(now);
        info!("starting scheduled wait-time update");

        match run_tick(&upstream, &store, &PARKS).await {
            Ok(summary) => {
                if summary.success {
                    info!(
                        parks_updated = summary.parks_updated,
                        total_processed = summary.total_processed,
                        total_written = summary.total_written,
                        "tick completed"
                    );
                } else {
                    warn!(
                        parks_updated = summary.parks_updated,
                        parks_failed = summary.parks_failed,
                        failures = ?summary.failures,
                        "tick completed with park failures"
                    );
                }
                *state.last_successful_tick.write() = Some(now);
                *state.last_error.write() = None;
            }
            Err(e) => {
                error!(error = ?e, "scheduled update failed");
                *state.last_error.write() = Some(e);
            }
        }

        // If shutdown was requested during processing, break after finishing the tick.
        if shutdown.is_cancelled() {
            info!("shutdown requested, scheduler loop exiting after current tick");
            break;
        }
    }
}

async fn run_health_server(
    state: SchedulerState,
    shutdown: CancellationToken,
) -> Result<(), std::io::Error> {
    info!("starting axum health server");
    let app = Router::new()
        .route("/health", get(health_check))
        .with_state(state);
    let listener = TcpListener::bind("127.0.0.1:3000").await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.cancelled().await;
        })
        .await?;
    Ok(())
}

async fn health_check(State(state): State<SchedulerState>) -> impl IntoResponse {
    let last_attempted_tick = *state.last_attempted_tick.read();
    let last_successful_tick = *state.last_successful_tick.read();
    let last_error = if let Some(e) = state.last_error.read().as_ref() {
        format!("{e:?}")
    } else {
        "none".to_string()
    };

    if last_attempted_tick.is_none() || last_successful_tick.is_none() {
        return if let Some(last_attempted_tick) = last_attempted_tick {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!(
                    "No tick has completed successfully. Last attempted tick: {last_attempted_tick}. Last error: {last_error}"
                ),
            )
        } else {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "No attempted or successful ticks".to_string(),
            )
        };
    }

    // We can safely unwrap here because we checked is_none above
    let last_attempted_tick = last_attempted_tick.unwrap();
    let last_successful_tick = last_successful_tick.unwrap();
    let stale_after = TimeDelta::seconds(2 * state.interval_seconds as i64);
    if (Utc::now() - last_successful_tick) > stale_after {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!(
                "No successful tick in the last {} seconds. Last successful tick: {last_successful_tick}. Last attempted tick: {last_attempted_tick}. Last error: {last_error}",
                stale_after.num_seconds()
            ),
        )
    } else {
        (
            StatusCode::OK,
            format!("Last successful tick: {last_successful_tick}"),
        )
    }
}
