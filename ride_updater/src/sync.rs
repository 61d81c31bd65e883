use crate::error::{SyncError, TickError};
use crate::fetch::QueueTimesClient;
use crate::store::client::StoreClient;
use crate::store::models::StoredRide;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use shared::queue_times::{Park, RideObservation};
use std::collections::HashMap;
use tracing::{debug, info, warn};

pub const UNKNOWN_RIDE_NAME: &str = "Unknown Ride";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanonicalRide {
    pub name: String,
    pub wait_time: i32,
    pub is_open: bool,
    pub last_api_update: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParkSyncSummary {
    pub park_id: &'static str,
    pub rides_processed: usize,
    pub rides_written: usize,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParkFailure {
    pub park_id: &'static str,
    pub error: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub success: bool,
    pub total_processed: usize,
    pub total_written: usize,
    pub parks_updated: usize,
    pub parks_failed: usize,
    pub results: Vec<ParkSyncSummary>,
    pub failures: Vec<ParkFailure>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum RideAction {
    Create(CanonicalRide),
    Update {
        record_id: String,
        ride: CanonicalRide,
    },
}

/// Converts one raw observation into a canonical record. Total over any input
/// shape: missing or mistyped fields fall back to defaults instead of failing.
pub fn normalize_ride(obs: &RideObservation, now: DateTime<Utc>) -> CanonicalRide {
    let name = obs
        .name
        .as_ref()
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map_or_else(|| UNKNOWN_RIDE_NAME.to_string(), ToString::to_string);

    let wait_time = obs
        .wait_time
        .as_ref()
        .and_then(Value::as_f64)
        .filter(|n| n.is_finite())
        .map_or(0, |n| n.clamp(0.0, f64::from(i32::MAX)) as i32);

    let is_open = obs.is_open.as_ref().is_some_and(value_truthy);

    CanonicalRide {
        name,
        wait_time,
        is_open,
        last_api_update: resolve_last_update(obs.last_updated.as_ref(), now),
        updated_at: now,
    }
}

fn value_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Resolution order: finite positive number as epoch seconds, then a
/// parseable date string, then the processing time.
fn resolve_last_update(raw: Option<&Value>, now: DateTime<Utc>) -> DateTime<Utc> {
    let Some(raw) = raw else { return now };

    if let Some(n) = raw.as_f64() {
        if n.is_finite()
            && n > 0.0
            && let Some(ts) = DateTime::from_timestamp_millis((n * 1000.0) as i64)
        {
            return ts;
        }
        return now;
    }

    if let Some(s) = raw.as_str() {
        if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
            return ts.with_timezone(&Utc);
        }
        if let Ok(ts) = DateTime::parse_from_rfc2822(s) {
            return ts.with_timezone(&Utc);
        }
    }

    now
}

/// A ride never seen before always counts as changed. Timestamps are
/// deliberately excluded from the comparison: a ride whose only change is its
/// timestamp is not rewritten, which keeps the write volume down.
pub fn ride_changed(existing: Option<&StoredRide>, incoming: &CanonicalRide) -> bool {
    match existing {
        None => true,
        Some(e) => {
            e.wait_time != incoming.wait_time
                || e.is_open != incoming.is_open
                || e.name != incoming.name
        }
    }
}

/// Plans the writes for one park. The name index is built once and never
/// updated mid-plan, so duplicate incoming names resolve against the same
/// existing record and the later write wins.
pub fn plan_ride_writes(
    existing_by_name: &HashMap<String, StoredRide>,
    incoming: Vec<CanonicalRide>,
) -> Vec<RideAction> {
    incoming
        .into_iter()
        .filter_map(|ride| {
            let existing = existing_by_name.get(&ride.name);
            if !ride_changed(existing, &ride) {
                return None;
            }
            Some(match existing {
                Some(e) => RideAction::Update {
                    record_id: e.id.clone(),
                    ride,
                },
                None => RideAction::Create(ride),
            })
        })
        .collect()
}

/// Synchronizes a single park: fetch, normalize, diff against the stored
/// rides, write what changed. Any failure propagates to the batch runner.
pub async fn sync_park(
    upstream: &QueueTimesClient,
    store: &StoreClient,
    park: Park,
) -> Result<ParkSyncSummary, SyncError> {
    info!(park = park.name, api_id = park.api_id, "fetching park wait times");
    let lands = upstream.fetch_park_waits(park.api_id).await?;

    let park_record = store
        .find_park_record(park.api_id)
        .await?
        .ok_or_else(|| SyncError::ParkNotFound {
            api_id: park.api_id.to_string(),
        })?;
    debug!(record_id = %park_record.id, park = %park_record.name, "found park record");

    let now = Utc::now();
    let canonical: Vec<CanonicalRide> = lands
        .iter()
        .flat_map(|land| land.rides.as_deref().unwrap_or_default())
        .map(|obs| normalize_ride(obs, now))
        .collect();
    let rides_processed = canonical.len();

    let existing_by_name: HashMap<String, StoredRide> = store
        .list_park_rides(&park_record.id)
        .await?
        .into_iter()
        .map(|r| (r.name.clone(), r))
        .collect();

    let actions = plan_ride_writes(&existing_by_name, canonical);

    let mut rides_written = 0;
    for action in &actions {
        match action {
            RideAction::Create(ride) => {
                debug!(ride = ride.name, "creating ride record");
                store.create_ride(&park_record.id, ride).await?;
            }
            RideAction::Update { record_id, ride } => {
                debug!(ride = ride.name, record_id, "updating ride record");
                store.update_ride(record_id, ride).await?;
            }
        }
        rides_written += 1;
    }

    info!(
        park = park.name,
        rides_processed, rides_written, "park sync complete"
    );
    Ok(ParkSyncSummary {
        park_id: park.api_id,
        rides_processed,
        rides_written,
        completed_at: Utc::now(),
    })
}

/// Runs every configured park in sequence. A park's failure is recorded and
/// never prevents the remaining parks from being attempted.
pub async fn run_batch(
    upstream: &QueueTimesClient,
    store: &StoreClient,
    parks: &[Park],
) -> BatchSummary {
    let mut results = Vec::new();
    let mut failures = Vec::new();
    let mut total_processed = 0;
    let mut total_written = 0;

    for park in parks {
        match sync_park(upstream, store, *park).await {
            Ok(summary) => {
                total_processed += summary.rides_processed;
                total_written += summary.rides_written;
                results.push(summary);
            }
            Err(e) => {
                warn!(park = park.name, api_id = park.api_id, error = ?e, "park sync failed");
                failures.push(ParkFailure {
                    park_id: park.api_id,
                    error: e.to_string(),
                });
            }
        }
    }

    BatchSummary {
        success: failures.is_empty(),
        total_processed,
        total_written,
        parks_updated: results.len(),
        parks_failed: failures.len(),
        results,
        failures,
        completed_at: Utc::now(),
    }
}

/// One tick: refresh the store session if needed, then sync every configured
/// park. Also the entry point for manual out-of-band invocation.
pub async fn run_tick(
    upstream: &QueueTimesClient,
    store: &StoreClient,
    parks: &[Park],
) -> Result<BatchSummary, TickError> {
    store.ensure_authenticated().await?;
    Ok(run_batch(upstream, store, parks).await)
}
