use serde::Deserialize;

/// Envelope the record store wraps every list query in.
#[derive(Debug, Deserialize)]
pub struct RecordList<T> {
    pub items: Vec<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParkRecord {
    pub id: String,
    pub name: String,
}

/// Read model for a persisted ride. The store also persists both timestamps,
/// but change detection never consults them, so only the compared fields and
/// the record identity are read back.
#[derive(Debug, Clone, Deserialize)]
pub struct StoredRide {
    pub id: String,
    pub name: String,
    pub wait_time: i32,
    pub is_open: bool,
}
