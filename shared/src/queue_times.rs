use serde::Deserialize;
use serde_json::Value;

pub const QUEUE_TIMES_BASE_URL: &str = "https://queue-times.com";

/// The parks this service tracks. The upstream API keys parks by a numeric
/// identifier passed as a path segment.
pub const PARKS: [Park; 4] = [
    Park {
        api_id: "5",
        name: "EPCOT",
    },
    Park {
        api_id: "6",
        name: "Magic Kingdom",
    },
    Park {
        api_id: "7",
        name: "Disney's Hollywood Studios",
    },
    Park {
        api_id: "8",
        name: "Disney's Animal Kingdom",
    },
];

#[derive(Debug, Copy, Clone)]
pub struct Park {
    pub api_id: &'static str,
    pub name: &'static str,
}

pub fn park_waits_url(base_url: &str, api_id: &str) -> String {
    format!("{base_url}/parks/{api_id}/queue_times.json")
}

/// One park's wait-time payload. `lands` stays optional here so the fetch
/// layer can reject its absence with a typed error instead of a decode error.
#[derive(Debug, Clone, Deserialize)]
pub struct ParkWaitsResponse {
    pub lands: Option<Vec<Land>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Land {
    pub rides: Option<Vec<RideObservation>>,
}

/// Untrusted upstream ride observation. Any field may be absent, null, or of
/// an unexpected type; normalization must accept all of these shapes.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RideObservation {
    pub name: Option<Value>,
    pub wait_time: Option<Value>,
    pub is_open: Option<Value>,
    pub last_updated: Option<Value>,
}
