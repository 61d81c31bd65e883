use crate::error::FetchError;
use shared::queue_times::{Land, ParkWaitsResponse, QUEUE_TIMES_BASE_URL, park_waits_url};

pub struct QueueTimesClient {
    http: reqwest::Client,
    base_url: String,
}

impl QueueTimesClient {
    pub fn new() -> Self {
        Self::with_base_url(QUEUE_TIMES_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into();
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetches one park's wait-time payload and flattens it to its lands. A
    /// non-success status or a payload without `lands` fails the fetch.
    pub async fn fetch_park_waits(&self, api_id: &str) -> Result<Vec<Land>, FetchError> {
        let resp = self
            .http
            .get(park_waits_url(&self.base_url, api_id))
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let parsed: ParkWaitsResponse = serde_json::from_str(&resp)?;
        parsed.lands.ok_or(FetchError::MissingLands)
    }
}

impl Default for QueueTimesClient {
    fn default() -> Self {
        Self::new()
    }
}
