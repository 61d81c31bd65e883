use crate::store::models::{ParkRecord, RecordList, StoredRide};
use crate::sync::CanonicalRide;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared::StoreConfig;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error("store authentication failed with status {status}")]
    AuthFailed { status: reqwest::StatusCode },
    #[error("no store session; authenticate before issuing requests")]
    NotAuthenticated,
}

#[derive(Debug, Clone)]
struct Session {
    token: String,
    expires_at: Option<DateTime<Utc>>,
}

impl Session {
    // A token whose expiry cannot be read counts as expired.
    fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp > now)
    }
}

/// Client for the authenticated record store. The session token lives inside
/// the client and is refreshed lazily via [`StoreClient::ensure_authenticated`].
pub struct StoreClient {
    http: reqwest::Client,
    base_url: String,
    identity: String,
    password: String,
    session: RwLock<Option<Session>>,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: String,
}

#[derive(Debug, Deserialize)]
struct TokenClaims {
    exp: i64,
}

#[derive(Debug, Serialize)]
struct NewRideRecord<'a> {
    #[serde(flatten)]
    ride: &'a CanonicalRide,
    park_id: &'a str,
}

impl StoreClient {
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            identity: config.identity.clone(),
            password: config.password.clone(),
            session: RwLock::new(None),
        }
    }

    /// Re-authenticates only when there is no session or its token has
    /// expired; otherwise the cached session is kept.
    pub async fn ensure_authenticated(&self) -> Result<(), StoreError> {
        let valid = self
            .session
            .read()
            .as_ref()
            .is_some_and(|s| s.is_valid(Utc::now()));
        if valid {
            return Ok(());
        }
        self.authenticate().await
    }

    async fn authenticate(&self) -> Result<(), StoreError> {
        let url = format!(
            "{}/api/collections/_superusers/auth-with-password",
            self.base_url
        );
        let resp = self
            .http
            .post(url)
            .json(&json!({ "identity": self.identity, "password": self.password }))
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(StoreError::AuthFailed {
                status: resp.status(),
            });
        }

        let auth = resp.json::<AuthResponse>().await?;
        let expires_at = token_expiry(&auth.token);
        debug!(expires_at = ?expires_at, "parsed session token expiry");
        *self.session.write() = Some(Session {
            token: auth.token,
            expires_at,
        });
        info!("store re-authenticated");
        Ok(())
    }

    fn session_token(&self) -> Result<String, StoreError> {
        self.session
            .read()
            .as_ref()
            .map(|s| s.token.clone())
            .ok_or(StoreError::NotAuthenticated)
    }

    pub async fn find_park_record(&self, api_id: &str) -> Result<Option<ParkRecord>, StoreError> {
        let token = self.session_token()?;
        let filter = format!("(api_id='{api_id}')");
        let list = self
            .http
            .get(format!("{}/api/collections/parks/records", self.base_url))
            .header(AUTHORIZATION, &token)
            .query(&[("filter", filter.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json::<RecordList<ParkRecord>>()
            .await?;

        Ok(list.items.into_iter().next())
    }

    /// Returns every stored ride for a park. The store is expected to return
    /// the full set in one call; a single large page is requested.
    pub async fn list_park_rides(
        &self,
        park_record_id: &str,
    ) -> Result<Vec<StoredRide>, StoreError> {
        let token = self.session_token()?;
        let filter = format!("(park_id='{park_record_id}')");
        let list = self
            .http
            .get(format!("{}/api/collections/rides/records", self.base_url))
            .header(AUTHORIZATION, &token)
            .query(&[("filter", filter.as_str()), ("perPage", "500")])
            .send()
            .await?
            .error_for_status()?
            .json::<RecordList<StoredRide>>()
            .await?;

        Ok(list.items)
    }

    pub async fn create_ride(
        &self,
        park_record_id: &str,
        ride: &CanonicalRide,
    ) -> Result<(), StoreError> {
        let token = self.session_token()?;
        self.http
            .post(format!("{}/api/collections/rides/records", self.base_url))
            .header(AUTHORIZATION, &token)
            .json(&NewRideRecord {
                ride,
                park_id: park_record_id,
            })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    pub async fn update_ride(
        &self,
        ride_record_id: &str,
        ride: &CanonicalRide,
    ) -> Result<(), StoreError> {
        let token = self.session_token()?;
        self.http
            .patch(format!(
                "{}/api/collections/rides/records/{ride_record_id}",
                self.base_url
            ))
            .header(AUTHORIZATION, &token)
            .json(ride)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload).ok()?;
    let claims: TokenClaims = serde_json::from_slice(&bytes).ok()?;
    DateTime::from_timestamp(claims.exp, 0)
}
