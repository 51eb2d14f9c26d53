//! HTTP client for the API gateway.

use async_trait::async_trait;
use chrono::Utc;
use panel_common::{LoginRequest, LoginResponse};
use reqwest::{Client, Method};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crate::config::GatewayConfig;
use crate::error::{Error, Result};
use crate::heartbeat::{BeaconTarget, HealthSnapshot, HeartbeatSink};

use super::Credential;

const LOGIN_PATH: &str = "/auth/login";

/// Gateway client with transparent token handling.
///
/// Callers issue plain `get`/`post` calls; the client logs in on first use,
/// reuses the token until its local expiry and logs in again afterwards.
/// Status codes are never interpreted here: any non-2xx answer comes back as
/// [`Error::Http`] and the caller decides what it means.
pub struct GatewayClient {
    http_client: Client,
    base_url: String,
    username: String,
    password: String,
    token_ttl: chrono::Duration,
    // Held across the login exchange so concurrent callers share one login.
    credential: Mutex<Option<Credential>>,
}

impl GatewayClient {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;

        let token_ttl = chrono::Duration::from_std(config.token_ttl())
            .map_err(|e| Error::Config(format!("Invalid token_ttl_secs: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            token_ttl,
            credential: Mutex::new(None),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Return the cached token, logging in first if there is none or it expired.
    async fn token(&self) -> Result<String> {
        let mut cached = self.credential.lock().await;

        if let Some(credential) = cached.as_ref() {
            if credential.is_valid_at(Utc::now()) {
                return Ok(credential.token().to_string());
            }
            tracing::debug!("Gateway token expired at {}, logging in again", credential.expires_at());
        }

        let credential = self.login().await?;
        let token = credential.token().to_string();
        *cached = Some(credential);
        Ok(token)
    }

    async fn login(&self) -> Result<Credential> {
        let url = format!("{}{}", self.base_url, LOGIN_PATH);
        let request = LoginRequest {
            username: self.username.clone(),
            password: self.password.clone(),
        };

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(Error::network)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Auth(format!("{}: {}", status, body)));
        }

        let login: LoginResponse = response
            .json()
            .await
            .map_err(|e| Error::Auth(format!("malformed login response: {}", e)))?;

        let credential = Credential::issued(login.access_token, Utc::now(), self.token_ttl);
        tracing::info!(
            "Logged in to gateway as {}, token reused until {}",
            self.username,
            credential.expires_at()
        );
        Ok(credential)
    }

    /// Issue an authenticated call and decode the JSON body.
    ///
    /// An empty 2xx body decodes to `Value::Null`.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<Value> {
        let token = self.token().await?;
        let url = format!("{}{}", self.base_url, path);

        let mut builder = self
            .http_client
            .request(method.clone(), &url)
            .bearer_auth(token);
        if !query.is_empty() {
            builder = builder.query(query);
        }
        if let Some(body) = body {
            builder = builder.json(&body);
        }

        tracing::debug!("Gateway request: {} {}", method, path);

        let response = builder.send().await.map_err(Error::network)?;
        let status = response.status();
        let text = response.text().await.map_err(Error::network)?;

        if !status.is_success() {
            return Err(Error::Http { status, body: text });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&text).map_err(|e| Error::InvalidResponse(e.to_string()))
    }

    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        self.request(Method::GET, path, query, None).await
    }

    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value> {
        let body = serde_json::to_value(body)
            .map_err(|e| Error::InvalidArgument(format!("Unserializable request body: {}", e)))?;
        self.request(Method::POST, path, &[], Some(body)).await
    }

    // ------------------------------------------------------------------------
    // Dashboard endpoints
    // ------------------------------------------------------------------------

    /// Hourly forecast for the next 48 hours.
    pub async fn hourly_forecast(&self, lat: f64, lon: f64, units: &str) -> Result<Value> {
        self.get(
            "/forecast/hourly",
            &[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("units", units.to_string()),
            ],
        )
        .await
    }

    pub async fn daily_forecast(&self, lat: f64, lon: f64, days: u32, units: &str) -> Result<Value> {
        self.get(
            "/forecast/daily",
            &[
                ("lat", lat.to_string()),
                ("lon", lon.to_string()),
                ("cnt", days.to_string()),
                ("units", units.to_string()),
            ],
        )
        .await
    }

    /// Coordinates for a city name.
    pub async fn geocode(&self, city: &str) -> Result<Value> {
        self.get("/geocode", &[("text", city.to_string())]).await
    }

    /// Location of `ip`, or of the caller's public address when `None`.
    pub async fn location_from_ip(&self, ip: Option<&str>) -> Result<Value> {
        let query: Vec<(&str, String)> = ip.map(|ip| ("ip", ip.to_string())).into_iter().collect();
        self.get("/ipregistry/location", &query).await
    }

    pub async fn send_email(
        &self,
        to: &[String],
        subject: &str,
        html: &str,
        from_email: Option<&str>,
    ) -> Result<Value> {
        let mut payload = json!({
            "to": to,
            "subject": subject,
            "html": html,
        });
        if let Some(from) = from_email {
            payload["from_email"] = json!(from);
        }
        self.post("/email/send", &payload).await
    }
}

#[async_trait]
impl HeartbeatSink for GatewayClient {
    async fn push_heartbeat(&self, target: &BeaconTarget, snapshot: &HealthSnapshot) -> Result<()> {
        let payload = target.payload(snapshot)?;
        self.request(Method::POST, &target.heartbeat_path(), &[], Some(payload))
            .await?;
        Ok(())
    }
}
