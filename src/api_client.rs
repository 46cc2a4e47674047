use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde_json::{json, Value};

use crate::config::Config;
use crate::errors::AppError;
use crate::models::{AnalysisResult, JobStatus, LeaseUpload, LoginRequest};
use crate::session::Session;

/// Client for the lease analysis backend.
///
/// Holds no credentials itself; every authenticated call takes the
/// `Session` it should act for.
#[derive(Clone)]
pub struct LeaseApiClient {
    client: reqwest::Client,
    base_url: String,
    upload_timeout: Duration,
    status_timeout: Duration,
    chat_timeout: Duration,
}

impl LeaseApiClient {
    /// Creates a new `LeaseApiClient`.
    ///
    /// # Arguments
    ///
    /// * `config` - Base URL and per-endpoint timeouts.
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.status_timeout())
            .build()
            .map_err(|e| AppError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            upload_timeout: config.upload_timeout(),
            status_timeout: config.status_timeout(),
            chat_timeout: config.chat_timeout(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn status_timeout(&self) -> Duration {
        self.status_timeout
    }

    /// Exchanges a username and password for a bearer token.
    ///
    /// # Returns
    ///
    /// * `Result<String, AppError>` - The token. 401/403 and a body without a
    ///   token both map to `AppError::Auth`.
    pub async fn login(&self, username: &str, password: &str) -> Result<String, AppError> {
        let url = self.endpoint(&["login"])?;
        tracing::info!("Logging in as {}", username);

        let response = self
            .client
            .post(url)
            .timeout(self.status_timeout)
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::Auth(
                error_message(&body).unwrap_or_else(|| "invalid credentials".to_string()),
            ));
        }
        let body: Value = read_json(check_status(response).await?).await?;

        body.get("token")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AppError::Auth("login response did not include a token".to_string()))
    }

    /// Creates an account. Does not log in.
    pub async fn register(&self, username: &str, password: &str) -> Result<(), AppError> {
        let url = self.endpoint(&["register"])?;
        tracing::info!("Registering account {}", username);

        let response = self
            .client
            .post(url)
            .timeout(self.status_timeout)
            .json(&LoginRequest { username, password })
            .send()
            .await?;

        check_status(response).await?;
        tracing::info!("✓ Account {} registered", username);
        Ok(())
    }

    /// Tells the backend the session is over.
    pub async fn logout(&self, session: &Session) -> Result<(), AppError> {
        let url = self.endpoint(&["logout"])?;

        let response = authorize(self.client.post(url), session)
            .timeout(self.status_timeout)
            .send()
            .await?;

        check_status(response).await?;
        Ok(())
    }

    /// Uploads a lease PDF for analysis.
    ///
    /// # Returns
    ///
    /// * `Result<AnalysisResult, AppError>` - Either the complete analysis or
    ///   a partial one carrying `{status: "pending", job_id}`.
    pub async fn process_lease_pdf(
        &self,
        session: &Session,
        upload: &LeaseUpload,
    ) -> Result<AnalysisResult, AppError> {
        let mut url = self.endpoint(&["process_lease_pdf"])?;
        url.query_pairs_mut()
            .append_pair("fast_mode", if upload.fast_mode { "true" } else { "false" });

        tracing::info!(
            "Uploading {} ({} bytes, fast_mode={})",
            upload.file_name,
            upload.bytes.len(),
            upload.fast_mode
        );

        let part = reqwest::multipart::Part::bytes(upload.bytes.clone())
            .file_name(upload.file_name.clone())
            .mime_str("application/pdf")
            .map_err(|e| AppError::InvalidInput(format!("Invalid upload part: {}", e)))?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = authorize(self.client.post(url), session)
            .timeout(self.upload_timeout)
            .multipart(form)
            .send()
            .await?;

        let body = read_json(check_status(response).await?).await?;
        AnalysisResult::from_value(body)
            .ok_or_else(|| AppError::Parse("upload response is not a JSON object".to_string()))
    }

    /// Reads the status of an analysis job.
    ///
    /// 404 maps to `AppError::JobNotFound`; a 200 whose body is not a status
    /// document maps to `AppError::Parse`.
    pub async fn analysis_status(
        &self,
        session: &Session,
        job_id: &str,
    ) -> Result<JobStatus, AppError> {
        let url = self.endpoint(&["analysis_status", job_id])?;
        tracing::debug!("Polling status of job {}", job_id);

        let response = authorize(self.client.get(url), session)
            .timeout(self.status_timeout)
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(AppError::JobNotFound(job_id.to_string()));
        }

        let body = read_json(check_status(response).await?).await?;
        JobStatus::from_value(&body)
    }

    /// Sends one chat turn about the lease analysed under `job_id`.
    ///
    /// # Returns
    ///
    /// * `Result<String, AppError>` - The assistant reply (`reply`, or the
    ///   legacy `response` field).
    pub async fn chat(
        &self,
        session: &Session,
        job_id: &str,
        message: &str,
    ) -> Result<String, AppError> {
        let url = self.endpoint(&["chat", job_id])?;
        tracing::info!("Sending chat message for job {}", job_id);

        let response = authorize(self.client.post(url), session)
            .timeout(self.chat_timeout)
            .json(&json!({ "message": message }))
            .send()
            .await?;

        let body = read_json(check_status(response).await?).await?;
        ["reply", "response"]
            .iter()
            .find_map(|key| body.get(*key).and_then(Value::as_str))
            .map(str::to_string)
            .ok_or_else(|| AppError::Parse("chat response has no 'reply'".to_string()))
    }

    /// Lists the leases the backend stored for the logged-in user.
    pub async fn my_leases(&self, session: &Session) -> Result<Vec<AnalysisResult>, AppError> {
        if session.bearer_token().is_none() {
            return Err(AppError::Auth("login required to list saved leases".to_string()));
        }
        let url = self.endpoint(&["my_leases"])?;

        let response = authorize(self.client.get(url), session)
            .timeout(self.status_timeout)
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(AppError::Auth("session expired, log in again".to_string()));
        }

        let body = read_json(check_status(response).await?).await?;
        let leases = match body.get("leases") {
            Some(Value::Array(items)) => items
                .iter()
                .cloned()
                .filter_map(AnalysisResult::from_value)
                .collect(),
            _ => Vec::new(),
        };

        tracing::info!("Fetched {} saved leases", leases.len());
        Ok(leases)
    }

    /// Connectivity check against `/health`.
    pub async fn health(&self) -> Result<bool, AppError> {
        let url = self.endpoint(&["health"])?;

        let response = self
            .client
            .get(url)
            .timeout(self.status_timeout)
            .send()
            .await?;

        Ok(response.status().is_success())
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, AppError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| AppError::Config(format!("Invalid base URL {}: {}", self.base_url, e)))?;
        url.path_segments_mut()
            .map_err(|_| AppError::Config(format!("Base URL cannot carry a path: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Attaches the bearer token when the session has one; anonymous otherwise.
fn authorize(builder: RequestBuilder, session: &Session) -> RequestBuilder {
    match session.bearer_token() {
        Some(token) => builder.bearer_auth(token),
        None => builder,
    }
}

async fn check_status(response: Response) -> Result<Response, AppError> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let error_text = response.text().await.unwrap_or_default();
    tracing::warn!("Backend returned {}: {}", status, error_text);
    Err(AppError::Http {
        status: status.as_u16(),
        body: error_message(&error_text).unwrap_or(error_text),
    })
}

async fn read_json(response: Response) -> Result<Value, AppError> {
    let text = response.text().await?;
    Ok(serde_json::from_str(&text)?)
}

/// Pulls `error` (or `message`) out of a JSON error body.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["error", "message"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}
