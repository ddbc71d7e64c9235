//! HTTP client for the gateway's REST endpoints.
//!
//! [`GatewayClient`] holds a pooled [`reqwest::Client`] plus the base
//! API URL for one gateway. Error responses carry the gateway's
//! `detail` field when the body provides one, so upload and start
//! failures surface the backend's own message.

use serde::Deserialize;
use tally_core::job::Job;
use tally_core::transaction::{TransactionFilter, TransactionRecord};
use tally_core::types::{JobId, UserId};
use tally_core::user::User;

/// HTTP client for a single gateway instance.
pub struct GatewayClient {
    client: reqwest::Client,
    api_url: String,
}

/// Response returned by the upload endpoint after persisting the CSV.
#[derive(Debug, Deserialize)]
struct UploadResponse {
    job_id: JobId,
}

/// Errors from the gateway REST layer.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The gateway returned a non-2xx status code.
    #[error("Gateway error ({status}): {detail}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// The gateway's `detail` message when present, else the raw body.
        detail: String,
    },
}

impl GatewayClient {
    /// Create a new client for a gateway.
    ///
    /// * `api_url` - Base HTTP URL, e.g. `http://localhost:8000`.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
        }
    }

    /// Create a client reusing an existing [`reqwest::Client`]
    /// (useful for connection pooling across sessions).
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        Self {
            client,
            api_url: api_url.into(),
        }
    }

    /// Base HTTP API URL.
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    /// List all users. `GET /users`.
    pub async fn list_users(&self) -> Result<Vec<User>, GatewayError> {
        let response = self
            .client
            .get(format!("{}/users", self.api_url))
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Create a user. `POST /users`.
    pub async fn create_user(&self, name: &str, email: &str) -> Result<User, GatewayError> {
        let body = serde_json::json!({
            "name": name,
            "email": email,
        });
        let response = self
            .client
            .post(format!("{}/users", self.api_url))
            .json(&body)
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Fetch a single user. `GET /users/{id}`.
    pub async fn get_user(&self, user_id: UserId) -> Result<User, GatewayError> {
        let response = self
            .client
            .get(format!("{}/users/{}", self.api_url, user_id))
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Fetch the full job list for a user. `GET /users/{id}/jobs`.
    ///
    /// This is the pull-channel snapshot the sync layer reconciles
    /// against (last full refresh wins).
    pub async fn list_jobs(&self, user_id: UserId) -> Result<Vec<Job>, GatewayError> {
        let response = self
            .client
            .get(format!("{}/users/{}/jobs", self.api_url, user_id))
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Upload a CSV for validation. `POST /users/{id}/upload` (multipart).
    ///
    /// Returns the identifier of the job created for the file.
    pub async fn upload_csv(
        &self,
        user_id: UserId,
        file_name: &str,
        contents: Vec<u8>,
    ) -> Result<JobId, GatewayError> {
        let part = reqwest::multipart::Part::bytes(contents)
            .file_name(file_name.to_string())
            .mime_str("text/csv")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(format!("{}/users/{}/upload", self.api_url, user_id))
            .multipart(form)
            .send()
            .await?;

        let upload: UploadResponse = Self::parse_response(response).await?;
        tracing::info!(user_id, job_id = upload.job_id, "CSV uploaded");
        Ok(upload.job_id)
    }

    /// Start processing an uploaded job. `POST /jobs/{id}/start`.
    pub async fn start_job(&self, job_id: JobId) -> Result<(), GatewayError> {
        let response = self
            .client
            .post(format!("{}/jobs/{}/start", self.api_url, job_id))
            .send()
            .await?;
        Self::check_status(response).await?;
        tracing::info!(job_id, "Job started");
        Ok(())
    }

    /// Fetch one job's current status and counters. `GET /jobs/{id}`.
    pub async fn get_job(&self, job_id: JobId) -> Result<Job, GatewayError> {
        let response = self
            .client
            .get(format!("{}/jobs/{}", self.api_url, job_id))
            .send()
            .await?;
        Self::parse_response(response).await
    }

    /// Fetch one page of a job's transactions.
    /// `GET /jobs/{id}/transactions?page&size[&filter]`.
    pub async fn transactions_page(
        &self,
        job_id: JobId,
        page: u32,
        size: u32,
        filter: TransactionFilter,
    ) -> Result<Vec<TransactionRecord>, GatewayError> {
        let mut request = self
            .client
            .get(format!("{}/jobs/{}/transactions", self.api_url, job_id))
            .query(&[("page", page), ("size", size)]);
        if let Some(filter) = filter.as_query_param() {
            request = request.query(&[("filter", filter)]);
        }
        let response = request.send().await?;
        Self::parse_response(response).await
    }

    // ---- private helpers ----

    /// Ensure the response has a success status code. Returns the
    /// response unchanged on success, or a [`GatewayError::Api`] carrying
    /// the status and the extracted detail message on failure.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, GatewayError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                status: status.as_u16(),
                detail: extract_detail(&body),
            });
        }
        Ok(response)
    }

    /// Parse a successful JSON response body into the expected type.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, GatewayError> {
        let response = Self::ensure_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Assert the response has a success status code, discarding the body.
    async fn check_status(response: reqwest::Response) -> Result<(), GatewayError> {
        Self::ensure_success(response).await?;
        Ok(())
    }
}

/// Pull the human-readable message out of an error body.
///
/// The gateway reports errors as `{"detail": "..."}`. Falls back to the
/// raw body, or a generic message when the body is empty.
fn extract_detail(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        match value.get("detail") {
            Some(serde_json::Value::String(s)) => return s.clone(),
            Some(other) if !other.is_null() => return other.to_string(),
            _ => {}
        }
    }
    if body.is_empty() {
        "request failed".to_string()
    } else {
        body.to_string()
    }
}
