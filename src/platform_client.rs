use crate::circuit_breaker::{create_platform_circuit_breaker, PlatformCircuitBreaker};
use crate::errors::AppError;
use failsafe::futures::CircuitBreaker as _;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::time::Duration;

/// A PostgREST-style table query: table name plus encoded query parameters.
///
/// ```
/// use agentdex_api::platform_client::TableQuery;
///
/// let q = TableQuery::from("agents")
///     .select("*,reviews(rating)")
///     .eq("verification_status", "approved")
///     .order("created_at", false)
///     .limit(4);
/// assert_eq!(q.table(), "agents");
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TableQuery {
    table: String,
    params: Vec<(String, String)>,
}

impl TableQuery {
    pub fn from(table: &str) -> Self {
        Self {
            table: table.to_string(),
            params: Vec::new(),
        }
    }

    pub fn select(mut self, columns: &str) -> Self {
        self.params.push(("select".to_string(), columns.to_string()));
        self
    }

    pub fn eq(mut self, column: &str, value: impl ToString) -> Self {
        self.params
            .push((column.to_string(), format!("eq.{}", value.to_string())));
        self
    }

    /// `column=in.("a","b")`. Values are quoted so commas inside them are safe.
    pub fn in_list<V: ToString>(mut self, column: &str, values: &[V]) -> Self {
        let quoted: Vec<String> = values
            .iter()
            .map(|v| format!("\"{}\"", v.to_string().replace('"', "\\\"")))
            .collect();
        self.params
            .push((column.to_string(), format!("in.({})", quoted.join(","))));
        self
    }

    pub fn order(mut self, column: &str, ascending: bool) -> Self {
        let direction = if ascending { "asc" } else { "desc" };
        self.params
            .push(("order".to_string(), format!("{}.{}", column, direction)));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.params.push(("limit".to_string(), n.to_string()));
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }
}

/// Client for the hosted platform's REST table interface.
///
/// Every call is one request and one response. There is no retry and no
/// caching; a shared circuit breaker fails fast while the platform is down.
#[derive(Clone)]
pub struct PlatformClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    breaker: PlatformCircuitBreaker,
}

impl PlatformClient {
    /// Creates a new `PlatformClient`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - The platform base URL (no trailing slash).
    /// * `api_key` - The public anon key.
    pub fn new(base_url: String, api_key: String) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create platform client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            breaker: create_platform_circuit_breaker(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.client
    }

    /// Adds the `apikey` header and a bearer token: the user's access token
    /// when acting on behalf of someone, otherwise the anon key.
    pub(crate) fn authorize(&self, request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .header(
                "Authorization",
                format!("Bearer {}", token.unwrap_or(&self.api_key)),
            )
    }

    /// Sends a request through the circuit breaker and returns the response
    /// whatever its 4xx status. Transport errors and 5xx responses are
    /// failures and count against the breaker.
    pub(crate) async fn send_raw(
        &self,
        request: RequestBuilder,
        operation: &str,
    ) -> Result<Response, AppError> {
        let call = async move {
            let response = request.send().await.map_err(|e| {
                AppError::ExternalApiError(format!("{} request failed: {}", operation, e))
            })?;

            if response.status().is_server_error() {
                let status = response.status();
                let error_text = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                return Err(AppError::ExternalApiError(format!(
                    "{} returned {}: {}",
                    operation, status, error_text
                )));
            }

            Ok(response)
        };

        self.breaker
            .call_with(is_platform_failure, call)
            .await
            .map_err(|e| match e {
                failsafe::Error::Inner(e) => e,
                failsafe::Error::Rejected => {
                    tracing::warn!("Platform circuit open, rejecting {}", operation);
                    AppError::ExternalApiError(format!(
                        "{} rejected: platform circuit open",
                        operation
                    ))
                }
            })
    }

    /// Like [`send_raw`](Self::send_raw), but maps every non-success status to an error.
    pub(crate) async fn send(
        &self,
        request: RequestBuilder,
        operation: &str,
    ) -> Result<Response, AppError> {
        let response = self.send_raw(request, operation).await?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(error_for_status(status, &body, operation))
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    /// Fetches every row matching `query`.
    ///
    /// # Arguments
    ///
    /// * `query` - Table, columns, filters and ordering.
    /// * `token` - The caller's access token, if the read is on their behalf.
    ///
    /// # Returns
    ///
    /// * `Result<Vec<T>, AppError>` - The decoded rows.
    pub async fn select<T: DeserializeOwned>(
        &self,
        query: &TableQuery,
        token: Option<&str>,
    ) -> Result<Vec<T>, AppError> {
        let url = self.table_url(query.table());
        tracing::debug!("Platform select {} {:?}", url, query.params());

        let request = self
            .authorize(self.client.get(&url), token)
            .query(query.params());
        let response = self.send(request, "Platform select").await?;

        response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!(
                "Failed to parse {} rows: {}",
                query.table(),
                e
            ))
        })
    }

    /// Fetches the first row matching `query`, if any.
    pub async fn select_optional<T: DeserializeOwned>(
        &self,
        query: &TableQuery,
        token: Option<&str>,
    ) -> Result<Option<T>, AppError> {
        let query = query.clone().limit(1);
        let rows: Vec<T> = self.select(&query, token).await?;
        Ok(rows.into_iter().next())
    }

    /// Inserts one row and returns it as stored.
    pub async fn insert<B: Serialize, T: DeserializeOwned>(
        &self,
        table: &str,
        body: &B,
        token: Option<&str>,
    ) -> Result<T, AppError> {
        let url = self.table_url(table);
        tracing::info!("Inserting into {}", table);

        let request = self
            .authorize(self.client.post(&url), token)
            .header("Prefer", "return=representation")
            .json(&[body]);
        let response = self.send(request, "Platform insert").await?;

        let rows: Vec<T> = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse {} insert response: {}", table, e))
        })?;

        rows.into_iter().next().ok_or_else(|| {
            AppError::ExternalApiError(format!("Insert into {} returned no row", table))
        })
    }

    /// Updates the rows matching `query`; returns how many were changed.
    pub async fn update<B: Serialize>(
        &self,
        query: &TableQuery,
        body: &B,
        token: Option<&str>,
    ) -> Result<usize, AppError> {
        let url = self.table_url(query.table());
        tracing::info!("Updating {} {:?}", query.table(), query.params());

        let request = self
            .authorize(self.client.patch(&url), token)
            .header("Prefer", "return=representation")
            .query(query.params())
            .json(body);
        let response = self.send(request, "Platform update").await?;

        let rows: Vec<Value> = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse update response: {}", e))
        })?;
        Ok(rows.len())
    }

    /// Deletes the rows matching `query`; returns how many were removed.
    pub async fn delete(&self, query: &TableQuery, token: Option<&str>) -> Result<usize, AppError> {
        let url = self.table_url(query.table());
        tracing::info!("Deleting from {} {:?}", query.table(), query.params());

        let request = self
            .authorize(self.client.delete(&url), token)
            .header("Prefer", "return=representation")
            .query(query.params());
        let response = self.send(request, "Platform delete").await?;

        let rows: Vec<Value> = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse delete response: {}", e))
        })?;
        Ok(rows.len())
    }
}

fn is_platform_failure(err: &AppError) -> bool {
    matches!(err, AppError::ExternalApiError(_))
}

/// Pulls a human-readable message out of a platform error body.
pub(crate) fn extract_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<Value>(body) {
        for key in ["message", "msg", "error_description", "error"] {
            if let Some(msg) = value.get(key).and_then(|v| v.as_str()) {
                return msg.to_string();
            }
        }
    }
    body.trim().to_string()
}

/// Maps a non-success, non-5xx platform response to an `AppError`.
pub(crate) fn error_for_status(status: StatusCode, body: &str, operation: &str) -> AppError {
    let message = extract_message(body);
    tracing::warn!("{} returned {}: {}", operation, status, message);

    match status {
        StatusCode::UNAUTHORIZED => {
            AppError::Unauthorized("Sessão inválida ou expirada".to_string())
        }
        StatusCode::FORBIDDEN => AppError::Forbidden("Operação não permitida".to_string()),
        StatusCode::NOT_FOUND => AppError::NotFound(message),
        StatusCode::CONFLICT => AppError::Conflict(message),
        s if s.is_client_error() => AppError::BadRequest(message),
        s => AppError::ExternalApiError(format!("{} returned {}: {}", operation, s, message)),
    }
}
