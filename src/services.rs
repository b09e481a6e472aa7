use crate::errors::AppError;
use crate::platform_client::{error_for_status, extract_message, PlatformClient};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

/// An authenticated platform user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,
    #[serde(default)]
    pub email: Option<String>,
}

/// Tokens issued by a successful password sign-in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
    pub user: AuthUser,
}

/// Outcome of a sign-up: the new user and, when e-mail confirmation is
/// disabled on the platform, an immediate session.
#[derive(Debug, Clone, Serialize)]
pub struct SignUpOutcome {
    pub user: AuthUser,
    pub session: Option<AuthSession>,
}

/// Translates the platform's auth error messages for end users.
pub fn translate_auth_error(message: &str) -> String {
    match message {
        "Email not confirmed" => "Por favor, confirme seu email antes de fazer login.".to_string(),
        "Invalid login credentials" => "Email ou senha incorretos.".to_string(),
        "User already registered" => "Este email já está cadastrado.".to_string(),
        other => other.to_string(),
    }
}

/// Client for the platform's session/auth endpoints.
#[derive(Clone)]
pub struct AuthService {
    platform: PlatformClient,
}

impl AuthService {
    pub fn new(platform: PlatformClient) -> Self {
        Self { platform }
    }

    fn auth_error(status: StatusCode, body: &str, operation: &str) -> AppError {
        let message = translate_auth_error(&extract_message(body));
        tracing::warn!("{} returned {}: {}", operation, status, message);
        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                AppError::Unauthorized(message)
            }
            StatusCode::UNPROCESSABLE_ENTITY | StatusCode::CONFLICT => {
                AppError::BadRequest(message)
            }
            s => error_for_status(s, body, operation),
        }
    }

    /// Password sign-in.
    ///
    /// # Returns
    ///
    /// * `Result<AuthSession, AppError>` - Access token and user, or an
    ///   `Unauthorized` error carrying a pt-BR message.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AppError> {
        let url = format!("{}/auth/v1/token", self.platform.base_url());
        tracing::info!("Signing in {}", email);

        let request = self
            .platform
            .authorize(self.platform.http().post(&url), None)
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));
        let response = self.platform.send_raw(request, "Auth sign-in").await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::auth_error(status, &body, "Auth sign-in"));
        }

        response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse sign-in response: {}", e))
        })
    }

    /// Registers a new user.
    ///
    /// The platform answers either with a bare user object (confirmation
    /// pending) or with a session that embeds the user.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        redirect_to: &str,
    ) -> Result<SignUpOutcome, AppError> {
        let url = format!("{}/auth/v1/signup", self.platform.base_url());
        tracing::info!("Signing up {}", email);

        let request = self
            .platform
            .authorize(self.platform.http().post(&url), None)
            .query(&[("redirect_to", redirect_to)])
            .json(&json!({ "email": email, "password": password }));
        let response = self.platform.send_raw(request, "Auth sign-up").await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::auth_error(status, &body, "Auth sign-up"));
        }

        let body: Value = response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse sign-up response: {}", e))
        })?;

        parse_sign_up(body)
    }

    /// Resolves an access token to its user.
    pub async fn get_user(&self, access_token: &str) -> Result<AuthUser, AppError> {
        let url = format!("{}/auth/v1/user", self.platform.base_url());

        let request = self
            .platform
            .authorize(self.platform.http().get(&url), Some(access_token));
        let response = self.platform.send_raw(request, "Auth user lookup").await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!("Token rejected by platform ({}): {}", status, extract_message(&body));
            return Err(AppError::Unauthorized(
                "Sessão inválida ou expirada".to_string(),
            ));
        }

        response.json().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to parse user response: {}", e))
        })
    }
}

fn parse_sign_up(body: Value) -> Result<SignUpOutcome, AppError> {
    if body.get("access_token").is_some() {
        let session: AuthSession = serde_json::from_value(body).map_err(|e| {
            AppError::ExternalApiError(format!("Unexpected sign-up session: {}", e))
        })?;
        return Ok(SignUpOutcome {
            user: session.user.clone(),
            session: Some(session),
        });
    }

    let user_value = body.get("user").cloned().unwrap_or(body);
    let user: AuthUser = serde_json::from_value(user_value).map_err(|e| {
        tracing::warn!("Sign-up response missing user: {}", e);
        AppError::ExternalApiError("Sign-up response missing 'id' field".to_string())
    })?;

    Ok(SignUpOutcome {
        user,
        session: None,
    })
}

/// Client for the platform's object storage.
#[derive(Clone)]
pub struct StorageService {
    platform: PlatformClient,
    bucket: String,
}

impl StorageService {
    pub fn new(platform: PlatformClient, bucket: String) -> Self {
        Self { platform, bucket }
    }

    /// Publicly resolvable URL of an object key.
    pub fn public_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.platform.base_url(),
            self.bucket,
            key
        )
    }

    /// Uploads (or overwrites) an object and returns its public URL.
    ///
    /// # Arguments
    ///
    /// * `key` - Object key inside the bucket.
    /// * `bytes` - Already-compressed image bytes.
    /// * `content_type` - MIME type stored with the object.
    /// * `token` - The uploader's access token.
    pub async fn upload(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        token: &str,
    ) -> Result<String, AppError> {
        let url = format!(
            "{}/storage/v1/object/{}/{}",
            self.platform.base_url(),
            self.bucket,
            key
        );
        tracing::info!("Uploading {} bytes to {}/{}", bytes.len(), self.bucket, key);

        let request = self
            .platform
            .authorize(self.platform.http().post(&url), Some(token))
            .header("Content-Type", content_type)
            .header("x-upsert", "true")
            .body(bytes);
        self.platform.send(request, "Storage upload").await?;

        Ok(self.public_url(key))
    }
}
