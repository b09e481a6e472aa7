//! Sign-in and sign-up workflows.

use crate::directory::DirectoryService;
use crate::errors::AppError;
use crate::models::{Credentials, NewProfile};
use crate::services::{AuthService, AuthSession, SignUpOutcome};
use regex::Regex;

/// Shortest password the platform accepts.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Validates e-mail shape before anything is sent to the platform.
pub fn is_valid_email(email: &str) -> bool {
    if email.len() < 5 || !email.contains('@') || !email.contains('.') {
        return false;
    }

    // Simplified RFC 5322: local@domain.tld
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
    )
    .map(|re| re.is_match(email))
    .unwrap_or(false)
}

/// The username given to a new profile: the e-mail local part.
pub fn username_from_email(email: &str) -> String {
    email.split('@').next().unwrap_or_default().to_string()
}

fn check_credentials(credentials: &Credentials) -> Result<(String, &str), AppError> {
    let email = credentials.email.trim().to_lowercase();
    if !is_valid_email(&email) {
        tracing::warn!("Rejected malformed e-mail at sign-in/up");
        return Err(AppError::BadRequest("Email inválido".to_string()));
    }
    if credentials.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "A senha deve ter pelo menos {} caracteres",
            MIN_PASSWORD_LEN
        )));
    }
    Ok((email, credentials.password.as_str()))
}

/// Password sign-in.
pub async fn sign_in(auth: &AuthService, credentials: &Credentials) -> Result<AuthSession, AppError> {
    let (email, password) = check_credentials(credentials)?;
    let session = auth.sign_in(&email, password).await?;
    tracing::info!("User {} signed in", session.user.id);
    Ok(session)
}

/// Registers the user and creates their profile.
///
/// A failed profile insert is logged and otherwise ignored: the account
/// already exists at that point and the user can still confirm and sign in.
pub async fn sign_up(
    auth: &AuthService,
    directory: &DirectoryService,
    credentials: &Credentials,
    redirect_to: &str,
) -> Result<SignUpOutcome, AppError> {
    let (email, password) = check_credentials(credentials)?;
    let outcome = auth.sign_up(&email, password, redirect_to).await?;

    let profile = NewProfile {
        id: outcome.user.id,
        username: username_from_email(&email),
        is_premium_user: false,
    };
    let token = outcome.session.as_ref().map(|s| s.access_token.as_str());
    match directory.create_profile(&profile, token).await {
        Ok(_) => tracing::info!("Created profile {} for {}", profile.username, profile.id),
        Err(e) => tracing::error!("Failed to create profile for {}: {}", profile.id, e),
    }

    Ok(outcome)
}
