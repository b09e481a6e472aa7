//! The signed-in user's page: profile, own listings and own reviews.

use crate::catalog::AgentCard;
use crate::directory::DirectoryService;
use crate::errors::{AppError, ResultExt};
use crate::models::{Agency, Profile};
use crate::session::Actor;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct ProfilePage {
    pub profile: Option<Profile>,
    pub email: Option<String>,
    pub agents: Vec<AgentCard>,
    pub agencies: Vec<Agency>,
    /// Reviews from both review tables, newest first.
    pub reviews: Vec<Value>,
}

pub async fn load(directory: &DirectoryService, actor: &Actor) -> Result<ProfilePage, AppError> {
    let token = actor.access_token.as_str();
    let (profile, agents, agencies, reviews) = tokio::try_join!(
        directory.profile(actor.id, Some(token)),
        directory.agents_by_owner(actor.id, token),
        directory.agencies_by_owner(actor.id, token),
        directory.reviews_by_author(actor.id, token),
    )
    .context("Failed to load profile page")?;

    Ok(ProfilePage {
        profile,
        email: actor.email.clone(),
        agents,
        agencies,
        reviews,
    })
}
