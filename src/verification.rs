//! Reviewer workflow: premium users approve or reject pending listings.

use crate::directory::{DirectoryService, ListingKind};
use crate::errors::AppError;
use crate::models::{Agency, Agent, VerificationChange, VerificationStatus};
use crate::session::Actor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Approve,
    Reject,
}

/// Body of `POST /api/v1/verifications/:kind/:id`.
#[derive(Debug, Clone, Deserialize)]
pub struct VerificationRequest {
    pub action: Decision,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PendingQueue {
    pub agents: Vec<Agent>,
    pub agencies: Vec<Agency>,
}

/// Turns a reviewer decision into the column update.
pub fn decide(request: &VerificationRequest, now: DateTime<Utc>) -> Result<VerificationChange, AppError> {
    match request.action {
        Decision::Approve => Ok(VerificationChange {
            verification_status: VerificationStatus::Approved,
            rejected_at: None,
            rejected_reason: None,
        }),
        Decision::Reject => {
            let reason = request
                .reason
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .ok_or_else(|| {
                    AppError::BadRequest("Informe o motivo da rejeição".to_string())
                })?;
            Ok(VerificationChange {
                verification_status: VerificationStatus::Rejected,
                rejected_at: Some(now),
                rejected_reason: Some(reason.to_string()),
            })
        }
    }
}

/// Fails unless the actor's profile is premium.
pub async fn require_reviewer(directory: &DirectoryService, actor: &Actor) -> Result<(), AppError> {
    let profile = directory.profile(actor.id, Some(&actor.access_token)).await?;
    match profile {
        Some(p) if p.is_premium_user => Ok(()),
        _ => {
            tracing::warn!("Non-premium user {} tried to access verifications", actor.id);
            Err(AppError::Forbidden(
                "Apenas usuários premium podem acessar as verificações".to_string(),
            ))
        }
    }
}

pub async fn pending_queue(directory: &DirectoryService, actor: &Actor) -> Result<PendingQueue, AppError> {
    require_reviewer(directory, actor).await?;
    let (agents, agencies) = tokio::try_join!(
        directory.pending_agents(&actor.access_token),
        directory.pending_agencies(&actor.access_token),
    )?;
    Ok(PendingQueue { agents, agencies })
}

pub async fn apply_decision(
    directory: &DirectoryService,
    actor: &Actor,
    kind: ListingKind,
    id: Uuid,
    request: &VerificationRequest,
) -> Result<VerificationStatus, AppError> {
    require_reviewer(directory, actor).await?;
    let change = decide(request, Utc::now())?;

    if !directory
        .set_verification(kind, id, &change, &actor.access_token)
        .await?
    {
        return Err(AppError::NotFound(format!("{} {} não encontrado", kind.table(), id)));
    }

    tracing::info!(
        "{} {} marked {} by {}",
        kind.table(),
        id,
        change.verification_status.as_str(),
        actor.id
    );
    Ok(change.verification_status)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approve_clears_rejection() {
        let req = VerificationRequest { action: Decision::Approve, reason: None };
        let change = decide(&req, Utc::now()).unwrap();
        assert_eq!(change.verification_status, VerificationStatus::Approved);
        assert!(change.rejected_at.is_none());
        assert!(change.rejected_reason.is_none());
    }

    #[test]
    fn test_reject_requires_reason() {
        let now = Utc::now();
        let blank = VerificationRequest { action: Decision::Reject, reason: Some("  ".to_string()) };
        assert!(matches!(decide(&blank, now), Err(AppError::BadRequest(_))));

        let req = VerificationRequest {
            action: Decision::Reject,
            reason: Some("Site fora do ar".to_string()),
        };
        let change = decide(&req, now).unwrap();
        assert_eq!(change.verification_status, VerificationStatus::Rejected);
        assert_eq!(change.rejected_at, Some(now));
        assert_eq!(change.rejected_reason.as_deref(), Some("Site fora do ar"));
    }

    #[test]
    fn test_request_parsing() {
        let req: VerificationRequest = serde_json::from_str(r#"{"action":"approve"}"#).unwrap();
        assert_eq!(req.action, Decision::Approve);
        assert!(serde_json::from_str::<VerificationRequest>(r#"{"action":"maybe"}"#).is_err());
    }
}
