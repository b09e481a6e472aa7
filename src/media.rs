//! Upload policy for agent and agency images.
//!
//! Images are compressed by the caller before upload; this module enforces
//! the size ceiling per kind and derives the object key.

use crate::errors::AppError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

const MB: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UploadKind {
    AgentLogo,
    AgentCover,
    AgencyLogo,
    AgencyCover,
}

impl UploadKind {
    /// Parses the `/uploads/:kind` path segment.
    pub fn from_path(segment: &str) -> Option<Self> {
        match segment {
            "agent-logo" => Some(Self::AgentLogo),
            "agent-cover" => Some(Self::AgentCover),
            "agency-logo" => Some(Self::AgencyLogo),
            "agency-cover" => Some(Self::AgencyCover),
            _ => None,
        }
    }

    fn prefix(&self) -> &'static str {
        match self {
            Self::AgentLogo => "agent-logos",
            Self::AgentCover => "agent-covers",
            Self::AgencyLogo => "agency-logos",
            Self::AgencyCover => "agency-covers",
        }
    }

    fn is_logo(&self) -> bool {
        matches!(self, Self::AgentLogo | Self::AgencyLogo)
    }

    /// Largest accepted upload: 0.5 MB for logos, 1 MB for covers.
    pub fn max_bytes(&self) -> usize {
        if self.is_logo() {
            MB / 2
        } else {
            MB
        }
    }

    /// Longest side the client should compress to before uploading.
    pub fn max_dimension(&self) -> u32 {
        if self.is_logo() {
            400
        } else {
            1200
        }
    }
}

/// Rejects empty, oversized or non-image uploads.
pub fn validate_upload(
    kind: UploadKind,
    content_type: Option<&str>,
    bytes: &[u8],
) -> Result<(), AppError> {
    match content_type {
        Some(ct) if ct.starts_with("image/") => {}
        _ => {
            return Err(AppError::BadRequest(
                "Por favor, selecione apenas arquivos de imagem".to_string(),
            ))
        }
    }

    if bytes.is_empty() {
        return Err(AppError::BadRequest("Arquivo de imagem vazio".to_string()));
    }

    if bytes.len() > kind.max_bytes() {
        tracing::warn!(
            "Rejected {:?} upload of {} bytes (max {})",
            kind,
            bytes.len(),
            kind.max_bytes()
        );
        return Err(AppError::BadRequest(format!(
            "Imagem muito grande: máximo de {} KB após compressão ({}px)",
            kind.max_bytes() / 1024,
            kind.max_dimension()
        )));
    }

    Ok(())
}

/// `<prefix>/<user>/<unix millis>-<content digest>-<logo|cover>.webp`
pub fn object_key(kind: UploadKind, user_id: Uuid, bytes: &[u8], now: DateTime<Utc>) -> String {
    let digest = hex::encode(Sha256::digest(bytes));
    let suffix = if kind.is_logo() { "logo" } else { "cover" };
    format!(
        "{}/{}/{}-{}-{}.webp",
        kind.prefix(),
        user_id,
        now.timestamp_millis(),
        &digest[..12],
        suffix
    )
}
