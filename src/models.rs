use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::ratings::{lenient_records, RatingRecord};

// ============ Enumerations ============

/// Pricing model of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceType {
    Free,
    Paid,
    Freemium,
}

impl PriceType {
    /// Parses the platform's lowercase identifier.
    pub fn from_id(id: &str) -> Option<Self> {
        match id.trim().to_lowercase().as_str() {
            "free" => Some(Self::Free),
            "paid" => Some(Self::Paid),
            "freemium" => Some(Self::Freemium),
            _ => None,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Paid => "paid",
            Self::Freemium => "freemium",
        }
    }

    /// pt-BR label shown in listings.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Free => "Gratuito",
            Self::Paid => "Pago",
            Self::Freemium => "Freemium",
        }
    }
}

/// Review workflow state of a submitted agent or agency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

// ============ Platform Records ============

/// Public author information embedded through `profiles(...)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRef {
    pub username: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// A listed AI agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Unique identifier.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Logo URL in object storage.
    #[serde(default)]
    pub image_url: Option<String>,
    /// Cover image URL in object storage.
    #[serde(default)]
    pub cover_url: Option<String>,
    /// Product website.
    pub website_url: String,
    /// Pricing model.
    pub price_type: PriceType,
    /// Starting price in BRL; always `None` for free agents.
    #[serde(default)]
    pub starting_price: Option<f64>,
    /// Category identifier (see `catalog::CATEGORIES`).
    pub category: String,
    /// Whether the agent is featured as premium.
    #[serde(default)]
    pub is_premium: bool,
    /// Review workflow state.
    #[serde(default)]
    pub verification_status: VerificationStatus,
    /// Owner of the listing.
    pub user_id: Uuid,
    /// Timestamp of creation.
    pub created_at: DateTime<Utc>,
    /// Embedded author profile, when selected.
    #[serde(default)]
    pub profiles: Option<ProfileRef>,
    /// Embedded rating records, when selected. Consumed by aggregation and
    /// never echoed back to callers.
    #[serde(default, deserialize_with = "lenient_records", skip_serializing)]
    pub reviews: Vec<RatingRecord>,
    /// Any other columns.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A listed service-provider organization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agency {
    /// Unique identifier.
    pub id: Uuid,
    /// Trade name.
    pub name: String,
    /// Free-text description.
    pub description: String,
    /// Logo URL in object storage.
    #[serde(default)]
    pub logo_url: Option<String>,
    /// Cover image URL in object storage.
    #[serde(default)]
    pub cover_url: Option<String>,
    /// Company website.
    pub website_url: String,
    /// City / state as typed by the owner.
    pub location: String,
    /// Specialty labels (see `catalog::SPECIALTIES`).
    #[serde(default)]
    pub specialties: Vec<String>,
    /// Normalized 14-digit CNPJ.
    pub cnpj: String,
    /// Number of clients served.
    #[serde(default)]
    pub total_clients: i64,
    /// Owner of the listing.
    pub user_id: Uuid,
    /// Review workflow state.
    #[serde(default)]
    pub verification_status: VerificationStatus,
    /// Timestamp of creation.
    pub created_at: DateTime<Utc>,
    /// Embedded owner profile, when selected.
    #[serde(default)]
    pub profiles: Option<ProfileRef>,
    /// Any other columns.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Agency {
    pub fn is_verified(&self) -> bool {
        self.verification_status == VerificationStatus::Approved
    }
}

/// A review row from `reviews` or `agency_reviews`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Review {
    pub id: Uuid,
    pub rating: f64,
    #[serde(default)]
    pub comment: Option<String>,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub profiles: Option<ProfileRef>,
    /// `agent_id` or `agency_id` plus anything else selected.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A user profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub id: Uuid,
    pub username: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_premium_user: bool,
}

// ============ Insert / Update Payloads ============

#[derive(Debug, Clone, Serialize)]
pub struct NewAgent {
    pub name: String,
    pub description: String,
    pub image_url: Option<String>,
    pub cover_url: Option<String>,
    pub website_url: String,
    pub price_type: PriceType,
    pub starting_price: Option<f64>,
    pub category: String,
    pub user_id: Uuid,
    pub verification_status: VerificationStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct AgentChanges {
    pub name: String,
    pub description: String,
    pub image_url: Option<String>,
    pub cover_url: Option<String>,
    pub website_url: String,
    pub price_type: PriceType,
    pub starting_price: Option<f64>,
    pub category: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewAgency {
    pub name: String,
    pub cnpj: String,
    pub description: String,
    pub logo_url: Option<String>,
    pub cover_url: Option<String>,
    pub website_url: String,
    pub location: String,
    pub specialties: Vec<String>,
    pub user_id: Uuid,
    pub verification_status: VerificationStatus,
}

/// Edit payload for an agency. The CNPJ is fixed at registration.
#[derive(Debug, Clone, Serialize)]
pub struct AgencyChanges {
    pub name: String,
    pub description: String,
    pub logo_url: Option<String>,
    pub cover_url: Option<String>,
    pub website_url: String,
    pub location: String,
    pub specialties: Vec<String>,
}

/// Insert payload for both review tables; exactly one target id is set.
#[derive(Debug, Clone, Serialize)]
pub struct NewReview {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agency_id: Option<Uuid>,
    pub user_id: Uuid,
    pub rating: i64,
    pub comment: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewProfile {
    pub id: Uuid,
    pub username: String,
    pub is_premium_user: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerificationChange {
    pub verification_status: VerificationStatus,
    pub rejected_at: Option<DateTime<Utc>>,
    pub rejected_reason: Option<String>,
}

// ============ API Request Models ============

/// Body of `POST /api/v1/agents` and `PATCH /api/v1/agents/:id`.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentForm {
    pub name: String,
    pub description: String,
    pub website_url: String,
    pub category: String,
    pub price_type: String,
    /// Accepts `49.90`, `"49,90"` or `"49.90"`.
    #[serde(default)]
    pub starting_price: Option<Value>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub cover_url: Option<String>,
}

/// Body of `POST /api/v1/agencies` and `PATCH /api/v1/agencies/:id`.
#[derive(Debug, Clone, Deserialize)]
pub struct AgencyForm {
    pub name: String,
    pub cnpj: String,
    pub description: String,
    pub website_url: String,
    pub location: String,
    #[serde(default)]
    pub specialties: Vec<String>,
    #[serde(default)]
    pub logo_url: Option<String>,
    #[serde(default)]
    pub cover_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReviewForm {
    pub rating: i64,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CnpjRequest {
    pub cnpj: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CnpjResponse {
    pub valid: bool,
    pub normalized: String,
    pub formatted: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_agent_with_embedded_reviews() {
        let agent: Agent = serde_json::from_value(json!({
            "id": "6f1c9a1e-7a55-4d2b-9a8e-3b1f2b1c0a01",
            "name": "Atendente IA",
            "description": "Responde clientes no WhatsApp",
            "image_url": null,
            "website_url": "https://example.com",
            "price_type": "freemium",
            "starting_price": 49.9,
            "category": "chatbots",
            "is_premium": false,
            "verification_status": "approved",
            "user_id": "0b6f7d7e-1111-4c3a-9f1d-2a2a2a2a2a2a",
            "created_at": "2024-05-01T12:00:00Z",
            "profiles": {"username": "ana"},
            "reviews": [{"rating": 5}, {"rating": 4}],
            "slug": "atendente-ia"
        }))
        .unwrap();

        assert_eq!(agent.price_type, PriceType::Freemium);
        assert_eq!(agent.reviews.len(), 2);
        assert_eq!(agent.extra.get("slug"), Some(&json!("atendente-ia")));

        let out = serde_json::to_value(&agent).unwrap();
        assert!(out.get("reviews").is_none());
        assert_eq!(out["slug"], json!("atendente-ia"));
    }

    #[test]
    fn test_price_type_ids() {
        assert_eq!(PriceType::from_id("FREE"), Some(PriceType::Free));
        assert_eq!(PriceType::from_id("monthly"), None);
        assert_eq!(PriceType::Paid.label(), "Pago");
    }

    #[test]
    fn test_new_review_targets_one_table() {
        let review = NewReview {
            agent_id: None,
            agency_id: Some(Uuid::nil()),
            user_id: Uuid::nil(),
            rating: 5,
            comment: String::new(),
        };
        let v = serde_json::to_value(&review).unwrap();
        assert!(v.get("agent_id").is_none());
        assert!(v.get("agency_id").is_some());
    }
}
