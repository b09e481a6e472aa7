use crate::catalog::AgentCard;
use crate::errors::AppError;
use crate::models::*;
use crate::platform_client::{PlatformClient, TableQuery};
use crate::ratings::{aggregate_ratings, rating_records, AggregateRating};
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

const AGENT_WITH_STATS: &str = "*,profiles(username,avatar_url),reviews(rating)";
const WITH_AUTHOR: &str = "*,profiles(username,avatar_url)";

/// The entity a review is about; picks the review table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewTarget {
    Agent(Uuid),
    Agency(Uuid),
}

impl ReviewTarget {
    pub fn table(&self) -> &'static str {
        match self {
            ReviewTarget::Agent(_) => "reviews",
            ReviewTarget::Agency(_) => "agency_reviews",
        }
    }

    pub fn column(&self) -> &'static str {
        match self {
            ReviewTarget::Agent(_) => "agent_id",
            ReviewTarget::Agency(_) => "agency_id",
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            ReviewTarget::Agent(id) | ReviewTarget::Agency(id) => *id,
        }
    }
}

/// Listing kind for owner-scoped and review-workflow operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingKind {
    Agent,
    Agency,
}

impl ListingKind {
    pub fn from_path(segment: &str) -> Option<Self> {
        match segment {
            "agent" | "agents" => Some(Self::Agent),
            "agency" | "agencies" => Some(Self::Agency),
            _ => None,
        }
    }

    pub fn table(&self) -> &'static str {
        match self {
            ListingKind::Agent => "agents",
            ListingKind::Agency => "agencies",
        }
    }
}

/// Reads and writes directory records on the hosted platform.
///
/// Reads that feed a score always go through [`aggregate_ratings`].
#[derive(Clone)]
pub struct DirectoryService {
    platform: PlatformClient,
}

impl DirectoryService {
    pub fn new(platform: PlatformClient) -> Self {
        Self { platform }
    }

    // ============ Agents ============

    /// Approved agents with their ratings, in platform order.
    pub async fn approved_agent_cards(&self) -> Result<Vec<AgentCard>, AppError> {
        let query = TableQuery::from("agents")
            .select(AGENT_WITH_STATS)
            .eq("verification_status", VerificationStatus::Approved.as_str());
        let agents: Vec<Agent> = self.platform.select(&query, None).await?;
        Ok(agents.into_iter().map(AgentCard::from_agent).collect())
    }

    /// The newest approved agents, for the home page.
    pub async fn newest_agent_cards(&self, limit: usize) -> Result<Vec<AgentCard>, AppError> {
        let query = TableQuery::from("agents")
            .select(AGENT_WITH_STATS)
            .eq("verification_status", VerificationStatus::Approved.as_str())
            .order("created_at", false)
            .limit(limit);
        let agents: Vec<Agent> = self.platform.select(&query, None).await?;
        Ok(agents.into_iter().map(AgentCard::from_agent).collect())
    }

    /// Agents with ratings for the given ids, in the order requested.
    pub async fn agent_cards_by_ids(&self, ids: &[Uuid]) -> Result<Vec<AgentCard>, AppError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = TableQuery::from("agents")
            .select(AGENT_WITH_STATS)
            .in_list("id", ids);
        let agents: Vec<Agent> = self.platform.select(&query, None).await?;

        let mut cards: Vec<AgentCard> = agents.into_iter().map(AgentCard::from_agent).collect();
        cards.sort_by_key(|c| ids.iter().position(|id| *id == c.agent.id));
        Ok(cards)
    }

    /// One agent; `token` lets an owner read their own unapproved rows.
    pub async fn agent(&self, id: Uuid, token: Option<&str>) -> Result<Option<Agent>, AppError> {
        let query = TableQuery::from("agents").select(WITH_AUTHOR).eq("id", id);
        self.platform.select_optional(&query, token).await
    }

    pub async fn agents_by_owner(&self, user: Uuid, token: &str) -> Result<Vec<AgentCard>, AppError> {
        let query = TableQuery::from("agents")
            .select(AGENT_WITH_STATS)
            .eq("user_id", user)
            .order("created_at", false);
        let agents: Vec<Agent> = self.platform.select(&query, Some(token)).await?;
        Ok(agents.into_iter().map(AgentCard::from_agent).collect())
    }

    pub async fn insert_agent(&self, agent: &NewAgent, token: &str) -> Result<Agent, AppError> {
        self.platform.insert("agents", agent, Some(token)).await
    }

    // ============ Agencies ============

    /// Approved agencies, most clients first.
    pub async fn approved_agencies(&self) -> Result<Vec<Agency>, AppError> {
        let query = TableQuery::from("agencies")
            .select("*")
            .eq("verification_status", VerificationStatus::Approved.as_str())
            .order("total_clients", false);
        self.platform.select(&query, None).await
    }

    pub async fn agency(&self, id: Uuid, token: Option<&str>) -> Result<Option<Agency>, AppError> {
        let query = TableQuery::from("agencies").select("*").eq("id", id);
        self.platform.select_optional(&query, token).await
    }

    /// Whether any agency is registered under this normalized CNPJ.
    pub async fn agency_id_by_cnpj(&self, cnpj: &str) -> Result<Option<Uuid>, AppError> {
        let query = TableQuery::from("agencies").select("id").eq("cnpj", cnpj);
        let row: Option<Value> = self.platform.select_optional(&query, None).await?;
        Ok(row
            .and_then(|r| r.get("id").and_then(|v| v.as_str()).map(str::to_string))
            .and_then(|id| Uuid::parse_str(&id).ok()))
    }

    pub async fn agencies_by_owner(&self, user: Uuid, token: &str) -> Result<Vec<Agency>, AppError> {
        let query = TableQuery::from("agencies")
            .select("*")
            .eq("user_id", user)
            .order("created_at", false);
        self.platform.select(&query, Some(token)).await
    }

    pub async fn insert_agency(&self, agency: &NewAgency, token: &str) -> Result<Agency, AppError> {
        self.platform.insert("agencies", agency, Some(token)).await
    }

    // ============ Owner-scoped writes ============

    /// Updates a listing only if `owner` owns it; returns whether a row changed.
    pub async fn update_owned<B: Serialize>(
        &self,
        kind: ListingKind,
        id: Uuid,
        owner: Uuid,
        changes: &B,
        token: &str,
    ) -> Result<bool, AppError> {
        let query = TableQuery::from(kind.table()).eq("id", id).eq("user_id", owner);
        Ok(self.platform.update(&query, changes, Some(token)).await? > 0)
    }

    pub async fn delete_owned(
        &self,
        kind: ListingKind,
        id: Uuid,
        owner: Uuid,
        token: &str,
    ) -> Result<bool, AppError> {
        let query = TableQuery::from(kind.table()).eq("id", id).eq("user_id", owner);
        Ok(self.platform.delete(&query, Some(token)).await? > 0)
    }

    // ============ Reviews ============

    /// Aggregate rating of one agent or agency. Rows are parsed with the
    /// same rules as the ratings embedded in listings.
    pub async fn rating(&self, target: ReviewTarget) -> Result<AggregateRating, AppError> {
        let query = TableQuery::from(target.table())
            .select("rating")
            .eq(target.column(), target.id());
        let rows: Vec<Value> = self.platform.select(&query, None).await?;
        Ok(aggregate_ratings(&rating_records(rows)))
    }

    /// Reviews of one agent or agency, newest first.
    pub async fn reviews(&self, target: ReviewTarget) -> Result<Vec<Review>, AppError> {
        let query = TableQuery::from(target.table())
            .select(WITH_AUTHOR)
            .eq(target.column(), target.id())
            .order("created_at", false);
        self.platform.select(&query, None).await
    }

    pub async fn insert_review(
        &self,
        target: ReviewTarget,
        review: &NewReview,
        token: &str,
    ) -> Result<Review, AppError> {
        self.platform.insert(target.table(), review, Some(token)).await
    }

    /// Reviews written by `user` in both review tables, each row embedding
    /// the reviewed entity under `agent` or `agency`.
    pub async fn reviews_by_author(&self, user: Uuid, token: &str) -> Result<Vec<Value>, AppError> {
        let agent_query = TableQuery::from("reviews")
            .select("id,rating,comment,created_at,agent:agents(id,name,image_url)")
            .eq("user_id", user)
            .order("created_at", false);
        let agency_query = TableQuery::from("agency_reviews")
            .select("id,rating,comment,created_at,agency:agencies(id,name,logo_url)")
            .eq("user_id", user)
            .order("created_at", false);

        let (agent_reviews, agency_reviews) = tokio::try_join!(
            self.platform.select::<Value>(&agent_query, Some(token)),
            self.platform.select::<Value>(&agency_query, Some(token)),
        )?;

        let mut all: Vec<Value> = agent_reviews.into_iter().chain(agency_reviews).collect();
        // RFC 3339 timestamps from the same platform sort lexicographically
        all.sort_by(|a, b| {
            let a = a.get("created_at").and_then(Value::as_str).unwrap_or("");
            let b = b.get("created_at").and_then(Value::as_str).unwrap_or("");
            b.cmp(a)
        });
        Ok(all)
    }

    // ============ Profiles & verification ============

    pub async fn profile(&self, user: Uuid, token: Option<&str>) -> Result<Option<Profile>, AppError> {
        let query = TableQuery::from("profiles").select("*").eq("id", user);
        self.platform.select_optional(&query, token).await
    }

    pub async fn create_profile(&self, profile: &NewProfile, token: Option<&str>) -> Result<Profile, AppError> {
        self.platform.insert("profiles", profile, token).await
    }

    pub async fn pending_agents(&self, token: &str) -> Result<Vec<Agent>, AppError> {
        let query = TableQuery::from("agents")
            .select(WITH_AUTHOR)
            .eq("verification_status", VerificationStatus::Pending.as_str())
            .order("created_at", false);
        self.platform.select(&query, Some(token)).await
    }

    pub async fn pending_agencies(&self, token: &str) -> Result<Vec<Agency>, AppError> {
        let query = TableQuery::from("agencies")
            .select(WITH_AUTHOR)
            .eq("verification_status", VerificationStatus::Pending.as_str())
            .order("created_at", false);
        self.platform.select(&query, Some(token)).await
    }

    pub async fn set_verification(
        &self,
        kind: ListingKind,
        id: Uuid,
        change: &VerificationChange,
        token: &str,
    ) -> Result<bool, AppError> {
        let query = TableQuery::from(kind.table()).eq("id", id);
        Ok(self.platform.update(&query, change, Some(token)).await? > 0)
    }
}
