use crate::accounts;
use crate::catalog::{
    filter_ranking, rank_agents, split_csv, AgencyFilter, AgencyQuery, AgentCard, AgentFilter,
    MarketplaceQuery, RankingQuery, CATEGORIES, SPECIALTIES,
};
use crate::cnpj::{format_cnpj, normalize, validate_company_id};
use crate::compare::{ComparisonList, ComparisonStore};
use crate::config::Config;
use crate::directory::{DirectoryService, ListingKind, ReviewTarget};
use crate::display::{format_average, format_count, format_distance_to_now, format_price};
use crate::errors::AppError;
use crate::media::{object_key, validate_upload, UploadKind};
use crate::models::*;
use crate::platform_client::PlatformClient;
use crate::profile::{self, ProfilePage};
use crate::ratings::AggregateRating;
use crate::seo::{PageMetadata, Seo};
use crate::services::{AuthService, AuthSession, SignUpOutcome, StorageService};
use crate::session::{Actor, SessionResolver};
use crate::submissions;
use crate::verification::{self, PendingQueue, VerificationRequest};
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use uuid::Uuid;

/// Largest request body accepted, above the biggest image upload.
pub const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Number of agents featured on the home page.
const HOME_FEATURED: usize = 4;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Table reads and writes.
    pub directory: DirectoryService,
    /// Sign-in / sign-up.
    pub auth: AuthService,
    /// Logo and cover uploads.
    pub storage: StorageService,
    /// Bearer token -> caller, memoized for `session_cache_ttl_secs`.
    pub sessions: SessionResolver,
    /// Per-user comparison selections.
    pub comparisons: ComparisonStore,
    /// Page metadata builder.
    pub seo: Seo,
}

impl AppState {
    /// Wires every service against the configured platform.
    pub fn new(config: Config) -> Result<Self, AppError> {
        let platform = PlatformClient::new(
            config.platform_url.clone(),
            config.platform_anon_key.clone(),
        )?;
        let auth = AuthService::new(platform.clone());

        Ok(Self {
            directory: DirectoryService::new(platform.clone()),
            storage: StorageService::new(platform, config.storage_bucket.clone()),
            sessions: SessionResolver::new(
                auth.clone(),
                Duration::from_secs(config.session_cache_ttl_secs),
            ),
            auth,
            comparisons: ComparisonStore::default(),
            seo: Seo::new(&config.site_url),
            config,
        })
    }
}

/// Pending and rejected listings are visible to their owner only.
fn is_visible(status: VerificationStatus, owner: Uuid, actor: Option<&Actor>) -> bool {
    status == VerificationStatus::Approved || actor.map(|a| a.id == owner).unwrap_or(false)
}

fn listing_not_found(what: &str) -> AppError {
    AppError::NotFound(format!("{} não encontrado(a)", what))
}

// ============ Views ============

#[derive(Debug, Serialize)]
pub struct AgentListing {
    pub agents: Vec<AgentCard>,
    pub total: usize,
    pub has_active_filters: bool,
    pub seo: PageMetadata,
}

#[derive(Debug, Serialize)]
pub struct AgentDetail {
    pub agent: Agent,
    pub rating: AggregateRating,
    pub rating_display: String,
    pub review_count_display: String,
    pub price_display: String,
    pub seo: PageMetadata,
}

#[derive(Debug, Serialize)]
pub struct AgencyListing {
    pub agencies: Vec<Agency>,
    pub total: usize,
    pub active_filters: usize,
    pub seo: PageMetadata,
}

#[derive(Debug, Serialize)]
pub struct AgencyDetail {
    pub agency: Agency,
    pub cnpj_display: String,
    pub rating: AggregateRating,
    pub rating_display: String,
    pub seo: PageMetadata,
}

#[derive(Debug, Serialize)]
pub struct ReviewView {
    #[serde(flatten)]
    pub review: Review,
    /// Relative pt-BR timestamp, e.g. "há 3 dias".
    pub posted: String,
}

#[derive(Debug, Serialize)]
pub struct ComparisonView {
    pub agents: Vec<String>,
    pub path: String,
    pub is_full: bool,
}

impl From<&ComparisonList> for ComparisonView {
    fn from(list: &ComparisonList) -> Self {
        Self {
            agents: list.ids().to_vec(),
            path: list.to_path(),
            is_full: list.is_full(),
        }
    }
}

fn review_views(reviews: Vec<Review>) -> Vec<ReviewView> {
    let now = Utc::now();
    reviews
        .into_iter()
        .map(|review| {
            let posted = format_distance_to_now(review.created_at, now);
            ReviewView { review, posted }
        })
        .collect()
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "agentdex-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// GET /api/v1/catalog
///
/// Category table and agency specialty labels used by the filter forms.
pub async fn get_catalog() -> Json<serde_json::Value> {
    Json(json!({
        "categories": CATEGORIES,
        "specialties": SPECIALTIES,
    }))
}

/// POST /api/v1/cnpj/validate
pub async fn validate_cnpj(Json(req): Json<CnpjRequest>) -> Json<CnpjResponse> {
    let valid = validate_company_id(&req.cnpj);
    tracing::debug!("CNPJ check: valid={}", valid);
    Json(CnpjResponse {
        valid,
        normalized: normalize(&req.cnpj),
        formatted: format_cnpj(&req.cnpj),
    })
}

// ============ Agents ============

/// GET /api/v1/home
pub async fn home(State(state): State<Arc<AppState>>) -> Result<Json<Vec<AgentCard>>, AppError> {
    tracing::info!("GET /home");
    let cards = state.directory.newest_agent_cards(HOME_FEATURED).await?;
    Ok(Json(cards))
}

/// GET /api/v1/marketplace
///
/// Approved agents with ratings, filtered by search text, categories, price
/// types and minimum rating.
pub async fn marketplace(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MarketplaceQuery>,
) -> Result<Json<AgentListing>, AppError> {
    tracing::info!("GET /marketplace - {:?}", query);

    let filter = AgentFilter::from(&query);
    let cards = state.directory.approved_agent_cards().await?;
    let seo = state.seo.marketplace(cards.len());
    let agents = filter.apply(cards);

    Ok(Json(AgentListing {
        total: agents.len(),
        has_active_filters: filter.has_active_filters(),
        agents,
        seo,
    }))
}

/// GET /api/v1/ranking
pub async fn ranking(
    State(state): State<Arc<AppState>>,
    Query(query): Query<RankingQuery>,
) -> Result<Json<AgentListing>, AppError> {
    tracing::info!("GET /ranking - {:?}", query);

    let categories: Vec<String> = split_csv(query.category.as_deref())
        .into_iter()
        .map(|c| c.to_lowercase())
        .collect();
    let cards = state.directory.approved_agent_cards().await?;
    let mut agents = filter_ranking(cards, &categories);
    rank_agents(&mut agents);

    Ok(Json(AgentListing {
        total: agents.len(),
        has_active_filters: !categories.is_empty(),
        agents,
        seo: state.seo.ranking(),
    }))
}

/// GET /api/v1/compare/:ids
///
/// Up to three agents side by side, in the order given.
pub async fn compare(
    State(state): State<Arc<AppState>>,
    Path(ids): Path<String>,
) -> Result<Json<Vec<AgentCard>>, AppError> {
    let list = ComparisonList::from_path(&ids);
    let ids: Vec<Uuid> = list
        .ids()
        .iter()
        .filter_map(|id| Uuid::parse_str(id).ok())
        .collect();
    tracing::info!("GET /compare - {} agents", ids.len());

    let cards = state.directory.agent_cards_by_ids(&ids).await?;
    Ok(Json(cards))
}

/// GET /api/v1/agents/:id
pub async fn get_agent(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<AgentDetail>, AppError> {
    tracing::info!("GET /agents/{}", id);

    let actor = state.sessions.optional(&headers).await?;
    let token = actor.as_ref().map(|a| a.access_token.as_str());
    let agent = state
        .directory
        .agent(id, token)
        .await?
        .filter(|a| is_visible(a.verification_status, a.user_id, actor.as_ref()))
        .ok_or_else(|| listing_not_found("Agente"))?;

    let rating = state.directory.rating(ReviewTarget::Agent(id)).await?;
    let price_display = match agent.price_type {
        PriceType::Free => format_price(None),
        _ => agent
            .starting_price
            .map(|p| format_price(Some(p)))
            .unwrap_or_else(|| agent.price_type.label().to_string()),
    };

    Ok(Json(AgentDetail {
        seo: state.seo.agent(&agent, &rating),
        rating_display: format_average(&rating),
        review_count_display: format_count(rating.count as u64),
        price_display,
        rating,
        agent,
    }))
}

/// POST /api/v1/agents
pub async fn create_agent(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(form): Json<AgentForm>,
) -> Result<(StatusCode, Json<Agent>), AppError> {
    let actor = state.sessions.require(&headers).await?;
    tracing::info!("POST /agents by {}", actor.id);
    let agent = submissions::submit_agent(&state.directory, &actor, &form).await?;
    Ok((StatusCode::CREATED, Json(agent)))
}

/// PATCH /api/v1/agents/:id
pub async fn update_agent(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(form): Json<AgentForm>,
) -> Result<StatusCode, AppError> {
    let actor = state.sessions.require(&headers).await?;
    tracing::info!("PATCH /agents/{} by {}", id, actor.id);
    submissions::update_agent(&state.directory, &actor, id, &form).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/agents/:id
pub async fn delete_agent(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let actor = state.sessions.require(&headers).await?;
    tracing::info!("DELETE /agents/{} by {}", id, actor.id);
    submissions::delete_listing(&state.directory, &actor, ListingKind::Agent, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/agents/:id/reviews
pub async fn list_agent_reviews(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ReviewView>>, AppError> {
    let reviews = state.directory.reviews(ReviewTarget::Agent(id)).await?;
    Ok(Json(review_views(reviews)))
}

/// POST /api/v1/agents/:id/reviews
pub async fn create_agent_review(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(form): Json<ReviewForm>,
) -> Result<(StatusCode, Json<Review>), AppError> {
    let actor = state.sessions.require(&headers).await?;
    let review =
        submissions::submit_review(&state.directory, &actor, ReviewTarget::Agent(id), &form)
            .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

// ============ Agencies ============

/// GET /api/v1/agencies
pub async fn list_agencies(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AgencyQuery>,
) -> Result<Json<AgencyListing>, AppError> {
    tracing::info!("GET /agencies - {:?}", query);

    let filter = AgencyFilter::from(&query);
    let all = state.directory.approved_agencies().await?;
    let seo = state.seo.agencies(all.len());
    let agencies = filter.apply(all);

    Ok(Json(AgencyListing {
        total: agencies.len(),
        active_filters: filter.active_filter_count(),
        agencies,
        seo,
    }))
}

/// GET /api/v1/agencies/:id
pub async fn get_agency(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<Json<AgencyDetail>, AppError> {
    tracing::info!("GET /agencies/{}", id);

    let actor = state.sessions.optional(&headers).await?;
    let token = actor.as_ref().map(|a| a.access_token.as_str());
    let agency = state
        .directory
        .agency(id, token)
        .await?
        .filter(|a| is_visible(a.verification_status, a.user_id, actor.as_ref()))
        .ok_or_else(|| listing_not_found("Agência"))?;

    let rating = state.directory.rating(ReviewTarget::Agency(id)).await?;

    Ok(Json(AgencyDetail {
        seo: state.seo.agency(&agency),
        cnpj_display: format_cnpj(&agency.cnpj),
        rating_display: format_average(&rating),
        rating,
        agency,
    }))
}

/// POST /api/v1/agencies
pub async fn create_agency(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(form): Json<AgencyForm>,
) -> Result<(StatusCode, Json<Agency>), AppError> {
    let actor = state.sessions.require(&headers).await?;
    tracing::info!("POST /agencies by {}", actor.id);
    let agency = submissions::submit_agency(&state.directory, &actor, &form).await?;
    Ok((StatusCode::CREATED, Json(agency)))
}

/// PATCH /api/v1/agencies/:id
pub async fn update_agency(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(form): Json<AgencyForm>,
) -> Result<StatusCode, AppError> {
    let actor = state.sessions.require(&headers).await?;
    tracing::info!("PATCH /agencies/{} by {}", id, actor.id);
    submissions::update_agency(&state.directory, &actor, id, &form).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/v1/agencies/:id
pub async fn delete_agency(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let actor = state.sessions.require(&headers).await?;
    tracing::info!("DELETE /agencies/{} by {}", id, actor.id);
    submissions::delete_listing(&state.directory, &actor, ListingKind::Agency, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/v1/agencies/:id/reviews
pub async fn list_agency_reviews(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<ReviewView>>, AppError> {
    let reviews = state.directory.reviews(ReviewTarget::Agency(id)).await?;
    Ok(Json(review_views(reviews)))
}

/// POST /api/v1/agencies/:id/reviews
pub async fn create_agency_review(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<Uuid>,
    Json(form): Json<ReviewForm>,
) -> Result<(StatusCode, Json<Review>), AppError> {
    let actor = state.sessions.require(&headers).await?;
    let review =
        submissions::submit_review(&state.directory, &actor, ReviewTarget::Agency(id), &form)
            .await?;
    Ok((StatusCode::CREATED, Json(review)))
}

// ============ Uploads ============

/// POST /api/v1/uploads/:kind
///
/// Raw image bytes in the body, already compressed by the client.
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(kind): Path<String>,
    body: Bytes,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let actor = state.sessions.require(&headers).await?;
    let kind = UploadKind::from_path(&kind)
        .ok_or_else(|| AppError::BadRequest(format!("Tipo de upload desconhecido: {}", kind)))?;
    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());

    validate_upload(kind, content_type, &body)?;

    let key = object_key(kind, actor.id, &body, Utc::now());
    let url = state
        .storage
        .upload(
            &key,
            body.to_vec(),
            content_type.unwrap_or("image/webp"),
            &actor.access_token,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(json!({ "key": key, "url": url }))))
}

// ============ Accounts ============

/// POST /api/v1/auth/sign-in
pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(credentials): Json<Credentials>,
) -> Result<Json<AuthSession>, AppError> {
    let session = accounts::sign_in(&state.auth, &credentials).await?;
    Ok(Json(session))
}

/// POST /api/v1/auth/sign-up
pub async fn sign_up(
    State(state): State<Arc<AppState>>,
    Json(credentials): Json<Credentials>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let SignUpOutcome { user, session } = accounts::sign_up(
        &state.auth,
        &state.directory,
        &credentials,
        &state.config.site_url,
    )
    .await?;

    let message = if session.is_some() {
        "Conta criada com sucesso."
    } else {
        "Um link de confirmação foi enviado para seu email. Por favor, verifique sua caixa de entrada e spam."
    };

    Ok((
        StatusCode::CREATED,
        Json(json!({ "user": user, "session": session, "message": message })),
    ))
}

/// GET /api/v1/me
pub async fn me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ProfilePage>, AppError> {
    let actor = state.sessions.require(&headers).await?;
    let page = profile::load(&state.directory, &actor).await?;
    Ok(Json(page))
}

// ============ Comparison selection ============

/// GET /api/v1/me/compare
pub async fn get_comparison(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<ComparisonView>, AppError> {
    let actor = state.sessions.require(&headers).await?;
    let list = state.comparisons.get(actor.id).await;
    Ok(Json(ComparisonView::from(&list)))
}

/// DELETE /api/v1/me/compare
pub async fn clear_comparison(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let actor = state.sessions.require(&headers).await?;
    state.comparisons.clear(actor.id).await;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/v1/me/compare/:agent_id
///
/// Adding a selected agent, or adding to a full selection, changes nothing
/// and reports `added: false`.
pub async fn add_to_comparison(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(agent_id): Path<Uuid>,
) -> Result<Json<serde_json::Value>, AppError> {
    let actor = state.sessions.require(&headers).await?;
    let (list, added) = state
        .comparisons
        .add(actor.id, &agent_id.to_string())
        .await;
    Ok(Json(json!({
        "added": added,
        "selection": ComparisonView::from(&list),
    })))
}

/// DELETE /api/v1/me/compare/:agent_id
pub async fn remove_from_comparison(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(agent_id): Path<Uuid>,
) -> Result<Json<ComparisonView>, AppError> {
    let actor = state.sessions.require(&headers).await?;
    let list = state
        .comparisons
        .remove(actor.id, &agent_id.to_string())
        .await;
    Ok(Json(ComparisonView::from(&list)))
}

// ============ Verification ============

/// GET /api/v1/verifications
pub async fn list_verifications(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<PendingQueue>, AppError> {
    let actor = state.sessions.require(&headers).await?;
    let queue = verification::pending_queue(&state.directory, &actor).await?;
    tracing::info!(
        "Pending queue: {} agents, {} agencies",
        queue.agents.len(),
        queue.agencies.len()
    );
    Ok(Json(queue))
}

/// POST /api/v1/verifications/:kind/:id
pub async fn decide_verification(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path((kind, id)): Path<(String, Uuid)>,
    Json(request): Json<VerificationRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let actor = state.sessions.require(&headers).await?;
    let kind = ListingKind::from_path(&kind)
        .ok_or_else(|| AppError::BadRequest(format!("Tipo desconhecido: {}", kind)))?;
    let status =
        verification::apply_decision(&state.directory, &actor, kind, id, &request).await?;
    Ok(Json(json!({ "id": id, "verification_status": status })))
}

// ============ Routing ============

/// Every `/api/v1` route, without state or rate limiting.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/catalog", get(get_catalog))
        .route("/api/v1/cnpj/validate", post(validate_cnpj))
        .route("/api/v1/home", get(home))
        .route("/api/v1/marketplace", get(marketplace))
        .route("/api/v1/ranking", get(ranking))
        .route("/api/v1/compare/:ids", get(compare))
        .route("/api/v1/agents", post(create_agent))
        .route(
            "/api/v1/agents/:id",
            get(get_agent).patch(update_agent).delete(delete_agent),
        )
        .route(
            "/api/v1/agents/:id/reviews",
            get(list_agent_reviews).post(create_agent_review),
        )
        .route("/api/v1/agencies", get(list_agencies).post(create_agency))
        .route(
            "/api/v1/agencies/:id",
            get(get_agency).patch(update_agency).delete(delete_agency),
        )
        .route(
            "/api/v1/agencies/:id/reviews",
            get(list_agency_reviews).post(create_agency_review),
        )
        .route("/api/v1/uploads/:kind", post(upload_image))
        .route("/api/v1/auth/sign-in", post(sign_in))
        .route("/api/v1/auth/sign-up", post(sign_up))
        .route("/api/v1/me", get(me))
        .route(
            "/api/v1/me/compare",
            get(get_comparison).delete(clear_comparison),
        )
        .route(
            "/api/v1/me/compare/:agent_id",
            post(add_to_comparison).delete(remove_from_comparison),
        )
        .route("/api/v1/verifications", get(list_verifications))
        .route("/api/v1/verifications/:kind/:id", post(decide_verification))
}

/// The full application router with the health route and body limit.
/// The binary adds rate limiting, tracing and CORS on top.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(api_routes().layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)))
        .with_state(state)
}
