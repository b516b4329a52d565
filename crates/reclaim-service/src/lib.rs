#![deny(unsafe_code)]

pub mod session;

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use chrono::NaiveDate;
use reclaim_adapters::{hash_password, verify_password, AdapterError, ImageStore, LocalImageStore};
use reclaim_core::{
    AdminOverview, Claim, ClaimAction, ClaimView, Conversation, ConversationSummary, ContactInfo,
    FoundItem, ItemKind, ItemListing, LostItem, Message, NewFoundItem, NewLostItem, NewMessage,
    NewUser, Principal, ProofInfo, ReclaimEngine, ReclaimError, StorageConfig, SystemSnapshot,
    UserDashboard, UserDetails, UserProfile,
};
use serde::{Deserialize, Serialize};
use session::{SessionError, SessionStore};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub storage: StorageConfig,
    pub image_root: PathBuf,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::Memory,
            image_root: PathBuf::from("data/uploads"),
        }
    }
}

#[derive(Clone)]
pub struct ServiceState {
    pub engine: Arc<ReclaimEngine>,
    pub sessions: Arc<SessionStore>,
    pub images: Arc<dyn ImageStore>,
}

impl ServiceState {
    pub fn new(engine: Arc<ReclaimEngine>, images: Arc<dyn ImageStore>) -> Self {
        Self {
            engine,
            sessions: Arc::new(SessionStore::new()),
            images,
        }
    }

    pub async fn bootstrap(config: ServiceConfig) -> Result<Self, ReclaimError> {
        let engine = ReclaimEngine::bootstrap(config.storage).await?;
        Ok(Self::new(
            Arc::new(engine),
            Arc::new(LocalImageStore::new(config.image_root)),
        ))
    }
}

pub fn build_router(state: ServiceState) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/auth/signup", post(signup))
        .route("/v1/auth/login", post(login))
        .route("/v1/auth/logout", post(logout))
        .route("/v1/admin/login", post(admin_login))
        .route("/v1/admin/admins", post(create_admin))
        .route("/v1/items", get(browse_items))
        .route("/v1/items/found", post(post_found_item))
        .route("/v1/items/lost", post(post_lost_item))
        .route("/v1/items/found/:id", get(get_found_item))
        .route("/v1/items/lost/:id", get(get_lost_item))
        .route(
            "/v1/items/found/:id/claims",
            get(list_item_claims).post(submit_claim),
        )
        .route("/v1/dashboard", get(dashboard))
        .route("/v1/claims/:id", get(view_claim))
        .route("/v1/claims/:id/approve", post(approve_claim))
        .route("/v1/claims/:id/reject", post(reject_claim))
        .route("/v1/claims/:id/acknowledge", post(acknowledge_claim))
        .route("/v1/messages", get(list_conversations).post(send_message))
        .route("/v1/messages/unread/count", get(unread_count))
        .route("/v1/messages/inquiry", post(send_inquiry))
        .route("/v1/messages/:other", get(view_conversation))
        .route("/v1/images", post(upload_image))
        .route("/v1/admin/overview", get(admin_overview))
        .route("/v1/admin/report", get(admin_report))
        .route("/v1/admin/users/:username", get(admin_user_details))
        .route("/v1/admin/users/:username/toggle", post(toggle_user))
        .route("/v1/admin/items/:kind/:id", delete(delete_item))
        .route("/v1/admin/items/:kind/:id/status", post(mark_item_status))
        .route("/v1/admin/claims/:id", delete(delete_claim))
        .with_state(state)
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Http { status: StatusCode, message: String },
    #[error(transparent)]
    Core(#[from] ReclaimError),
    #[error(transparent)]
    Adapter(#[from] AdapterError),
    #[error(transparent)]
    Session(#[from] SessionError),
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self::Http {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn unauthenticated(message: impl Into<String>) -> Self {
        Self::Http {
            status: StatusCode::UNAUTHORIZED,
            message: message.into(),
        }
    }

    fn forbidden(message: impl Into<String>) -> Self {
        Self::Http {
            status: StatusCode::FORBIDDEN,
            message: message.into(),
        }
    }

    fn not_found(message: impl Into<String>) -> Self {
        Self::Http {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Http { status, message } => (status, message),
            ApiError::Core(err) => {
                let status = match &err {
                    ReclaimError::NotFound(_) => StatusCode::NOT_FOUND,
                    ReclaimError::Unauthorized(_) => StatusCode::FORBIDDEN,
                    ReclaimError::SelfClaimForbidden
                    | ReclaimError::InvalidState(_)
                    | ReclaimError::Conflict(_) => StatusCode::CONFLICT,
                    ReclaimError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
                };
                (status, err.to_string())
            }
            ApiError::Adapter(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
            ApiError::Session(err) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()),
        };
        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or_else(|| ApiError::unauthenticated("missing bearer token"))
}

fn authenticate(state: &ServiceState, headers: &HeaderMap) -> Result<Principal, ApiError> {
    let token = bearer_token(headers)?;
    state
        .sessions
        .resolve(token)?
        .ok_or_else(|| ApiError::unauthenticated("invalid or expired session token"))
}

fn parse_kind(kind: &str) -> Result<ItemKind, ApiError> {
    match kind {
        "found" => Ok(ItemKind::Found),
        "lost" => Ok(ItemKind::Lost),
        other => Err(ApiError::bad_request(format!(
            "invalid item kind '{other}'; expected found or lost"
        ))),
    }
}

// ---- health ----------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    storage_backend: &'static str,
}

async fn health(State(state): State<ServiceState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "reclaim-service",
        storage_backend: state.engine.backend_label(),
    })
}

// ---- auth ------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct SignupRequest {
    username: String,
    email: String,
    password: String,
    user_type: Option<String>,
    phone: Option<String>,
    full_name: Option<String>,
    student_id: Option<String>,
    department: Option<String>,
    year: Option<String>,
}

async fn signup(
    State(state): State<ServiceState>,
    Json(request): Json<SignupRequest>,
) -> Result<Json<reclaim_core::User>, ApiError> {
    if request.username.trim().is_empty() || request.password.is_empty() {
        return Err(ApiError::bad_request("username and password are required"));
    }

    let mut new_user = NewUser::new(
        request.username.trim(),
        request.email.trim(),
        hash_password(&request.password)?,
    )
    .with_profile(UserProfile {
        phone: request.phone,
        full_name: request.full_name,
        student_id: request.student_id,
        department: request.department,
        year: request.year,
    });
    if let Some(user_type) = request.user_type {
        new_user = new_user.with_user_type(user_type);
    }

    let user = state.engine.register_user(new_user).await?;
    info!(username = %user.username, "user registered");
    Ok(Json(user))
}

#[derive(Debug, Clone, Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

#[derive(Debug, Clone, Serialize)]
struct TokenResponse {
    token: String,
    username: String,
    is_admin: bool,
}

async fn login(
    State(state): State<ServiceState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let user = state
        .engine
        .user(&request.username)
        .await?
        .ok_or_else(|| ApiError::unauthenticated("invalid username or password"))?;
    if !verify_password(&request.password, &user.credential_hash)? {
        return Err(ApiError::unauthenticated("invalid username or password"));
    }
    if !user.is_active {
        return Err(ApiError::forbidden(
            "this account has been deactivated by an administrator",
        ));
    }

    state.engine.record_login(&user.username).await?;
    let token = state.sessions.issue(Principal::user(&user.username))?;
    info!(username = %user.username, "user login");
    Ok(Json(TokenResponse {
        token,
        username: user.username,
        is_admin: false,
    }))
}

async fn admin_login(
    State(state): State<ServiceState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let admin = state
        .engine
        .administrator(&request.username)
        .await?
        .ok_or_else(|| ApiError::unauthenticated("invalid administrator credentials"))?;
    if !verify_password(&request.password, &admin.credential_hash)? {
        return Err(ApiError::unauthenticated("invalid administrator credentials"));
    }

    let token = state.sessions.issue(Principal::admin(&admin.username))?;
    info!(username = %admin.username, "administrator login");
    Ok(Json(TokenResponse {
        token,
        username: admin.username,
        is_admin: true,
    }))
}

#[derive(Debug, Clone, Serialize)]
struct LogoutResponse {
    revoked: bool,
}

async fn logout(
    State(state): State<ServiceState>,
    headers: HeaderMap,
) -> Result<Json<LogoutResponse>, ApiError> {
    let token = bearer_token(&headers)?;
    let revoked = state.sessions.revoke(token)?;
    Ok(Json(LogoutResponse { revoked }))
}

#[derive(Debug, Clone, Deserialize)]
struct CreateAdminRequest {
    username: String,
    password: String,
}

async fn create_admin(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Json(request): Json<CreateAdminRequest>,
) -> Result<Json<reclaim_core::Administrator>, ApiError> {
    let actor = authenticate(&state, &headers)?;
    let admin = state
        .engine
        .register_admin(&actor, &request.username, &hash_password(&request.password)?)
        .await?;
    Ok(Json(admin))
}

// ---- items -----------------------------------------------------------------

async fn browse_items(
    State(state): State<ServiceState>,
    headers: HeaderMap,
) -> Result<Json<ItemListing>, ApiError> {
    let actor = authenticate(&state, &headers)?;
    Ok(Json(state.engine.browse_items(&actor).await?))
}

#[derive(Debug, Clone, Deserialize)]
struct PostFoundRequest {
    device_name: String,
    location: String,
    description: Option<String>,
    color: Option<String>,
    image_ref: Option<String>,
}

async fn post_found_item(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Json(request): Json<PostFoundRequest>,
) -> Result<Json<FoundItem>, ApiError> {
    let actor = authenticate(&state, &headers)?;
    let item = NewFoundItem::new(request.device_name, request.location).with_details(
        request.description,
        request.color,
        request.image_ref,
    );
    Ok(Json(state.engine.post_found_item(&actor, item).await?))
}

#[derive(Debug, Clone, Deserialize)]
struct PostLostRequest {
    device_name: String,
    location: String,
    lost_date: Option<NaiveDate>,
    description: Option<String>,
    color: Option<String>,
    image_ref: Option<String>,
}

async fn post_lost_item(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Json(request): Json<PostLostRequest>,
) -> Result<Json<LostItem>, ApiError> {
    let actor = authenticate(&state, &headers)?;
    let mut item = NewLostItem::new(request.device_name, request.location).with_details(
        request.description,
        request.color,
        request.image_ref,
    );
    if let Some(lost_date) = request.lost_date {
        item = item.with_lost_date(lost_date);
    }
    Ok(Json(state.engine.post_lost_item(&actor, item).await?))
}

async fn get_found_item(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<FoundItem>, ApiError> {
    authenticate(&state, &headers)?;
    let item = state
        .engine
        .found_item(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("found item {id} does not exist")))?;
    Ok(Json(item))
}

async fn get_lost_item(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<LostItem>, ApiError> {
    authenticate(&state, &headers)?;
    let item = state
        .engine
        .lost_item(id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("lost item {id} does not exist")))?;
    Ok(Json(item))
}

async fn dashboard(
    State(state): State<ServiceState>,
    headers: HeaderMap,
) -> Result<Json<UserDashboard>, ApiError> {
    let actor = authenticate(&state, &headers)?;
    Ok(Json(state.engine.dashboard(&actor).await?))
}

// ---- claims ----------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct ClaimRequest {
    phone_number: String,
    address: String,
    contact_method: Option<String>,
    proof_description: Option<String>,
    proof_image_ref: Option<String>,
}

async fn submit_claim(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
    Json(request): Json<ClaimRequest>,
) -> Result<Json<Claim>, ApiError> {
    let actor = authenticate(&state, &headers)?;
    let contact = ContactInfo {
        phone_number: request.phone_number,
        address: request.address,
        contact_method: request.contact_method,
    };
    let proof = ProofInfo {
        description: request.proof_description,
        image_ref: request.proof_image_ref,
    };
    let claim = state.engine.submit_claim(&actor, id, contact, proof).await?;
    Ok(Json(claim))
}

async fn view_claim(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<ClaimView>, ApiError> {
    let actor = authenticate(&state, &headers)?;
    Ok(Json(state.engine.claim(&actor, id).await?))
}

async fn approve_claim(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Claim>, ApiError> {
    let actor = authenticate(&state, &headers)?;
    Ok(Json(
        state
            .engine
            .resolve_claim(&actor, id, ClaimAction::Approve)
            .await?,
    ))
}

async fn reject_claim(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Claim>, ApiError> {
    let actor = authenticate(&state, &headers)?;
    Ok(Json(
        state
            .engine
            .resolve_claim(&actor, id, ClaimAction::Reject)
            .await?,
    ))
}

async fn acknowledge_claim(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Claim>, ApiError> {
    let actor = authenticate(&state, &headers)?;
    Ok(Json(state.engine.acknowledge_claim(&actor, id).await?))
}

async fn list_item_claims(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<Vec<Claim>>, ApiError> {
    let actor = authenticate(&state, &headers)?;
    Ok(Json(state.engine.claims_for_item(&actor, id).await?))
}

// ---- messaging -------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct SendMessageRequest {
    recipient: String,
    body: String,
    subject: Option<String>,
    item_id: Option<i64>,
    item_kind: Option<ItemKind>,
}

async fn send_message(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Json(request): Json<SendMessageRequest>,
) -> Result<Json<Message>, ApiError> {
    let actor = authenticate(&state, &headers)?;
    if request.recipient.trim().is_empty() || request.body.trim().is_empty() {
        return Err(ApiError::bad_request("recipient and body are required"));
    }

    let mut message = NewMessage::new(request.recipient, request.body);
    if let Some(subject) = request.subject {
        message = message.with_subject(subject);
    }
    if let (Some(item_id), Some(kind)) = (request.item_id, request.item_kind) {
        message = message.about_item(item_id, kind);
    }
    Ok(Json(state.engine.send_message(&actor, message).await?))
}

#[derive(Debug, Clone, Deserialize)]
struct InquiryRequest {
    kind: ItemKind,
    item_id: i64,
    recipient: String,
}

async fn send_inquiry(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Json(request): Json<InquiryRequest>,
) -> Result<Json<Message>, ApiError> {
    let actor = authenticate(&state, &headers)?;
    Ok(Json(
        state
            .engine
            .item_inquiry(&actor, request.kind, request.item_id, &request.recipient)
            .await?,
    ))
}

async fn list_conversations(
    State(state): State<ServiceState>,
    headers: HeaderMap,
) -> Result<Json<Vec<ConversationSummary>>, ApiError> {
    let actor = authenticate(&state, &headers)?;
    Ok(Json(state.engine.conversations(&actor).await?))
}

async fn view_conversation(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Path(other): Path<String>,
) -> Result<Json<Conversation>, ApiError> {
    let actor = authenticate(&state, &headers)?;
    Ok(Json(state.engine.conversation(&actor, &other).await?))
}

#[derive(Debug, Clone, Serialize)]
struct UnreadResponse {
    unread: i64,
}

async fn unread_count(
    State(state): State<ServiceState>,
    headers: HeaderMap,
) -> Result<Json<UnreadResponse>, ApiError> {
    let actor = authenticate(&state, &headers)?;
    Ok(Json(UnreadResponse {
        unread: state.engine.unread_count(&actor).await?,
    }))
}

// ---- images ----------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
struct ImageQuery {
    filename: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct ImageResponse {
    reference: String,
}

async fn upload_image(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Query(query): Query<ImageQuery>,
    body: Bytes,
) -> Result<Json<ImageResponse>, ApiError> {
    authenticate(&state, &headers)?;
    if body.is_empty() {
        return Err(ApiError::bad_request("image body is empty"));
    }
    let hint = query.filename.as_deref().unwrap_or("upload");
    let reference = state.images.store(hint, &body)?;
    Ok(Json(ImageResponse { reference }))
}

// ---- admin -----------------------------------------------------------------

async fn admin_overview(
    State(state): State<ServiceState>,
    headers: HeaderMap,
) -> Result<Json<AdminOverview>, ApiError> {
    let actor = authenticate(&state, &headers)?;
    Ok(Json(state.engine.admin_overview(&actor).await?))
}

async fn admin_report(
    State(state): State<ServiceState>,
    headers: HeaderMap,
) -> Result<Json<SystemSnapshot>, ApiError> {
    let actor = authenticate(&state, &headers)?;
    Ok(Json(state.engine.system_snapshot(&actor).await?))
}

async fn admin_user_details(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Path(username): Path<String>,
) -> Result<Json<UserDetails>, ApiError> {
    let actor = authenticate(&state, &headers)?;
    Ok(Json(state.engine.user_details(&actor, &username).await?))
}

#[derive(Debug, Clone, Serialize)]
struct ToggleResponse {
    username: String,
    is_active: bool,
}

async fn toggle_user(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Path(username): Path<String>,
) -> Result<Json<ToggleResponse>, ApiError> {
    let actor = authenticate(&state, &headers)?;
    let is_active = state.engine.toggle_user_active(&actor, &username).await?;
    Ok(Json(ToggleResponse { username, is_active }))
}

#[derive(Debug, Clone, Serialize)]
struct DeletedResponse {
    deleted: bool,
}

async fn delete_item(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Path((kind, id)): Path<(String, i64)>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let actor = authenticate(&state, &headers)?;
    let kind = parse_kind(&kind)?;
    state.engine.delete_item(&actor, kind, id).await?;
    Ok(Json(DeletedResponse { deleted: true }))
}

async fn delete_claim(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let actor = authenticate(&state, &headers)?;
    state.engine.delete_claim(&actor, id).await?;
    Ok(Json(DeletedResponse { deleted: true }))
}

#[derive(Debug, Clone, Deserialize)]
struct MarkStatusRequest {
    status: String,
}

#[derive(Debug, Clone, Serialize)]
struct MarkStatusResponse {
    kind: ItemKind,
    id: i64,
    status: String,
}

async fn mark_item_status(
    State(state): State<ServiceState>,
    headers: HeaderMap,
    Path((kind, id)): Path<(String, i64)>,
    Json(request): Json<MarkStatusRequest>,
) -> Result<Json<MarkStatusResponse>, ApiError> {
    let actor = authenticate(&state, &headers)?;
    let kind = parse_kind(&kind)?;
    state
        .engine
        .mark_item_status(&actor, kind, id, &request.status)
        .await?;
    Ok(Json(MarkStatusResponse {
        kind,
        id,
        status: request.status,
    }))
}
