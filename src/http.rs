//! JSON API for the onboarding screens.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    BoxError, Json, Router,
    error_handling::HandleErrorLayer,
    extract::{Query, Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::json;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::error::OnboardingError;
use crate::onboarding::models::{
    BasicInfo, GeneralInfo, HudlLink, LinkPlayer, PlayerSeed, Profile, RoleChoice, SpecificInfo,
};
use crate::onboarding::sequencer::{Step, Transition};
use crate::onboarding::{OnboardingService, Resolution, StepOutcome};
use crate::session::{Session, SessionProvider};

pub struct App {
    pub service: OnboardingService,
    sessions: Box<dyn SessionProvider>,
    bearer_token: Option<String>,
    allow_token_in_url: bool,
}

pub type SharedApp = Arc<App>;

impl App {
    pub fn new(
        service: OnboardingService,
        sessions: Box<dyn SessionProvider>,
        cfg: &Config,
    ) -> SharedApp {
        Arc::new(Self {
            service,
            sessions,
            bearer_token: cfg.bearer_token.clone().filter(|t| !t.is_empty()),
            allow_token_in_url: cfg.allow_token_in_url,
        })
    }

    fn session(&self, headers: &HeaderMap) -> Option<Session> {
        self.sessions.session(headers)
    }
}

impl OnboardingError {
    pub fn status(&self) -> StatusCode {
        match self {
            OnboardingError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            OnboardingError::UsernameTaken
            | OnboardingError::AlreadyLinked
            | OnboardingError::NoLinkedPlayer => StatusCode::CONFLICT,
            OnboardingError::Busy => StatusCode::TOO_MANY_REQUESTS,
            OnboardingError::Unauthenticated => StatusCode::UNAUTHORIZED,
            OnboardingError::Forbidden(_) => StatusCode::FORBIDDEN,
            OnboardingError::NotFound(_) => StatusCode::NOT_FOUND,
            OnboardingError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for OnboardingError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        let body = Json(json!({ "error": self.code(), "message": self.to_string() }));
        (status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, OnboardingError>;

fn token_from_query(query: Option<&str>) -> Option<&str> {
    query?
        .split('&')
        .find_map(|pair| pair.strip_prefix("access_token="))
}

fn bearer_ok(expected: &str, headers: &HeaderMap, query: Option<&str>, allow_in_url: bool) -> bool {
    let from_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim);
    if from_header == Some(expected) {
        return true;
    }
    allow_in_url && token_from_query(query) == Some(expected)
}

async fn require_bearer(State(app): State<SharedApp>, req: Request, next: Next) -> Response {
    let Some(expected) = app.bearer_token.as_deref() else {
        return next.run(req).await;
    };
    if bearer_ok(expected, req.headers(), req.uri().query(), app.allow_token_in_url) {
        return next.run(req).await;
    }
    tracing::warn!(path = %req.uri().path(), "rejected request without a valid bearer token");
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "unauthorized", "message": "missing or invalid bearer token" })),
    )
        .into_response()
}

async fn handle_middleware_error(err: BoxError) -> Response {
    if err.is::<tower::timeout::error::Elapsed>() {
        return (
            StatusCode::REQUEST_TIMEOUT,
            Json(json!({ "error": "timeout", "message": "request took too long" })),
        )
            .into_response();
    }
    tracing::error!(error = %err, "unhandled middleware error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "internal", "message": err.to_string() })),
    )
        .into_response()
}

#[derive(Debug, Default, Deserialize)]
struct StepQuery {
    step: Option<String>,
}

impl StepQuery {
    fn step(&self) -> Step {
        Step::from_query(self.step.as_deref())
    }
}

#[derive(Debug, Default, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

async fn healthz(State(app): State<SharedApp>) -> Response {
    match app.service.ping().await {
        Ok(true) => Json(json!({ "ok": true })).into_response(),
        Ok(false) => (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "ok": false }))).into_response(),
        Err(err) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "ok": false, "error": err.to_string() })),
        )
            .into_response(),
    }
}

async fn resolve(
    State(app): State<SharedApp>,
    headers: HeaderMap,
    Query(query): Query<StepQuery>,
) -> Json<Resolution> {
    let session = app.session(&headers);
    Json(app.service.resolve(session.as_ref(), query.step()).await)
}

async fn profile(State(app): State<SharedApp>, headers: HeaderMap) -> ApiResult<Option<Profile>> {
    let session = app.session(&headers);
    Ok(Json(app.service.profile(session.as_ref()).await?))
}

async fn basic_info(
    State(app): State<SharedApp>,
    headers: HeaderMap,
    Json(input): Json<BasicInfo>,
) -> ApiResult<StepOutcome> {
    let session = app.session(&headers);
    Ok(Json(app.service.submit_basic_info(session.as_ref(), &input).await?))
}

async fn select_role(
    State(app): State<SharedApp>,
    headers: HeaderMap,
    Json(input): Json<RoleChoice>,
) -> ApiResult<StepOutcome> {
    let session = app.session(&headers);
    Ok(Json(app.service.select_role(session.as_ref(), &input).await?))
}

async fn search_players(
    State(app): State<SharedApp>,
    headers: HeaderMap,
    Query(query): Query<SearchQuery>,
) -> ApiResult<Vec<Profile>> {
    let session = app.session(&headers);
    Ok(Json(app.service.search_players(session.as_ref(), &query.q).await?))
}

async fn link_player(
    State(app): State<SharedApp>,
    headers: HeaderMap,
    Json(input): Json<LinkPlayer>,
) -> ApiResult<StepOutcome> {
    let session = app.session(&headers);
    Ok(Json(app.service.link_player(session.as_ref(), &input).await?))
}

async fn create_player(
    State(app): State<SharedApp>,
    headers: HeaderMap,
    Json(seed): Json<PlayerSeed>,
) -> ApiResult<StepOutcome> {
    let session = app.session(&headers);
    Ok(Json(app.service.create_player(session.as_ref(), &seed).await?))
}

async fn hudl_link(
    State(app): State<SharedApp>,
    headers: HeaderMap,
    Json(input): Json<HudlLink>,
) -> ApiResult<StepOutcome> {
    let session = app.session(&headers);
    Ok(Json(app.service.save_hudl_link(session.as_ref(), &input).await?))
}

async fn general_info(
    State(app): State<SharedApp>,
    headers: HeaderMap,
    Json(input): Json<GeneralInfo>,
) -> ApiResult<StepOutcome> {
    let session = app.session(&headers);
    Ok(Json(app.service.save_general_info(session.as_ref(), &input).await?))
}

async fn specific_info(
    State(app): State<SharedApp>,
    headers: HeaderMap,
    Json(input): Json<SpecificInfo>,
) -> ApiResult<StepOutcome> {
    let session = app.session(&headers);
    Ok(Json(app.service.save_specific_info(session.as_ref(), &input).await?))
}

async fn back(
    State(app): State<SharedApp>,
    headers: HeaderMap,
    Query(query): Query<StepQuery>,
) -> Json<Transition> {
    let session = app.session(&headers);
    Json(app.service.back(session.as_ref(), query.step()).await)
}

/// Accepts immediately; the flag is written in the background.
async fn skip(State(app): State<SharedApp>, headers: HeaderMap) -> Result<StatusCode, OnboardingError> {
    let session = app.session(&headers).ok_or(OnboardingError::Unauthenticated)?;
    tokio::spawn(async move {
        match app.service.mark_skipped(Some(&session)) {
            Ok(()) => tracing::info!(user = %session.user_id, "role selection skipped"),
            Err(err) => tracing::warn!(user = %session.user_id, error = %err, "could not record skip"),
        }
    });
    Ok(StatusCode::ACCEPTED)
}

pub fn router(app: SharedApp, timeout: Duration) -> Router {
    Router::new()
        .route("/playerparent", get(resolve))
        .route("/profile", get(profile))
        .route("/playerparent/basic-info", post(basic_info))
        .route("/playerparent/role", post(select_role))
        .route("/playerparent/players", get(search_players))
        .route("/playerparent/link-player", post(link_player))
        .route("/api/parent/create-player", post(create_player))
        .route("/playerparent/hudl-link", post(hudl_link))
        .route("/playerparent/general-info", post(general_info))
        .route("/playerparent/specific-info", post(specific_info))
        .route("/playerparent/back", post(back))
        .route("/playerparent/skip", post(skip))
        .route_layer(middleware::from_fn_with_state(app.clone(), require_bearer))
        .route("/healthz", get(healthz))
        .layer(
            ServiceBuilder::new()
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .timeout(timeout),
        )
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app)
}

pub async fn serve(app: SharedApp, cfg: &Config) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(&cfg.http_addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "onboarding http listening");
    axum::serve(listener, router(app, cfg.request_timeout)).await?;
    Ok(())
}
