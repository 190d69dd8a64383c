mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use playerparent_onboarding::config::Config;
use playerparent_onboarding::http::{self, App};
use playerparent_onboarding::session::ForwardedIdentity;
use playerparent_onboarding::store::MemoryStore;
use serde_json::{Value, json};
use tower::ServiceExt;

fn app_with(cfg: Config) -> Router {
    let svc = common::service(Arc::new(MemoryStore::new()));
    let sessions = ForwardedIdentity::new(&cfg.identity_header).unwrap();
    let app = App::new(svc, Box::new(sessions), &cfg);
    http::router(app, Duration::from_secs(5))
}

fn app() -> Router {
    app_with(Config::default())
}

async fn call(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str, user: Option<&str>) -> Request<Body> {
    let mut req = Request::builder().method("GET").uri(uri);
    if let Some(user) = user {
        req = req.header("x-user-id", user);
    }
    req.body(Body::empty()).unwrap()
}

fn post(uri: &str, user: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("x-user-id", user)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn basic_info(username: &str) -> Value {
    json!({
        "full_name": "Sam Parker",
        "username": username,
        "birthday": "1990-02-03"
    })
}

#[tokio::test]
async fn healthz_is_open() {
    let (status, body) = call(&app(), get("/healthz", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn anonymous_resolution_points_at_sign_up() {
    let (status, body) = call(&app(), get("/playerparent?step=4", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["action"]["kind"], "redirect");
    assert_eq!(body["action"]["step"], 1);
    assert_eq!(body["action"]["location"], "/playerparent?step=1");
}

#[tokio::test]
async fn player_flow_over_http() {
    let app = app();
    let (status, body) = call(&app, post("/playerparent/basic-info", "u1", basic_info("sam"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transition"]["kind"], "move");
    assert_eq!(body["transition"]["step"], 3);

    let (status, body) = call(&app, post("/playerparent/role", "u1", json!({ "role": "player" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["profile"]["role"], "player");
    assert_eq!(body["transition"]["location"], "/playerparent?step=4");

    let (_, body) = call(&app, get("/playerparent?step=4", Some("u1"))).await;
    assert_eq!(body["action"]["kind"], "render");
    assert_eq!(body["steps"][3]["label"], "HUDL Link");

    let (status, body) = call(
        &app,
        post("/playerparent/hudl-link", "u1", json!({ "hudl_link": "not a link" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"], "validation");

    let (_, body) = call(&app, get("/profile", Some("u1"))).await;
    assert_eq!(body["username"], "sam");
}

#[tokio::test]
async fn username_conflicts_are_409() {
    let app = app();
    call(&app, post("/playerparent/basic-info", "u1", basic_info("taken"))).await;
    let (status, body) = call(&app, post("/playerparent/basic-info", "u2", basic_info("Taken"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "username_taken");
}

#[tokio::test]
async fn step_writes_need_a_session() {
    let req = Request::builder()
        .method("POST")
        .uri("/playerparent/role")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "role": "parent" }).to_string()))
        .unwrap();
    let (status, body) = call(&app(), req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthenticated");
}

#[tokio::test]
async fn parent_creates_a_player_through_the_privileged_route() {
    let app = app();
    call(&app, post("/playerparent/basic-info", "mom", basic_info("mom"))).await;
    call(&app, post("/playerparent/role", "mom", json!({ "role": "parent" }))).await;

    let (status, body) = call(
        &app,
        post("/api/parent/create-player", "mom", json!({ "full_name": "Kid Parker" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["transition"]["step"], 5);
    assert_eq!(body["player"]["role"], "player");

    let (_, body) = call(&app, get("/playerparent?step=4", Some("mom"))).await;
    assert_eq!(body["action"]["kind"], "redirect");
    assert_eq!(body["action"]["step"], 5);
    assert_eq!(body["account"], "parent");
}

#[tokio::test]
async fn back_and_skip() {
    let app = app();
    let req = Request::builder()
        .method("POST")
        .uri("/playerparent/back?step=3")
        .body(Body::empty())
        .unwrap();
    let (_, body) = call(&app, req).await;
    assert_eq!(body["step"], 2);

    call(&app, post("/playerparent/basic-info", "u9", basic_info("skippy"))).await;
    let (status, _) = call(&app, post("/playerparent/skip", "u9", Value::Null)).await;
    assert_eq!(status, StatusCode::ACCEPTED);

    let mut skipped = false;
    for _ in 0..50 {
        let (_, body) = call(&app, get("/playerparent?step=3", Some("u9"))).await;
        if body["skipped"] == true {
            skipped = true;
            assert_eq!(body["action"]["kind"], "render");
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(skipped);
}

#[tokio::test]
async fn bearer_token_guards_everything_but_healthz() {
    let cfg = Config {
        bearer_token: Some("s3cret".into()),
        ..Config::default()
    };
    let app = app_with(cfg);

    let (status, _) = call(&app, get("/playerparent", Some("u1"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&app, get("/playerparent?access_token=s3cret", Some("u1"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .uri("/playerparent")
        .header("authorization", "Bearer s3cret")
        .body(Body::empty())
        .unwrap();
    let (status, _) = call(&app, req).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(&app, get("/healthz", None)).await;
    assert_eq!(status, StatusCode::OK);
}
