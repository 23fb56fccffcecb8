use super::*;
use anyhow::Result;
use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::post, Json, Router};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::{net::TcpListener, sync::Mutex};

#[derive(Clone, Default)]
struct ServerState {
    bodies: Arc<Mutex<Vec<Value>>>,
}

async fn handle_sites_new(
    State(state): State<ServerState>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    state.bodies.lock().await.push(body.clone());
    match body["blog_name"].as_str().unwrap_or_default() {
        "taken" => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "error": "blog_name_exists",
                "message": "Sorry, that site already exists!"
            })),
        )
            .into_response(),
        "maintenance" => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "error": "maintenance",
                "message": "Down for maintenance"
            })),
        )
            .into_response(),
        "broken" => (StatusCode::INTERNAL_SERVER_ERROR, "upstream exploded").into_response(),
        "garbled" => (StatusCode::OK, "not json").into_response(),
        _ => Json(json!({ "success": true })).into_response(),
    }
}

async fn spawn_sites_server() -> Result<(String, ServerState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = ServerState::default();
    let app = Router::new()
        .route("/rest/v1.1/sites/new", post(handle_sites_new))
        .with_state(state.clone());
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}"), state))
}

#[tokio::test]
async fn sites_new_posts_validation_request_with_credentials() {
    let (base, state) = spawn_sites_server().await.expect("spawn server");
    let client = WpcomClient::new(&base)
        .expect("client")
        .with_credentials(Some(WpcomClientCredentials {
            client_id: "42".into(),
            client_secret: "shh".into(),
        }));

    let response = client
        .sites_new(SitesNewRequest::validation("myteam", "My Team"))
        .await
        .expect("sites/new");
    assert!(response.success);

    let bodies = state.bodies.lock().await;
    assert_eq!(bodies.len(), 1);
    assert_eq!(bodies[0]["blog_name"], "myteam");
    assert_eq!(bodies[0]["blog_title"], "My Team");
    assert_eq!(bodies[0]["validate"], true);
    assert_eq!(bodies[0]["client_id"], "42");
}

#[tokio::test]
async fn structured_rejection_becomes_api_error() {
    let (base, _state) = spawn_sites_server().await.expect("spawn server");
    let client = WpcomClient::new(&format!("{base}/")).expect("client");

    let err = client
        .sites_new(SitesNewRequest::validation("taken", "Taken"))
        .await
        .expect_err("name is taken");
    match err {
        SiteApiError::Api(api_error) => {
            assert_eq!(api_error.error, "blog_name_exists");
            assert_eq!(api_error.message, "Sorry, that site already exists!");
        }
        other => panic!("expected api error, got {other:?}"),
    }
}

#[tokio::test]
async fn unstructured_failures_are_not_api_errors() {
    let (base, _state) = spawn_sites_server().await.expect("spawn server");
    let client = WpcomClient::new(&base).expect("client");

    let err = client
        .sites_new(SitesNewRequest::validation("broken", "Broken"))
        .await
        .expect_err("server error");
    assert!(matches!(err, SiteApiError::Status { status: 500, .. }));

    let err = client
        .sites_new(SitesNewRequest::validation("garbled", "Garbled"))
        .await
        .expect_err("bad body");
    assert!(matches!(err, SiteApiError::Decode(_)));
}

#[tokio::test]
async fn server_error_with_error_body_is_not_a_field_verdict() {
    let (base, _state) = spawn_sites_server().await.expect("spawn server");
    let client = WpcomClient::new(&base).expect("client");

    let err = client
        .sites_new(SitesNewRequest::validation("maintenance", "Maintenance"))
        .await
        .expect_err("service unavailable");
    match err {
        SiteApiError::Status { status, body } => {
            assert_eq!(status, 503);
            assert!(body.contains("Down for maintenance"));
        }
        other => panic!("expected status error, got {other:?}"),
    }
}

#[tokio::test]
async fn unreachable_server_is_a_transport_error() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let client = WpcomClient::with_timeout(&format!("http://{addr}"), Duration::from_secs(2))
        .expect("client");
    let err = client
        .sites_new(SitesNewRequest::validation("myteam", "My Team"))
        .await
        .expect_err("nothing is listening");
    assert!(matches!(err, SiteApiError::Transport(_)));
}

#[test]
fn invalid_base_url_is_rejected() {
    assert!(matches!(
        WpcomClient::new("not a url"),
        Err(SiteApiError::InvalidBaseUrl(_))
    ));
}
