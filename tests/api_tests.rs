use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{TimeZone, Utc};
use dealsync::entities::deals::Model;
use dealsync::store::StoreConnector;
use dealsync::{create_app, AppState};
use http_body_util::BodyExt; // For Response body handling
use sea_orm::{DatabaseBackend, DatabaseConnection, DbErr, MockDatabase};
use serde_json::{json, Value};
use tower::ServiceExt; // For oneshot

/// Builds a fresh mock connection for every request, like the real connector.
struct MockConnector<F>(F);

#[async_trait]
impl<F> StoreConnector for MockConnector<F>
where
    F: Fn() -> Result<DatabaseConnection, DbErr> + Send + Sync,
{
    async fn connect(&self) -> Result<DatabaseConnection, DbErr> {
        (self.0)()
    }
}

fn static_dir() -> std::path::PathBuf {
    std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("static")
}

fn app_with<F>(make: F) -> Router
where
    F: Fn() -> Result<DatabaseConnection, DbErr> + Send + Sync + 'static,
{
    create_app(AppState::new(MockConnector(make)), static_dir())
}

fn app_returning(rows: Vec<Model>) -> Router {
    app_with(move || {
        Ok(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([rows.clone()])
            .into_connection())
    })
}

fn unreachable_app() -> Router {
    app_with(|| Err(DbErr::Custom("connection refused".to_string())))
}

fn deal(id: i64, name: &str, created_hour: u32) -> Model {
    let created = Utc.with_ymd_and_hms(2025, 1, 10, created_hour, 0, 0).unwrap();
    Model {
        id,
        dealname: Some(name.to_string()),
        amount: Some(100.0),
        pipeline: Some("default".to_string()),
        dealstage: Some("qualifiedtobuy".to_string()),
        createdate: Some(created),
        hs_lastmodifieddate: Some(created),
        closedate: None,
        properties: json!({
            "dealname": name,
            "amount": "100",
            "deal_owner_id": "owner-7",
        }),
    }
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = unreachable_app();
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_list_deals_returns_rows_in_store_order() {
    let app = app_returning(vec![deal(2, "newer", 12), deal(1, "older", 9)]);

    let (status, body) = send(app, get("/deals")).await;

    assert_eq!(status, StatusCode::OK);
    let deals = body.as_array().expect("array body");
    assert_eq!(deals.len(), 2);
    assert_eq!(deals[0]["id"], 2);
    assert_eq!(deals[1]["id"], 1);
    assert_eq!(deals[0]["deal_owner_id"], "owner-7");
    assert_eq!(deals[0]["properties"]["amount"], "100");
    assert!(deals[0]["closedate"].is_null());

    let first = deals[0]["createdate"].as_str().unwrap();
    let second = deals[1]["createdate"].as_str().unwrap();
    let first = chrono::DateTime::parse_from_rfc3339(first).unwrap();
    let second = chrono::DateTime::parse_from_rfc3339(second).unwrap();
    assert!(first >= second);
}

#[tokio::test]
async fn test_list_deals_empty_store() {
    let app = app_returning(vec![]);
    let (status, body) = send(app, get("/deals")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_list_deals_query_failure_is_server_error() {
    let app = app_with(|| {
        Ok(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_errors([DbErr::Custom("relation \"deals\" does not exist".to_string())])
            .into_connection())
    });

    let (status, body) = send(app, get("/deals")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    // Store details stay out of the response.
    assert!(!body["error"].as_str().unwrap().contains("relation"));
}

#[tokio::test]
async fn test_get_deal_found() {
    let app = app_returning(vec![deal(42, "answer", 10)]);

    let (status, body) = send(app, get("/deals/42")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], 42);
    assert_eq!(body["dealname"], "answer");
}

#[tokio::test]
async fn test_get_deal_missing_is_not_found() {
    let app = app_returning(vec![]);

    let (status, body) = send(app, get("/deals/999")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found: deal 999");
}

#[tokio::test]
async fn test_get_deal_query_failure_is_server_error_not_404() {
    let app = app_with(|| {
        Ok(MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_errors([DbErr::Custom("timeout".to_string())])
            .into_connection())
    });

    let (status, _) = send(app, get("/deals/1")).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn test_unreachable_store_is_service_unavailable() {
    for request in [
        get("/deals"),
        get("/deals/1"),
        post_json(
            "/deals",
            json!({"dealname": "x", "amount": 1.0, "pipeline": "p", "dealstage": "s"}),
        ),
    ] {
        let (status, body) = send(unreachable_app(), request).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            body["error"],
            "Service unavailable: Database connection is currently unavailable."
        );
    }
}

#[tokio::test]
async fn test_create_deal_returns_created_row() {
    let stored = deal(1_736_503_200_000, "Acme renewal", 10);
    let app = app_returning(vec![stored.clone()]);

    let (status, body) = send(
        app,
        post_json(
            "/deals",
            json!({
                "dealname": "Acme renewal",
                "amount": 100.0,
                "pipeline": "default",
                "dealstage": "qualifiedtobuy"
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["id"], stored.id);
    assert_eq!(body["dealname"], "Acme renewal");
    assert_eq!(body["createdate"], body["hs_lastmodifieddate"]);
}

#[tokio::test]
async fn test_create_deal_requires_every_field() {
    // No connection must be attempted for an invalid body.
    let app = app_with(|| panic!("store should not be touched"));

    let (status, _) = send(
        app,
        post_json("/deals", json!({"dealname": "missing the rest"})),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_create_deal_rejects_non_numeric_amount() {
    let app = app_with(|| panic!("store should not be touched"));

    let (status, _) = send(
        app,
        post_json(
            "/deals",
            json!({"dealname": "x", "amount": "lots", "pipeline": "p", "dealstage": "s"}),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_frontend_index_is_served() {
    let app = unreachable_app();
    let response = app.oneshot(get("/")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body_bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert!(String::from_utf8_lossy(&body_bytes).contains("HubSpot Deals"));
}

#[tokio::test]
async fn test_static_assets_are_served() {
    let app = unreachable_app();
    let response = app.oneshot(get("/static/app.js")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_openapi_document_lists_deal_routes() {
    let app = unreachable_app();

    let (status, body) = send(app, get("/api-doc/openapi.json")).await;

    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]["/deals"]["get"].is_object());
    assert!(body["paths"]["/deals"]["post"].is_object());
    assert!(body["paths"]["/deals/{id}"]["get"].is_object());
}
