//! # Stockbook Server
//!
//! JSON API for the Stockbook dashboard.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Stockbook Server                                 │
//! │                                                                         │
//! │  Dashboard ───► HTTP (8080) ───► routes ───► stockbook-db ───► SQLite  │
//! │      ▲                             │               │                    │
//! │      │                        CurrentUser      ChangeFeed              │
//! │      │                      (JWT + role)           │                    │
//! │      └──────── /api/events (WebSocket) ◄───────────┘                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! [`app`] builds the router; the binary in `main.rs` adds config loading,
//! logging, admin bootstrap, and graceful shutdown.

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;
pub mod state;

use axum::http::Request;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, Span};

use stockbook_core::{AccessLevel, NewUser, Role, UserProfile};

pub use config::{ConfigError, ServerConfig};
pub use error::ApiError;
pub use state::AppState;

/// Actor recorded for changes made by the server itself.
pub const SYSTEM_ACTOR: &str = "system";

/// Builds the full application router.
pub fn app(state: AppState) -> Router {
    routes::api_router()
        .layer(TraceLayer::new_for_http().make_span_with(request_span))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Request span without the query string, which may carry an access token.
fn request_span<B>(request: &Request<B>) -> Span {
    info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        version = ?request.version(),
    )
}

/// Creates the configured admin account when the database has no users.
///
/// Returns the new profile, or `None` when nothing was created.
pub async fn bootstrap_admin(state: &AppState) -> Result<Option<UserProfile>, ApiError> {
    let (Some(email), Some(password)) = (
        state.config.admin_email.as_deref(),
        state.config.admin_password.as_deref(),
    ) else {
        return Ok(None);
    };

    if state.db.users().count().await? > 0 {
        return Ok(None);
    }

    auth::validate_password(password)?;
    let hash = auth::hash_password(password)?;
    let admin = state
        .db
        .users()
        .create(
            SYSTEM_ACTOR,
            &NewUser {
                email: email.to_string(),
                password: String::new(),
                full_name: Some("Administrator".to_string()),
                role: Role::Admin,
                access_level: AccessLevel::Write,
                assigned_columns: Vec::new(),
            },
            &hash,
        )
        .await?;

    info!(email = %admin.email, "Bootstrap admin created");
    Ok(Some(admin))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use stockbook_db::{Database, DbConfig};
    use tower::ServiceExt;

    async fn test_state() -> AppState {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let config = ServerConfig {
            jwt_secret: "test-secret".to_string(),
            ..Default::default()
        };
        AppState::new(db, config)
    }

    /// Creates a user directly and returns a token for them.
    async fn login_as(state: &AppState, email: &str, role: Role, access_level: AccessLevel) -> String {
        let profile = state
            .db
            .users()
            .create(
                SYSTEM_ACTOR,
                &NewUser {
                    email: email.to_string(),
                    password: String::new(),
                    full_name: None,
                    role,
                    access_level,
                    assigned_columns: Vec::new(),
                },
                "unused-hash",
            )
            .await
            .unwrap();
        state.jwt.generate_access_token(&profile).unwrap()
    }

    async fn send_raw(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        content_type: &str,
        body: String,
    ) -> (StatusCode, String) {
        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, content_type);
        if let Some(token) = token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = app
            .clone()
            .oneshot(request.body(Body::from(body)).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let body = body.map(|b| b.to_string()).unwrap_or_default();
        let (status, text) = send_raw(app, method, uri, token, "application/json", body).await;
        let json = if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap()
        };
        (status, json)
    }

    #[test]
    fn test_request_span_omits_query() {
        let request = Request::builder()
            .uri("/api/events?table=products&token=secret-jwt")
            .body(())
            .unwrap();

        tracing::subscriber::with_default(tracing_subscriber::registry(), || {
            let span = request_span(&request);
            let fields = span.metadata().unwrap().fields();
            assert!(fields.field("path").is_some());
            assert!(fields.field("uri").is_none());
        });
    }

    #[tokio::test]
    async fn test_health_check() {
        let app = app(test_state().await);
        let (status, body) = send(&app, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
        assert_eq!(body["migrations_applied"], body["migrations_total"]);
    }

    #[tokio::test]
    async fn test_login_and_me() {
        let mut state = test_state().await;
        state.config = std::sync::Arc::new(ServerConfig {
            jwt_secret: "test-secret".to_string(),
            admin_email: Some("admin@shop.in".to_string()),
            admin_password: Some("admin-password".to_string()),
            ..Default::default()
        });
        assert!(bootstrap_admin(&state).await.unwrap().is_some());
        // Only once.
        assert!(bootstrap_admin(&state).await.unwrap().is_none());

        let app = app(state);
        let (status, body) = send(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "ADMIN@shop.in", "password": "wrong-password" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "unauthorized");

        let (status, body) = send(
            &app,
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "ADMIN@shop.in", "password": "admin-password" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["user"]["role"], "admin");
        let token = body["access_token"].as_str().unwrap().to_string();

        let (status, body) = send(&app, "GET", "/api/auth/me", Some(&token), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["can_manage_users"], true);
        assert_eq!(body["columns"].as_array().unwrap().len(), 14);
    }

    #[tokio::test]
    async fn test_requires_token() {
        let app = app(test_state().await);
        let (status, body) = send(&app, "GET", "/api/products", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["code"], "unauthorized");

        let (status, _) = send(&app, "GET", "/api/products", Some("garbage"), None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_viewer_sees_assigned_columns_only() {
        let state = test_state().await;
        let manager = login_as(&state, "manager@shop.in", Role::Manager, AccessLevel::Read).await;
        let viewer = login_as(&state, "viewer@shop.in", Role::Viewer, AccessLevel::Read).await;
        let app = app(state);

        let product = json!({
            "model_no": "TL-100",
            "name": "Marble 60x60",
            "total_stock": 10,
            "internal_notes": "Supplier owes 4 cartons",
        });
        let (status, _) = send(&app, "POST", "/api/products", Some(&viewer), Some(product.clone())).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, created) = send(&app, "POST", "/api/products", Some(&manager), Some(product)).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["available_stock"], 10);

        let (_, full) = send(&app, "GET", "/api/products", Some(&manager), None).await;
        assert_eq!(full[0]["internal_notes"], "Supplier owes 4 cartons");

        let (status, projected) = send(&app, "GET", "/api/products", Some(&viewer), None).await;
        assert_eq!(status, StatusCode::OK);
        let row = projected[0].as_object().unwrap();
        assert_eq!(row["model_no"], "TL-100");
        assert_eq!(row["available_stock"], 10);
        assert!(!row.contains_key("internal_notes"));
        assert!(!row.contains_key("total_stock"));
    }

    #[tokio::test]
    async fn test_overbooking_is_rejected_with_names() {
        let state = test_state().await;
        let manager = login_as(&state, "manager@shop.in", Role::Manager, AccessLevel::Read).await;
        let reader = login_as(&state, "reader@shop.in", Role::Viewer, AccessLevel::Read).await;
        let writer = login_as(&state, "writer@shop.in", Role::Viewer, AccessLevel::Write).await;
        let app = app(state);

        let (_, tile) = send(
            &app,
            "POST",
            "/api/products",
            Some(&manager),
            Some(json!({ "model_no": "TL-1", "name": "Tile A", "total_stock": 5 })),
        )
        .await;
        let (status, customer) = send(
            &app,
            "POST",
            "/api/customers",
            Some(&writer),
            Some(json!({ "name": "Ayesha Khan" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);

        let booking = |quantity: i64| {
            json!({
                "customer_id": customer["id"],
                "items": [{ "product_id": tile["id"], "quantity": quantity }],
            })
        };

        let (status, _) = send(&app, "POST", "/api/bookings", Some(&reader), Some(booking(1))).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(&app, "POST", "/api/bookings", Some(&writer), Some(booking(8))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "overbooked");
        assert_eq!(body["details"]["products"][0]["name"], "Tile A");

        let (_, bookings) = send(&app, "GET", "/api/bookings", Some(&writer), None).await;
        assert!(bookings.as_array().unwrap().is_empty());

        let (status, created) = send(&app, "POST", "/api/bookings", Some(&writer), Some(booking(5))).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["status"], "pending");

        let uri = format!("/api/products/{}", tile["id"].as_str().unwrap());
        let (_, after) = send(&app, "GET", &uri, Some(&manager), None).await;
        assert_eq!(after["booked_stock"], 5);
        assert_eq!(after["available_stock"], 0);

        let (_, stats) = send(&app, "GET", "/api/stats/overview", Some(&reader), None).await;
        assert_eq!(stats["total_bookings"], 1);
    }

    #[tokio::test]
    async fn test_oversized_quantities_are_rejected() {
        let state = test_state().await;
        let manager = login_as(&state, "manager@shop.in", Role::Manager, AccessLevel::Write).await;
        let app = app(state);

        let (status, body) = send(
            &app,
            "POST",
            "/api/products",
            Some(&manager),
            Some(json!({
                "model_no": "TL-9",
                "name": "Tile Z",
                "total_stock": i64::MAX,
                "bad_stock": i64::MAX,
                "dead_stock": 1,
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "validation_failed");

        let (_, tile) = send(
            &app,
            "POST",
            "/api/products",
            Some(&manager),
            Some(json!({ "model_no": "TL-1", "name": "Tile A", "total_stock": 1 })),
        )
        .await;
        let (_, customer) = send(
            &app,
            "POST",
            "/api/customers",
            Some(&manager),
            Some(json!({ "name": "Ayesha Khan" })),
        )
        .await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/bookings",
            Some(&manager),
            Some(json!({
                "customer_id": customer["id"],
                "items": [
                    { "product_id": tile["id"], "quantity": i64::MAX },
                    { "product_id": tile["id"], "quantity": i64::MAX },
                    { "product_id": tile["id"], "quantity": 3 },
                ],
            })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "validation_failed");

        let (_, bookings) = send(&app, "GET", "/api/bookings", Some(&manager), None).await;
        assert!(bookings.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_category_delete_blocked_while_in_use() {
        let state = test_state().await;
        let manager = login_as(&state, "manager@shop.in", Role::Manager, AccessLevel::Read).await;
        let app = app(state);

        let (_, category) = send(
            &app,
            "POST",
            "/api/categories",
            Some(&manager),
            Some(json!({ "name": "Tiles" })),
        )
        .await;
        send(
            &app,
            "POST",
            "/api/products",
            Some(&manager),
            Some(json!({ "model_no": "TL-1", "name": "Tile", "category_id": category["id"] })),
        )
        .await;

        let uri = format!("/api/categories/{}", category["id"].as_str().unwrap());
        let (status, body) = send(&app, "DELETE", &uri, Some(&manager), None).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(
            body["message"],
            "Cannot delete category. 1 products are using this category."
        );
    }

    #[tokio::test]
    async fn test_csv_import_and_export() {
        let state = test_state().await;
        let manager = login_as(&state, "manager@shop.in", Role::Manager, AccessLevel::Read).await;
        let app = app(state);

        let csv = "Model Number,Name,Total Stock\nTL-1,Tile A,12\nTL-2,Tile B,3\n".to_string();
        let (status, body) = send_raw(&app, "POST", "/api/products/import", Some(&manager), "text/csv", csv).await;
        assert_eq!(status, StatusCode::OK);
        let summary: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(summary["created"], 2);

        let bad = "model_no,name,total_stock\nTL-3,Tile C,lots\n".to_string();
        let (status, body) = send_raw(&app, "POST", "/api/products/import", Some(&manager), "text/csv", bad).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let error: Value = serde_json::from_str(&body).unwrap();
        assert_eq!(error["details"]["row"], 1);

        let (status, exported) = send_raw(
            &app,
            "GET",
            "/api/products/export?columns=model_no,available_stock",
            Some(&manager),
            "text/plain",
            String::new(),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let lines: Vec<&str> = exported.lines().collect();
        assert_eq!(lines, vec!["Model Number,Available Stock", "TL-1,12", "TL-2,3"]);
    }

    #[tokio::test]
    async fn test_activity_and_users_are_gated() {
        let state = test_state().await;
        let admin = login_as(&state, "admin@shop.in", Role::Admin, AccessLevel::Write).await;
        let manager = login_as(&state, "manager@shop.in", Role::Manager, AccessLevel::Read).await;
        let viewer = login_as(&state, "viewer@shop.in", Role::Viewer, AccessLevel::Write).await;
        let app = app(state);

        send(
            &app,
            "POST",
            "/api/manufacturers",
            Some(&manager),
            Some(json!({ "factory_name": "Sonex Ceramics" })),
        )
        .await;

        let (status, _) = send(&app, "GET", "/api/activity", Some(&viewer), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, feed) = send(&app, "GET", "/api/activity?limit=5", Some(&manager), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(feed[0]["entity_type"], "manufacturer");
        assert_eq!(feed[0]["user_email"], "manager@shop.in");

        let (status, _) = send(&app, "GET", "/api/users", Some(&manager), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, body) = send(
            &app,
            "POST",
            "/api/users",
            Some(&admin),
            Some(json!({ "email": "new@shop.in", "password": "short", "role": "viewer" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["code"], "validation_failed");

        let (status, users) = send(&app, "GET", "/api/users", Some(&admin), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(users.as_array().unwrap().len(), 3);
    }
}
