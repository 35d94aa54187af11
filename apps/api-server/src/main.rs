//! api-server — HTTP API for the employee records workspace.
//!
//! Maps the employee repository onto JSON endpoints:
//! - `GET /employees`, `GET /employees/:id`
//! - `POST /employees`
//! - `PATCH /employees/:id` (salary only)
//! - `DELETE /employees/:id`
//!
//! Storage: SQLite (file) when the `sqlite` feature is enabled and selected,
//! otherwise in-memory.
//!
//! Run:
//! ```bash
//! # pretty logs (default); PORT optional
//! cargo run -p api-server
//!
//! # ephemeral storage, JSON logs
//! STORAGE_PROVIDER=memory LOG_FORMAT=json cargo run -p api-server
//! ```
//!
//! Configuration: See `config.rs` for all environment variables.

mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::HeaderValue;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use domain::adapters::memory_store::InMemoryStore;
use domain::repository::EmployeeRepository;
use domain::{CoreError, Employee, EmployeeId, EmployeeStore, StoreError};
use serde::Deserialize;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// Store abstraction supporting memory or sqlite (feature-gated).
enum AnyStore {
    Memory(InMemoryStore),
    #[cfg(feature = "sqlite")]
    Sqlite(sqlite_adapter::SqliteStore),
}

impl EmployeeStore for AnyStore {
    fn query_all(&self) -> Result<Vec<Employee>, StoreError> {
        match self {
            AnyStore::Memory(s) => s.query_all(),
            #[cfg(feature = "sqlite")]
            AnyStore::Sqlite(s) => s.query_all(),
        }
    }

    fn get(&self, id: EmployeeId) -> Result<Option<Employee>, StoreError> {
        match self {
            AnyStore::Memory(s) => s.get(id),
            #[cfg(feature = "sqlite")]
            AnyStore::Sqlite(s) => s.get(id),
        }
    }

    fn add(&self, employee: Employee) -> Result<(), StoreError> {
        match self {
            AnyStore::Memory(s) => s.add(employee),
            #[cfg(feature = "sqlite")]
            AnyStore::Sqlite(s) => s.add(employee),
        }
    }

    fn save(&self, employee: &Employee) -> Result<(), StoreError> {
        match self {
            AnyStore::Memory(s) => s.save(employee),
            #[cfg(feature = "sqlite")]
            AnyStore::Sqlite(s) => s.save(employee),
        }
    }

    fn remove(&self, id: EmployeeId) -> Result<(), StoreError> {
        match self {
            AnyStore::Memory(s) => s.remove(id),
            #[cfg(feature = "sqlite")]
            AnyStore::Sqlite(s) => s.remove(id),
        }
    }

    fn commit(&self) -> Result<(), StoreError> {
        match self {
            AnyStore::Memory(s) => s.commit(),
            #[cfg(feature = "sqlite")]
            AnyStore::Sqlite(s) => s.commit(),
        }
    }

    fn rollback(&self) -> Result<(), StoreError> {
        match self {
            AnyStore::Memory(s) => s.rollback(),
            #[cfg(feature = "sqlite")]
            AnyStore::Sqlite(s) => s.rollback(),
        }
    }
}

#[derive(Clone)]
struct AppState {
    repo: Arc<EmployeeRepository<AnyStore>>,
}

#[tokio::main]
async fn main() {
    // Load and validate config first (fail fast on misconfiguration)
    let cfg = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&cfg);

    let state = AppState {
        repo: Arc::new(EmployeeRepository::new(build_store(&cfg))),
    };

    // Request ID header name
    let x_request_id = axum::http::HeaderName::from_static("x-request-id");

    let mut app = router(state)
        .layer(PropagateRequestIdLayer::new(x_request_id.clone()))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("-");
                tracing::info_span!(
                    "http_request",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(SetRequestIdLayer::new(x_request_id, MakeRequestUuid));

    // CORS - already validated in Config::from_env()
    let cors = if cfg.cors_allow_origin == HeaderValue::from_static("*") {
        CorsLayer::permissive()
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list([cfg.cors_allow_origin]))
            .allow_methods([
                axum::http::Method::GET,
                axum::http::Method::POST,
                axum::http::Method::PATCH,
                axum::http::Method::DELETE,
                axum::http::Method::OPTIONS,
            ])
            .allow_headers([axum::http::header::CONTENT_TYPE])
    };
    app = app.layer(cors);

    let addr: SocketAddr = ([0, 0, 0, 0], cfg.port).into();
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(%addr, err = %e, "failed to bind");
            std::process::exit(1);
        }
    };
    info!(%addr, "api-server listening");
    if let Err(e) = axum::serve(listener, app).await {
        error!(err = %e, "server error");
        std::process::exit(1);
    }
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/employees", get(list_employees).post(create_employee))
        .route(
            "/employees/:id",
            get(get_employee)
                .patch(update_salary)
                .delete(delete_employee),
        )
        .with_state(state)
}

fn init_tracing(cfg: &config::Config) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);
    match cfg.log_format {
        config::LogFormat::Json => {
            registry
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_timer(fmt::time::SystemTime)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
        config::LogFormat::Pretty => {
            registry
                .with(
                    fmt::layer()
                        .pretty()
                        .with_target(true)
                        .with_writer(std::io::stdout),
                )
                .init();
        }
    }
}

// Construct a store instance based on config and feature flags.
fn build_store(cfg: &config::Config) -> AnyStore {
    match cfg.storage_provider {
        #[cfg(feature = "sqlite")]
        config::StorageProvider::Sqlite => match sqlite_adapter::SqliteStore::from_env() {
            Ok(s) => AnyStore::Sqlite(s),
            Err(e) => {
                error!(err = %e, "failed to init SqliteStore from env; using memory");
                AnyStore::Memory(InMemoryStore::new())
            }
        },
        #[cfg(not(feature = "sqlite"))]
        config::StorageProvider::Sqlite => {
            warn!("sqlite feature disabled; using memory");
            AnyStore::Memory(InMemoryStore::new())
        }
        config::StorageProvider::Memory => AnyStore::Memory(InMemoryStore::new()),
    }
}

#[derive(Deserialize)]
struct CreateEmployeeReq {
    id: u32,
    name: String,
    job_title: String,
    salary: u64,
}

#[derive(Deserialize)]
struct UpdateSalaryReq {
    salary: u64,
}

fn internal_error() -> axum::response::Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(http_common::json_err("internal")),
    )
        .into_response()
}

fn bad_id() -> axum::response::Response {
    warn!("bad employee id in path");
    (
        StatusCode::BAD_REQUEST,
        Json(http_common::json_err("invalid_id")),
    )
        .into_response()
}

fn not_found() -> axum::response::Response {
    (
        StatusCode::NOT_FOUND,
        Json(http_common::json_err("not_found")),
    )
        .into_response()
}

fn invalid_request(msg: &str) -> axum::response::Response {
    (
        StatusCode::BAD_REQUEST,
        Json(http_common::json_error_with_message("invalid_request", msg)),
    )
        .into_response()
}

/// Any body the `Json` extractor refuses answers 400, never 415 or 422.
fn invalid_body(rej: JsonRejection) -> axum::response::Response {
    warn!(status = %rej.status(), "rejected request body");
    invalid_request(&rej.body_text())
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

async fn list_employees(State(state): State<AppState>) -> impl IntoResponse {
    match state.repo.list_all() {
        Ok(employees) => (StatusCode::OK, Json(employees)).into_response(),
        Err(e) => {
            error!(err = ?e, "list error");
            internal_error()
        }
    }
}

async fn get_employee(
    State(state): State<AppState>,
    Path(id_str): Path<String>,
) -> impl IntoResponse {
    let Some(id) = http_common::parse_employee_id(&id_str) else {
        return bad_id();
    };
    match state.repo.find_by_id(id) {
        Ok(Some(employee)) => (StatusCode::OK, Json(employee)).into_response(),
        Ok(None) => {
            warn!(%id, "lookup 404");
            not_found()
        }
        Err(e) => {
            error!(%id, err = ?e, "lookup error");
            internal_error()
        }
    }
}

async fn create_employee(
    State(state): State<AppState>,
    body: Result<Json<CreateEmployeeReq>, JsonRejection>,
) -> impl IntoResponse {
    let body = match body {
        Ok(Json(body)) => body,
        Err(rej) => return invalid_body(rej),
    };
    let employee = Employee::new(body.id, body.name, body.job_title, body.salary);

    match state.repo.add(employee.clone()) {
        Ok(()) => {
            info!(id = %employee.id, "create ok");
            (StatusCode::CREATED, Json(employee)).into_response()
        }
        Err(e @ CoreError::DuplicateId(_)) => (
            StatusCode::CONFLICT,
            Json(http_common::json_error_with_message(
                "conflict",
                &e.to_string(),
            )),
        )
            .into_response(),
        Err(CoreError::InvalidEmployee(msg)) => invalid_request(&msg),
        Err(e) => {
            error!(err = ?e, "create error");
            internal_error()
        }
    }
}

async fn update_salary(
    State(state): State<AppState>,
    Path(id_str): Path<String>,
    body: Result<Json<UpdateSalaryReq>, JsonRejection>,
) -> impl IntoResponse {
    let Some(id) = http_common::parse_employee_id(&id_str) else {
        return bad_id();
    };
    let body = match body {
        Ok(Json(body)) => body,
        Err(rej) => return invalid_body(rej),
    };
    match state.repo.update_salary(id, body.salary) {
        Ok(Some(employee)) => (StatusCode::OK, Json(employee)).into_response(),
        Ok(None) => not_found(),
        Err(CoreError::InvalidEmployee(msg)) => invalid_request(&msg),
        Err(e) => {
            error!(%id, err = ?e, "update error");
            internal_error()
        }
    }
}

async fn delete_employee(
    State(state): State<AppState>,
    Path(id_str): Path<String>,
) -> impl IntoResponse {
    let Some(id) = http_common::parse_employee_id(&id_str) else {
        return bad_id();
    };
    match state.repo.delete(id) {
        Ok(Some(_)) => StatusCode::NO_CONTENT.into_response(),
        Ok(None) => not_found(),
        Err(e) => {
            error!(%id, err = ?e, "delete error");
            internal_error()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::util::ServiceExt;

    fn app() -> Router {
        let state = AppState {
            repo: Arc::new(EmployeeRepository::new(AnyStore::Memory(
                InMemoryStore::new(),
            ))),
        };
        router(state)
    }

    fn post_employee(json: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/employees")
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap()
    }

    async fn body_json(resp: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    const AARIS: &str = r#"{"id":101,"name":"Aaris","job_title":"TCE","salary":90000}"#;

    #[tokio::test]
    async fn create_list_and_get_flow() {
        let router = app();

        let resp = router.clone().oneshot(post_employee(AARIS)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = router
            .clone()
            .oneshot(Request::builder().uri("/employees").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let list = body_json(resp).await;
        assert_eq!(
            list,
            serde_json::json!([{"id":101,"name":"Aaris","job_title":"TCE","salary":90000}])
        );

        let resp = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/employees/101")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await["name"], "Aaris");
    }

    #[tokio::test]
    async fn duplicate_create_is_conflict() {
        let router = app();
        let resp = router.clone().oneshot(post_employee(AARIS)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);

        let resp = router.clone().oneshot(post_employee(AARIS)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(body_json(resp).await["error"]["code"], "conflict");

        let resp = router
            .oneshot(Request::builder().uri("/employees").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let list = body_json(resp).await;
        assert_eq!(list.as_array().map(|a| a.len()), Some(1));
    }

    #[tokio::test]
    async fn invalid_employee_is_bad_request() {
        let resp = app()
            .oneshot(post_employee(
                r#"{"id":1,"name":"  ","job_title":"TCE","salary":1}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"]["code"], "invalid_request");
    }

    #[tokio::test]
    async fn get_unknown_and_bad_id() {
        let router = app();
        let resp = router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/employees/404")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = router
            .oneshot(
                Request::builder()
                    .uri("/employees/abc")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"]["code"], "invalid_id");
    }

    #[tokio::test]
    async fn patch_salary_updates_only_salary() {
        let router = app();
        router.clone().oneshot(post_employee(AARIS)).await.unwrap();

        let resp = router
            .clone()
            .oneshot(
                Request::builder()
                    .method("PATCH")
                    .uri("/employees/101")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"salary":95000}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            body_json(resp).await,
            serde_json::json!({"id":101,"name":"Aaris","job_title":"TCE","salary":95000})
        );

        let resp = router
            .oneshot(
                Request::builder()
                    .method("PATCH")
                    .uri("/employees/7")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"salary":1}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_existing_then_missing() {
        let router = app();
        router.clone().oneshot(post_employee(AARIS)).await.unwrap();

        let delete = || {
            Request::builder()
                .method("DELETE")
                .uri("/employees/101")
                .body(Body::empty())
                .unwrap()
        };
        let resp = router.clone().oneshot(delete()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NO_CONTENT);

        let resp = router.clone().oneshot(delete()).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = router
            .oneshot(Request::builder().uri("/employees").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(resp).await, serde_json::json!([]));
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let resp = app()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_json(resp).await, serde_json::json!({"status": "ok"}));
    }

    fn patch_salary(uri: &str, json: &str) -> Request<Body> {
        Request::builder()
            .method("PATCH")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn malformed_create_bodies_are_bad_request() {
        let router = app();
        for body in [
            r#"{"id":1}"#,
            r#"{"id":1,"name":"A","job_title":"T","salary":-5}"#,
            "not json",
        ] {
            let resp = router.clone().oneshot(post_employee(body)).await.unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body {body}");
            assert_eq!(body_json(resp).await["error"]["code"], "invalid_request");
        }

        let resp = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/employees")
                    .body(Body::from(AARIS))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"]["code"], "invalid_request");
    }

    #[tokio::test]
    async fn malformed_patch_bodies_are_bad_request() {
        let router = app();
        router.clone().oneshot(post_employee(AARIS)).await.unwrap();

        for body in ["{}", r#"{"salary":-5}"#, "not json"] {
            let resp = router
                .clone()
                .oneshot(patch_salary("/employees/101", body))
                .await
                .unwrap();
            assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "body {body}");
            assert_eq!(body_json(resp).await["error"]["code"], "invalid_request");
        }

        let resp = router
            .oneshot(Request::builder().uri("/employees/101").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(body_json(resp).await["salary"], 90000);
    }

    #[tokio::test]
    async fn salary_beyond_signed_64_bit_is_bad_request() {
        let router = app();
        let resp = router
            .clone()
            .oneshot(post_employee(
                r#"{"id":1,"name":"A","job_title":"T","salary":9223372036854775808}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"]["code"], "invalid_request");

        router.clone().oneshot(post_employee(AARIS)).await.unwrap();
        let resp = router
            .oneshot(patch_salary(
                "/employees/101",
                r#"{"salary":9223372036854775808}"#,
            ))
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(resp).await["error"]["code"], "invalid_request");
    }
}
