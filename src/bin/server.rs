//! Farmgate HTTP Server
//!
//! Run with: cargo run --features server --bin farmgate-server
//!
//! The caller identity is read from the `x-user-id` header, which an upstream
//! authentication layer is expected to set after verifying credentials.
//!
//! Endpoints:
//!   GET    /health                          Health check
//!   POST   /farms                           Create farm (caller becomes manager)
//!   GET    /farms                           Farms the caller has a grant on
//!   GET    /farms/:farm                     Get farm
//!   DELETE /farms/:farm                     Delete farm (owner only)
//!   GET    /farms/:farm/grants              List grants (manager)
//!   POST   /farms/:farm/grants              Create grant (manager)
//!   PUT    /farms/:farm/grants/:user        Change grant level (manager)
//!   DELETE /farms/:farm/grants/:user        Delete grant (manager)
//!   POST   /nodes                           Create row/rack/shelf/fan/sensor
//!   GET    /nodes/:kind/:id                 Get node
//!   DELETE /nodes/:kind/:id                 Delete node
//!   GET    /nodes/:kind/:id/farm            Resolve owning farm
//!   GET    /access/:kind/:id?levels=a,b     Check caller access

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use farmgate::{
    Config, Error, Farm, FarmId, Level, LevelSet, LmdbStore, NewNode, Node, PermissionGrant, ResourceId,
    ResourceKind, ResourceRef, Rule, UserId,
};

type AppState = Arc<LmdbStore>;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct CreateFarmRequest {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CreateGrantRequest {
    user: UserId,
    level: Level,
}

#[derive(Debug, Deserialize)]
struct UpdateGrantRequest {
    level: Level,
}

#[derive(Debug, Deserialize)]
struct AccessQuery {
    levels: String,
}

#[derive(Debug, Serialize)]
struct ResolveResponse {
    farm_id: FarmId,
}

#[derive(Debug, Serialize)]
struct AccessResponse {
    allowed: bool,
    farm_id: FarmId,
    levels: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

// ============================================================================
// Errors
// ============================================================================

struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, msg) = match &self.0 {
            Error::NotFound(_) => (StatusCode::NOT_FOUND, self.0.to_string()),
            Error::Conflict(_) => (StatusCode::CONFLICT, self.0.to_string()),
            Error::Forbidden(_) => (StatusCode::FORBIDDEN, self.0.to_string()),
            Error::Invalid(_) => (StatusCode::BAD_REQUEST, self.0.to_string()),
            Error::Integrity(_) | Error::Storage(_) => {
                error!(error = %self.0, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal error".to_string())
            }
        };
        (status, Json(ErrorResponse { error: msg })).into_response()
    }
}

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

fn caller(headers: &HeaderMap) -> Result<UserId, ApiError> {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| UserId::new(s).ok())
        .ok_or(ApiError(Error::Forbidden(Rule::MissingIdentity)))
}

fn node_ref(kind: &str, id: ResourceId) -> Result<ResourceRef, ApiError> {
    Ok(ResourceRef::new(kind.parse::<ResourceKind>()?, id))
}

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// Farms

async fn create_farm(
    State(store): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CreateFarmRequest>,
) -> ApiResult<Farm> {
    let user = caller(&headers)?;
    Ok(Json(farmgate::create_farm(&store, &user, &req.name)?))
}

async fn list_farms(State(store): State<AppState>, headers: HeaderMap) -> ApiResult<Vec<Farm>> {
    let user = caller(&headers)?;
    Ok(Json(farmgate::list_farms(&store, &user)?))
}

async fn get_farm(State(store): State<AppState>, headers: HeaderMap, Path(farm): Path<FarmId>) -> ApiResult<Farm> {
    let user = caller(&headers)?;
    Ok(Json(farmgate::get_farm(&store, &user, farm)?))
}

async fn delete_farm(State(store): State<AppState>, headers: HeaderMap, Path(farm): Path<FarmId>) -> ApiResult<Farm> {
    let user = caller(&headers)?;
    Ok(Json(farmgate::delete_farm(&store, &user, farm)?))
}

// Grants

async fn list_grants(
    State(store): State<AppState>,
    headers: HeaderMap,
    Path(farm): Path<FarmId>,
) -> ApiResult<Vec<PermissionGrant>> {
    let user = caller(&headers)?;
    Ok(Json(farmgate::list_grants(&store, &user, farm)?))
}

async fn create_grant(
    State(store): State<AppState>,
    headers: HeaderMap,
    Path(farm): Path<FarmId>,
    Json(req): Json<CreateGrantRequest>,
) -> Result<(StatusCode, Json<PermissionGrant>), ApiError> {
    let user = caller(&headers)?;
    let g = farmgate::create_grant(&store, &user, &req.user, farm, req.level)?;
    Ok((StatusCode::CREATED, Json(g)))
}

async fn update_grant(
    State(store): State<AppState>,
    headers: HeaderMap,
    Path((farm, target)): Path<(FarmId, String)>,
    Json(req): Json<UpdateGrantRequest>,
) -> ApiResult<PermissionGrant> {
    let user = caller(&headers)?;
    let target = UserId::new(target)?;
    Ok(Json(farmgate::update_grant(&store, &user, &target, farm, req.level)?))
}

async fn delete_grant(
    State(store): State<AppState>,
    headers: HeaderMap,
    Path((farm, target)): Path<(FarmId, String)>,
) -> ApiResult<PermissionGrant> {
    let user = caller(&headers)?;
    let target = UserId::new(target)?;
    Ok(Json(farmgate::delete_grant(&store, &user, &target, farm)?))
}

// Nodes

async fn create_node(
    State(store): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<NewNode>,
) -> Result<(StatusCode, Json<Node>), ApiError> {
    let user = caller(&headers)?;
    let node = farmgate::create_node(&store, &user, &req)?;
    Ok((StatusCode::CREATED, Json(node)))
}

async fn get_node(
    State(store): State<AppState>,
    headers: HeaderMap,
    Path((kind, id)): Path<(String, ResourceId)>,
) -> ApiResult<Node> {
    let user = caller(&headers)?;
    Ok(Json(farmgate::get_node(&store, &user, node_ref(&kind, id)?)?))
}

async fn delete_node(
    State(store): State<AppState>,
    headers: HeaderMap,
    Path((kind, id)): Path<(String, ResourceId)>,
) -> ApiResult<Node> {
    let user = caller(&headers)?;
    Ok(Json(farmgate::delete_node(&store, &user, node_ref(&kind, id)?)?))
}

async fn resolve_farm(
    State(store): State<AppState>,
    headers: HeaderMap,
    Path((kind, id)): Path<(String, ResourceId)>,
) -> ApiResult<ResolveResponse> {
    let user = caller(&headers)?;
    let r = node_ref(&kind, id)?;
    let farm_id = farmgate::resolve(&store, r)?;
    farmgate::require(&store, &user, farm_id, LevelSet::ANY_MEMBER)?;
    Ok(Json(ResolveResponse { farm_id }))
}

async fn check_access(
    State(store): State<AppState>,
    headers: HeaderMap,
    Path((kind, id)): Path<(String, ResourceId)>,
    Query(q): Query<AccessQuery>,
) -> ApiResult<AccessResponse> {
    let user = caller(&headers)?;
    let r = node_ref(&kind, id)?;
    let names: Vec<&str> = q.levels.split(',').map(str::trim).filter(|s| !s.is_empty()).collect();
    let levels = LevelSet::from_names(&names)?;
    let farm_id = farmgate::resolve(&store, r)?;
    let allowed = farmgate::can_perform(&store, &user, farm_id, levels)?;
    Ok(Json(AccessResponse { allowed, farm_id, levels: levels.names() }))
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            std::process::exit(2);
        }
    };

    let store = match LmdbStore::open(&config) {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!(error = %e, path = %config.db_path.display(), "failed to open database");
            std::process::exit(1);
        }
    };
    info!(path = %config.db_path.display(), "database opened");

    let app = Router::new()
        .route("/health", get(health))
        // Farms
        .route("/farms", post(create_farm).get(list_farms))
        .route("/farms/:farm", get(get_farm).delete(delete_farm))
        // Grants
        .route("/farms/:farm/grants", get(list_grants).post(create_grant))
        .route("/farms/:farm/grants/:user", put(update_grant).delete(delete_grant))
        // Nodes
        .route("/nodes", post(create_node))
        .route("/nodes/:kind/:id", get(get_node).delete(delete_node))
        .route("/nodes/:kind/:id/farm", get(resolve_farm))
        // Access checks
        .route("/access/:kind/:id", get(check_access))
        // Middleware
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(store);

    let listener = match tokio::net::TcpListener::bind(&config.bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            error!(error = %e, addr = %config.bind_addr, "failed to bind");
            std::process::exit(1);
        }
    };
    info!(addr = %config.bind_addr, version = env!("CARGO_PKG_VERSION"), "farmgate-server listening");
    if let Err(e) = axum::serve(listener, app).await {
        error!(error = %e, "server error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    async fn respond(e: Error) -> (StatusCode, String) {
        let resp = ApiError(e).into_response();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn error_status_codes() {
        let cases = [
            (Error::NotFound("farm 9".into()), StatusCode::NOT_FOUND),
            (Error::Conflict("grant".into()), StatusCode::CONFLICT),
            (Error::Forbidden(Rule::InsufficientLevel), StatusCode::FORBIDDEN),
            (Error::Forbidden(Rule::MissingIdentity), StatusCode::FORBIDDEN),
            (Error::Invalid("bad kind".into()), StatusCode::BAD_REQUEST),
            (Error::Integrity("rack 3 references missing row 2".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (Error::Storage("MDB_PANIC".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (e, want) in cases {
            assert_eq!(respond(e.clone()).await.0, want, "{:?}", e);
        }
    }

    #[tokio::test]
    async fn client_errors_carry_detail() {
        let (_, body) = respond(Error::NotFound("farm 9".into())).await;
        assert!(body.contains("farm 9 not found"), "{}", body);
        let (_, body) = respond(Error::Forbidden(Rule::ManagerProtected)).await;
        assert!(body.contains("manager grants are protected"), "{}", body);
    }

    #[tokio::test]
    async fn internal_errors_hide_detail() {
        let (_, body) = respond(Error::Integrity("rack 3 references missing row 2".into())).await;
        assert!(body.contains("internal error"));
        assert!(!body.contains("rack 3"), "{}", body);

        let (_, body) = respond(Error::Storage("MDB_PANIC at /var/lib/farmgate".into())).await;
        assert!(!body.contains("MDB_PANIC") && !body.contains("/var/lib"), "{}", body);
    }

    #[test]
    fn caller_identity_from_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", HeaderValue::from_static("alice"));
        assert_eq!(caller(&headers).ok().map(|u| u.to_string()), Some("alice".to_string()));
    }

    #[test]
    fn missing_or_bad_identity_is_forbidden() {
        let mut headers = HeaderMap::new();
        let missing = |h: &HeaderMap| matches!(caller(h), Err(ApiError(Error::Forbidden(Rule::MissingIdentity))));
        assert!(missing(&headers));

        headers.insert("x-user-id", HeaderValue::from_static(""));
        assert!(missing(&headers));

        let long = HeaderValue::from_str(&"x".repeat(UserId::MAX_LEN + 1)).unwrap();
        headers.insert("x-user-id", long);
        assert!(missing(&headers));
    }

    #[test]
    fn unknown_node_kind_is_bad_request() {
        let e = node_ref("barn", 1).err().unwrap();
        assert_eq!(e.into_response().status(), StatusCode::BAD_REQUEST);
        assert_eq!(node_ref("sensor", 4).ok().map(|r| r.kind), Some(ResourceKind::SensorDevice));
    }
}
