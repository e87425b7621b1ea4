//! Read-only HTTP API over the catalog.
//!
//! A thin dispatcher: each handler parses its query string into the
//! engine's request types, calls one catalog operation and serializes the
//! result. No state is kept between requests.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/api/departments` | Departments with product counts |
//! | `GET`  | `/api/departments/{id}` | One department |
//! | `GET`  | `/api/departments/{id}/products` | Products of one department |
//! | `GET`  | `/api/departments/{id}/stats` | Statistics of one department |
//! | `GET`  | `/api/products` | Filtered, paginated products |
//! | `GET`  | `/api/products/stats` | Catalog-wide statistics |
//! | `GET`  | `/api/products/{id}` | One product |
//! | `GET`  | `/api/categories` | Distinct categories |
//! | `GET`  | `/api/brands` | Distinct brands |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! Product listings accept `page`, `limit`, `category`, `brand`,
//! `department_id`, `department` (name) and `search`.
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "invalid limit: must be an integer", "field": "limit" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404), `internal` (500).

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::config::Config;
use crate::error::CatalogError;
use crate::models::{DepartmentDetail, DepartmentId, DepartmentSummary, ProductWithDepartment};
use crate::query::{self, DepartmentProductPage, PageRequest, ProductFilters, ProductPage};
use crate::stats::{self, AggregateStats};
use crate::store::CatalogStore;

#[derive(Clone)]
struct AppState {
    store: CatalogStore,
    config: Arc<Config>,
}

/// Serve the API on `[server].bind` until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store = CatalogStore::open(config).await?;
    let bind_addr = config.server.bind.clone();
    let app = router(store, Arc::new(config.clone()));

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(bind = %bind_addr, "catalog API listening");
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the router with permissive CORS.
pub fn router(store: CatalogStore, config: Arc<Config>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/departments", get(handle_list_departments))
        .route("/api/departments/{id}", get(handle_get_department))
        .route(
            "/api/departments/{id}/products",
            get(handle_department_products),
        )
        .route("/api/departments/{id}/stats", get(handle_department_stats))
        .route("/api/products", get(handle_list_products))
        .route("/api/products/stats", get(handle_stats))
        .route("/api/products/{id}", get(handle_get_product))
        .route("/api/categories", get(handle_categories))
        .route("/api/brands", get(handle_brands))
        .route("/health", get(handle_health))
        .layer(cors)
        .with_state(AppState {
            store,
            config,
        })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: &'static str,
    message: String,
    /// Offending request parameter, for `bad_request`.
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<String>,
}

#[derive(Debug)]
struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
    field: Option<String>,
}

impl From<CatalogError> for AppError {
    fn from(err: CatalogError) -> Self {
        match &err {
            CatalogError::Validation { field, .. } => AppError {
                status: StatusCode::BAD_REQUEST,
                code: "bad_request",
                field: Some(field.clone()),
                message: err.to_string(),
            },
            CatalogError::NotFound { .. } => AppError {
                status: StatusCode::NOT_FOUND,
                code: "not_found",
                field: None,
                message: err.to_string(),
            },
            _ => {
                error!(error = %err, "request failed");
                AppError {
                    status: StatusCode::INTERNAL_SERVER_ERROR,
                    code: "internal",
                    field: None,
                    message: "internal server error".to_string(),
                }
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
                field: self.field,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, AppError>;

// ============ Request parsing ============

/// Raw query string of product listings. Everything arrives as text so a
/// malformed number becomes a `bad_request` naming the parameter.
#[derive(Debug, Default, Deserialize)]
struct ProductQuery {
    page: Option<String>,
    limit: Option<String>,
    category: Option<String>,
    brand: Option<String>,
    department_id: Option<String>,
    department: Option<String>,
    search: Option<String>,
}

impl ProductQuery {
    fn into_request(self) -> Result<(ProductFilters, PageRequest), CatalogError> {
        let page = PageRequest::parse(self.page.as_deref(), self.limit.as_deref())?;
        let department_id = match self.department_id.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(parse_id("department_id", raw)?),
        };
        let filters = ProductFilters {
            category: self.category,
            brand: self.brand,
            department_id,
            department_name: self.department,
            search: self.search,
        };
        Ok((filters, page))
    }
}

fn parse_id(field: &str, raw: &str) -> Result<DepartmentId, CatalogError> {
    raw.trim()
        .parse()
        .map_err(|_| CatalogError::validation(field, "must be an integer"))
}

// ============ Handlers ============

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn handle_list_departments(
    State(state): State<AppState>,
) -> ApiResult<Vec<DepartmentSummary>> {
    Ok(Json(query::list_departments(&state.store).await?))
}

async fn handle_get_department(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<DepartmentDetail> {
    let id = parse_id("id", &id)?;
    Ok(Json(query::get_department(&state.store, id).await?))
}

async fn handle_department_products(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(params): Query<ProductQuery>,
) -> ApiResult<DepartmentProductPage> {
    let id = parse_id("id", &id)?;
    let (filters, page) = params.into_request()?;
    let result =
        query::list_department_products(&state.store, id, &filters, page, &state.config.query)
            .await?;
    Ok(Json(result))
}

async fn handle_department_stats(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<AggregateStats> {
    let id = parse_id("id", &id)?;
    let result =
        stats::get_department_statistics(&state.store, id, state.config.stats.top_n).await?;
    Ok(Json(result))
}

async fn handle_list_products(
    State(state): State<AppState>,
    Query(params): Query<ProductQuery>,
) -> ApiResult<ProductPage> {
    let (filters, page) = params.into_request()?;
    let result = query::list_products(&state.store, &filters, page, &state.config.query).await?;
    Ok(Json(result))
}

async fn handle_stats(State(state): State<AppState>) -> ApiResult<AggregateStats> {
    Ok(Json(
        stats::get_statistics(&state.store, state.config.stats.top_n).await?,
    ))
}

async fn handle_get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<ProductWithDepartment> {
    Ok(Json(query::get_product(&state.store, &id).await?))
}

async fn handle_categories(State(state): State<AppState>) -> ApiResult<Vec<String>> {
    Ok(Json(query::list_categories(&state.store).await?))
}

async fn handle_brands(State(state): State<AppState>) -> ApiResult<Vec<String>> {
    Ok(Json(query::list_brands(&state.store).await?))
}
