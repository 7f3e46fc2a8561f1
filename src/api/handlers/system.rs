//! System endpoints: health check and the category catalog.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Serialize;
use utoipa::ToSchema;

use crate::app_state::AppState;
use crate::domain::room::{Difficulty, MainCategory, SubCategory};

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
struct HealthResponse {
    status: String,
    timestamp: String,
    version: String,
}

/// `GET /health` — Service health status.
#[utoipa::path(
    get,
    path = "/health",
    tag = "System",
    summary = "Health check",
    description = "Returns service health status, version, and current timestamp.",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
    )
)]
pub async fn health_handler() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "healthy".to_string(),
            timestamp: Utc::now().to_rfc3339(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }),
    )
}

/// One selectable category pairing with its labels.
#[derive(Debug, Serialize, ToSchema)]
struct CategoryInfo {
    main_category: MainCategory,
    sub_category: SubCategory,
    label: String,
}

/// One selectable difficulty with its label.
#[derive(Debug, Serialize, ToSchema)]
struct DifficultyInfo {
    difficulty: Difficulty,
    label: &'static str,
}

/// Full catalog offered to the room-creation form.
#[derive(Debug, Serialize, ToSchema)]
struct CatalogResponse {
    categories: Vec<CategoryInfo>,
    difficulties: Vec<DifficultyInfo>,
}

const CATEGORY_PAIRS: [(MainCategory, SubCategory); 8] = [
    (MainCategory::Science, SubCategory::Physics),
    (MainCategory::Science, SubCategory::Chemistry),
    (MainCategory::Science, SubCategory::Biology),
    (MainCategory::History, SubCategory::AncientHistory),
    (MainCategory::History, SubCategory::ModernHistory),
    (MainCategory::Language, SubCategory::Vocabulary),
    (MainCategory::Language, SubCategory::Grammar),
    (MainCategory::General, SubCategory::Mixed),
];

/// `GET /config/categories` — List selectable categories and
/// difficulties.
#[utoipa::path(
    get,
    path = "/config/categories",
    tag = "System",
    summary = "List quiz categories",
    description = "Returns every selectable main/sub category pairing and difficulty level for the room-creation form.",
    responses(
        (status = 200, description = "Category catalog", body = CatalogResponse),
    )
)]
pub async fn categories_handler() -> impl IntoResponse {
    let categories = CATEGORY_PAIRS
        .iter()
        .map(|(main, sub)| CategoryInfo {
            main_category: *main,
            sub_category: *sub,
            label: format!("{} / {}", main.label(), sub.label()),
        })
        .collect();
    let difficulties = vec![
        DifficultyInfo {
            difficulty: Difficulty::Easy,
            label: "Easy",
        },
        DifficultyInfo {
            difficulty: Difficulty::Normal,
            label: "Normal",
        },
        DifficultyInfo {
            difficulty: Difficulty::Hard,
            label: "Hard",
        },
    ];
    (
        StatusCode::OK,
        Json(CatalogResponse {
            categories,
            difficulties,
        }),
    )
}

/// System routes mounted at the root level (not under /api/v1).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_handler))
        .route("/config/categories", get(categories_handler))
}
