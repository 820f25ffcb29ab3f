//! Category listing endpoint

use axum::{extract::State, routing::get, Json, Router};
use serde::{Deserialize, Serialize};

use crate::state::AppState;

/// Known category names, sorted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct CategoriesResponse {
    pub categories: Vec<String>,
}

/// GET /categories - Names accepted by POST /incident
#[cfg_attr(feature = "openapi", utoipa::path(
    get,
    path = "/categories",
    tag = "Categories",
    responses(
        (status = 200, description = "Known categories", body = CategoriesResponse),
    ),
))]
pub async fn list_categories(State(state): State<AppState>) -> Json<CategoriesResponse> {
    Json(CategoriesResponse {
        categories: state.intake.categories(),
    })
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_categories))
        .with_state(state)
}
