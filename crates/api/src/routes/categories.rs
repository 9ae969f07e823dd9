//! Category catalog reads.
//!
//! Categories are managed out of band; the portal only reads them for
//! catalog browsing.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::CategoryId;
use store::{Category, Store};
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::error::ApiError;
use crate::routes::orders::AppState;

/// GET /categories — all categories, sorted by name.
#[tracing::instrument(skip(state, _user))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _user: CurrentUser,
) -> Result<Json<Vec<Category>>, ApiError> {
    let categories = state.store.list_categories().await?;
    Ok(Json(categories))
}

/// GET /categories/:id — a single category.
#[tracing::instrument(skip(state, _user))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Category>, ApiError> {
    let category = state
        .store
        .get_category(CategoryId::from_uuid(id))
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("category not found: {id}")))?;

    Ok(Json(category))
}
