//! Product catalog and admin product management endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{CategoryId, Money, ProductId, UserId};
use serde::{Deserialize, Serialize};
use store::{Category, NewProduct, Product, ProductFilter, Store, UserSummary};
use uuid::Uuid;

use crate::auth::{CurrentUser, require_admin};
use crate::error::ApiError;
use crate::routes::orders::AppState;

// -- Request types --

#[derive(Debug, Deserialize)]
pub struct ListProductsQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub category: Option<Uuid>,
}

#[derive(Deserialize)]
pub struct ProductRequest {
    pub name: String,
    #[serde(default)]
    pub reference: Option<String>,
    #[serde(default)]
    pub supplier_ref: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price_cents: i64,
    #[serde(default)]
    pub stock: i32,
    pub category_id: Uuid,
}

impl ProductRequest {
    fn into_new_product(self) -> Result<NewProduct, ApiError> {
        if self.price_cents < 0 {
            return Err(ApiError::BadRequest("price must not be negative".to_string()));
        }
        if self.stock < 0 {
            return Err(ApiError::BadRequest("stock must not be negative".to_string()));
        }
        Ok(NewProduct {
            name: self.name,
            reference: self.reference,
            supplier_ref: self.supplier_ref,
            description: self.description,
            price: Money::from_cents(self.price_cents),
            stock: self.stock,
            category_id: CategoryId::from_uuid(self.category_id),
        })
    }
}

#[derive(Deserialize)]
pub struct AssignUserRequest {
    pub user_id: Uuid,
}

// -- Response types --

#[derive(Serialize)]
pub struct ProductResponse {
    pub id: ProductId,
    pub name: String,
    pub reference: Option<String>,
    pub supplier_ref: Option<String>,
    pub description: Option<String>,
    pub price_cents: i64,
    pub stock: i32,
    pub category: Category,
    pub assigned_user: Option<UserSummary>,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            name: product.name,
            reference: product.reference,
            supplier_ref: product.supplier_ref,
            description: product.description,
            price_cents: product.price.cents(),
            stock: product.stock,
            category: product.category,
            assigned_user: product.assigned_user,
        }
    }
}

// -- Handlers --

/// GET /products — catalog listing with optional search and category
/// filters. Non-admins only see products assigned to them.
#[tracing::instrument(skip(state, user))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Query(query): Query<ListProductsQuery>,
) -> Result<Json<Vec<ProductResponse>>, ApiError> {
    let filter = ProductFilter {
        search: query.search,
        category: query.category.map(CategoryId::from_uuid),
        assigned_to: (!user.0.role.is_admin()).then_some(user.0.id),
    };

    let products = state.store.list_products(filter).await?;
    Ok(Json(products.into_iter().map(Into::into).collect()))
}

/// POST /products — admin: create a product.
#[tracing::instrument(skip(state, user, req))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Json(req): Json<ProductRequest>,
) -> Result<(StatusCode, Json<ProductResponse>), ApiError> {
    require_admin(&user.0)?;

    let product = state.store.create_product(req.into_new_product()?).await?;
    Ok((StatusCode::CREATED, Json(product.into())))
}

/// PUT /products/:id — admin: replace a product's fields.
#[tracing::instrument(skip(state, user, req))]
pub async fn update<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<ProductRequest>,
) -> Result<Json<ProductResponse>, ApiError> {
    require_admin(&user.0)?;

    let product = state
        .store
        .update_product(ProductId::from_uuid(id), req.into_new_product()?)
        .await?;
    Ok(Json(product.into()))
}

/// DELETE /products/:id — admin: delete a product. Existing order lines
/// keep their quantity but lose the product reference.
#[tracing::instrument(skip(state, user))]
pub async fn remove<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    require_admin(&user.0)?;

    state.store.delete_product(ProductId::from_uuid(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /products/:id/assignment — admin: restrict the product to one user.
#[tracing::instrument(skip(state, user, req))]
pub async fn assign<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
    Json(req): Json<AssignUserRequest>,
) -> Result<StatusCode, ApiError> {
    require_admin(&user.0)?;

    state
        .store
        .assign_product(ProductId::from_uuid(id), UserId::from_uuid(req.user_id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /products/:id/assignment — admin: remove the product's
/// assignment. Fails with 404 when none exists.
#[tracing::instrument(skip(state, user))]
pub async fn unassign<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    user: CurrentUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    require_admin(&user.0)?;

    state
        .store
        .unassign_product(ProductId::from_uuid(id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
