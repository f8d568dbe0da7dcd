//! HTTP handlers for the product catalog.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use std::sync::Arc;

use crate::{
    AppState,
    api::models::products::{
        CatalogReloadResponse, CategoriesResponse, ProductListResponse, ProductLookupResponse, ProductSearchQuery,
    },
    api::models::users::CurrentUser,
    catalog::Catalog,
    errors::Error,
};

/// List every catalog product.
#[utoipa::path(
    get,
    path = "/products",
    tag = "products",
    responses(
        (status = 200, description = "Products", body = ProductListResponse),
        (status = 500, description = "Catalog not loaded"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_products(State(state): State<AppState>, _user: CurrentUser) -> Result<Json<ProductListResponse>, Error> {
    let catalog = state.catalog()?;
    Ok(Json(ProductListResponse {
        total: catalog.len(),
        products: catalog.products().to_vec(),
    }))
}

/// Search products by name substring.
#[utoipa::path(
    get,
    path = "/products/search",
    params(ProductSearchQuery),
    tag = "products",
    responses(
        (status = 200, description = "Matching products", body = ProductListResponse),
    )
)]
#[tracing::instrument(skip_all, fields(q = %query.q))]
pub async fn search_products(
    State(state): State<AppState>,
    _user: CurrentUser,
    Query(query): Query<ProductSearchQuery>,
) -> Result<Json<ProductListResponse>, Error> {
    let catalog = state.catalog()?;
    let products: Vec<_> = catalog.search(&query.q).into_iter().cloned().collect();
    Ok(Json(ProductListResponse {
        total: products.len(),
        products,
    }))
}

/// Get the category tree with product counts.
#[utoipa::path(
    get,
    path = "/products/categories",
    tag = "products",
    responses(
        (status = 200, description = "Category tree", body = CategoriesResponse),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_categories(State(state): State<AppState>, _user: CurrentUser) -> Result<Json<CategoriesResponse>, Error> {
    let catalog = state.catalog()?;
    Ok(Json(CategoriesResponse {
        categories: catalog.categories(),
    }))
}

/// Resolve a scanned code to a product via substring matching.
#[utoipa::path(
    get,
    path = "/products/lookup/{code}",
    params(("code" = String, Path, description = "Scanned barcode")),
    tag = "products",
    responses(
        (status = 200, description = "Matched product", body = ProductLookupResponse),
        (status = 404, description = "No product matches the code"),
    )
)]
#[tracing::instrument(skip_all, fields(code = %code))]
pub async fn lookup_product(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(code): Path<String>,
) -> Result<Json<ProductLookupResponse>, Error> {
    let catalog = state.catalog()?;
    let product = catalog
        .match_scanned_code(&code)
        .ok_or_else(|| Error::ProductNotFound { code: code.clone() })?;

    Ok(Json(ProductLookupResponse {
        matched_upc: product.upc.clone(),
        product: product.clone(),
    }))
}

/// Reload the catalog from disk (admin only). Readers see either the old or
/// the new catalog, never a partial one.
#[utoipa::path(
    post,
    path = "/products/reload",
    tag = "products",
    responses(
        (status = 200, description = "Catalog reloaded", body = CatalogReloadResponse),
        (status = 403, description = "Admin role required"),
        (status = 500, description = "Reload failed"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn reload_catalog(State(state): State<AppState>, user: CurrentUser) -> Result<Json<CatalogReloadResponse>, Error> {
    user.require_admin()?;

    let catalog = Catalog::load(&state.config.products_file).map_err(|e| Error::Internal {
        operation: format!("reload product catalog: {e}"),
    })?;
    let count = catalog.len();
    state.catalog.store(Some(Arc::new(catalog)));

    tracing::info!(count, "product catalog reloaded");
    Ok(Json(CatalogReloadResponse { success: true, count }))
}
