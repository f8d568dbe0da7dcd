//! API request/response models for the product catalog.

use crate::catalog::Product;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductListResponse {
    pub products: Vec<Product>,
    pub total: usize,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ProductSearchQuery {
    /// Case-insensitive name substring
    pub q: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CategoriesResponse {
    /// Main category -> subcategory -> product count
    pub categories: HashMap<String, HashMap<String, usize>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProductLookupResponse {
    pub product: Product,
    /// The stored UPC that matched the scanned code
    pub matched_upc: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CatalogReloadResponse {
    pub success: bool,
    /// Number of products after the reload
    pub count: usize,
}
