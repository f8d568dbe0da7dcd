//! OpenAPI documentation, served interactively at `/docs`.

use utoipa::OpenApi;

use crate::api::models::{auth, pick_requests, products, users};
use crate::catalog::Product;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "pickctl",
        description = "Warehouse pick-request coordination service"
    ),
    paths(
        crate::api::handlers::health::health,
        crate::api::handlers::auth::login,
        crate::api::handlers::auth::refresh,
        crate::api::handlers::auth::me,
        crate::api::handlers::auth::change_password,
        crate::api::handlers::users::create_user,
        crate::api::handlers::users::list_users,
        crate::api::handlers::users::get_user,
        crate::api::handlers::users::update_user,
        crate::api::handlers::users::deactivate_user,
        crate::api::handlers::products::list_products,
        crate::api::handlers::products::search_products,
        crate::api::handlers::products::list_categories,
        crate::api::handlers::products::lookup_product,
        crate::api::handlers::products::reload_catalog,
        crate::api::handlers::pick_requests::validate_name,
        crate::api::handlers::pick_requests::create,
        crate::api::handlers::pick_requests::list,
        crate::api::handlers::pick_requests::get,
        crate::api::handlers::pick_requests::delete,
        crate::api::handlers::pick_requests::start,
        crate::api::handlers::pick_requests::pause,
        crate::api::handlers::pick_requests::resume,
        crate::api::handlers::pick_requests::release,
        crate::api::handlers::pick_requests::cancel,
        crate::api::handlers::pick_requests::approve,
        crate::api::handlers::pick_requests::update_item,
        crate::api::handlers::pick_requests::set_item_shortage,
        crate::api::handlers::pick_requests::get_shortages,
        crate::api::handlers::pick_requests::submit,
    ),
    components(schemas(
        auth::LoginRequest,
        auth::TokenResponse,
        auth::RefreshRequest,
        auth::RefreshResponse,
        auth::ChangePasswordRequest,
        users::Role,
        users::UserCreate,
        users::UserUpdate,
        users::UserResponse,
        pick_requests::ItemCreate,
        pick_requests::PickRequestCreate,
        pick_requests::ItemQuantityUpdate,
        pick_requests::ItemShortageUpdate,
        pick_requests::SubmitRequest,
        pick_requests::ApproveRequest,
        pick_requests::PickRequestItemResponse,
        pick_requests::PickRequestResponse,
        pick_requests::PickRequestListResponse,
        pick_requests::NameValidationResponse,
        pick_requests::WorkflowResponse,
        pick_requests::ItemResponse,
        pick_requests::SubmitResponse,
        pick_requests::ShortageSummary,
        pick_requests::ShortageSummaryItem,
        pick_requests::MessageResponse,
        products::ProductListResponse,
        products::CategoriesResponse,
        products::ProductLookupResponse,
        products::CatalogReloadResponse,
        Product,
    )),
    tags(
        (name = "health", description = "Service health"),
        (name = "authentication", description = "Login and token management"),
        (name = "users", description = "User administration"),
        (name = "products", description = "Product catalog"),
        (name = "pick-requests", description = "Pick request CRUD"),
        (name = "picking", description = "Picking workflow"),
    )
)]
pub struct ApiDoc;
