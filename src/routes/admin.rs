use axum::{
    Json, Router,
    extract::{Path, Query, State},
};
use uuid::Uuid;

use crate::{
    dto::admin::{
        AdjustStockRequest, AnalyticsSummary, BulkDeleteProductsRequest, BulkOperationResult,
        BulkUpdateProductsRequest, LowStockQuery, SalesAnalytics, UpdateOrderStatusRequest,
    },
    dto::orders::{OrderList, OrderWithItems},
    dto::products::ProductList,
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Order, Product},
    response::ApiResponse,
    routes::params::OrderListQuery,
    services::admin_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", axum::routing::get(list_all_orders))
        .route("/orders/{id}", axum::routing::get(get_order_admin))
        .route("/orders/{id}/approve", axum::routing::post(approve_order))
        .route("/orders/{id}/reject", axum::routing::post(reject_order))
        .route("/orders/{id}/status", axum::routing::put(update_order_status))
        .route("/products/bulk-update", axum::routing::post(bulk_update_products))
        .route("/products/bulk-delete", axum::routing::delete(bulk_delete_products))
        .route("/inventory/low-stock", axum::routing::get(list_low_stock))
        .route("/inventory/{product_id}", axum::routing::put(adjust_inventory))
        .route("/analytics", axum::routing::get(analytics))
        .route("/analytics/sales", axum::routing::get(sales_analytics))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20, max 100"),
        ("status" = Option<String>, Query, description = "Filter by order status"),
    ),
    responses(
        (status = 200, description = "All orders", body = ApiResponse<OrderList>),
        (status = 403, description = "Admin only"),
    ),
    tag = "Admin"
)]
pub async fn list_all_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    Ok(Json(
        admin_service::list_all_orders(&state, &user, query).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Any order with items", body = ApiResponse<OrderWithItems>),
        (status = 404, description = "Order not found"),
    ),
    tag = "Admin"
)]
pub async fn get_order_admin(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<OrderWithItems>>> {
    Ok(Json(admin_service::get_any_order(&state, &user, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/admin/orders/{id}/approve",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order approved", body = ApiResponse<Order>),
        (status = 400, description = "Order is not pending"),
    ),
    tag = "Admin"
)]
pub async fn approve_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Order>>> {
    Ok(Json(admin_service::approve_order(&state, &user, id).await?))
}

#[utoipa::path(
    post,
    path = "/api/admin/orders/{id}/reject",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    responses(
        (status = 200, description = "Order rejected and stock returned", body = ApiResponse<Order>),
        (status = 400, description = "Order is not pending"),
    ),
    tag = "Admin"
)]
pub async fn reject_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Order>>> {
    Ok(Json(admin_service::reject_order(&state, &user, id).await?))
}

#[utoipa::path(
    put,
    path = "/api/admin/orders/{id}/status",
    params(
        ("id" = Uuid, Path, description = "Order ID")
    ),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<Order>),
        (status = 400, description = "Illegal status transition"),
    ),
    tag = "Admin"
)]

pub async fn update_order_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateOrderStatusRequest>,
) -> AppResult<Json<ApiResponse<Order>>> {
    Ok(Json(
        admin_service::update_order_status(&state, &user, id, payload).await?,
    ))
}

#[utoipa::path(
    post,
    path = "/api/admin/products/bulk-update",
    request_body = BulkUpdateProductsRequest,
    responses(
        (status = 200, description = "Products updated", body = ApiResponse<BulkOperationResult>),
        (status = 400, description = "Empty id list or invalid field values"),
    ),
    tag = "Admin"
)]
pub async fn bulk_update_products(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<BulkUpdateProductsRequest>,
) -> AppResult<Json<ApiResponse<BulkOperationResult>>> {
    Ok(Json(
        admin_service::bulk_update_products(&state, &user, payload).await?,
    ))
}

#[utoipa::path(
    delete,
    path = "/api/admin/products/bulk-delete",
    request_body = BulkDeleteProductsRequest,
    responses(
        (status = 200, description = "Products deleted", body = ApiResponse<BulkOperationResult>),
        (status = 400, description = "Empty id list or products appear in orders"),
    ),
    tag = "Admin"
)]
pub async fn bulk_delete_products(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<BulkDeleteProductsRequest>,
) -> AppResult<Json<ApiResponse<BulkOperationResult>>> {
    Ok(Json(
        admin_service::bulk_delete_products(&state, &user, payload).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/admin/inventory/low-stock",
    params(
        ("threshold" = Option<i32>, Query, description = "Stock at or below this counts as low, default 5")
    ),
    responses(
        (status = 200, description = "Products running low", body = ApiResponse<ProductList>),
    ),
    tag = "Admin"
)]
pub async fn list_low_stock(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<LowStockQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    Ok(Json(
        admin_service::low_stock_products(&state, &user, query).await?,
    ))
}

#[utoipa::path(
    put,
    path = "/api/admin/inventory/{product_id}",
    params(
        ("product_id" = Uuid, Path, description = "Product ID")
    ),
    request_body = AdjustStockRequest,
    responses(
        (status = 200, description = "Stock level set", body = ApiResponse<Product>),
        (status = 400, description = "Negative stock"),
    ),
    tag = "Admin"
)]
pub async fn adjust_inventory(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
    Json(payload): Json<AdjustStockRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    Ok(Json(
        admin_service::adjust_stock(&state, &user, product_id, payload).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/admin/analytics",
    responses(
        (status = 200, description = "Storefront counters", body = ApiResponse<AnalyticsSummary>),
    ),
    tag = "Admin"
)]
pub async fn analytics(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<AnalyticsSummary>>> {
    Ok(Json(admin_service::analytics(&state, &user).await?))
}

#[utoipa::path(
    get,
    path = "/api/admin/analytics/sales",
    responses(
        (status = 200, description = "Sales statistics", body = ApiResponse<SalesAnalytics>),
    ),
    tag = "Admin"
)]
pub async fn sales_analytics(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<SalesAnalytics>>> {
    Ok(Json(admin_service::sales_analytics(&state, &user).await?))
}
