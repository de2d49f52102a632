use chrono::Utc;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, FromQueryResult, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::admin::{
        AdjustStockRequest, AnalyticsSummary, BulkDeleteProductsRequest, BulkOperationResult,
        BulkUpdateProductsRequest, LowStockQuery, RecentOrder, SalesAnalytics, TopProduct,
        UpdateOrderStatusRequest,
    },
    dto::orders::{OrderList, OrderWithItems},
    dto::products::ProductList,
    entity::{
        categories::Entity as Categories,
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, OrderStatus},
        order_items::{Column as OrderItemCol, Entity as OrderItems},
        products::{ActiveModel as ProductActive, Column as ProdCol, Entity as Products},
        users::Entity as Users,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Order, OrderItem, Product},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    services::{order_service, product_service},
    state::AppState,
};

const DEFAULT_LOW_STOCK_THRESHOLD: i32 = 5;

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    ensure_admin(user)?;

    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all();
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        let status = OrderStatus::parse(status)
            .ok_or_else(|| AppError::BadRequest("Invalid order status".into()))?;
        condition = condition.add(OrderCol::Status.eq(status));
    }

    let mut finder = Orders::find().filter(condition);
    finder = match query.sort_order.unwrap_or(SortOrder::Desc) {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Order::from)
        .collect();

    Ok(ApiResponse::success(
        "Orders",
        OrderList { items },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn get_any_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    ensure_admin(user)?;

    let order = Orders::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order.id))
        .all(&state.orm)
        .await?
        .into_iter()
        .map(OrderItem::from)
        .collect();

    Ok(ApiResponse::success(
        "OK",
        OrderWithItems {
            order: order.into(),
            items,
        },
        Some(Meta::empty()),
    ))
}

pub async fn approve_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    transition_order(state, user, id, OrderStatus::Approved, "Order approved").await
}

pub async fn reject_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Order>> {
    transition_order(state, user, id, OrderStatus::Rejected, "Order rejected").await
}

pub async fn update_order_status(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateOrderStatusRequest,
) -> AppResult<ApiResponse<Order>> {
    let target = OrderStatus::parse(&payload.status)
        .ok_or_else(|| AppError::BadRequest("Invalid order status".into()))?;
    transition_order(state, user, id, target, "Order status updated").await
}

/// Every status change goes through the transition table. There is no
/// override path: an illegal jump is rejected no matter who asks.
async fn transition_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    target: OrderStatus,
    message: &str,
) -> AppResult<ApiResponse<Order>> {
    ensure_admin(user)?;

    let txn = state.orm.begin().await?;

    let order = Orders::find_by_id(id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    if !order.status.can_transition_to(target) {
        return Err(AppError::BadRequest(format!(
            "Cannot change order status from {} to {}",
            order.status.as_str(),
            target.as_str()
        )));
    }

    let releases_stock = order.status.releases_stock(target);
    let previous = order.status;

    let mut active: OrderActive = order.into();
    active.status = Set(target);
    active.updated_at = Set(Utc::now().into());
    let order = active.update(&txn).await?;

    if releases_stock {
        order_service::restock_order_items(&txn, order.id).await?;
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "order_status_change",
        Some("orders"),
        Some(serde_json::json!({
            "order_id": order.id,
            "from": previous.as_str(),
            "to": target.as_str(),
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(message, order.into(), Some(Meta::empty())))
}

pub async fn low_stock_products(
    state: &AppState,
    user: &AuthUser,
    query: LowStockQuery,
) -> AppResult<ApiResponse<ProductList>> {
    ensure_admin(user)?;

    let threshold = query
        .threshold
        .unwrap_or(DEFAULT_LOW_STOCK_THRESHOLD)
        .max(0);

    let items = Products::find()
        .filter(ProdCol::Stock.lte(threshold))
        .order_by_asc(ProdCol::Stock)
        .order_by_asc(ProdCol::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    Ok(ApiResponse::success("Low stock", ProductList { items }, None))
}

pub async fn adjust_stock(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: AdjustStockRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;

    if payload.stock < 0 {
        return Err(AppError::BadRequest("Stock cannot be negative".into()));
    }

    let txn = state.orm.begin().await?;
    let product = Products::find_by_id(product_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: ProductActive = product.into();
    active.stock = Set(payload.stock);
    active.in_stock = Set(payload.stock > 0);
    let product = active.update(&txn).await?;
    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "stock_adjust",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id, "stock": product.stock })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Stock updated",
        product.into(),
        Some(Meta::empty()),
    ))
}

/// Apply the same field changes to a batch of products in one statement.
pub async fn bulk_update_products(
    state: &AppState,
    user: &AuthUser,
    payload: BulkUpdateProductsRequest,
) -> AppResult<ApiResponse<BulkOperationResult>> {
    ensure_admin(user)?;

    if payload.product_ids.is_empty() {
        return Err(AppError::BadRequest("product_ids must not be empty".into()));
    }
    let changes = payload.changes;
    if changes.price.is_none()
        && changes.original_price.is_none()
        && changes.stock.is_none()
        && changes.category_id.is_none()
    {
        return Err(AppError::BadRequest("No changes provided".into()));
    }
    if changes.price.is_some_and(|p| p <= 0) {
        return Err(AppError::BadRequest(
            "Product price must be greater than 0".into(),
        ));
    }
    if changes.stock.is_some_and(|s| s < 0) {
        return Err(AppError::BadRequest("Stock cannot be negative".into()));
    }

    let txn = state.orm.begin().await?;

    // Category moves shift the denormalized counters on both sides.
    let mut touched_categories: Vec<Uuid> = Vec::new();
    if let Some(new_category) = changes.category_id {
        Categories::find_by_id(new_category)
            .one(&txn)
            .await?
            .ok_or_else(|| AppError::BadRequest("Category not found".into()))?;

        touched_categories = Products::find()
            .filter(ProdCol::Id.is_in(payload.product_ids.clone()))
            .all(&txn)
            .await?
            .into_iter()
            .map(|p| p.category_id)
            .collect();
        touched_categories.push(new_category);
        touched_categories.sort_unstable();
        touched_categories.dedup();
    }

    let mut update = Products::update_many().filter(ProdCol::Id.is_in(payload.product_ids.clone()));
    if let Some(price) = changes.price {
        update = update.col_expr(ProdCol::Price, Expr::value(price));
    }
    if let Some(original_price) = changes.original_price {
        update = update.col_expr(ProdCol::OriginalPrice, Expr::value(original_price));
    }
    if let Some(stock) = changes.stock {
        update = update
            .col_expr(ProdCol::Stock, Expr::value(stock))
            .col_expr(ProdCol::InStock, Expr::value(stock > 0));
    }
    if let Some(category_id) = changes.category_id {
        update = update.col_expr(ProdCol::CategoryId, Expr::value(category_id));
    }
    let result = update.exec(&txn).await?;

    for category_id in touched_categories {
        crate::services::category_service::refresh_product_count(&txn, category_id).await?;
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "products_bulk_update",
        Some("products"),
        Some(serde_json::json!({ "count": result.rows_affected })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        format!("Updated {} products", result.rows_affected),
        BulkOperationResult {
            affected: result.rows_affected,
        },
        Some(Meta::empty()),
    ))
}

pub async fn bulk_delete_products(
    state: &AppState,
    user: &AuthUser,
    payload: BulkDeleteProductsRequest,
) -> AppResult<ApiResponse<BulkOperationResult>> {
    ensure_admin(user)?;

    if payload.product_ids.is_empty() {
        return Err(AppError::BadRequest("product_ids must not be empty".into()));
    }

    let txn = state.orm.begin().await?;

    let products = Products::find()
        .filter(ProdCol::Id.is_in(payload.product_ids.clone()))
        .all(&txn)
        .await?;
    let found_ids: Vec<Uuid> = products.iter().map(|p| p.id).collect();

    let referenced = OrderItems::find()
        .filter(OrderItemCol::ProductId.is_in(found_ids.clone()))
        .count(&txn)
        .await?;
    if referenced > 0 {
        return Err(AppError::BadRequest(
            "Cannot delete products that appear in existing orders".into(),
        ));
    }

    let mut categories: Vec<Uuid> = products.iter().map(|p| p.category_id).collect();
    categories.sort_unstable();
    categories.dedup();

    product_service::purge_product_references(&txn, &found_ids).await?;
    let result = Products::delete_many()
        .filter(ProdCol::Id.is_in(found_ids))
        .exec(&txn)
        .await?;

    for category_id in categories {
        crate::services::category_service::refresh_product_count(&txn, category_id).await?;
    }

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "products_bulk_delete",
        Some("products"),
        Some(serde_json::json!({ "count": result.rows_affected })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        format!("Deleted {} products", result.rows_affected),
        BulkOperationResult {
            affected: result.rows_affected,
        },
        Some(Meta::empty()),
    ))
}

#[derive(Debug, FromQueryResult)]
struct TopSeller {
    product_id: Uuid,
    total_sold: i64,
    order_count: i64,
}

/// Order statistics for the sales dashboard: status counters, revenue from
/// approved-through-delivered orders, the ten newest orders with customer
/// contact, and the five best sellers by units.
pub async fn sales_analytics(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<SalesAnalytics>> {
    ensure_admin(user)?;

    const APPROVED_STATUSES: &str = "('APPROVED', 'PROCESSING', 'SHIPPED', 'DELIVERED')";

    let total_orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(&state.pool)
        .await?;
    let pending_orders: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE status = 'PENDING'")
            .fetch_one(&state.pool)
            .await?;
    let approved_orders: i64 = sqlx::query_scalar(&format!(
        "SELECT COUNT(*) FROM orders WHERE status IN {APPROVED_STATUSES}"
    ))
    .fetch_one(&state.pool)
    .await?;
    let rejected_orders: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE status = 'REJECTED'")
            .fetch_one(&state.pool)
            .await?;
    let total_revenue: i64 = sqlx::query_scalar(&format!(
        "SELECT COALESCE(SUM(total), 0)::BIGINT FROM orders WHERE status IN {APPROVED_STATUSES}"
    ))
    .fetch_one(&state.pool)
    .await?;

    let recent_orders = Orders::find()
        .order_by_desc(OrderCol::CreatedAt)
        .limit(10)
        .find_also_related(Users)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(|(order, customer)| {
            let (customer_name, customer_email) = customer
                .map(|u| (format!("{} {}", u.first_name, u.last_name), u.email))
                .unwrap_or_else(|| ("Unknown".into(), String::new()));
            RecentOrder {
                order: order.into(),
                customer_name,
                customer_email,
            }
        })
        .collect();

    let sellers = OrderItems::find()
        .select_only()
        .column_as(OrderItemCol::ProductId, "product_id")
        .column_as(OrderItemCol::Quantity.sum(), "total_sold")
        .column_as(OrderItemCol::Id.count(), "order_count")
        .group_by(OrderItemCol::ProductId)
        .order_by_desc(OrderItemCol::Quantity.sum())
        .limit(5)
        .into_model::<TopSeller>()
        .all(&state.orm)
        .await?;

    let seller_products = Products::find()
        .filter(ProdCol::Id.is_in(sellers.iter().map(|s| s.product_id).collect::<Vec<_>>()))
        .all(&state.orm)
        .await?;
    let top_products = sellers
        .into_iter()
        .filter_map(|seller| {
            seller_products
                .iter()
                .find(|p| p.id == seller.product_id)
                .map(|p| TopProduct {
                    product_id: p.id,
                    name: p.name.clone(),
                    image: p.image.clone(),
                    price: p.price,
                    total_sold: seller.total_sold,
                    order_count: seller.order_count,
                })
        })
        .collect();

    Ok(ApiResponse::success(
        "Sales analytics",
        SalesAnalytics {
            total_orders,
            pending_orders,
            approved_orders,
            rejected_orders,
            total_revenue,
            recent_orders,
            top_products,
        },
        None,
    ))
}

/// Storefront-wide counters for the admin dashboard. Read-only aggregates,
/// so these go straight through the sqlx pool.
pub async fn analytics(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<AnalyticsSummary>> {
    ensure_admin(user)?;

    let total_orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(&state.pool)
        .await?;
    let pending_orders: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE status = 'PENDING'")
            .fetch_one(&state.pool)
            .await?;
    let delivered_orders: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE status = 'DELIVERED'")
            .fetch_one(&state.pool)
            .await?;
    let total_revenue: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(total), 0)::BIGINT FROM orders WHERE status = 'DELIVERED'",
    )
    .fetch_one(&state.pool)
    .await?;
    let total_customers: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE role = 'CUSTOMER'")
            .fetch_one(&state.pool)
            .await?;
    let total_products: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
        .fetch_one(&state.pool)
        .await?;

    Ok(ApiResponse::success(
        "Analytics",
        AnalyticsSummary {
            total_orders,
            pending_orders,
            delivered_orders,
            total_revenue,
            total_customers,
            total_products,
        },
        None,
    ))
}
