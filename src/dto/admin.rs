use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::Order;

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    pub status: String,
}

/// Field set applied uniformly to every product in a bulk update. Absent
/// fields are left untouched.
#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkProductChanges {
    /// Cents.
    pub price: Option<i64>,
    pub original_price: Option<i64>,
    pub stock: Option<i32>,
    pub category_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkUpdateProductsRequest {
    pub product_ids: Vec<Uuid>,
    pub changes: BulkProductChanges,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct BulkDeleteProductsRequest {
    pub product_ids: Vec<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct BulkOperationResult {
    pub affected: u64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AdjustStockRequest {
    /// Absolute stock level, not a delta.
    pub stock: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LowStockQuery {
    pub threshold: Option<i32>,
}

/// Order-centric statistics for the sales dashboard.
#[derive(Debug, Serialize, ToSchema)]
pub struct SalesAnalytics {
    pub total_orders: i64,
    pub pending_orders: i64,
    /// Orders that made it past approval (approved through delivered).
    pub approved_orders: i64,
    pub rejected_orders: i64,
    /// Sum of approved-through-delivered order totals, in cents.
    pub total_revenue: i64,
    pub recent_orders: Vec<RecentOrder>,
    pub top_products: Vec<TopProduct>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RecentOrder {
    #[serde(flatten)]
    pub order: Order,
    pub customer_name: String,
    pub customer_email: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TopProduct {
    pub product_id: Uuid,
    pub name: String,
    pub image: String,
    /// Cents.
    pub price: i64,
    pub total_sold: i64,
    pub order_count: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct AnalyticsSummary {
    pub total_orders: i64,
    pub pending_orders: i64,
    pub delivered_orders: i64,
    /// Sum of delivered order totals, in cents.
    pub total_revenue: i64,
    pub total_customers: i64,
    pub total_products: i64,
}
