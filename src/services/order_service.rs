use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::{Expr, LockType};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseTransaction, EntityTrait,
    FromQueryResult, JoinType, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait,
    Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::orders::{CheckoutRequest, CreateOrderRequest, OrderList, OrderWithItems},
    entity::{
        addresses::{ActiveModel as AddressActive, AddressKind, Column as AddrCol, Entity as Addresses},
        cart_items::{self, Column as CartCol, Entity as CartItems},
        order_items::{ActiveModel as OrderItemActive, Column as OrderItemCol, Entity as OrderItems},
        orders::{ActiveModel as OrderActive, Column as OrderCol, Entity as Orders, OrderStatus},
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Order, OrderItem},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, SortOrder},
    state::AppState,
};

/// Orders at or above this subtotal ship for free; below it a flat fee
/// applies. All amounts in cents.
pub const FREE_SHIPPING_THRESHOLD: i64 = 5000;
pub const FLAT_SHIPPING_FEE: i64 = 599;
/// Flat tax, percent of subtotal.
pub const TAX_RATE_PERCENT: i64 = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: i64,
    pub shipping: i64,
    pub tax: i64,
    pub total: i64,
}

pub fn compute_totals(subtotal: i64) -> OrderTotals {
    let shipping = if subtotal >= FREE_SHIPPING_THRESHOLD {
        0
    } else {
        FLAT_SHIPPING_FEE
    };
    let tax = subtotal * TAX_RATE_PERCENT / 100;
    OrderTotals {
        subtotal,
        shipping,
        tax,
        total: subtotal + shipping + tax,
    }
}

pub async fn list_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all().add(OrderCol::UserId.eq(user.user_id));
    if let Some(status) = query.status.as_ref().filter(|s| !s.is_empty()) {
        let status = OrderStatus::parse(status)
            .ok_or_else(|| AppError::BadRequest("Invalid order status".into()))?;
        condition = condition.add(OrderCol::Status.eq(status));
    }

    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let mut finder = Orders::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(OrderCol::CreatedAt),
        SortOrder::Desc => finder.order_by_desc(OrderCol::CreatedAt),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let orders = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Order::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Orders",
        OrderList { items: orders },
        Some(meta),
    ))
}

pub async fn get_order(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let order = Orders::find()
        .filter(
            Condition::all()
                .add(OrderCol::UserId.eq(user.user_id))
                .add(OrderCol::Id.eq(id)),
        )
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

/// Checkout against an existing address. The whole unit — order row, item
/// snapshots, stock decrements, cart clear — commits or rolls back together.
pub async fn create_order(
    state: &AppState,
    user: &AuthUser,
    payload: CreateOrderRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let txn = state.orm.begin().await?;

    let address = Addresses::find()
        .filter(
            Condition::all()
                .add(AddrCol::Id.eq(payload.address_id))
                .add(AddrCol::UserId.eq(user.user_id)),
        )
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let lines = load_cart_lines(&txn, user.user_id).await?;
    let (order, items) = persist_order(&txn, user.user_id, address.id, None, &lines).await?;

    txn.commit().await?;
    audit_checkout(state, user.user_id, order.id).await;

    Ok(ApiResponse::success(
        "Order created successfully",
        OrderWithItems { order, items },
        Some(Meta::empty()),
    ))
}

/// Checkout with a submitted shipping address: reuses a matching address row
/// or creates one inside the same transaction, and stores the opaque
/// customer-contact blob on the order. Stock is reserved here exactly as in
/// the address-id path; admin approval is a status change only.
pub async fn checkout(
    state: &AppState,
    user: &AuthUser,
    payload: CheckoutRequest,
) -> AppResult<ApiResponse<OrderWithItems>> {
    let shipping = payload.shipping_address;
    if shipping.street.trim().is_empty() || shipping.city.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Customer information and shipping address are required".into(),
        ));
    }

    let txn = state.orm.begin().await?;

    let address = Addresses::find()
        .filter(
            Condition::all()
                .add(AddrCol::UserId.eq(user.user_id))
                .add(AddrCol::Street.eq(shipping.street.as_str()))
                .add(AddrCol::City.eq(shipping.city.as_str()))
                .add(AddrCol::State.eq(shipping.state.as_str()))
                .add(AddrCol::ZipCode.eq(shipping.zip_code.as_str()))
                .add(AddrCol::Country.eq(shipping.country.as_str())),
        )
        .one(&txn)
        .await?;

    let address = match address {
        Some(address) => address,
        None => {
            AddressActive {
                id: Set(Uuid::new_v4()),
                user_id: Set(user.user_id),
                kind: Set(AddressKind::Shipping),
                first_name: Set(shipping.first_name),
                last_name: Set(shipping.last_name),
                street: Set(shipping.street),
                city: Set(shipping.city),
                state: Set(shipping.state),
                zip_code: Set(shipping.zip_code),
                country: Set(shipping.country),
                is_default: Set(false),
                created_at: NotSet,
            }
            .insert(&txn)
            .await?
        }
    };

    let lines = load_cart_lines(&txn, user.user_id).await?;
    let (order, items) = persist_order(
        &txn,
        user.user_id,
        address.id,
        Some(payload.customer_info),
        &lines,
    )
    .await?;

    txn.commit().await?;
    audit_checkout(state, user.user_id, order.id).await;

    Ok(ApiResponse::success(
        "Order created successfully and sent for admin approval",
        OrderWithItems { order, items },
        Some(Meta::empty()),
    ))
}

#[derive(Debug, FromQueryResult)]
struct CartLine {
    product_id: Uuid,
    quantity: i32,
    name: String,
    price: i64,
    stock: i32,
    in_stock: bool,
}

/// Re-read the cart joined with current product rows, locked `FOR UPDATE` so
/// concurrent checkouts serialize on the same products.
async fn load_cart_lines(txn: &DatabaseTransaction, user_id: Uuid) -> AppResult<Vec<CartLine>> {
    let lines = CartItems::find()
        .select_only()
        .column_as(CartCol::ProductId, "product_id")
        .column_as(CartCol::Quantity, "quantity")
        .column_as(ProdCol::Name, "name")
        .column_as(ProdCol::Price, "price")
        .column_as(ProdCol::Stock, "stock")
        .column_as(ProdCol::InStock, "in_stock")
        .join(JoinType::InnerJoin, cart_items::Relation::Products.def())
        .filter(CartCol::UserId.eq(user_id))
        .lock(LockType::Update)
        .into_model::<CartLine>()
        .all(txn)
        .await?;

    if lines.is_empty() {
        return Err(AppError::BadRequest("Cart is empty".into()));
    }

    for line in &lines {
        if line.quantity <= 0 {
            return Err(AppError::BadRequest("Cart has invalid quantity".into()));
        }
        if !line.in_stock {
            return Err(AppError::BadRequest(format!(
                "{} is out of stock",
                line.name
            )));
        }
        if line.quantity > line.stock {
            return Err(AppError::BadRequest(format!(
                "Only {} units of {} available",
                line.stock, line.name
            )));
        }
    }

    Ok(lines)
}

/// Steps 1-4 of the checkout unit: order row with computed totals, item rows
/// snapshotting current unit prices, guarded stock decrements, cart clear.
async fn persist_order(
    txn: &DatabaseTransaction,
    user_id: Uuid,
    address_id: Uuid,
    customer_info: Option<serde_json::Value>,
    lines: &[CartLine],
) -> AppResult<(Order, Vec<OrderItem>)> {
    let subtotal: i64 = lines
        .iter()
        .map(|line| line.price * line.quantity as i64)
        .sum();
    let totals = compute_totals(subtotal);

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        address_id: Set(address_id),
        subtotal: Set(totals.subtotal),
        tax: Set(totals.tax),
        shipping: Set(totals.shipping),
        total: Set(totals.total),
        status: Set(OrderStatus::Pending),
        customer_info: Set(customer_info),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(txn)
    .await?;

    let mut items: Vec<OrderItem> = Vec::with_capacity(lines.len());
    for line in lines {
        let item = OrderItemActive {
            id: Set(Uuid::new_v4()),
            order_id: Set(order.id),
            product_id: Set(line.product_id),
            quantity: Set(line.quantity),
            price: Set(line.price),
            created_at: NotSet,
        }
        .insert(txn)
        .await?;
        items.push(item.into());

        // Conditional decrement: losing a race to another checkout surfaces
        // as zero rows affected and aborts the whole unit.
        let updated = Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).sub(line.quantity))
            .filter(ProdCol::Id.eq(line.product_id))
            .filter(ProdCol::Stock.gte(line.quantity))
            .exec(txn)
            .await?;
        if updated.rows_affected == 0 {
            return Err(AppError::BadRequest(format!(
                "Only {} units of {} available",
                line.stock, line.name
            )));
        }

        Products::update_many()
            .col_expr(ProdCol::InStock, Expr::value(false))
            .filter(ProdCol::Id.eq(line.product_id))
            .filter(ProdCol::Stock.lte(0))
            .exec(txn)
            .await?;
    }

    CartItems::delete_many()
        .filter(CartCol::UserId.eq(user_id))
        .exec(txn)
        .await?;

    Ok((order.into(), items))
}

/// Return reserved stock to the shelf when an order is rejected or
/// cancelled.
pub async fn restock_order_items<C: ConnectionTrait>(conn: &C, order_id: Uuid) -> AppResult<()> {
    let items = OrderItems::find()
        .filter(OrderItemCol::OrderId.eq(order_id))
        .all(conn)
        .await?;

    for item in items {
        Products::update_many()
            .col_expr(ProdCol::Stock, Expr::col(ProdCol::Stock).add(item.quantity))
            .filter(ProdCol::Id.eq(item.product_id))
            .exec(conn)
            .await?;
        Products::update_many()
            .col_expr(ProdCol::InStock, Expr::value(true))
            .filter(ProdCol::Id.eq(item.product_id))
            .filter(ProdCol::Stock.gt(0))
            .exec(conn)
            .await?;
    }
    Ok(())
}

async fn audit_checkout(state: &AppState, user_id: Uuid, order_id: Uuid) {
    if let Err(err) = log_audit(
        &state.pool,
        Some(user_id),
        "checkout",
        Some("orders"),
        Some(serde_json::json!({ "order_id": order_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }
}

#[cfg(test)]
mod tests {
    use super::{FLAT_SHIPPING_FEE, compute_totals};

    #[test]
    fn free_shipping_kicks_in_at_the_threshold() {
        assert_eq!(compute_totals(5000).shipping, 0);
        assert_eq!(compute_totals(4999).shipping, FLAT_SHIPPING_FEE);
    }

    #[test]
    fn worked_example_from_the_pricing_rules() {
        // Two units at $20.00 plus one at $35.00.
        let totals = compute_totals(2 * 2000 + 3500);
        assert_eq!(totals.subtotal, 7500);
        assert_eq!(totals.shipping, 0);
        assert_eq!(totals.tax, 600);
        assert_eq!(totals.total, 8100);
    }

    #[test]
    fn total_is_the_sum_of_its_parts() {
        for subtotal in [1, 599, 4999, 5000, 123_456] {
            let t = compute_totals(subtotal);
            assert_eq!(t.total, t.subtotal + t.shipping + t.tax);
            assert_eq!(t.tax, subtotal * 8 / 100);
        }
    }
}
