use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::cart::{AddToCartRequest, CartItemDto, CartList, UpdateCartItemRequest},
    entity::{
        cart_items::{ActiveModel as CartActive, Column as CartCol, Entity as CartItems},
        products::{self, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::CartItem,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn list_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartList>> {
    let rows = CartItems::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .order_by_desc(CartCol::CreatedAt)
        .find_also_related(Products)
        .all(&state.orm)
        .await?;

    let mut items = Vec::with_capacity(rows.len());
    let mut total: i64 = 0;
    let mut item_count: i64 = 0;
    for (item, product) in rows {
        // A dangling cart row without its product is skipped rather than 500'd.
        let Some(product) = product else { continue };
        total += product.price * item.quantity as i64;
        item_count += item.quantity as i64;
        items.push(CartItemDto {
            id: item.id,
            product: product.into(),
            quantity: item.quantity,
        });
    }

    Ok(ApiResponse::success(
        "OK",
        CartList {
            items,
            total,
            item_count,
        },
        None,
    ))
}

pub async fn add_to_cart(
    state: &AppState,
    user: &AuthUser,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartItem>> {
    if payload.quantity < 1 {
        return Err(AppError::BadRequest("Quantity must be at least 1".into()));
    }

    let product = Products::find_by_id(payload.product_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if !product.in_stock {
        return Err(AppError::BadRequest("Product is out of stock".into()));
    }
    if payload.quantity > product.stock {
        return Err(AppError::BadRequest(format!(
            "Only {} items available in stock",
            product.stock
        )));
    }

    let existing = CartItems::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .filter(CartCol::ProductId.eq(payload.product_id))
        .one(&state.orm)
        .await?;

    let cart_item = if let Some(item) = existing {
        let merged = item.quantity + payload.quantity;
        if merged > product.stock {
            return Err(AppError::BadRequest(merge_rejection(
                payload.quantity,
                &product,
                item.quantity,
            )));
        }
        let mut active: CartActive = item.into();
        active.quantity = Set(merged);
        active.update(&state.orm).await?
    } else {
        CartActive {
            id: Set(Uuid::new_v4()),
            user_id: Set(user.user_id),
            product_id: Set(payload.product_id),
            quantity: Set(payload.quantity),
            created_at: NotSet,
        }
        .insert(&state.orm)
        .await?
    };

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "cart_add",
        Some("cart_items"),
        Some(serde_json::json!({
            "product_id": payload.product_id,
            "quantity": cart_item.quantity,
        })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success("Added to cart", cart_item.into(), None))
}

pub async fn update_cart_item(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: UpdateCartItemRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    if payload.quantity < 0 {
        return Err(AppError::BadRequest("Quantity cannot be negative".into()));
    }

    // Quantity zero means removal.
    if payload.quantity == 0 {
        return remove_from_cart(state, user, product_id).await;
    }

    let item = CartItems::find()
        .filter(CartCol::UserId.eq(user.user_id))
        .filter(CartCol::ProductId.eq(product_id))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let product = Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    if payload.quantity > product.stock {
        return Err(AppError::BadRequest(format!(
            "Only {} items available in stock",
            product.stock
        )));
    }

    let mut active: CartActive = item.into();
    active.quantity = Set(payload.quantity);
    let item = active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "Cart updated",
        serde_json::json!({ "product_id": product_id, "quantity": item.quantity }),
        Some(Meta::empty()),
    ))
}

/// Idempotent: removing an absent line is still a success.
pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    CartItems::delete_many()
        .filter(CartCol::UserId.eq(user.user_id))
        .filter(CartCol::ProductId.eq(product_id))
        .exec(&state.orm)
        .await?;

    Ok(ApiResponse::success(
        "Removed from cart",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn clear_cart(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<serde_json::Value>> {
    CartItems::delete_many()
        .filter(CartCol::UserId.eq(user.user_id))
        .exec(&state.orm)
        .await?;

    Ok(ApiResponse::success(
        "Cart cleared",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// Names exactly how many additional units would still fit.
fn merge_rejection(requested: i32, product: &products::Model, already_in_cart: i32) -> String {
    format!(
        "Cannot add {requested} more. Only {} items available",
        product.stock - already_in_cart
    )
}

#[cfg(test)]
mod tests {
    use super::merge_rejection;
    use crate::entity::products;
    use chrono::Utc;
    use uuid::Uuid;

    fn product(stock: i32) -> products::Model {
        products::Model {
            id: Uuid::new_v4(),
            name: "Widget".into(),
            description: None,
            price: 2000,
            original_price: None,
            image: String::new(),
            images: serde_json::json!([]),
            stock,
            in_stock: stock > 0,
            rating: 0.0,
            reviews: 0,
            category_id: Uuid::new_v4(),
            created_at: Utc::now().into(),
        }
    }

    #[test]
    fn merge_message_names_remaining_units() {
        let msg = merge_rejection(4, &product(5), 3);
        assert_eq!(msg, "Cannot add 4 more. Only 2 items available");
    }
}
