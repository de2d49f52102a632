use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::{
    dto::favorites::{AddFavoriteRequest, FavoriteCheck, FavoriteCount, FavoriteProductList},
    entity::{
        favorites::{ActiveModel as FavoriteActive, Column as FavCol, Entity as Favorites},
        products::Entity as Products,
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Product,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn list_favorites(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<FavoriteProductList>> {
    let rows = Favorites::find()
        .filter(FavCol::UserId.eq(user.user_id))
        .order_by_desc(FavCol::CreatedAt)
        .find_also_related(Products)
        .all(&state.orm)
        .await?;

    let items: Vec<Product> = rows
        .into_iter()
        .filter_map(|(_, product)| product.map(Product::from))
        .collect();

    Ok(ApiResponse::success(
        "Favorites",
        FavoriteProductList { items },
        None,
    ))
}

pub async fn add_favorite(
    state: &AppState,
    user: &AuthUser,
    payload: AddFavoriteRequest,
) -> AppResult<ApiResponse<FavoriteCheck>> {
    Products::find_by_id(payload.product_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let existing = Favorites::find()
        .filter(FavCol::UserId.eq(user.user_id))
        .filter(FavCol::ProductId.eq(payload.product_id))
        .one(&state.orm)
        .await?;

    if existing.is_some() {
        return Err(AppError::BadRequest(
            "Product is already in favorites".into(),
        ));
    }

    FavoriteActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        product_id: Set(payload.product_id),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(ApiResponse::success(
        "Added to favorites",
        FavoriteCheck { is_favorite: true },
        Some(Meta::empty()),
    ))
}

/// Idempotent: removing an absent favorite is still a success.
pub async fn remove_favorite(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<FavoriteCheck>> {
    Favorites::delete_many()
        .filter(FavCol::UserId.eq(user.user_id))
        .filter(FavCol::ProductId.eq(product_id))
        .exec(&state.orm)
        .await?;

    Ok(ApiResponse::success(
        "Removed from favorites",
        FavoriteCheck { is_favorite: false },
        Some(Meta::empty()),
    ))
}

pub async fn check_favorite(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<FavoriteCheck>> {
    let existing = Favorites::find()
        .filter(FavCol::UserId.eq(user.user_id))
        .filter(FavCol::ProductId.eq(product_id))
        .one(&state.orm)
        .await?;

    Ok(ApiResponse::success(
        "OK",
        FavoriteCheck {
            is_favorite: existing.is_some(),
        },
        None,
    ))
}

pub async fn favorite_count(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<FavoriteCount>> {
    let count = Favorites::find()
        .filter(FavCol::UserId.eq(user.user_id))
        .count(&state.orm)
        .await? as i64;

    Ok(ApiResponse::success("OK", FavoriteCount { count }, None))
}
