use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use crate::{
    dto::favorites::{AddFavoriteRequest, FavoriteCheck, FavoriteCount, FavoriteProductList},
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    services::favorite_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", axum::routing::get(list_favorites))
        .route("/", axum::routing::post(add_favorite))
        .route("/count", axum::routing::get(favorite_count))
        .route("/{product_id}", axum::routing::delete(remove_favorite))
        .route("/{product_id}/check", axum::routing::get(check_favorite))
}

#[utoipa::path(
    get,
    path = "/api/favorites",
    responses(
        (status = 200, description = "Favorited products", body = ApiResponse<FavoriteProductList>),
    ),
    tag = "Favorites"
)]
pub async fn list_favorites(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<FavoriteProductList>>> {
    Ok(Json(favorite_service::list_favorites(&state, &user).await?))
}

#[utoipa::path(
    post,
    path = "/api/favorites",
    request_body = AddFavoriteRequest,
    responses(
        (status = 201, description = "Added to favorites", body = ApiResponse<FavoriteCheck>),
        (status = 400, description = "Already in favorites"),
        (status = 404, description = "Product not found"),
    ),
    tag = "Favorites"
)]
pub async fn add_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<AddFavoriteRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<FavoriteCheck>>)> {
    let resp = favorite_service::add_favorite(&state, &user, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    delete,
    path = "/api/favorites/{product_id}",
    params(
        ("product_id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Removed from favorites", body = ApiResponse<FavoriteCheck>),
    ),
    tag = "Favorites"
)]
pub async fn remove_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<FavoriteCheck>>> {
    Ok(Json(
        favorite_service::remove_favorite(&state, &user, product_id).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/favorites/{product_id}/check",
    params(
        ("product_id" = Uuid, Path, description = "Product ID")
    ),
    responses(
        (status = 200, description = "Whether the product is favorited", body = ApiResponse<FavoriteCheck>),
    ),
    tag = "Favorites"
)]
pub async fn check_favorite(
    State(state): State<AppState>,
    user: AuthUser,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<FavoriteCheck>>> {
    Ok(Json(
        favorite_service::check_favorite(&state, &user, product_id).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/favorites/count",
    responses(
        (status = 200, description = "Number of favorites", body = ApiResponse<FavoriteCount>),
    ),
    tag = "Favorites"
)]
pub async fn favorite_count(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<FavoriteCount>>> {
    Ok(Json(favorite_service::favorite_count(&state, &user).await?))
}
