use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::products::{CreateProductRequest, ProductList, UpdateProductRequest},
    entity::{
        categories::{Column as CatCol, Entity as Categories},
        products::{ActiveModel as ProductActive, Column, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    services::category_service,
    state::AppState,
};

/// Products at or above this rating count as "featured".
const FEATURED_RATING_THRESHOLD: f64 = 4.5;

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, limit, offset) = query.pagination.normalize();
    let mut condition = Condition::all();

    // Category filter accepts a uuid or a case-insensitive name.
    if let Some(category) = query.category.as_ref().filter(|c| !c.is_empty()) {
        let category_id = match Uuid::parse_str(category) {
            Ok(id) => Some(id),
            Err(_) => Categories::find()
                .filter(Expr::col(CatCol::Name).ilike(category.clone()))
                .one(&state.orm)
                .await?
                .map(|c| c.id),
        };
        let Some(category_id) = category_id else {
            // Unknown category matches nothing.
            return Ok(ApiResponse::success(
                "Products",
                ProductList { items: vec![] },
                Some(Meta::new(page, limit, 0)),
            ));
        };
        condition = condition.add(Column::CategoryId.eq(category_id));
    }

    if let Some(in_stock) = query.in_stock {
        condition = condition.add(Column::InStock.eq(in_stock));
    }

    // Applied before pagination so featured pages are full pages.
    if query.featured == Some(true) {
        condition = condition.add(Column::Rating.gte(FEATURED_RATING_THRESHOLD));
    }

    if let Some(min_price) = query.min_price {
        condition = condition.add(Column::Price.gte(min_price));
    }
    if let Some(max_price) = query.max_price {
        condition = condition.add(Column::Price.lte(max_price));
    }

    if let Some(search) = query.search.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Name).ilike(pattern.clone()))
                .add(Expr::col(Column::Description).ilike(pattern)),
        );
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        ProductSortBy::Name => Column::Name,
        ProductSortBy::Price => Column::Price,
        ProductSortBy::Rating => Column::Rating,
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Stock => Column::Stock,
    };

    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Product::from)
        .collect();

    let meta = Meta::new(page, limit, total);
    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(meta),
    ))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Product", product.into(), None))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;
    validate_pricing(payload.price, payload.original_price, payload.stock)?;
    if payload.name.trim().is_empty() {
        return Err(AppError::BadRequest("Product name is required".into()));
    }
    if payload.image.trim().is_empty() {
        return Err(AppError::BadRequest("Product image is required".into()));
    }

    let category = Categories::find_by_id(payload.category_id)
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::BadRequest("Category not found".into()))?;

    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name),
        description: Set(payload.description),
        price: Set(payload.price),
        original_price: Set(payload.original_price),
        image: Set(payload.image),
        images: Set(serde_json::json!(payload.images)),
        stock: Set(payload.stock),
        in_stock: Set(payload.stock > 0),
        rating: Set(0.0),
        reviews: Set(0),
        category_id: Set(category.id),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    category_service::refresh_product_count(&state.orm, category.id).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "product_create",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Product created",
        product.into(),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    ensure_admin(user)?;

    let existing = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let price = payload.price.unwrap_or(existing.price);
    let original_price = payload.original_price.or(existing.original_price);
    let stock = payload.stock.unwrap_or(existing.stock);
    validate_pricing(price, original_price, stock)?;

    let old_category = existing.category_id;
    let new_category = payload.category_id.unwrap_or(old_category);
    if new_category != old_category {
        Categories::find_by_id(new_category)
            .one(&state.orm)
            .await?
            .ok_or_else(|| AppError::BadRequest("Category not found".into()))?;
    }

    let mut active: ProductActive = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(image) = payload.image {
        active.image = Set(image);
    }
    if let Some(images) = payload.images {
        active.images = Set(serde_json::json!(images));
    }
    active.price = Set(price);
    active.original_price = Set(original_price);
    active.stock = Set(stock);
    active.in_stock = Set(stock > 0);
    active.category_id = Set(new_category);

    let product = active.update(&state.orm).await?;

    if new_category != old_category {
        category_service::refresh_product_count(&state.orm, old_category).await?;
        category_service::refresh_product_count(&state.orm, new_category).await?;
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "product_update",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Product updated",
        product.into(),
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;

    let txn = state.orm.begin().await?;

    let product = Products::find_by_id(id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let referenced = crate::entity::OrderItems::find()
        .filter(crate::entity::order_items::Column::ProductId.eq(id))
        .count(&txn)
        .await?;
    if referenced > 0 {
        return Err(AppError::BadRequest(
            "Cannot delete a product that appears in existing orders".into(),
        ));
    }

    purge_product_references(&txn, &[id]).await?;
    Products::delete_by_id(id).exec(&txn).await?;
    category_service::refresh_product_count(&txn, product.category_id).await?;

    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "product_delete",
        Some("products"),
        Some(serde_json::json!({ "product_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Product deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// Carts, favorites and reviews all hold FKs onto `products`; drop those
/// rows before the product itself so the delete cannot trip a constraint.
/// Order items are deliberately excluded since they block deletion instead.
pub(crate) async fn purge_product_references<C: sea_orm::ConnectionTrait>(
    conn: &C,
    product_ids: &[Uuid],
) -> AppResult<()> {
    use crate::entity::{
        cart_items::{Column as CartCol, Entity as CartItems},
        favorites::{Column as FavCol, Entity as Favorites},
        reviews::{Column as ReviewCol, Entity as Reviews},
    };

    CartItems::delete_many()
        .filter(CartCol::ProductId.is_in(product_ids.to_vec()))
        .exec(conn)
        .await?;
    Favorites::delete_many()
        .filter(FavCol::ProductId.is_in(product_ids.to_vec()))
        .exec(conn)
        .await?;
    Reviews::delete_many()
        .filter(ReviewCol::ProductId.is_in(product_ids.to_vec()))
        .exec(conn)
        .await?;
    Ok(())
}

fn validate_pricing(price: i64, original_price: Option<i64>, stock: i32) -> AppResult<()> {
    if price <= 0 {
        return Err(AppError::BadRequest(
            "Product price must be greater than 0".into(),
        ));
    }
    if let Some(original) = original_price {
        if original <= price {
            return Err(AppError::BadRequest(
                "Original price must be greater than current price".into(),
            ));
        }
    }
    if stock < 0 {
        return Err(AppError::BadRequest("Stock cannot be negative".into()));
    }
    Ok(())
}
