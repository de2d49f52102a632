use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use sea_orm::ActiveValue::NotSet;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::categories::{CategoryList, CreateCategoryRequest, UpdateCategoryRequest},
    entity::{
        categories::{ActiveModel as CategoryActive, Column as CatCol, Entity as Categories},
        products::{Column as ProdCol, Entity as Products},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Category,
    response::{ApiResponse, Meta},
    routes::params::CategoryQuery,
    state::AppState,
};

const MAX_NAME_LEN: usize = 50;
const MAX_DESCRIPTION_LEN: usize = 500;

pub async fn list_categories(
    state: &AppState,
    query: CategoryQuery,
) -> AppResult<ApiResponse<CategoryList>> {
    let mut finder = Categories::find();
    if query.featured == Some(true) {
        finder = finder.filter(CatCol::Featured.eq(true));
    }

    let items = finder
        .order_by_desc(CatCol::Featured)
        .order_by_asc(CatCol::Name)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Category::from)
        .collect();

    Ok(ApiResponse::success(
        "Categories",
        CategoryList { items },
        None,
    ))
}

pub async fn get_category(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Category>> {
    let category = Categories::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("Category", category.into(), None))
}

pub async fn create_category(
    state: &AppState,
    user: &AuthUser,
    payload: CreateCategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    ensure_admin(user)?;
    validate_fields(&payload.name, payload.description.as_deref(), &payload.image)?;

    let exists = Categories::find()
        .filter(CatCol::Name.eq(payload.name.as_str()))
        .one(&state.orm)
        .await?;
    if exists.is_some() {
        return Err(AppError::BadRequest(
            "Category with this name already exists".into(),
        ));
    }

    let category = CategoryActive {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name),
        description: Set(payload.description),
        image: Set(payload.image),
        featured: Set(payload.featured),
        product_count: Set(0),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "category_create",
        Some("categories"),
        Some(serde_json::json!({ "category_id": category.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Category created",
        category.into(),
        Some(Meta::empty()),
    ))
}

pub async fn update_category(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateCategoryRequest,
) -> AppResult<ApiResponse<Category>> {
    ensure_admin(user)?;

    let existing = Categories::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if let Some(name) = payload.name.as_deref() {
        if name.trim().is_empty() || name.len() > MAX_NAME_LEN {
            return Err(AppError::BadRequest(format!(
                "Category name must be 1 to {MAX_NAME_LEN} characters"
            )));
        }
    }
    if let Some(description) = payload.description.as_deref() {
        if description.len() > MAX_DESCRIPTION_LEN {
            return Err(AppError::BadRequest(format!(
                "Category description must be less than {MAX_DESCRIPTION_LEN} characters"
            )));
        }
    }

    let mut active: CategoryActive = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(image) = payload.image {
        active.image = Set(image);
    }
    if let Some(featured) = payload.featured {
        active.featured = Set(featured);
    }
    let category = active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "Category updated",
        category.into(),
        Some(Meta::empty()),
    ))
}

/// Deletion is blocked while products still reference the category; the
/// error names the offending count instead of cascading.
pub async fn delete_category(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    ensure_admin(user)?;

    let category = Categories::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let product_count = Products::find()
        .filter(ProdCol::CategoryId.eq(id))
        .count(&state.orm)
        .await?;
    if product_count > 0 {
        return Err(AppError::BadRequest(format!(
            "Cannot delete category. It contains {product_count} products. \
             Please move or delete the products first."
        )));
    }

    Categories::delete_by_id(category.id).exec(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "category_delete",
        Some("categories"),
        Some(serde_json::json!({ "category_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Category deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

/// Recompute the denormalized product count. Called from every product
/// mutation that can change category membership.
pub async fn refresh_product_count<C: ConnectionTrait>(
    conn: &C,
    category_id: Uuid,
) -> AppResult<()> {
    let count = Products::find()
        .filter(ProdCol::CategoryId.eq(category_id))
        .count(conn)
        .await? as i32;

    if let Some(category) = Categories::find_by_id(category_id).one(conn).await? {
        let mut active: CategoryActive = category.into();
        active.product_count = Set(count);
        active.update(conn).await?;
    }
    Ok(())
}

fn validate_fields(name: &str, description: Option<&str>, image: &str) -> AppResult<()> {
    if name.trim().is_empty() {
        return Err(AppError::BadRequest("Category name is required".into()));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(AppError::BadRequest(format!(
            "Category name must be less than {MAX_NAME_LEN} characters"
        )));
    }
    if image.trim().is_empty() {
        return Err(AppError::BadRequest("Category image is required".into()));
    }
    if let Some(description) = description {
        if description.len() > MAX_DESCRIPTION_LEN {
            return Err(AppError::BadRequest(format!(
                "Category description must be less than {MAX_DESCRIPTION_LEN} characters"
            )));
        }
    }
    Ok(())
}
