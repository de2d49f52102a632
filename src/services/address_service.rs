use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder,
    Set, TransactionTrait,
};
use uuid::Uuid;

use crate::{
    dto::addresses::{AddressList, CreateAddressRequest, UpdateAddressRequest},
    entity::{
        addresses::{ActiveModel as AddressActive, Column as AddrCol, Entity as Addresses},
        orders::{Column as OrderCol, Entity as Orders},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::Address,
    response::{ApiResponse, Meta},
    state::AppState,
};

pub async fn list_addresses(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<AddressList>> {
    let items = Addresses::find()
        .filter(AddrCol::UserId.eq(user.user_id))
        .order_by_desc(AddrCol::IsDefault)
        .order_by_desc(AddrCol::CreatedAt)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(Address::from)
        .collect();

    Ok(ApiResponse::success("Addresses", AddressList { items }, None))
}

pub async fn create_address(
    state: &AppState,
    user: &AuthUser,
    payload: CreateAddressRequest,
) -> AppResult<ApiResponse<Address>> {
    validate_fields(
        &payload.street,
        &payload.city,
        &payload.state,
        &payload.zip_code,
        &payload.country,
    )?;

    let txn = state.orm.begin().await?;

    if payload.is_default {
        clear_default(&txn, user.user_id, payload.kind).await?;
    }

    let address = AddressActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        kind: Set(payload.kind),
        first_name: Set(payload.first_name),
        last_name: Set(payload.last_name),
        street: Set(payload.street),
        city: Set(payload.city),
        state: Set(payload.state),
        zip_code: Set(payload.zip_code),
        country: Set(payload.country),
        is_default: Set(payload.is_default),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    Ok(ApiResponse::success(
        "Address created",
        address.into(),
        Some(Meta::empty()),
    ))
}

pub async fn update_address(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateAddressRequest,
) -> AppResult<ApiResponse<Address>> {
    let existing = find_owned(state, user, id).await?;

    let mut active: AddressActive = existing.into();
    if let Some(kind) = payload.kind {
        active.kind = Set(kind);
    }
    if let Some(first_name) = payload.first_name {
        active.first_name = Set(first_name);
    }
    if let Some(last_name) = payload.last_name {
        active.last_name = Set(last_name);
    }
    if let Some(street) = payload.street {
        if street.trim().is_empty() {
            return Err(AppError::BadRequest("Street cannot be empty".into()));
        }
        active.street = Set(street);
    }
    if let Some(city) = payload.city {
        if city.trim().is_empty() {
            return Err(AppError::BadRequest("City cannot be empty".into()));
        }
        active.city = Set(city);
    }
    if let Some(addr_state) = payload.state {
        active.state = Set(addr_state);
    }
    if let Some(zip_code) = payload.zip_code {
        active.zip_code = Set(zip_code);
    }
    if let Some(country) = payload.country {
        active.country = Set(country);
    }

    let address = active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "Address updated",
        address.into(),
        Some(Meta::empty()),
    ))
}

/// Exactly one default per address kind: setting this address clears the
/// flag on the user's other addresses of the same kind inside one
/// transaction.
pub async fn set_default_address(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Address>> {
    let existing = find_owned(state, user, id).await?;

    let txn = state.orm.begin().await?;
    clear_default(&txn, user.user_id, existing.kind).await?;

    let mut active: AddressActive = existing.into();
    active.is_default = Set(true);
    let address = active.update(&txn).await?;

    txn.commit().await?;

    Ok(ApiResponse::success(
        "Default address updated",
        address.into(),
        Some(Meta::empty()),
    ))
}

/// Deletion is blocked while orders still reference the address; order
/// history keeps pointing at a live row.
pub async fn delete_address(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let address = find_owned(state, user, id).await?;

    let referenced = Orders::find()
        .filter(OrderCol::AddressId.eq(id))
        .count(&state.orm)
        .await?;
    if referenced > 0 {
        return Err(AppError::BadRequest(
            "Cannot delete an address that is used by existing orders".into(),
        ));
    }

    Addresses::delete_by_id(address.id).exec(&state.orm).await?;

    Ok(ApiResponse::success(
        "Address deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

async fn find_owned(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<crate::entity::addresses::Model> {
    Addresses::find()
        .filter(
            Condition::all()
                .add(AddrCol::Id.eq(id))
                .add(AddrCol::UserId.eq(user.user_id)),
        )
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)
}

async fn clear_default<C: sea_orm::ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    kind: crate::entity::addresses::AddressKind,
) -> AppResult<()> {
    use sea_orm::sea_query::Expr;

    Addresses::update_many()
        .col_expr(AddrCol::IsDefault, Expr::value(false))
        .filter(AddrCol::UserId.eq(user_id))
        .filter(AddrCol::Kind.eq(kind))
        .filter(AddrCol::IsDefault.eq(true))
        .exec(conn)
        .await?;
    Ok(())
}

fn validate_fields(
    street: &str,
    city: &str,
    state: &str,
    zip_code: &str,
    country: &str,
) -> AppResult<()> {
    if street.trim().is_empty()
        || city.trim().is_empty()
        || state.trim().is_empty()
        || zip_code.trim().is_empty()
        || country.trim().is_empty()
    {
        return Err(AppError::BadRequest(
            "Street, city, state, zip code, and country are required".into(),
        ));
    }
    Ok(())
}
