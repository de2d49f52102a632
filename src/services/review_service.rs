use sea_orm::ActiveValue::NotSet;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, FromQueryResult, JoinType,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, SqlErr,
    TransactionTrait,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::reviews::{CreateReviewRequest, HelpfulResponse, RatingSummary, ReviewDto, ReviewList},
    entity::{
        order_items::{self, Column as OrderItemCol, Entity as OrderItems},
        orders::{Column as OrderCol, OrderStatus},
        products::{ActiveModel as ProductActive, Entity as Products},
        reviews::{ActiveModel as ReviewActive, Column as ReviewCol, Entity as Reviews},
        users::{self, Entity as Users, UserRole},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    response::{ApiResponse, Meta},
    routes::params::{ReviewListQuery, ReviewSortBy},
    state::AppState,
};

pub async fn list_reviews(
    state: &AppState,
    product_id: Uuid,
    query: ReviewListQuery,
) -> AppResult<ApiResponse<ReviewList>> {
    Products::find_by_id(product_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let (page, limit, offset) = query.pagination.normalize();

    let mut finder = Reviews::find().filter(ReviewCol::ProductId.eq(product_id));
    finder = match query.sort_by.unwrap_or(ReviewSortBy::Newest) {
        ReviewSortBy::Newest => finder.order_by_desc(ReviewCol::CreatedAt),
        ReviewSortBy::Oldest => finder.order_by_asc(ReviewCol::CreatedAt),
        ReviewSortBy::Highest => finder
            .order_by_desc(ReviewCol::Rating)
            .order_by_desc(ReviewCol::CreatedAt),
        ReviewSortBy::Lowest => finder
            .order_by_asc(ReviewCol::Rating)
            .order_by_desc(ReviewCol::CreatedAt),
        ReviewSortBy::Helpful => finder
            .order_by_desc(ReviewCol::Helpful)
            .order_by_desc(ReviewCol::CreatedAt),
    };

    let rows = finder
        .find_also_related(Users)
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?;

    let items = rows
        .into_iter()
        .map(|(review, user)| review_dto(review, user.as_ref()))
        .collect();

    let summary = rating_summary(&state.orm, product_id).await?;
    let total = summary.total_reviews;

    Ok(ApiResponse::success(
        "Reviews",
        ReviewList { items, summary },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn create_review(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: CreateReviewRequest,
) -> AppResult<ApiResponse<ReviewDto>> {
    if !(1..=5).contains(&payload.rating) {
        return Err(AppError::BadRequest(
            "Rating must be between 1 and 5".into(),
        ));
    }
    if payload.title.trim().is_empty() || payload.comment.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Review title and comment are required".into(),
        ));
    }

    let author = Users::find_by_id(user.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let txn = state.orm.begin().await?;

    Products::find_by_id(product_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    let verified = has_delivered_order(&txn, user.user_id, product_id).await?;

    // One review per (user, product), enforced by the unique index so two
    // concurrent first reviews cannot both slip through.
    let review = match (ReviewActive {
        id: Set(Uuid::new_v4()),
        product_id: Set(product_id),
        user_id: Set(user.user_id),
        rating: Set(payload.rating),
        title: Set(payload.title),
        comment: Set(payload.comment),
        helpful: Set(0),
        verified: Set(verified),
        created_at: NotSet,
        updated_at: NotSet,
    })
    .insert(&txn)
    .await
    {
        Ok(review) => review,
        Err(err) if matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            return Err(AppError::BadRequest(
                "You have already reviewed this product".into(),
            ));
        }
        Err(err) => return Err(err.into()),
    };

    refresh_product_rating(&txn, product_id).await?;
    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "review_create",
        Some("reviews"),
        Some(serde_json::json!({ "review_id": review.id, "product_id": product_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Review submitted",
        review_dto(review, Some(&author)),
        Some(Meta::empty()),
    ))
}

pub async fn mark_helpful(
    state: &AppState,
    review_id: Uuid,
) -> AppResult<ApiResponse<HelpfulResponse>> {
    use sea_orm::sea_query::Expr;

    let updated = Reviews::update_many()
        .col_expr(ReviewCol::Helpful, Expr::col(ReviewCol::Helpful).add(1))
        .filter(ReviewCol::Id.eq(review_id))
        .exec(&state.orm)
        .await?;
    if updated.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    let review = Reviews::find_by_id(review_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    Ok(ApiResponse::success(
        "Marked as helpful",
        HelpfulResponse {
            helpful: review.helpful,
        },
        Some(Meta::empty()),
    ))
}

pub async fn delete_review(
    state: &AppState,
    user: &AuthUser,
    review_id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let txn = state.orm.begin().await?;

    let review = Reviews::find_by_id(review_id)
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound)?;

    if review.user_id != user.user_id && user.role != UserRole::Admin {
        return Err(AppError::Forbidden);
    }

    let product_id = review.product_id;
    Reviews::delete_by_id(review_id).exec(&txn).await?;
    refresh_product_rating(&txn, product_id).await?;
    txn.commit().await?;

    Ok(ApiResponse::success(
        "Review deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

#[derive(Debug, FromQueryResult)]
struct RatingBucket {
    rating: i32,
    count: i64,
}

async fn rating_summary<C: ConnectionTrait>(conn: &C, product_id: Uuid) -> AppResult<RatingSummary> {
    let buckets = Reviews::find()
        .select_only()
        .column(ReviewCol::Rating)
        .column_as(ReviewCol::Id.count(), "count")
        .filter(ReviewCol::ProductId.eq(product_id))
        .group_by(ReviewCol::Rating)
        .into_model::<RatingBucket>()
        .all(conn)
        .await?;

    let mut distribution = [0i64; 5];
    let mut total = 0i64;
    let mut rating_sum = 0i64;
    for bucket in buckets {
        if (1..=5).contains(&bucket.rating) {
            distribution[(bucket.rating - 1) as usize] = bucket.count;
        }
        total += bucket.count;
        rating_sum += bucket.rating as i64 * bucket.count;
    }

    let average_rating = if total > 0 {
        round_rating(rating_sum as f64 / total as f64)
    } else {
        0.0
    };

    Ok(RatingSummary {
        average_rating,
        total_reviews: total,
        rating_distribution: distribution,
    })
}

/// A review is "verified" when the author has a delivered order containing
/// the product.
async fn has_delivered_order<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    product_id: Uuid,
) -> AppResult<bool> {
    let count = OrderItems::find()
        .join(JoinType::InnerJoin, order_items::Relation::Orders.def())
        .filter(OrderItemCol::ProductId.eq(product_id))
        .filter(OrderCol::UserId.eq(user_id))
        .filter(OrderCol::Status.eq(OrderStatus::Delivered))
        .count(conn)
        .await?;
    Ok(count > 0)
}

/// Recompute the denormalized rating and review count on the product row.
/// Runs inside the same transaction as the review write so the aggregate
/// never drifts from the rows it summarizes.
pub async fn refresh_product_rating<C: ConnectionTrait>(
    conn: &C,
    product_id: Uuid,
) -> AppResult<()> {
    let summary = rating_summary(conn, product_id).await?;

    if let Some(product) = Products::find_by_id(product_id).one(conn).await? {
        let mut active: ProductActive = product.into();
        active.rating = Set(summary.average_rating);
        active.reviews = Set(summary.total_reviews as i32);
        active.update(conn).await?;
    }
    Ok(())
}

fn round_rating(avg: f64) -> f64 {
    (avg * 10.0).round() / 10.0
}

fn review_dto(review: crate::entity::reviews::Model, user: Option<&users::Model>) -> ReviewDto {
    let user_name = user
        .map(|u| format!("{} {}", u.first_name, u.last_name))
        .unwrap_or_else(|| "Anonymous".into());
    ReviewDto {
        id: review.id,
        product_id: review.product_id,
        user_id: review.user_id,
        user_name,
        rating: review.rating,
        title: review.title,
        comment: review.comment,
        helpful: review.helpful,
        verified: review.verified,
        created_at: review.created_at.with_timezone(&chrono::Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::round_rating;

    #[test]
    fn average_rounds_to_one_decimal() {
        assert_eq!(round_rating(13.0 / 3.0), 4.3);
        assert_eq!(round_rating(9.0 / 2.0), 4.5);
        assert_eq!(round_rating(5.0), 5.0);
    }
}
