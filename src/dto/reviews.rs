use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateReviewRequest {
    pub rating: i32,
    pub title: String,
    pub comment: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewDto {
    pub id: Uuid,
    pub product_id: Uuid,
    pub user_id: Uuid,
    pub user_name: String,
    pub rating: i32,
    pub title: String,
    pub comment: String,
    pub helpful: i32,
    pub verified: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RatingSummary {
    pub average_rating: f64,
    pub total_reviews: i64,
    /// Review counts for one through five stars.
    pub rating_distribution: [i64; 5],
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReviewList {
    pub items: Vec<ReviewDto>,
    pub summary: RatingSummary,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HelpfulResponse {
    pub helpful: i32,
}
