use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
};

use crate::{
    dto::auth::{
        LoginRequest, LoginResponse, RegisterRequest, ResendVerificationRequest, VerifyEmailQuery,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::User,
    response::ApiResponse,
    services::auth_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", axum::routing::post(register))
        .route("/login", axum::routing::post(login))
        .route("/verify-email", axum::routing::get(verify_email))
        .route(
            "/resend-verification",
            axum::routing::post(resend_verification),
        )
        .route("/me", axum::routing::get(me))
}

#[utoipa::path(
    post,
    path = "/api/customer-auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "Account created, verification email sent", body = ApiResponse<User>),
        (status = 400, description = "Validation failure or duplicate email"),
    ),
    tag = "CustomerAuth"
)]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> AppResult<(StatusCode, Json<ApiResponse<User>>)> {
    let resp = auth_service::register(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(resp)))
}

#[utoipa::path(
    post,
    path = "/api/customer-auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = ApiResponse<LoginResponse>),
        (status = 401, description = "Invalid credentials, or EMAIL_NOT_VERIFIED"),
    ),
    tag = "CustomerAuth"
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> AppResult<Json<ApiResponse<LoginResponse>>> {
    Ok(Json(auth_service::login_customer(&state, payload).await?))
}

#[utoipa::path(
    get,
    path = "/api/customer-auth/verify-email",
    params(
        ("token" = String, Query, description = "Verification token from the email link")
    ),
    responses(
        (status = 200, description = "Email verified", body = ApiResponse<User>),
        (status = 400, description = "Invalid or expired token"),
    ),
    tag = "CustomerAuth"
)]
pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyEmailQuery>,
) -> AppResult<Json<ApiResponse<User>>> {
    Ok(Json(auth_service::verify_email(&state, &query.token).await?))
}

#[utoipa::path(
    post,
    path = "/api/customer-auth/resend-verification",
    request_body = ResendVerificationRequest,
    responses(
        (status = 200, description = "Verification email sent"),
        (status = 400, description = "Email already verified"),
        (status = 404, description = "No account for that email"),
    ),
    tag = "CustomerAuth"
)]
pub async fn resend_verification(
    State(state): State<AppState>,
    Json(payload): Json<ResendVerificationRequest>,
) -> AppResult<Json<ApiResponse<serde_json::Value>>> {
    Ok(Json(
        auth_service::resend_verification(&state, payload).await?,
    ))
}

#[utoipa::path(
    get,
    path = "/api/customer-auth/me",
    responses(
        (status = 200, description = "Current user", body = ApiResponse<User>),
        (status = 401, description = "Missing or invalid token"),
    ),
    tag = "CustomerAuth"
)]
pub async fn me(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<User>>> {
    Ok(Json(auth_service::current_user(&state, &user).await?))
}
