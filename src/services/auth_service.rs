use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use password_hash::rand_core::OsRng;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};
use sea_orm::ActiveValue::NotSet;
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::auth::{LoginRequest, LoginResponse, RegisterRequest, ResendVerificationRequest},
    entity::users::{self, ActiveModel as UserActive, Column as UserCol, Entity as Users, UserRole},
    error::{AppError, AppResult},
    middleware::auth::{ADMIN_TOKEN_TTL_HOURS, AuthUser, CUSTOMER_TOKEN_TTL_HOURS, issue_token},
    models::User,
    response::{ApiResponse, Meta},
    state::AppState,
};

const MIN_PASSWORD_LEN: usize = 6;
const VERIFICATION_TOKEN_TTL_HOURS: i64 = 24;

pub async fn register(state: &AppState, payload: RegisterRequest) -> AppResult<ApiResponse<User>> {
    let RegisterRequest {
        email,
        password,
        first_name,
        last_name,
    } = payload;

    if email.trim().is_empty() || first_name.trim().is_empty() || last_name.trim().is_empty() {
        return Err(AppError::BadRequest(
            "Email, password, first name, and last name are required".into(),
        ));
    }
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters long"
        )));
    }

    let exists = Users::find()
        .filter(UserCol::Email.eq(email.as_str()))
        .one(&state.orm)
        .await?;
    if exists.is_some() {
        return Err(AppError::BadRequest(
            "User with this email already exists".into(),
        ));
    }

    let token = generate_verification_token();
    let expiry = Utc::now() + Duration::hours(VERIFICATION_TOKEN_TTL_HOURS);

    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.clone()),
        password_hash: Set(hash_password(&password)?),
        first_name: Set(first_name.clone()),
        last_name: Set(last_name),
        role: Set(UserRole::Customer),
        is_email_verified: Set(false),
        email_verification_token: Set(Some(token.clone())),
        email_verification_expiry: Set(Some(expiry.into())),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    // Mail delivery must not abort registration.
    if let Some(mailer) = &state.mailer {
        let link = verification_link(state, &token);
        if let Err(err) = mailer
            .send_verification_email(&user.email, &user.first_name, &link)
            .await
        {
            tracing::warn!(error = %err, "verification email failed");
        }
    }

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.id),
        "user_register",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Registration successful. Check your email to verify your account before logging in.",
        user.into(),
        None,
    ))
}

pub async fn login_customer(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let user = find_by_email(state, &payload.email).await?;

    if !user.is_email_verified {
        return Err(AppError::EmailNotVerified);
    }
    verify_password(&payload.password, &user.password_hash)?;

    let token = issue_token(&user, CUSTOMER_TOKEN_TTL_HOURS)?;
    audit_login(state, user.id).await;

    Ok(ApiResponse::success(
        "Login successful",
        LoginResponse {
            token,
            user: user.into(),
        },
        Some(Meta::empty()),
    ))
}

pub async fn login_admin(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let user = find_by_email(state, &payload.email).await?;

    // Admin is a flag on the shared users table, not a separate principal.
    if user.role != UserRole::Admin {
        return Err(AppError::Unauthorized("Invalid email or password".into()));
    }
    verify_password(&payload.password, &user.password_hash)?;

    let token = issue_token(&user, ADMIN_TOKEN_TTL_HOURS)?;
    audit_login(state, user.id).await;

    Ok(ApiResponse::success(
        "Login successful",
        LoginResponse {
            token,
            user: user.into(),
        },
        Some(Meta::empty()),
    ))
}

pub async fn verify_email(state: &AppState, token: &str) -> AppResult<ApiResponse<User>> {
    let user = Users::find()
        .filter(UserCol::EmailVerificationToken.eq(token))
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::BadRequest("Invalid or expired verification token".into()))?;

    if user.is_email_verified {
        return Ok(ApiResponse::success(
            "Email is already verified. You can now log in.",
            user.into(),
            None,
        ));
    }

    if let Some(expiry) = user.email_verification_expiry {
        if expiry.with_timezone(&Utc) < Utc::now() {
            return Err(AppError::BadRequest(
                "Verification token has expired. Please request a new verification email.".into(),
            ));
        }
    }

    let email = user.email.clone();
    let first_name = user.first_name.clone();

    let mut active: UserActive = user.into();
    active.is_email_verified = Set(true);
    active.email_verification_token = Set(None);
    active.email_verification_expiry = Set(None);
    let user = active.update(&state.orm).await?;

    if let Some(mailer) = &state.mailer {
        if let Err(err) = mailer.send_welcome_email(&email, &first_name).await {
            tracing::warn!(error = %err, "welcome email failed");
        }
    }

    Ok(ApiResponse::success(
        "Email verified successfully. You can now log in to your account.",
        user.into(),
        None,
    ))
}

pub async fn resend_verification(
    state: &AppState,
    payload: ResendVerificationRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let user = Users::find()
        .filter(UserCol::Email.eq(payload.email.as_str()))
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    if user.is_email_verified {
        return Err(AppError::BadRequest("Email is already verified".into()));
    }

    let token = generate_verification_token();
    let expiry = Utc::now() + Duration::hours(VERIFICATION_TOKEN_TTL_HOURS);

    let email = user.email.clone();
    let first_name = user.first_name.clone();

    let mut active: UserActive = user.into();
    active.email_verification_token = Set(Some(token.clone()));
    active.email_verification_expiry = Set(Some(expiry.into()));
    active.update(&state.orm).await?;

    if let Some(mailer) = &state.mailer {
        let link = verification_link(state, &token);
        if let Err(err) = mailer
            .send_verification_email(&email, &first_name, &link)
            .await
        {
            tracing::warn!(error = %err, "verification email failed");
        }
    }

    Ok(ApiResponse::success(
        "Verification email sent",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub async fn current_user(state: &AppState, auth: &AuthUser) -> AppResult<ApiResponse<User>> {
    let user = Users::find_by_id(auth.user_id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("OK", user.into(), None))
}

async fn find_by_email(state: &AppState, email: &str) -> AppResult<users::Model> {
    Users::find()
        .filter(UserCol::Email.eq(email))
        .one(&state.orm)
        .await?
        .ok_or_else(|| AppError::Unauthorized("Invalid email or password".into()))
}

pub fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();
    Ok(argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string())
}

fn verify_password(password: &str, password_hash: &str) -> AppResult<()> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Invalid password hash")))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .map_err(|_| AppError::Unauthorized("Invalid email or password".into()))
}

fn generate_verification_token() -> String {
    // 256 bits of randomness, rendered as 64 hex chars.
    format!(
        "{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}

fn verification_link(state: &AppState, token: &str) -> String {
    format!(
        "{}/api/customer-auth/verify-email?token={token}",
        state.config.app_base_url
    )
}

async fn audit_login(state: &AppState, user_id: Uuid) {
    if let Err(err) = log_audit(
        &state.pool,
        Some(user_id),
        "user_login",
        Some("users"),
        Some(serde_json::json!({ "user_id": user_id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }
}
