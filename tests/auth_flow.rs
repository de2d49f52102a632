use axum::response::IntoResponse;
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, Statement};

use storefront_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    dto::auth::{LoginRequest, RegisterRequest},
    entity::users::{Column as UserCol, Entity as Users},
    error::AppError,
    middleware::auth::ensure_admin,
    services::auth_service,
    state::AppState,
};

// Registration leaves the account unverified; login must refuse it with the
// distinguished code until the emailed token is redeemed.
#[tokio::test]
async fn unverified_login_is_refused_until_email_is_verified() -> anyhow::Result<()> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!("Skipping test: set TEST_DATABASE_URL or DATABASE_URL.");
            return Ok(());
        }
    };

    let state = setup_state(&database_url).await?;

    auth_service::register(
        &state,
        RegisterRequest {
            email: "new-customer@example.com".into(),
            password: "hunter22".into(),
            first_name: "New".into(),
            last_name: "Customer".into(),
        },
    )
    .await?;

    let err = auth_service::login_customer(
        &state,
        LoginRequest {
            email: "new-customer@example.com".into(),
            password: "hunter22".into(),
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::EmailNotVerified));

    // Over the wire that is a 401 carrying the machine-readable code.
    let response = err.into_response();
    assert_eq!(response.status(), axum::http::StatusCode::UNAUTHORIZED);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let body = String::from_utf8(body.to_vec())?;
    assert!(body.contains("\"code\":\"EMAIL_NOT_VERIFIED\""));

    // Redeem the stored token, then the same credentials work.
    let user = Users::find()
        .filter(UserCol::Email.eq("new-customer@example.com"))
        .one(&state.orm)
        .await?
        .expect("registered user");
    let token = user.email_verification_token.expect("verification token");

    auth_service::verify_email(&state, &token).await?;

    let login = auth_service::login_customer(
        &state,
        LoginRequest {
            email: "new-customer@example.com".into(),
            password: "hunter22".into(),
        },
    )
    .await?
    .data
    .expect("login data");
    assert!(!login.token.is_empty());

    // A customer token never passes the admin guard.
    let customer = storefront_api::middleware::auth::AuthUser {
        user_id: user.id,
        email: user.email,
        role: user.role,
    };
    assert!(matches!(ensure_admin(&customer), Err(AppError::Forbidden)));

    Ok(())
}

async fn setup_state(database_url: &str) -> anyhow::Result<AppState> {
    let pool = create_pool(database_url).await?;
    let orm = create_orm_conn(database_url).await?;
    run_migrations(&orm).await?;

    let backend = orm.get_database_backend();
    orm.execute(Statement::from_string(
        backend,
        "TRUNCATE TABLE order_items, orders, cart_items, favorites, reviews, addresses, \
         audit_logs, products, categories, users RESTART IDENTITY CASCADE",
    ))
    .await?;

    Ok(AppState {
        pool,
        orm,
        config: AppConfig {
            database_url: database_url.to_string(),
            host: "127.0.0.1".into(),
            port: 0,
            app_base_url: "http://localhost".into(),
        },
        mailer: None,
        images: None,
    })
}
