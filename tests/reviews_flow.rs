use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ConnectionTrait, EntityTrait, Set, Statement};
use uuid::Uuid;

use storefront_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    dto::reviews::CreateReviewRequest,
    entity::{
        addresses::{ActiveModel as AddressActive, AddressKind},
        categories::ActiveModel as CategoryActive,
        order_items::ActiveModel as OrderItemActive,
        orders::{ActiveModel as OrderActive, OrderStatus},
        products::{ActiveModel as ProductActive, Entity as Products},
        users::{ActiveModel as UserActive, UserRole},
    },
    error::AppError,
    middleware::auth::AuthUser,
    routes::params::{Pagination, ReviewListQuery},
    services::review_service,
    state::AppState,
};

// Review lifecycle: verified-purchase detection, rating recomputation on
// create and delete, duplicate rejection.
#[tokio::test]
async fn reviews_keep_the_product_aggregate_in_sync() -> anyhow::Result<()> {
    let database_url = match std::env::var("TEST_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
    {
        Ok(url) => url,
        Err(_) => {
            eprintln!(
                "Skipping test: set TEST_DATABASE_URL or DATABASE_URL to run integration flow tests."
            );
            return Ok(());
        }
    };

    let state = setup_state(&database_url).await?;

    let buyer = create_user(&state, "buyer@example.com").await?;
    let browser = create_user(&state, "browser@example.com").await?;
    let product_id = create_product(&state).await?;

    // The buyer has a delivered order containing the product.
    create_delivered_order(&state, &buyer, product_id).await?;

    let review = review_service::create_review(
        &state,
        &buyer,
        product_id,
        CreateReviewRequest {
            rating: 5,
            title: "Excellent".into(),
            comment: "Does what it says.".into(),
        },
    )
    .await?
    .data
    .expect("review data");
    assert!(review.verified);

    // The browser never bought it.
    let review2 = review_service::create_review(
        &state,
        &browser,
        product_id,
        CreateReviewRequest {
            rating: 4,
            title: "Good".into(),
            comment: "Solid but pricey.".into(),
        },
    )
    .await?
    .data
    .expect("review data");
    assert!(!review2.verified);

    let product = Products::find_by_id(product_id).one(&state.orm).await?.unwrap();
    assert_eq!(product.reviews, 2);
    assert_eq!(product.rating, 4.5);

    // One review per user per product: the unique index fires and surfaces
    // as a 400, not a 500.
    let err = review_service::create_review(
        &state,
        &buyer,
        product_id,
        CreateReviewRequest {
            rating: 1,
            title: "Changed my mind".into(),
            comment: "Second thoughts.".into(),
        },
    )
    .await
    .unwrap_err();
    match err {
        AppError::BadRequest(msg) => assert!(msg.contains("already reviewed")),
        other => panic!("expected BadRequest, got {other:?}"),
    }

    let helpful = review_service::mark_helpful(&state, review.id)
        .await?
        .data
        .expect("helpful data");
    assert_eq!(helpful.helpful, 1);

    let listed = review_service::list_reviews(
        &state,
        product_id,
        ReviewListQuery {
            pagination: Pagination {
                page: None,
                per_page: None,
            },
            sort_by: None,
        },
    )
    .await?
    .data
    .expect("review list");
    assert_eq!(listed.summary.total_reviews, 2);
    assert_eq!(listed.summary.rating_distribution, [0, 0, 0, 1, 1]);

    // Deleting someone else's review is forbidden.
    let err = review_service::delete_review(&state, &browser, review.id)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Forbidden));

    review_service::delete_review(&state, &buyer, review.id).await?;
    let product = Products::find_by_id(product_id).one(&state.orm).await?.unwrap();
    assert_eq!(product.reviews, 1);
    assert_eq!(product.rating, 4.0);

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

async fn create_user(state: &AppState, email: &str) -> anyhow::Result<AuthUser> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set("dummy".into()),
        first_name: Set("Test".into()),
        last_name: Set("User".into()),
        role: Set(UserRole::Customer),
        is_email_verified: Set(true),
        email_verification_token: Set(None),
        email_verification_expiry: Set(None),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser {
        user_id: user.id,
        email: user.email,
        role: user.role,
    })
}

async fn create_product(state: &AppState) -> anyhow::Result<Uuid> {
    let category = CategoryActive {
        id: Set(Uuid::new_v4()),
        name: Set("Reviewed Things".into()),
        description: Set(None),
        image: Set("https://example.com/cat.png".into()),
        featured: Set(false),
        product_count: Set(1),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set("Reviewable Widget".into()),
        description: Set(None),
        price: Set(2500),
        original_price: Set(None),
        image: Set("https://example.com/p.png".into()),
        images: Set(serde_json::json!([])),
        stock: Set(10),
        in_stock: Set(true),
        rating: Set(0.0),
        reviews: Set(0),
        category_id: Set(category.id),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(product.id)
}

async fn create_delivered_order(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> anyhow::Result<()> {
    let address = AddressActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        kind: Set(AddressKind::Shipping),
        first_name: Set("Test".into()),
        last_name: Set("User".into()),
        street: Set("1 Main St".into()),
        city: Set("Springfield".into()),
        state: Set("IL".into()),
        zip_code: Set("62701".into()),
        country: Set("US".into()),
        is_default: Set(true),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    let order = OrderActive {
        id: Set(Uuid::new_v4()),
        user_id: Set(user.user_id),
        address_id: Set(address.id),
        subtotal: Set(2500),
        tax: Set(200),
        shipping: Set(599),
        total: Set(3299),
        status: Set(OrderStatus::Delivered),
        customer_info: Set(None),
        created_at: NotSet,
        updated_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    OrderItemActive {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        product_id: Set(product_id),
        quantity: Set(1),
        price: Set(2500),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(())
}
