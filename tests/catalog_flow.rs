use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait, QueryFilter, Set, Statement};
use uuid::Uuid;

use storefront_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool, run_migrations},
    dto::{
        admin::{BulkDeleteProductsRequest, BulkProductChanges, BulkUpdateProductsRequest},
        cart::AddToCartRequest,
        favorites::AddFavoriteRequest,
        reviews::CreateReviewRequest,
    },
    entity::{
        categories::{ActiveModel as CategoryActive, Entity as Categories},
        products::{ActiveModel as ProductActive, Entity as Products},
        reviews::{Column as ReviewCol, Entity as Reviews},
        users::{ActiveModel as UserActive, UserRole},
    },
    error::AppError,
    middleware::auth::AuthUser,
    services::{
        admin_service, cart_service, category_service, favorite_service, product_service,
        review_service,
    },
    state::AppState,
};

// Category deletion refuses while products remain, naming the count; product
// deletion sweeps carts, favorites and reviews so the FK graph never turns a
// delete into a 500.
#[tokio::test]
async fn product_and_category_deletion_keep_references_consistent() -> anyhow::Result<()> {
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
    let admin = create_user(&state, UserRole::Admin, "catalog-admin@example.com").await?;
    let customer = create_user(&state, UserRole::Customer, "catalog-customer@example.com").await?;
    let category_id = create_category(&state).await?;

    let chair = create_product(&state, category_id, "Chair", 4000, 10).await?;
    let table = create_product(&state, category_id, "Table", 9000, 4).await?;
    let bench = create_product(&state, category_id, "Bench", 6000, 2).await?;

    // Three products still reference the category.
    let err = category_service::delete_category(&state, &admin, category_id)
        .await
        .unwrap_err();
    match err {
        AppError::BadRequest(msg) => assert!(msg.contains("contains 3 products")),
        other => panic!("expected BadRequest, got {other:?}"),
    }
    assert!(
        Categories::find_by_id(category_id)
            .one(&state.orm)
            .await?
            .is_some()
    );

    // The chair sits in a cart, in favorites, and has a review.
    cart_service::add_to_cart(
        &state,
        &customer,
        AddToCartRequest {
            product_id: chair,
            quantity: 1,
        },
    )
    .await?;
    favorite_service::add_favorite(
        &state,
        &customer,
        AddFavoriteRequest { product_id: chair },
    )
    .await?;
    review_service::create_review(
        &state,
        &customer,
        chair,
        CreateReviewRequest {
            rating: 4,
            title: "Sturdy".into(),
            comment: "Holds up well.".into(),
        },
    )
    .await?;

    product_service::delete_product(&state, &admin, chair).await?;

    let cart = cart_service::list_cart(&state, &customer)
        .await?
        .data
        .expect("cart data");
    assert_eq!(cart.item_count, 0);
    let check = favorite_service::check_favorite(&state, &customer, chair)
        .await?
        .data
        .expect("favorite data");
    assert!(!check.is_favorite);
    let reviews = Reviews::find()
        .filter(ReviewCol::ProductId.eq(chair))
        .count(&state.orm)
        .await?;
    assert_eq!(reviews, 0);

    let category = category_service::get_category(&state, category_id)
        .await?
        .data
        .expect("category data");
    assert_eq!(category.product_count, 2);

    // Bulk reprice and sell out the remaining two.
    let updated = admin_service::bulk_update_products(
        &state,
        &admin,
        BulkUpdateProductsRequest {
            product_ids: vec![table, bench],
            changes: BulkProductChanges {
                price: Some(7500),
                original_price: None,
                stock: Some(0),
                category_id: None,
            },
        },
    )
    .await?
    .data
    .expect("bulk update data");
    assert_eq!(updated.affected, 2);

    let table_row = Products::find_by_id(table).one(&state.orm).await?.unwrap();
    assert_eq!(table_row.price, 7500);
    assert_eq!(table_row.stock, 0);
    assert!(!table_row.in_stock);

    // An empty id list is rejected outright.
    let err = admin_service::bulk_update_products(
        &state,
        &admin,
        BulkUpdateProductsRequest {
            product_ids: vec![],
            changes: BulkProductChanges {
                price: Some(100),
                original_price: None,
                stock: None,
                category_id: None,
            },
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::BadRequest(_)));

    let deleted = admin_service::bulk_delete_products(
        &state,
        &admin,
        BulkDeleteProductsRequest {
            product_ids: vec![table, bench],
        },
    )
    .await?
    .data
    .expect("bulk delete data");
    assert_eq!(deleted.affected, 2);
    assert!(Products::find_by_id(table).one(&state.orm).await?.is_none());

    let category = category_service::get_category(&state, category_id)
        .await?
        .data
        .expect("category data");
    assert_eq!(category.product_count, 0);

    // Nothing references the category anymore.
    category_service::delete_category(&state, &admin, category_id).await?;

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

async fn create_user(state: &AppState, role: UserRole, email: &str) -> anyhow::Result<AuthUser> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set("dummy".into()),
        first_name: Set("Test".into()),
        last_name: Set("User".into()),
        role: Set(role),
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

async fn create_category(state: &AppState) -> anyhow::Result<Uuid> {
    let category = CategoryActive {
        id: Set(Uuid::new_v4()),
        name: Set("Furniture".into()),
        description: Set(None),
        image: Set("https://example.com/cat.png".into()),
        featured: Set(false),
        product_count: Set(0),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(category.id)
}

async fn create_product(
    state: &AppState,
    category_id: Uuid,
    name: &str,
    price: i64,
    stock: i32,
) -> anyhow::Result<Uuid> {
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        description: Set(Some(format!("{name} for testing"))),
        price: Set(price),
        original_price: Set(None),
        image: Set("https://example.com/p.png".into()),
        images: Set(serde_json::json!([])),
        stock: Set(stock),
        in_stock: Set(stock > 0),
        rating: Set(0.0),
        reviews: Set(0),
        category_id: Set(category_id),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;
    Ok(product.id)
}
