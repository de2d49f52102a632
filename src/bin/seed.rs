//! Seeds an admin account and a small demo catalog. Safe to run repeatedly;
//! existing rows are left alone.

use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, Set};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use storefront_api::{
    config::AppConfig,
    db::{create_orm_conn, create_pool},
    entity::{
        categories::{ActiveModel as CategoryActive, Column as CatCol, Entity as Categories},
        products::{ActiveModel as ProductActive, Entity as Products},
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users, UserRole},
    },
    services::auth_service::hash_password,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    let pool = create_pool(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    let orm = create_orm_conn(&config.database_url).await?;

    seed_user(
        &orm,
        &std::env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@example.com".into()),
        &std::env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "admin123".into()),
        "Store",
        "Admin",
        UserRole::Admin,
    )
    .await?;
    seed_user(
        &orm,
        "customer@example.com",
        "customer123",
        "Demo",
        "Customer",
        UserRole::Customer,
    )
    .await?;

    seed_catalog(&orm).await?;

    tracing::info!("seed complete");
    Ok(())
}

async fn seed_user(
    orm: &sea_orm::DatabaseConnection,
    email: &str,
    password: &str,
    first_name: &str,
    last_name: &str,
    role: UserRole,
) -> anyhow::Result<()> {
    let exists = Users::find()
        .filter(UserCol::Email.eq(email))
        .one(orm)
        .await?;
    if exists.is_some() {
        tracing::info!(email, "user already present, skipping");
        return Ok(());
    }

    UserActive {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        password_hash: Set(hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?),
        first_name: Set(first_name.to_string()),
        last_name: Set(last_name.to_string()),
        role: Set(role),
        is_email_verified: Set(true),
        email_verification_token: Set(None),
        email_verification_expiry: Set(None),
        created_at: NotSet,
    }
    .insert(orm)
    .await?;

    tracing::info!(email, "user created");
    Ok(())
}

async fn seed_catalog(orm: &sea_orm::DatabaseConnection) -> anyhow::Result<()> {
    if Categories::find().count(orm).await? > 0 {
        tracing::info!("catalog already present, skipping");
        return Ok(());
    }

    let demo = [
        ("Electronics", "Gadgets and accessories", true),
        ("Home & Kitchen", "Everything for the house", false),
    ];

    for (name, description, featured) in demo {
        let category = CategoryActive {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(Some(description.to_string())),
            image: Set(format!("https://placehold.co/600x400?text={name}")),
            featured: Set(featured),
            product_count: Set(2),
            created_at: NotSet,
        }
        .insert(orm)
        .await?;

        for n in 1..=2 {
            let product_name = format!("{name} Sample {n}");
            ProductActive {
                id: Set(Uuid::new_v4()),
                name: Set(product_name.clone()),
                description: Set(Some(format!("Demo listing for {product_name}"))),
                price: Set(1999 * n),
                original_price: Set(None),
                image: Set(format!("https://placehold.co/600x400?text={n}")),
                images: Set(serde_json::json!([])),
                stock: Set(25),
                in_stock: Set(true),
                rating: Set(0.0),
                reviews: Set(0),
                category_id: Set(category.id),
                created_at: NotSet,
            }
            .insert(orm)
            .await?;
        }
        tracing::info!(category = name, "category seeded");
    }

    Ok(())
}
