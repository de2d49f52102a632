//! Runs pending SQL migrations and exits. The server also migrates on boot;
//! this exists for deploy pipelines that migrate before rolling instances.

use storefront_api::{config::AppConfig, db::create_pool};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let config = AppConfig::from_env()?;
    let pool = create_pool(&config.database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await?;

    tracing::info!("migrations applied");
    Ok(())
}
