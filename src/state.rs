use crate::{
    config::AppConfig,
    db::{DbPool, OrmConn},
    email::Mailer,
    images::ImageClient,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: DbPool,
    pub orm: OrmConn,
    pub config: AppConfig,
    /// SMTP transport; absent when SMTP_HOST is not configured.
    pub mailer: Option<Mailer>,
    /// Image CDN client; absent when the CDN credentials are not configured.
    pub images: Option<ImageClient>,
}
