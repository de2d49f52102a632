use anyhow::Context;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType,
    transport::smtp::authentication::Credentials,
};

/// Async SMTP mailer. Every send is best-effort from the caller's point of
/// view: registration and verification must succeed even when mail delivery
/// fails.
#[derive(Clone)]
pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl Mailer {
    /// Returns `None` when SMTP_HOST is not set.
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("SMTP_HOST").ok()?;
        let port = std::env::var("SMTP_PORT")
            .ok()
            .and_then(|p| p.parse::<u16>().ok())
            .unwrap_or(587);
        let from = std::env::var("SMTP_FROM").unwrap_or_else(|_| "no-reply@localhost".to_string());

        let mut builder = match AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&host) {
            Ok(builder) => builder.port(port),
            Err(err) => {
                tracing::warn!(error = %err, "invalid SMTP configuration, mailer disabled");
                return None;
            }
        };
        if let (Ok(user), Ok(pass)) = (std::env::var("SMTP_USER"), std::env::var("SMTP_PASS")) {
            builder = builder.credentials(Credentials::new(user, pass));
        }

        Some(Self {
            transport: builder.build(),
            from,
        })
    }

    pub async fn send_verification_email(
        &self,
        to: &str,
        first_name: &str,
        verification_link: &str,
    ) -> anyhow::Result<()> {
        let body = format!(
            "Hi {first_name},\n\n\
             Thanks for signing up. Please verify your email address by opening\n\
             the link below within 24 hours:\n\n{verification_link}\n\n\
             If you did not create an account, you can ignore this message.\n"
        );
        self.send(to, "Verify your email address", body).await
    }

    pub async fn send_welcome_email(&self, to: &str, first_name: &str) -> anyhow::Result<()> {
        let body = format!(
            "Hi {first_name},\n\n\
             Your email address has been verified and your account is ready.\n\
             Happy shopping!\n"
        );
        self.send(to, "Welcome aboard", body).await
    }

    async fn send(&self, to: &str, subject: &str, body: String) -> anyhow::Result<()> {
        let message = Message::builder()
            .from(self.from.parse().context("invalid SMTP_FROM address")?)
            .to(to.parse().context("invalid recipient address")?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)?;

        self.transport.send(message).await?;
        Ok(())
    }
}
