use async_trait::async_trait;
use tracing::debug;

/// One-way outbound mail. Constructed and passed into the coordinator
/// explicitly; a real SMTP transport would live behind this same trait.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> anyhow::Result<()>;
}

/// Default mailer: delivery is disabled, messages are dropped after logging.
/// Call sites still build the full message body.
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, to: &str, subject: &str, _html: &str) -> anyhow::Result<()> {
        debug!(%to, %subject, "mail delivery disabled, dropping message");
        Ok(())
    }
}
