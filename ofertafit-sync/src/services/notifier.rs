//! Post-run notification boundary
//!
//! Delivery mechanics live outside this engine; the orchestrator only needs
//! `send(html, recipients) -> ok/fail`. The shipped implementation logs the
//! delivery, which is what development and test deployments run with.

use async_trait::async_trait;
use ofertafit_common::Result;

/// External notification collaborator
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, html: &str, recipients: &[String]) -> Result<()>;
}

/// Notifier that writes the delivery to the log instead of sending it
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, html: &str, recipients: &[String]) -> Result<()> {
        tracing::info!(
            recipients = recipients.len(),
            bytes = html.len(),
            "Run summary notification (log delivery)"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_notifier_always_ok() {
        let notifier = LogNotifier;
        let recipients = vec!["ops@ofertafit.com.br".to_string()];
        assert!(notifier.send("<p>ok</p>", &recipients).await.is_ok());
    }
}
