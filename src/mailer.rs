use std::sync::{Arc, Mutex};

/// Delivers password reset links. Real delivery lives outside this service.
pub trait Mailer: Send + Sync {
    fn send_reset_link(&self, email: &str, link: &str) -> anyhow::Result<()>;
}

/// Writes the link to the log instead of sending mail.
#[derive(Debug, Default)]
pub struct LogMailer;

impl Mailer for LogMailer {
    fn send_reset_link(&self, email: &str, link: &str) -> anyhow::Result<()> {
        tracing::info!(%email, %link, "password reset link issued");
        Ok(())
    }
}

/// Keeps sent links in memory.
#[derive(Debug, Default, Clone)]
pub struct MemoryMailer {
    sent: Arc<Mutex<Vec<(String, String)>>>,
}

impl MemoryMailer {
    pub fn new() -> Self {
        Self::default()
    }

    /// `(email, link)` pairs in send order.
    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

impl Mailer for MemoryMailer {
    fn send_reset_link(&self, email: &str, link: &str) -> anyhow::Result<()> {
        self.sent
            .lock()
            .map_err(|_| anyhow::anyhow!("mailbox lock poisoned"))?
            .push((email.to_string(), link.to_string()));
        Ok(())
    }
}
