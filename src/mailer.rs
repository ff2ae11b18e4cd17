use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, instrument};

use crate::config::MailConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

impl EmailMessage {
    /// HTML body, falling back to the plain text wrapped in a paragraph.
    pub fn html_body(&self) -> String {
        self.html
            .clone()
            .unwrap_or_else(|| format!("<p>{}</p>", self.text))
    }
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()>;
}

/// Delivers through a transactional mail HTTP API.
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    from: String,
}

impl HttpMailer {
    pub fn new(cfg: &MailConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .context("build mail http client")?;
        Ok(Self {
            client,
            api_url: cfg.api_url.clone(),
            api_key: cfg.api_key.clone(),
            from: cfg.from.clone(),
        })
    }
}

#[derive(Serialize)]
struct MailApiRequest<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
    html: String,
}

#[async_trait]
impl Mailer for HttpMailer {
    #[instrument(skip(self, message), fields(to = %message.to))]
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
        let body = MailApiRequest {
            from: &self.from,
            to: &message.to,
            subject: &message.subject,
            text: &message.text,
            html: message.html_body(),
        };
        let mut req = self.client.post(&self.api_url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        req.send()
            .await
            .context("mail api request")?
            .error_for_status()
            .context("mail api rejected message")?;
        info!(to = %message.to, "email sent");
        Ok(())
    }
}

/// Writes messages to the log instead of delivering them.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: &EmailMessage) -> anyhow::Result<()> {
        info!(to = %message.to, subject = %message.subject, text = %message.text, "email (log only)");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn html_falls_back_to_text() {
        let msg = EmailMessage {
            to: "a@x.io".into(),
            subject: "Hi".into(),
            text: "hello".into(),
            html: None,
        };
        assert_eq!(msg.html_body(), "<p>hello</p>");

        let msg = EmailMessage {
            html: Some("<b>hello</b>".into()),
            ..msg
        };
        assert_eq!(msg.html_body(), "<b>hello</b>");
    }

    #[tokio::test]
    async fn log_mailer_always_succeeds() {
        let msg = EmailMessage {
            to: "a@x.io".into(),
            subject: "Hi".into(),
            text: "hello".into(),
            html: None,
        };
        assert!(LogMailer.send(&msg).await.is_ok());
    }
}
