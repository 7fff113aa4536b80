use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};

use super::Order;
use crate::config::SmtpConfig;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationMessage {
    pub subject: String,
    pub body: String,
    pub reply_to: Option<String>,
}

/// Announces a newly recorded order. Callers treat delivery as best-effort.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    async fn notify(&self, order: &Order, folder_path: &str) -> Result<()>;
}

pub fn compose_notification(order: &Order, folder_link: &str) -> NotificationMessage {
    let not_provided = "not provided";
    let body = format!(
        "A new order was submitted.\n\n\
         Order: {order_id}\n\
         Date: {date}\n\
         Name: {name}\n\
         Email: {email}\n\
         Phone: {phone}\n\n\
         Description:\n{description}\n\n\
         Files: {folder_link}\n",
        order_id = order.order_id,
        date = order.submitted_at.format("%Y-%m-%d"),
        name = order.name,
        email = order.email,
        phone = order.phone.as_deref().unwrap_or(not_provided),
        description = order.description.as_deref().unwrap_or(not_provided),
    );

    NotificationMessage {
        subject: format!("New order {} from {}", order.order_id, order.name),
        body,
        reply_to: Some(order.email.clone()),
    }
}

pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    to: Mailbox,
    folder_base_url: Option<String>,
}

impl std::fmt::Debug for SmtpNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmtpNotifier")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("transport", &"<AsyncSmtpTransport>")
            .finish()
    }
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig, folder_base_url: Option<String>) -> Result<Self> {
        let from = config
            .from
            .parse::<Mailbox>()
            .with_context(|| format!("invalid NOTIFY_FROM address {}", config.from))?;
        let to = config
            .to
            .parse::<Mailbox>()
            .with_context(|| format!("invalid NOTIFY_TO address {}", config.to))?;

        let builder = if config.tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .context("failed to configure SMTP STARTTLS relay")?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };
        let builder = builder.port(config.port);
        let builder = match (&config.username, &config.password) {
            (Some(user), Some(pass)) => {
                builder.credentials(Credentials::new(user.clone(), pass.clone()))
            }
            _ => builder,
        };

        Ok(Self {
            transport: builder.build(),
            from,
            to,
            folder_base_url,
        })
    }

    fn folder_link(&self, folder_path: &str) -> String {
        match &self.folder_base_url {
            Some(base) => format!("{}{}", base.trim_end_matches('/'), folder_path),
            None => folder_path.to_string(),
        }
    }

    fn build_message(&self, message: &NotificationMessage) -> Result<Message> {
        let mut builder = Message::builder()
            .from(self.from.clone())
            .to(self.to.clone())
            .subject(&message.subject);

        // A customer address that lettre cannot parse only costs us the reply-to header.
        if let Some(reply_to) = message
            .reply_to
            .as_deref()
            .and_then(|addr| addr.parse::<Mailbox>().ok())
        {
            builder = builder.reply_to(reply_to);
        }

        builder
            .body(message.body.clone())
            .context("failed to build notification email")
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, order: &Order, folder_path: &str) -> Result<()> {
        let message = compose_notification(order, &self.folder_link(folder_path));
        debug!(order_id = %order.order_id, subject = %message.subject, "sending order notification");
        let email = self.build_message(&message)?;

        self.transport
            .send(email)
            .await
            .context("SMTP delivery failed")?;

        info!(order_id = %order.order_id, to = %self.to, "order notification sent");
        Ok(())
    }
}
