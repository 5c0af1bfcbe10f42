// storefront_app/src/services/mailer.rs

use async_trait::async_trait;
use fulfillment::{AdminOrderNotification, CompletedOrderEmail, CustomizationProcessingEmail, Notifier};
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Renders order emails and hands them to a simulated mail relay.
#[derive(Debug, Clone)]
pub struct MailNotifier {
  sender: String,
  admin_email: String,
  latency: Duration,
}

impl MailNotifier {
  pub fn new(sender: impl Into<String>, admin_email: impl Into<String>) -> Self {
    Self {
      sender: sender.into(),
      admin_email: admin_email.into(),
      latency: Duration::from_millis(20),
    }
  }

  #[instrument(skip(self, html_body), fields(from = %self.sender))]
  async fn send(&self, to: &str, subject: &str, html_body: &str) -> anyhow::Result<String> {
    info!(to, subject, "Simulating sending email");
    tokio::time::sleep(self.latency).await;

    // `.invalid` is reserved and never routable; use it to exercise failures.
    if to.ends_with(".invalid") {
      warn!(to, "Simulated mail relay rejected recipient");
      anyhow::bail!("mail relay rejected recipient {}", to);
    }

    let message_id = format!("mail_{}", uuid::Uuid::new_v4());
    info!(%message_id, body_bytes = html_body.len(), "Email accepted by relay");
    Ok(message_id)
  }
}

pub fn render_completed_order(email: &CompletedOrderEmail) -> (String, String) {
  let subject = format!("Your files for order {} are ready", email.order_number);
  let links: String = email
    .download_links
    .iter()
    .map(|l| format!("<li>{}: <a href=\"{}\">{}</a></li>", l.product_name, l.url, l.file_name))
    .collect();
  let body = format!(
    "<p>Hi {},</p><p>Your downloads are ready:</p><ul>{}</ul><p>Links expire on {}.</p>",
    email.customer_name,
    links,
    email.expires_at.format("%Y-%m-%d")
  );
  (subject, body)
}

pub fn render_customization_processing(email: &CustomizationProcessingEmail) -> (String, String) {
  let subject = format!("We're working on order {}", email.order_number);
  let items: String = email
    .pending_items
    .iter()
    .map(|i| format!("<li>{}</li>", i.product_name))
    .collect();
  let body = format!(
    "<p>Hi {},</p><p>Our designers are preparing these items for you:</p><ul>{}</ul>",
    email.customer_name, items
  );
  (subject, body)
}

#[async_trait]
impl Notifier for MailNotifier {
  async fn send_completed_order_email(&self, customer_email: &str, email: &CompletedOrderEmail) -> anyhow::Result<()> {
    let (subject, body) = render_completed_order(email);
    self.send(customer_email, &subject, &body).await.map(|_| ())
  }

  async fn send_customization_processing_email(
    &self,
    customer_email: &str,
    email: &CustomizationProcessingEmail,
  ) -> anyhow::Result<()> {
    let (subject, body) = render_customization_processing(email);
    self.send(customer_email, &subject, &body).await.map(|_| ())
  }

  async fn send_admin_new_order_notification(&self, n: &AdminOrderNotification) -> anyhow::Result<()> {
    let subject = format!(
      "New order {}{}",
      n.order_number,
      if n.has_customizations { " (custom work)" } else { "" }
    );
    let body = format!(
      "<p>Order {} ({})</p><ul><li>Free: {}</li><li>Customizations: {}</li><li>Auto-completed: {}</li></ul>",
      n.order_number, n.order_id, n.is_free_order, n.has_customizations, n.auto_completed
    );
    self.send(&self.admin_email, &subject, &body).await.map(|_| ())
  }
}
