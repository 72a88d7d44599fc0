// storefront/src/services/notifications.rs

//! Order confirmation emails for the customer and the operations inbox.

use tracing::{info, instrument, warn};

use super::mailer::{Mailer, OutgoingEmail};
use super::pricing::format_major;
use crate::config::AppConfig;
use crate::errors::{AppError, Result as AppResult};
use crate::models::{OrderDetails, User};

const CUSTOMER_SUBJECT: &str = "Your order {{order_number}} is confirmed";
const CUSTOMER_TEMPLATE: &str = r#"<h1>Thank you, {{customer_name}}!</h1>
<p>We received your payment for order <strong>{{order_number}}</strong>.</p>
<table>{{items}}</table>
<p>Subtotal: {{subtotal}}<br>Tax: {{tax}}<br>Shipping: {{shipping}}<br>Discount: -{{discount}}<br><strong>Total: {{total}}</strong></p>
<p>Shipping to:<br>{{shipping_address}}</p>
<p><a href="{{order_link}}">View your order</a></p>"#;

const OPS_SUBJECT: &str = "New paid order {{order_number}}";
const OPS_TEMPLATE: &str = r#"<h1>New paid order {{order_number}}</h1>
<p>Customer: {{customer_name}} &lt;{{customer_email}}&gt;</p>
<table>{{items}}</table>
<p><strong>Total: {{total}}</strong></p>
<p>Ship to:<br>{{shipping_address}}</p>
<p><a href="{{order_link}}">{{order_link}}</a></p>"#;

/// Replaces every `{{key}}` in `template`. Unknown placeholders are left in place.
pub fn render(template: &str, values: &[(&str, String)]) -> String {
  values.iter().fold(template.to_string(), |acc, (key, value)| {
    acc.replace(&format!("{{{{{}}}}}", key), value)
  })
}

fn escape_html(raw: &str) -> String {
  raw
    .replace('&', "&amp;")
    .replace('<', "&lt;")
    .replace('>', "&gt;")
    .replace('"', "&quot;")
}

fn render_items(details: &OrderDetails) -> String {
  details
    .items
    .iter()
    .map(|item| {
      let variant: Vec<&str> = [item.size.as_deref(), item.color.as_deref()].into_iter().flatten().collect();
      let variant = if variant.is_empty() {
        String::new()
      } else {
        format!(" ({})", escape_html(&variant.join(", ")))
      };
      format!(
        "<tr><td>{}{}</td><td>x{}</td><td>{}</td></tr>",
        escape_html(&item.product_name),
        variant,
        item.quantity,
        format_major(item.line_total_cents())
      )
    })
    .collect()
}

fn template_values(details: &OrderDetails, user: &User, config: &AppConfig) -> Vec<(&'static str, String)> {
  let order = &details.order;
  let shipping_address = details
    .shipping_address
    .as_ref()
    .map(|a| escape_html(&a.to_postal_lines()).replace('\n', "<br>"))
    .unwrap_or_else(|| "Not provided".to_string());
  vec![
    ("order_number", escape_html(&order.order_number)),
    ("customer_name", escape_html(user.display_name())),
    ("customer_email", escape_html(&user.email)),
    ("items", render_items(details)),
    ("subtotal", format_major(order.subtotal_cents)),
    ("tax", format_major(order.tax_cents)),
    ("shipping", format_major(order.shipping_cents)),
    ("discount", format_major(order.discount_cents)),
    ("total", format_major(order.total_cents)),
    ("shipping_address", shipping_address),
    ("order_link", config.order_link(order.id)),
  ]
}

pub fn customer_confirmation(details: &OrderDetails, user: &User, config: &AppConfig) -> OutgoingEmail {
  let values = template_values(details, user, config);
  OutgoingEmail {
    to: user.email.clone(),
    from: config.email_sender.clone(),
    subject: render(CUSTOMER_SUBJECT, &values),
    html_body: render(CUSTOMER_TEMPLATE, &values),
  }
}

pub fn ops_notice(details: &OrderDetails, user: &User, config: &AppConfig) -> OutgoingEmail {
  let values = template_values(details, user, config);
  OutgoingEmail {
    to: config.ops_inbox_email.clone(),
    from: config.email_sender.clone(),
    subject: render(OPS_SUBJECT, &values),
    html_body: render(OPS_TEMPLATE, &values),
  }
}

/// Sends both emails. Each send is attempted even if the other fails.
#[instrument(name = "notifications::order_confirmation", skip_all, fields(order_number = %details.order.order_number))]
pub async fn dispatch_order_confirmation(
  mailer: &dyn Mailer,
  config: &AppConfig,
  details: &OrderDetails,
  user: &User,
) -> AppResult<()> {
  let mut failures = Vec::new();
  for email in [customer_confirmation(details, user, config), ops_notice(details, user, config)] {
    let to = email.to.clone();
    match mailer.send(email).await {
      Ok(sent) => info!(to = %sent.to, message_id = %sent.message_id, "Order confirmation sent."),
      Err(e) => {
        warn!(%to, error = %e, "Order confirmation email failed.");
        failures.push(format!("{}: {}", to, e));
      }
    }
  }
  if failures.is_empty() {
    Ok(())
  } else {
    Err(AppError::Email(failures.join("; ")))
  }
}
