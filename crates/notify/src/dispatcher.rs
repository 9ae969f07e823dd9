//! Order-placed notification dispatcher.

use async_trait::async_trait;
use store::{EMAIL_NOTIFICATIONS, Order, Store};

use crate::error::Result;
use crate::mailer::{EmailMessage, Mailer};

/// Receives the hydrated order right after its transaction committed.
///
/// Implementations are invoked from a detached task: returning an error
/// gets it logged by the spawner, nothing more. The committed order is
/// never affected.
#[async_trait]
pub trait OrderNotifier: Send + Sync {
    /// Called once per successfully placed order.
    async fn order_placed(&self, order: &Order) -> Result<()>;
}

/// Notifier that does nothing. Used when no mail transport is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

#[async_trait]
impl OrderNotifier for NoopNotifier {
    async fn order_placed(&self, _order: &Order) -> Result<()> {
        Ok(())
    }
}

/// Emails a summary of a newly placed order to all admins and the owner.
///
/// Gated by the `email_notifications` setting: only the value `"true"`
/// enables delivery.
pub struct NotificationDispatcher<S, M> {
    store: S,
    mailer: M,
}

impl<S: Store, M: Mailer> NotificationDispatcher<S, M> {
    /// Creates a dispatcher reading recipients and the flag from `store` and
    /// delivering through `mailer`.
    pub fn new(store: S, mailer: M) -> Self {
        Self { store, mailer }
    }
}

#[async_trait]
impl<S: Store, M: Mailer> OrderNotifier for NotificationDispatcher<S, M> {
    async fn order_placed(&self, order: &Order) -> Result<()> {
        let enabled = self.store.get_setting(EMAIL_NOTIFICATIONS).await?;
        if enabled.as_deref() != Some("true") {
            tracing::debug!(order_id = %order.id, "email notifications disabled, skipping");
            return Ok(());
        }

        let admins = self.store.list_admins().await?;
        let mut recipients: Vec<String> = Vec::new();
        for email in admins
            .iter()
            .map(|admin| admin.email.as_str())
            .chain(std::iter::once(order.user.email.as_str()))
        {
            if !recipients.iter().any(|existing| existing == email) {
                recipients.push(email.to_string());
            }
        }

        let message = EmailMessage {
            to: recipients,
            subject: format!("New consumables order #{}", order.id),
            body: compose_body(order),
        };

        tracing::debug!(
            order_id = %order.id,
            recipients = message.to.len(),
            "sending order notification"
        );
        self.mailer.send(&message).await
    }
}

fn compose_body(order: &Order) -> String {
    let owner = order.user.name.as_deref().unwrap_or(&order.user.email);

    let mut body = format!(
        "A new order was placed by {owner} ({email}).\n\nItems:\n",
        email = order.user.email
    );
    for item in &order.items {
        match &item.product {
            Some(product) => match &product.reference {
                Some(reference) => body.push_str(&format!(
                    "- {} ({}) x {}\n",
                    product.name, reference, item.quantity
                )),
                None => body.push_str(&format!("- {} x {}\n", product.name, item.quantity)),
            },
            None => body.push_str(&format!("- unknown product x {}\n", item.quantity)),
        }
    }

    body.push_str(&format!(
        "\nNotes: {}\n\nThe order can be reviewed on the portal.\n",
        order.notes.as_deref().unwrap_or("none")
    ));
    body
}
