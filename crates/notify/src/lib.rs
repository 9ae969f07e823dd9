//! Best-effort email notification for placed orders.
//!
//! The dispatcher composes a summary of a newly placed order (one line per
//! item, plus the notes) addressed to all admins and the ordering user, and
//! hands it to a [`Mailer`]. Delivery runs outside the placement request;
//! failures are logged by the spawner and never affect the committed order.

pub mod dispatcher;
pub mod error;
pub mod mailer;

pub use dispatcher::{NoopNotifier, NotificationDispatcher, OrderNotifier};
pub use error::{NotifyError, Result};
pub use mailer::{EmailMessage, InMemoryMailer, Mailer, SmtpConfig, SmtpMailer};
