//! Push notifications to client channels.
//!
//! Results of single-photo work and queue status updates are delivered to a
//! named destination channel. The transport (WebSocket fan-out in the
//! server) lives behind [`Notifier`].

mod envelope;
mod traits;

pub use envelope::Envelope;
pub use traits::{Notification, NotificationEvent, Notifier, NotifyError};
