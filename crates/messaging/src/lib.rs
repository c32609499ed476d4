//! Tradepost Messaging Crate
//!
//! The in-memory half of the conversation relay: presence registry, relay
//! hub, the persist-then-notify send path, and the client-side reconciler.
//! Durable state lives in `tradepost-database`.

pub mod events;
pub mod presence;
pub mod reconciler;
pub mod relay;
pub mod service;

pub use events::DeliveryEvent;
pub use presence::{ConnectionHandle, PresenceRegistry};
pub use reconciler::ConversationView;
pub use relay::RelayHub;
pub use service::{ConversationSummary, MessagingService};

// The service surface returns database-layer results; re-export them so
// callers need not depend on the database crate just for error matching.
pub use tradepost_database::{MessagingError, MessagingResult};
