//! Core domain for PR Relay.
//!
//! This crate contains every domain concept the relay works with: the raw and
//! canonical pull-request shapes, the normaliser that maps one onto the other,
//! the in-memory store, the broadcast hub, and the port traits the
//! infrastructure crates implement.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate performs no network I/O.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`PullRequestId`, `SubscriberId`, etc.) |
//! | [`types`] | Raw input shapes, enrichment reply, canonical record |
//! | [`normalizer`] | Raw + reply → canonical record |
//! | [`store`] | Process-lifetime record store |
//! | [`hub`] | Subscriber registry and fan-out |
//! | [`ports`] | Outbound traits (`PullRequestSource`, `EnrichmentProvider`) |
//! | [`errors`] | Port and startup error types |

pub mod errors;
pub mod hub;
pub mod identifiers;
pub mod normalizer;
pub mod ports;
pub mod store;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use errors::{EnrichmentError, RelayError, SourceError};
pub use hub::{BroadcastHub, Subscription};
pub use identifiers::{DeliveryId, PullRequestId, RepositoryId, SubscriberId};
pub use normalizer::{normalize, strip_code_fence};
pub use ports::{EnrichmentProvider, PullRequestSource};
pub use store::{PrStore, StoreSnapshot};
pub use types::{
    EnrichmentFields, EnrichmentReply, PullRequestFields, PullRequestRecord, RawPullRequest,
    WebhookDelivery, PROCESSED_AT_SERVER, STATUS_ENHANCED, WEBHOOK_WRAPPER_KEY,
};
