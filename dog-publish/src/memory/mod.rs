//! In-memory collaborators for tests, demos and local development.
//!
//! All of them share one [`MemoryPostStore`], so uploads completed through
//! [`MemoryMediaGateway`] are visible to the coordinator and to
//! [`MemoryPublishGateway`] without any copying.

mod media;
mod publisher;
mod sinks;
mod store;

pub use media::{MemoryMediaGateway, DEFAULT_MAX_AUTOMATED_RETRIES};
pub use publisher::MemoryPublishGateway;
pub use sinks::{MemoryNoticeSink, MemorySearchIndex};
pub use store::MemoryPostStore;
