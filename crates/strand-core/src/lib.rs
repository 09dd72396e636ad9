pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod models;
pub mod nostr;
pub mod stats;
pub mod store;
pub mod tracing_setup;

#[cfg(test)]
mod testing;

// Re-export the engine surface at crate root for convenience
pub use config::CoreConfig;
pub use engine::{ContactListChange, FeedEngine, ThreadLookup, ThreadView};
pub use error::{CoreError, GatewayError, KeyError, PublishError};
pub use nostr::{KeySigner, RecordFilter, RelayGateway, SourceGateway};
