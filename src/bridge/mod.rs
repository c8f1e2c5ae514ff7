//! Ingestion side ("bridge")
//!
//! Reads glove frames from a line-oriented link, validates them and publishes
//! each reading as JSON to every connected WebSocket client.

pub mod broadcaster;
pub mod server;

pub use broadcaster::{DeliveryError, PublishReport, ReadingBroadcaster, ReadingSink, SubscriptionId};
pub use server::{BridgeError, BridgeServer, LineSource, open_source};
