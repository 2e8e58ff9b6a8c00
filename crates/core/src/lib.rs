//! Session lifecycle supervisor for long-lived messaging connections.
//!
//! A [`SessionRegistry`] owns one supervisor task per session id. Each
//! supervisor opens a connection through a [`Transport`], mirrors login
//! challenges and credentials into a [`CredentialStore`] via the
//! [`AuthStateBridge`], and restarts retriable failures with bounded
//! exponential backoff.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use hub::{JsonFileStore, SessionRegistry, SupervisorConfig, WebSocketTransport};
//!
//! let store = Arc::new(JsonFileStore::open("./hub-data")?);
//! let transport = Arc::new(WebSocketTransport::new("ws://127.0.0.1:8765/sessions"));
//! let registry = SessionRegistry::new(transport, store, SupervisorConfig::default());
//!
//! registry.restore().await?;
//! let session = registry.create("sales").await?;
//! println!("{} is {}", session.id, session.state);
//! ```

pub mod bridge;
pub mod config;
pub mod error;
pub mod qr;
pub mod registry;
pub mod session;
pub mod store;
mod supervisor;
pub mod transport;

pub use bridge::{AuthStateBridge, CredentialWrite};
pub use config::{BackoffPolicy, CredentialPolicy, SupervisorConfig};
pub use error::{Error, Result};
pub use hub_protocol as protocol;
pub use qr::{CHALLENGE_CONTENT_TYPE, challenge_image, encode_challenge, render_terminal};
pub use registry::SessionRegistry;
pub use session::{Session, now_ms, validate_id};
pub use store::{CredentialStore, JsonFileStore, MemoryStore, RecordStatus, RecordUpdate, SessionRecord};
pub use transport::{EventStream, Transport, TransportHandle, TransportParts, WebSocketTransport};
