//! Wire types for session-hub.
//!
//! This crate contains the serde-serializable types shared by the session
//! supervisor, its HTTP binding, and the protocol bridge it connects to.
//! These types represent the shapes of data as they appear on the wire.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization and small predicates
//! * Transport-agnostic: Credentials and message payloads stay opaque blobs
//! * Stable: Changes only when the bridge or API wire format changes
//!
//! Lifecycle behavior is built on top of these types in `hub-core`.

pub mod bridge;
pub mod credential;
pub mod events;
pub mod payload;
pub mod session;
pub mod transport;

pub use bridge::*;
pub use credential::*;
pub use events::*;
pub use payload::*;
pub use session::*;
pub use transport::*;
