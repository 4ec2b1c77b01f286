//! # indi-client
//!
//! Synchronous, event-driven client for the INDI device protocol: a
//! server exposes typed named properties grouped into vectors, and this
//! crate reads, writes, and watches them.
//!
//! ```rust,no_run
//! use indi_client::{ClientConfig, IndiClient};
//!
//! let mut client = IndiClient::connect(ClientConfig::new("localhost", 7624))?;
//!
//! // Blocking read: waits until the device has announced the vector.
//! if let Some(ra) = client.get_float("Telescope Simulator", "EQUATORIAL_COORD", "RA") {
//!     println!("RA = {ra}");
//! }
//!
//! // Write and wait for the device to settle.
//! client.set_and_send_float("Telescope Simulator", "EQUATORIAL_COORD", "RA", 2.0)?;
//! client.wait_until_ok(
//!     "Telescope Simulator",
//!     "EQUATORIAL_COORD",
//!     std::time::Duration::from_secs(60),
//! )?;
//!
//! // Observe updates: handlers run inside process_events, on this thread.
//! client.add_element_callback("Telescope Simulator", "EQUATORIAL_COORD", "RA", |_, ra| {
//!     println!("RA is now {}", ra.text());
//! });
//! client.process_events()?;
//! # Ok::<(), indi_client::ClientError>(())
//! ```
//!
//! ## Threading model
//!
//! Exactly two threads of control: a background receive worker owning the
//! socket, and the caller's thread. The worker only parses and enqueues;
//! every user callback (subscriptions, define handlers, the message
//! handler) runs synchronously inside
//! [`process_events`](IndiClient::process_events) on the caller's thread.
//! Blocking accessors suspend on channel waits with deadlines and report
//! slow or absent devices through the replaceable timeout handler instead
//! of failing.

pub use client::IndiClient;
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult};
pub use handlers::{ElementHandler, FeedbackGuard, VectorHandler, WaitPolicy};

// Re-export the protocol surface callers interact with.
pub use indi_protocol::{
    DeviceMessage, ElementPayload, LightState, Permission, PropertyElement, PropertyKind,
    PropertyVector, SwitchRule, VectorKind,
};

mod client;
mod config;
mod connection;
mod error;
mod handlers;
mod registry;
