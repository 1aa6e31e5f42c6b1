//! Scoped real-time chat relay library
//!
//! Routes text messages among WebSocket clients organized into a
//! server → channel → group hierarchy, with direct and group-broadcast
//! delivery and acknowledgement envelopes.
//!
//! # Architecture
//! Actor-per-entity over `mpsc` channels:
//! - The `ServerActor` owns the channel registry
//! - Each `ChannelActor` owns its user and group registries
//! - Each `GroupActor` owns one broadcast membership set and fans out
//!   from inside its own loop
//! - Each connection runs a `Session` fed by a read pump, plus a write
//!   pump draining the bounded outbound queue
//!
//! No locks: every registry is mutated only by the task that owns it, and
//! lookups are request/reply messages through the owning mailbox. The only
//! cross-task resource is the per-user outbound queue, a many-producer/
//! one-consumer channel shut down exactly once at disconnect.
//!
//! # Example
//! ```ignore
//! use tokio::net::TcpListener;
//! use chat_relay::{activity, handle_connection, ServerActor};
//!
//! #[tokio::main]
//! async fn main() {
//!     let listener = TcpListener::bind("127.0.0.1:8080").await.unwrap();
//!     let server = ServerActor::spawn();
//!
//!     while let Ok((stream, addr)) = listener.accept().await {
//!         let (activity_tx, activity_rx) = activity::activity_stream();
//!         tokio::spawn(activity::log_activity(addr.to_string(), activity_rx));
//!         tokio::spawn(handle_connection(stream, server.clone(), activity_tx));
//!     }
//! }
//! ```

pub mod activity;
pub mod channel;
pub mod envelope;
pub mod error;
pub mod group;
pub mod handler;
pub mod outbound;
pub mod server;
pub mod types;
pub mod user;

// Re-export main types for convenience
pub use activity::{ActivityKind, UserActivity};
pub use channel::{ChannelActor, ChannelHandle, GroupRef};
pub use envelope::{Command, Envelope, ResponseCode, ResponseInfo};
pub use error::AppError;
pub use group::{GroupActor, GroupHandle};
pub use handler::handle_connection;
pub use outbound::{outbound_queue, Outbound, OutboundSender};
pub use server::{ServerActor, ServerHandle};
pub use types::{ChannelId, GroupId, UserId};
pub use user::{Session, UserRef};
