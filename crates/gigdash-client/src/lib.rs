//! # gigdash-client
//!
//! Consumes the gigdash SSE stream and keeps a shared notification store up
//! to date across disconnects.
//!
//! ```no_run
//! use std::sync::Arc;
//! use gigdash_client::{EventReceiver, ReceiverConfig};
//!
//! # async fn example() -> gigdash_core::Result<()> {
//! let receiver = Arc::new(EventReceiver::new(ReceiverConfig::from_env()?)?);
//! let mut updates = receiver.subscribe();
//! while updates.changed().await.is_ok() {
//!     let state = updates.borrow_and_update().clone();
//!     println!("{} ({} unread)", state.status, state.unread_count);
//! }
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod config;
pub mod connector;
pub mod received;
pub mod receiver;
pub mod sse;
pub mod store;

pub use backoff::BackoffPolicy;
pub use config::{EventCallback, ReceiverConfig};
pub use connector::{ByteStream, Connector, HttpConnector};
pub use received::ReceivedEvent;
pub use receiver::EventReceiver;
pub use sse::{SseDecoder, SseFrame};
pub use store::{ConnectionStatus, NotificationStore, StoreState};
