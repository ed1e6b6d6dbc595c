//! Transport boundary for SkyCooker devices.
//!
//! The cooker exposes a Nordic UART style GATT service: commands are written
//! to one characteristic and responses arrive as notifications on another.
//! This crate models that boundary without depending on a BLE stack:
//!
//! - [`Transport`]: connect, subscribe, write, disconnect
//! - [`NotificationSink`] / [`Mailbox`]: the single-slot inbound path
//! - [`MockTransport`]: a scriptable in-memory link for tests and the CLI
//!
//! # Design
//!
//! - **Async-first**: native `async fn` in traits (edition 2024), no
//!   `async_trait` macro.
//! - **Single consumer**: exactly one dispatcher reads the mailbox; the sink
//!   only accepts a frame while a request is armed.
//!
//! # Example
//!
//! ```
//! use skycooker_transport::{MockTransport, Transport, mailbox};
//!
//! #[tokio::main]
//! async fn main() -> skycooker_transport::Result<()> {
//!     let (mut transport, handle) = MockTransport::new("AA:BB:CC:DD:EE:FF");
//!     handle.set_responder(|frame| vec![frame.to_vec()]);
//!
//!     let (sink, mailbox) = mailbox();
//!     transport.connect().await?;
//!     transport.subscribe(sink).await?;
//!
//!     mailbox.arm(7);
//!     transport.write(&[0x55, 7, 0x06, 0xAA]).await?;
//!     assert_eq!(mailbox.take().as_deref(), Some(&[0x55, 7, 0x06, 0xAA][..]));
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod mock;
pub mod notify;
pub mod traits;

pub use error::{Result, TransportError};
pub use mock::{MockTransport, MockTransportHandle};
pub use notify::{Mailbox, NotificationSink, mailbox};
pub use traits::Transport;
