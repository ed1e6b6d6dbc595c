//! Transport trait definition.
//!
//! A transport is the byte pipe between the driver and one cooker. Real
//! backends map it onto the BLE GATT service (`UUID_SERVICE`), writing to the
//! tx characteristic and forwarding rx notifications to the subscribed sink.
//!
//! Methods use native `async fn` (edition 2024). The trait is therefore not
//! object safe; connections are generic over `T: Transport`.

#![allow(async_fn_in_trait)]

use crate::error::Result;
use crate::notify::NotificationSink;

/// Byte-stream link to a single cooker.
///
/// # Examples
///
/// ```no_run
/// use skycooker_transport::{Transport, Result, mailbox};
///
/// async fn open<T: Transport>(transport: &mut T) -> Result<skycooker_transport::Mailbox> {
///     let (sink, mailbox) = mailbox();
///     transport.connect().await?;
///     transport.subscribe(sink).await?;
///     Ok(mailbox)
/// }
/// ```
pub trait Transport: Send + Sync {
    /// Device address, e.g. a BLE MAC.
    fn address(&self) -> &str;

    /// Whether the link is currently up.
    ///
    /// Link loss is reported here; callers check it lazily before each
    /// operation.
    fn is_connected(&self) -> bool;

    /// Open the link.
    ///
    /// # Errors
    /// `TransportError::ConnectFailed` if the device cannot be reached.
    async fn connect(&mut self) -> Result<()>;

    /// Route inbound notifications to `sink` until the link closes.
    async fn subscribe(&mut self, sink: NotificationSink) -> Result<()>;

    /// Write one complete frame to the command characteristic.
    ///
    /// # Errors
    /// - `TransportError::Disconnected` if there is no link
    /// - `TransportError::WriteFailed` if the write was not accepted
    async fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Close the link. Closing an already closed link is not an error.
    async fn disconnect(&mut self) -> Result<()>;
}
