//! Mock transport for testing and development.
//!
//! [`MockTransport`] is an in-memory link whose peer is a responder closure:
//! every written frame is handed to the responder and whatever it returns is
//! delivered as notifications. The paired [`MockTransportHandle`] scripts
//! faults (failed connects, failed writes, dropped responses, link loss) and
//! records the traffic for assertions.

use crate::{
    Result, TransportError,
    notify::NotificationSink,
    traits::Transport,
};
use bytes::Bytes;
use std::sync::{Arc, Mutex, MutexGuard};

type Responder = Box<dyn FnMut(&[u8]) -> Vec<Vec<u8>> + Send>;

#[derive(Default)]
struct MockState {
    connected: bool,
    sink: Option<NotificationSink>,
    responder: Option<Responder>,
    fail_connects: u32,
    fail_writes: u32,
    drop_responses: u32,
    written: Vec<Bytes>,
    connect_count: u32,
    disconnect_count: u32,
}

#[derive(Default)]
struct Shared {
    state: Mutex<MockState>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// In-memory transport for tests and the simulated device.
///
/// # Examples
///
/// ```
/// use skycooker_transport::{MockTransport, Transport};
///
/// #[tokio::main]
/// async fn main() -> skycooker_transport::Result<()> {
///     let (mut transport, handle) = MockTransport::new("AA:BB:CC:DD:EE:FF");
///
///     handle.fail_connects(1);
///     assert!(transport.connect().await.is_err());
///     transport.connect().await?;
///
///     transport.write(&[0x55, 0x01, 0x06, 0xAA]).await?;
///     assert_eq!(handle.written_frames().len(), 1);
///     assert_eq!(handle.connect_count(), 1);
///     Ok(())
/// }
/// ```
pub struct MockTransport {
    address: String,
    shared: Arc<Shared>,
}

impl MockTransport {
    /// Create a disconnected mock transport and its control handle.
    pub fn new(address: impl Into<String>) -> (Self, MockTransportHandle) {
        let shared = Arc::new(Shared::default());
        let transport = Self {
            address: address.into(),
            shared: shared.clone(),
        };
        (transport, MockTransportHandle { shared })
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransport")
            .field("address", &self.address)
            .field("connected", &self.shared.state().connected)
            .finish()
    }
}

impl Transport for MockTransport {
    fn address(&self) -> &str {
        &self.address
    }

    fn is_connected(&self) -> bool {
        self.shared.state().connected
    }

    async fn connect(&mut self) -> Result<()> {
        let mut state = self.shared.state();
        if state.fail_connects > 0 {
            state.fail_connects -= 1;
            return Err(TransportError::connect_failed(
                &self.address,
                "device not reachable",
            ));
        }
        state.connected = true;
        state.connect_count += 1;
        Ok(())
    }

    async fn subscribe(&mut self, sink: NotificationSink) -> Result<()> {
        let mut state = self.shared.state();
        if !state.connected {
            return Err(TransportError::disconnected(&self.address));
        }
        state.sink = Some(sink);
        Ok(())
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        let (mut responder, sink) = {
            let mut state = self.shared.state();
            if !state.connected {
                return Err(TransportError::disconnected(&self.address));
            }
            if state.fail_writes > 0 {
                state.fail_writes -= 1;
                return Err(TransportError::write_failed("characteristic write rejected"));
            }
            state.written.push(Bytes::copy_from_slice(data));
            if state.drop_responses > 0 {
                state.drop_responses -= 1;
                return Ok(());
            }
            (state.responder.take(), state.sink.clone())
        };

        // The responder runs unlocked so it may use the handle.
        let responses = responder
            .as_mut()
            .map(|respond| respond(data))
            .unwrap_or_default();

        if let Some(responder) = responder {
            let mut state = self.shared.state();
            if state.responder.is_none() {
                state.responder = Some(responder);
            }
        }

        if let Some(sink) = sink {
            for response in responses {
                sink.deliver(&response);
            }
        }
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        let mut state = self.shared.state();
        if state.connected {
            state.disconnect_count += 1;
        }
        state.connected = false;
        state.sink = None;
        Ok(())
    }
}

/// Handle for scripting a [`MockTransport`].
///
/// Cloned handles control the same transport.
#[derive(Clone)]
pub struct MockTransportHandle {
    shared: Arc<Shared>,
}

impl MockTransportHandle {
    /// Install the peer that answers written frames.
    pub fn set_responder<F>(&self, responder: F)
    where
        F: FnMut(&[u8]) -> Vec<Vec<u8>> + Send + 'static,
    {
        self.shared.state().responder = Some(Box::new(responder));
    }

    /// Deliver a notification as if the device had sent it unprompted.
    ///
    /// Returns `false` if nothing is subscribed or the sink rejected it.
    pub fn inject(&self, data: &[u8]) -> bool {
        let sink = self.shared.state().sink.clone();
        sink.is_some_and(|sink| sink.deliver(data))
    }

    /// Drop the link as a radio dropout would.
    pub fn lose_link(&self) {
        let mut state = self.shared.state();
        state.connected = false;
        state.sink = None;
    }

    /// Fail the next `count` connect attempts.
    pub fn fail_connects(&self, count: u32) {
        self.shared.state().fail_connects = count;
    }

    /// Fail the next `count` writes.
    pub fn fail_writes(&self, count: u32) {
        self.shared.state().fail_writes = count;
    }

    /// Accept the next `count` writes without answering them.
    pub fn drop_responses(&self, count: u32) {
        self.shared.state().drop_responses = count;
    }

    /// Every frame written so far, oldest first.
    pub fn written_frames(&self) -> Vec<Bytes> {
        self.shared.state().written.clone()
    }

    pub fn clear_written(&self) {
        self.shared.state().written.clear();
    }

    pub fn is_connected(&self) -> bool {
        self.shared.state().connected
    }

    pub fn connect_count(&self) -> u32 {
        self.shared.state().connect_count
    }

    pub fn disconnect_count(&self) -> u32 {
        self.shared.state().disconnect_count
    }
}

impl std::fmt::Debug for MockTransportHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockTransportHandle").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::mailbox;

    const GET_STATUS: [u8; 4] = [0x55, 0x01, 0x06, 0xAA];

    async fn connected() -> (MockTransport, MockTransportHandle, crate::Mailbox) {
        let (mut transport, handle) = MockTransport::new("AA:BB:CC:DD:EE:FF");
        let (sink, mailbox) = mailbox();
        transport.connect().await.unwrap();
        transport.subscribe(sink).await.unwrap();
        (transport, handle, mailbox)
    }

    #[tokio::test]
    async fn test_write_requires_link() {
        let (mut transport, _handle) = MockTransport::new("AA:BB");
        let result = transport.write(&GET_STATUS).await;
        assert!(matches!(result, Err(TransportError::Disconnected { .. })));
    }

    #[tokio::test]
    async fn test_responder_answers_through_sink() {
        let (mut transport, handle, mailbox) = connected().await;
        handle.set_responder(|frame| {
            let mut response = frame[..3].to_vec();
            response.extend_from_slice(&[0x01, 0xAA]);
            vec![response]
        });

        mailbox.arm(0x01);
        transport.write(&GET_STATUS).await.unwrap();

        assert_eq!(
            mailbox.take().as_deref(),
            Some(&[0x55, 0x01, 0x06, 0x01, 0xAA][..])
        );
        assert_eq!(handle.written_frames(), vec![Bytes::from_static(&GET_STATUS)]);
    }

    #[tokio::test]
    async fn test_dropped_responses() {
        let (mut transport, handle, mailbox) = connected().await;
        handle.set_responder(|frame| vec![frame.to_vec()]);
        handle.drop_responses(1);

        mailbox.arm(0x01);
        transport.write(&GET_STATUS).await.unwrap();
        assert!(mailbox.take().is_none());

        transport.write(&GET_STATUS).await.unwrap();
        assert!(mailbox.take().is_some());
    }

    #[tokio::test]
    async fn test_fail_writes() {
        let (mut transport, handle, _mailbox) = connected().await;
        handle.fail_writes(2);
        assert!(transport.write(&GET_STATUS).await.is_err());
        assert!(transport.write(&GET_STATUS).await.is_err());
        assert!(transport.write(&GET_STATUS).await.is_ok());
        assert_eq!(handle.written_frames().len(), 1);
    }

    #[tokio::test]
    async fn test_fail_connects() {
        let (mut transport, handle) = MockTransport::new("AA:BB");
        handle.fail_connects(1);
        assert!(matches!(
            transport.connect().await,
            Err(TransportError::ConnectFailed { .. })
        ));
        assert!(transport.connect().await.is_ok());
        assert_eq!(handle.connect_count(), 1);
    }

    #[tokio::test]
    async fn test_lose_link() {
        let (mut transport, handle, _mailbox) = connected().await;
        handle.lose_link();
        assert!(!transport.is_connected());
        assert!(transport.write(&GET_STATUS).await.is_err());
    }

    #[tokio::test]
    async fn test_inject_reaches_armed_mailbox() {
        let (_transport, handle, mailbox) = connected().await;
        assert!(!handle.inject(&GET_STATUS));
        mailbox.arm(0x01);
        assert!(handle.inject(&GET_STATUS));
    }

    #[tokio::test]
    async fn test_disconnect_counts_once() {
        let (mut transport, handle, _mailbox) = connected().await;
        transport.disconnect().await.unwrap();
        transport.disconnect().await.unwrap();
        assert_eq!(handle.disconnect_count(), 1);
        assert!(!handle.is_connected());
    }
}
