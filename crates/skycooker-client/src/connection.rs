//! Link lifecycle and authentication state machine.
//!
//! ```text
//! Disconnected ──► Connecting ──► ConnectedUnauthenticated ──► Ready
//!      ▲               │                    │                   │
//!      └───────────────┴────────────────────┴───────────────────┘
//!                 (failure, explicit disconnect, link loss)
//!
//! any state ──► Disposed (terminal)
//! ```
//!
//! Link loss is detected lazily: [`Connection::ensure_ready`] compares the
//! recorded state with the transport before the next operation and
//! reconnects when they disagree.

use bytes::Bytes;
use serde::Serialize;
use skycooker_core::{AuthKey, DeviceState, Error, FirmwareVersion, Result};
use skycooker_protocol::{Request, check_ack, check_auth, decode_status, parse_version};
use skycooker_transport::Transport;
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::{Span, debug, info, info_span, warn};

use crate::config::TimingConfig;
use crate::dispatcher::{Dispatcher, SendOptions};

/// Link state of one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    Disconnected,
    Connecting,
    ConnectedUnauthenticated,
    Ready,
    Disposed,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            LinkState::Disconnected => "Disconnected",
            LinkState::Connecting => "Connecting",
            LinkState::ConnectedUnauthenticated => "ConnectedUnauthenticated",
            LinkState::Ready => "Ready",
            LinkState::Disposed => "Disposed",
        };
        f.write_str(name)
    }
}

impl LinkState {
    /// Check if a transition to `target` is allowed from this state.
    ///
    /// # Examples
    ///
    /// ```
    /// use skycooker_client::LinkState;
    ///
    /// assert!(LinkState::Disconnected.can_transition_to(&LinkState::Connecting));
    /// assert!(!LinkState::Disconnected.can_transition_to(&LinkState::Ready));
    /// assert!(!LinkState::Disposed.can_transition_to(&LinkState::Connecting));
    /// ```
    pub fn can_transition_to(&self, target: &LinkState) -> bool {
        matches!(
            (self, target),
            (LinkState::Disconnected, LinkState::Connecting)
                | (
                    LinkState::Connecting,
                    LinkState::ConnectedUnauthenticated | LinkState::Disconnected
                )
                | (
                    LinkState::ConnectedUnauthenticated,
                    LinkState::Ready | LinkState::Disconnected
                )
                | (LinkState::Ready, LinkState::Disconnected)
                | (
                    LinkState::Disconnected
                        | LinkState::Connecting
                        | LinkState::ConnectedUnauthenticated
                        | LinkState::Ready,
                    LinkState::Disposed
                )
        )
    }

    /// Transport link is up, authenticated or not.
    pub fn is_connected(&self) -> bool {
        matches!(self, LinkState::ConnectedUnauthenticated | LinkState::Ready)
    }
}

/// One authenticated session with a cooker.
///
/// Owns the transport and the dispatcher. Not synchronised; the
/// [`Cooker`](crate::Cooker) wraps it in a mutex to keep one command in
/// flight.
#[derive(Debug)]
pub struct Connection<T: Transport> {
    transport: T,
    dispatcher: Dispatcher,
    key: AuthKey,
    state: LinkState,
    firmware: Option<FirmwareVersion>,
    cancel: CancellationToken,
    span: Span,
    last_connect_ok: bool,
    last_auth_ok: bool,
    timing: TimingConfig,
}

impl<T: Transport> Connection<T> {
    /// Wrap `transport`; nothing is sent until the first operation.
    pub fn new(transport: T, key: AuthKey, cancel: CancellationToken, timing: &TimingConfig) -> Self {
        let span = info_span!("skycooker", address = %transport.address());
        Self {
            dispatcher: Dispatcher::new(cancel.clone(), timing),
            transport,
            key,
            state: LinkState::Disconnected,
            firmware: None,
            cancel,
            span,
            last_connect_ok: false,
            last_auth_ok: false,
            timing: timing.clone(),
        }
    }

    fn transition_to(&mut self, target: LinkState) -> Result<()> {
        if !self.state.can_transition_to(&target) {
            return Err(Error::InvalidStateTransition {
                from: self.state.to_string(),
                to: target.to_string(),
            });
        }
        debug!(from = %self.state, to = %target, "Link state change");
        self.state = target;
        Ok(())
    }

    /// Forget the link without touching the transport.
    fn mark_disconnected(&mut self) {
        if self.state != LinkState::Disconnected && self.state != LinkState::Disposed {
            debug!(from = %self.state, to = %LinkState::Disconnected, "Link state change");
            self.state = LinkState::Disconnected;
        }
    }

    async fn open_link(&mut self) -> Result<()> {
        self.transport.connect().await?;
        self.transport.subscribe(self.dispatcher.sink()).await?;
        Ok(())
    }

    /// Open the transport link and subscribe to notifications.
    ///
    /// # Errors
    /// Returns `Error::Disposed` once disposed, `Error::InvalidStateTransition`
    /// unless disconnected, or the transport error when the link cannot be
    /// opened.
    pub async fn connect(&mut self) -> Result<()> {
        if self.state == LinkState::Disposed {
            return Err(Error::Disposed);
        }
        self.transition_to(LinkState::Connecting)?;

        match self.open_link().await {
            Ok(()) => {
                self.last_connect_ok = true;
                self.transition_to(LinkState::ConnectedUnauthenticated)?;
                info!("Connected");
                Ok(())
            }
            Err(error) => {
                self.last_connect_ok = false;
                let _ = self.transport.disconnect().await;
                self.transition_to(LinkState::Disconnected)?;
                warn!(error = %error, "Connect failed");
                Err(error)
            }
        }
    }

    /// Present the pre-shared key.
    ///
    /// On the first successful authentication the firmware version is
    /// fetched once; a failure there is logged and recorded as `0.0`.
    ///
    /// # Errors
    /// Returns `Error::Auth` when the device rejects the key. The device
    /// only accepts unknown keys while in pairing mode. `Error::Disposed`
    /// once disposed.
    pub async fn authenticate(&mut self) -> Result<()> {
        if self.state == LinkState::Disposed {
            return Err(Error::Disposed);
        }
        if !self.state.can_transition_to(&LinkState::Ready) {
            return Err(Error::InvalidStateTransition {
                from: self.state.to_string(),
                to: LinkState::Ready.to_string(),
            });
        }

        let options = self.dispatcher.default_options();
        let outcome = match self.execute(&Request::Auth(self.key), options).await {
            Ok(payload) => check_auth(&payload),
            Err(error) => Err(error),
        };

        match outcome {
            Ok(()) => {
                self.last_auth_ok = true;
                self.transition_to(LinkState::Ready)?;
                info!("Authenticated");
            }
            Err(Error::Auth) => {
                self.last_auth_ok = false;
                warn!("Authentication rejected, enable pairing mode on the device");
                return Err(Error::Auth);
            }
            Err(error) => return Err(error),
        }

        if self.firmware.is_none() {
            let version = match self.fetch_version().await {
                Ok(version) => version,
                Err(error) => {
                    warn!(error = %error, "Firmware version unavailable");
                    FirmwareVersion::placeholder()
                }
            };
            info!(firmware = %version, "Firmware version");
            self.firmware = Some(version);
        }
        Ok(())
    }

    /// Bring the link to `Ready`, reconnecting and authenticating as needed.
    pub async fn ensure_ready(&mut self) -> Result<()> {
        if self.state == LinkState::Disposed || self.cancel.is_cancelled() {
            return Err(Error::Disposed);
        }

        if self.state.is_connected() && !self.transport.is_connected() {
            warn!(state = %self.state, "Link lost");
            self.mark_disconnected();
        }
        if self.state == LinkState::Connecting {
            // an interrupted connect leaves nothing usable behind
            self.mark_disconnected();
        }

        if self.state == LinkState::Disconnected {
            self.connect().await?;
        }
        if self.state == LinkState::ConnectedUnauthenticated {
            self.authenticate().await?;
        }
        Ok(())
    }

    /// Send one request and return the response payload.
    ///
    /// # Errors
    /// Returns `Error::NotConnected` unless the link is up; a link found
    /// dead during the send moves the state to `Disconnected`.
    pub async fn execute(&mut self, request: &Request, options: SendOptions) -> Result<Bytes> {
        if self.state == LinkState::Disposed {
            return Err(Error::Disposed);
        }
        if !self.state.is_connected() {
            return Err(Error::NotConnected);
        }

        let result = self
            .dispatcher
            .send(
                &mut self.transport,
                request.command(),
                &request.payload(),
                options,
            )
            .await;

        if matches!(result, Err(Error::NotConnected)) {
            self.mark_disconnected();
        }
        result
    }

    /// Send a mutating request and check its acknowledgement byte.
    pub async fn control(&mut self, request: &Request) -> Result<()> {
        let options = self.dispatcher.default_options();
        let payload = self.execute(request, options).await?;
        check_ack(request.command(), &payload)
    }

    /// Fetch and decode the device status.
    pub async fn fetch_status(&mut self) -> Result<DeviceState> {
        let options = self.dispatcher.default_options();
        let payload = self.execute(&Request::GetStatus, options).await?;
        decode_status(&payload)
    }

    /// Single-attempt firmware version query.
    pub async fn fetch_version(&mut self) -> Result<FirmwareVersion> {
        let options = self.dispatcher.default_options().with_retries(0);
        let payload = self.execute(&Request::GetVersion, options).await?;
        parse_version(&payload)
    }

    /// Close the link; bounded and best effort.
    pub async fn disconnect(&mut self) {
        if self.state == LinkState::Disposed {
            return;
        }
        match tokio::time::timeout(self.timing.disconnect_timeout(), self.transport.disconnect())
            .await
        {
            Ok(Ok(())) => {}
            Ok(Err(error)) => debug!(error = %error, "Disconnect failed"),
            Err(_) => debug!("Disconnect timed out"),
        }
        if self.state != LinkState::Disconnected {
            self.mark_disconnected();
            info!("Disconnected");
        }
    }

    /// Permanently retire the connection.
    ///
    /// Pending dispatcher waits end with `Error::Disposed`; every later
    /// operation fails the same way.
    pub async fn dispose(&mut self) {
        if self.state == LinkState::Disposed {
            return;
        }
        self.cancel.cancel();
        self.disconnect().await;
        self.state = LinkState::Disposed;
        info!("Disposed");
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == LinkState::Ready
    }

    /// Last connect and last authentication both succeeded.
    pub fn available(&self) -> bool {
        self.last_connect_ok && self.last_auth_ok
    }

    pub fn firmware(&self) -> Option<FirmwareVersion> {
        self.firmware
    }

    pub fn address(&self) -> &str {
        self.transport.address()
    }

    /// Tracing span carrying the device address.
    pub fn span(&self) -> &Span {
        &self.span
    }

    pub fn timing(&self) -> &TimingConfig {
        &self.timing
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use skycooker_core::{CookingMode, OperatingStatus};
    use skycooker_protocol::Frame;
    use skycooker_transport::{MockTransport, MockTransportHandle};

    const STATUS: [u8; 12] = [0, 0, 0, 0x05, 0, 100, 1, 30, 1, 30, 1, 0x05];

    /// Minimal device: answers auth with `auth`, every other command sensibly.
    fn device(auth: u8) -> impl FnMut(&[u8]) -> Vec<Vec<u8>> + Send + 'static {
        move |frame: &[u8]| {
            let payload = match frame[2] {
                0xFF => vec![auth],
                0x01 => vec![4, 2],
                0x06 => STATUS.to_vec(),
                0x03 => vec![0],
                _ => vec![1],
            };
            vec![Frame::encode(frame[1], frame[2], &payload).to_vec()]
        }
    }

    fn connection() -> (Connection<MockTransport>, MockTransportHandle) {
        let (transport, handle) = MockTransport::new("AA:BB:CC:DD:EE:FF");
        let key = AuthKey::new([1, 2, 3, 4, 5, 6, 7, 8]);
        let connection = Connection::new(
            transport,
            key,
            CancellationToken::new(),
            &TimingConfig::default(),
        );
        (connection, handle)
    }

    #[rstest]
    #[case(LinkState::Disconnected, LinkState::Connecting, true)]
    #[case(LinkState::Connecting, LinkState::ConnectedUnauthenticated, true)]
    #[case(LinkState::Connecting, LinkState::Disconnected, true)]
    #[case(LinkState::ConnectedUnauthenticated, LinkState::Ready, true)]
    #[case(LinkState::Ready, LinkState::Disconnected, true)]
    #[case(LinkState::Ready, LinkState::Disposed, true)]
    #[case(LinkState::Disconnected, LinkState::Ready, false)]
    #[case(LinkState::Ready, LinkState::Connecting, false)]
    #[case(LinkState::Disposed, LinkState::Disconnected, false)]
    #[case(LinkState::Disposed, LinkState::Disposed, false)]
    fn test_transition_table(
        #[case] from: LinkState,
        #[case] to: LinkState,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(&to), allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ensure_ready_connects_and_authenticates() {
        let (mut connection, handle) = connection();
        handle.set_responder(device(1));

        connection.ensure_ready().await.unwrap();

        assert_eq!(connection.state(), LinkState::Ready);
        assert!(connection.available());
        assert_eq!(connection.firmware(), Some(FirmwareVersion::new(4, 2)));

        let frames = handle.written_frames();
        assert_eq!(
            &frames[0][..],
            &[0x55, 0x01, 0xFF, 1, 2, 3, 4, 5, 6, 7, 8, 0xAA]
        );
        assert_eq!(frames[1][2], 0x01);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auth_rejected() {
        let (mut connection, handle) = connection();
        handle.set_responder(device(0));

        let result = connection.ensure_ready().await;

        assert!(matches!(result, Err(Error::Auth)));
        assert_eq!(connection.state(), LinkState::ConnectedUnauthenticated);
        assert!(!connection.available());
        // one auth frame, no retry and no version query
        assert_eq!(handle.written_frames().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_failure_returns_to_disconnected() {
        let (mut connection, handle) = connection();
        handle.fail_connects(1);

        let error = connection.ensure_ready().await.unwrap_err();
        assert_eq!(error.kind(), skycooker_core::ErrorKind::Transport);
        assert_eq!(connection.state(), LinkState::Disconnected);
        assert!(!connection.available());
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_version_uses_placeholder() {
        let (mut connection, handle) = connection();
        let mut inner = device(1);
        handle.set_responder(move |frame: &[u8]| {
            if frame[2] == 0x01 { Vec::new() } else { inner(frame) }
        });

        connection.ensure_ready().await.unwrap();
        assert_eq!(connection.state(), LinkState::Ready);
        assert_eq!(connection.firmware(), Some(FirmwareVersion::placeholder()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_version_fetched_once() {
        let (mut connection, handle) = connection();
        handle.set_responder(device(1));

        connection.ensure_ready().await.unwrap();
        connection.disconnect().await;
        connection.ensure_ready().await.unwrap();

        let version_queries = handle
            .written_frames()
            .iter()
            .filter(|frame| frame[2] == 0x01)
            .count();
        assert_eq!(version_queries, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_link_loss_detected_lazily() {
        let (mut connection, handle) = connection();
        handle.set_responder(device(1));
        connection.ensure_ready().await.unwrap();

        handle.lose_link();
        assert_eq!(connection.state(), LinkState::Ready);

        connection.ensure_ready().await.unwrap();
        assert_eq!(connection.state(), LinkState::Ready);
        assert_eq!(handle.connect_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_status() {
        let (mut connection, handle) = connection();
        handle.set_responder(device(1));
        connection.ensure_ready().await.unwrap();

        let state = connection.fetch_status().await.unwrap();
        assert_eq!(state.status, OperatingStatus::Cooking);
        assert_eq!(state.mode, CookingMode::from_wire(0x05));
        assert_eq!(state.temperature, 100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_control_rejected() {
        let (mut connection, handle) = connection();
        handle.set_responder(device(1));
        connection.ensure_ready().await.unwrap();

        assert!(connection.control(&Request::TurnOff).await.is_ok());
        assert!(matches!(
            connection.control(&Request::TurnOn).await,
            Err(Error::CommandRejected { command: 0x03 })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_execute_requires_link() {
        let (mut connection, _handle) = connection();
        let result = connection.fetch_status().await;
        assert!(matches!(result, Err(Error::NotConnected)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_is_terminal() {
        let (mut connection, handle) = connection();
        handle.set_responder(device(1));
        connection.ensure_ready().await.unwrap();

        connection.dispose().await;

        assert_eq!(connection.state(), LinkState::Disposed);
        assert!(!handle.is_connected());
        assert!(matches!(connection.ensure_ready().await, Err(Error::Disposed)));
        assert!(matches!(connection.fetch_status().await, Err(Error::Disposed)));
        assert!(matches!(connection.connect().await, Err(Error::Disposed)));
        assert!(matches!(connection.authenticate().await, Err(Error::Disposed)));
        assert_eq!(connection.state(), LinkState::Disposed);
        assert_eq!(handle.connect_count(), 1);
    }
}
