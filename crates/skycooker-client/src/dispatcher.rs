//! Command dispatcher.
//!
//! The dispatcher owns the sequence counter and the inbound mailbox. A call
//! to [`Dispatcher::send`] writes one frame, waits for the notification that
//! echoes its sequence, and retries with a growing backoff when the response
//! is late, lost or answers a different command.
//!
//! # Correlation
//!
//! Every physical write takes a fresh sequence number and re-arms the
//! mailbox, so a stale notification from an earlier attempt is never
//! accepted. The mailbox is polled at 50 ms; once half of the receive window
//! has passed the interval doubles on each wake-up up to 200 ms.
//!
//! # Failure handling
//!
//! | Error                          | Behavior                       |
//! |--------------------------------|--------------------------------|
//! | receive timeout                | retry, backoff x2              |
//! | write failed                   | retry, backoff x1              |
//! | response for another command   | retry, backoff x1              |
//! | bad start/end marker           | fail now, caller decides       |
//! | no link                        | fail now                       |
//! | disposed                       | fail now                       |
//!
//! When the budget runs out the last error is wrapped in
//! `Error::CommandFailed`.

use bytes::Bytes;
use skycooker_core::{Error, Result, constants::*};
use skycooker_protocol::{CommandCode, Frame, HexDump, Request};
use skycooker_transport::{Mailbox, NotificationSink, Transport, mailbox};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::config::TimingConfig;

/// Per-call overrides.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendOptions {
    /// Receive timeout; `None` uses the configured or per-command default.
    pub timeout: Option<Duration>,
    /// Extra attempts after the first.
    pub max_retries: u32,
}

impl Default for SendOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            max_retries: DEFAULT_COMMAND_RETRIES,
        }
    }
}

impl SendOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

/// Linear backoff between dispatcher attempts.
///
/// The delay after attempt `n` is `base * multiplier * n`, where the
/// multiplier depends on whether the attempt timed out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub timeout_multiplier: u32,
    pub error_multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(RETRY_BASE_DELAY_MS),
            timeout_multiplier: TIMEOUT_BACKOFF_MULTIPLIER,
            error_multiplier: ERROR_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt` (1-based).
    pub fn delay(&self, attempt: u32, error: &Error) -> Duration {
        let multiplier = match error {
            Error::Timeout { .. } => self.timeout_multiplier,
            _ => self.error_multiplier,
        };
        self.base_delay
            .saturating_mul(multiplier)
            .saturating_mul(attempt)
    }
}

/// Sends commands and correlates their responses.
#[derive(Debug)]
pub struct Dispatcher {
    sequence: u8,
    sink: NotificationSink,
    mailbox: Mailbox,
    cancel: CancellationToken,
    policy: RetryPolicy,
    default_retries: u32,
    timeout_override: Option<Duration>,
    poll_interval: Duration,
    max_poll_interval: Duration,
}

impl Dispatcher {
    /// Create a dispatcher whose waits end when `cancel` fires.
    pub fn new(cancel: CancellationToken, timing: &TimingConfig) -> Self {
        let (sink, mailbox) = mailbox();
        Self {
            sequence: 0,
            sink,
            mailbox,
            cancel,
            policy: RetryPolicy {
                base_delay: timing.retry_base_delay(),
                ..RetryPolicy::default()
            },
            default_retries: timing.command_retries,
            timeout_override: timing.command_timeout(),
            poll_interval: timing.poll_interval(),
            max_poll_interval: timing.max_poll_interval(),
        }
    }

    /// Sink to hand to the transport on subscribe.
    pub fn sink(&self) -> NotificationSink {
        self.sink.clone()
    }

    /// Sequence number of the most recent write.
    pub fn sequence(&self) -> u8 {
        self.sequence
    }

    /// Options carrying the configured retry budget.
    pub fn default_options(&self) -> SendOptions {
        SendOptions {
            timeout: None,
            max_retries: self.default_retries,
        }
    }

    /// Receive timeout for `command` when the caller gives none.
    pub fn timeout_for(&self, command: CommandCode) -> Duration {
        self.timeout_override
            .unwrap_or_else(|| command.default_timeout())
    }

    /// Send a typed request with the configured retry budget.
    pub async fn request<T: Transport>(
        &mut self,
        transport: &mut T,
        request: &Request,
    ) -> Result<Bytes> {
        let options = self.default_options();
        self.send(transport, request.command(), &request.payload(), options)
            .await
    }

    /// Send `command` and return the payload of its correlated response.
    ///
    /// # Errors
    /// - `Error::Disposed` if the dispatcher was cancelled
    /// - `Error::NotConnected` if the transport has no link
    /// - `Error::InvalidMagic` if a response has bad markers
    /// - `Error::CommandFailed` when every attempt failed
    pub async fn send<T: Transport>(
        &mut self,
        transport: &mut T,
        command: CommandCode,
        payload: &[u8],
        options: SendOptions,
    ) -> Result<Bytes> {
        let timeout = options.timeout.unwrap_or_else(|| self.timeout_for(command));
        let attempts = options.max_retries.saturating_add(1);
        let mut previous_delay = Duration::ZERO;
        let mut attempt = 0;

        loop {
            attempt += 1;
            if self.cancel.is_cancelled() {
                return Err(Error::Disposed);
            }

            let error = match self.attempt(transport, command, payload, timeout).await {
                Ok(response) => return Ok(response),
                Err(error) if !Self::retries_locally(&error) => return Err(error),
                Err(error) => error,
            };

            if attempt >= attempts {
                warn!(
                    command = %command,
                    attempts,
                    error = %error,
                    "Command failed, retry budget exhausted"
                );
                return Err(Error::CommandFailed {
                    command: command.as_u8(),
                    attempts,
                    source: Box::new(error),
                });
            }

            let delay = self.policy.delay(attempt, &error).max(previous_delay);
            previous_delay = delay;
            debug!(
                command = %command,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Retrying command"
            );

            tokio::select! {
                _ = self.cancel.cancelled() => return Err(Error::Disposed),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    fn retries_locally(error: &Error) -> bool {
        matches!(
            error,
            Error::Timeout { .. }
                | Error::Transport(_)
                | Error::UnexpectedCommand { .. }
                | Error::FrameTooShort { .. }
        )
    }

    /// One physical write and its receive window.
    async fn attempt<T: Transport>(
        &mut self,
        transport: &mut T,
        command: CommandCode,
        payload: &[u8],
        timeout: Duration,
    ) -> Result<Bytes> {
        if !transport.is_connected() {
            return Err(Error::NotConnected);
        }

        self.sequence = self.sequence.wrapping_add(1);
        let sequence = self.sequence;
        let wire = Frame::encode(sequence, command.as_u8(), payload);

        self.mailbox.arm(sequence);
        trace!(sequence, command = %command, frame = %HexDump(&wire), "Writing frame");

        if let Err(error) = transport.write(&wire).await {
            self.mailbox.disarm();
            return Err(error.into());
        }

        let result = self.await_response(sequence, command, timeout).await;
        self.mailbox.disarm();
        result
    }

    async fn await_response(
        &self,
        sequence: u8,
        command: CommandCode,
        timeout: Duration,
    ) -> Result<Bytes> {
        let started = Instant::now();
        let deadline = started + timeout;
        let mut poll = self.poll_interval;

        loop {
            let now = Instant::now();
            if now >= deadline {
                return Err(Error::timeout(timeout.as_millis() as u64));
            }

            let received = tokio::select! {
                _ = self.cancel.cancelled() => return Err(Error::Disposed),
                received = self.mailbox.wait(poll.min(deadline - now)) => received,
            };

            if let Some(raw) = received {
                trace!(frame = %HexDump(&raw), "Received frame");
                let frame = Frame::decode(&raw)?;

                if frame.sequence() != sequence {
                    debug!(
                        expected = sequence,
                        actual = frame.sequence(),
                        "Discarding frame with mismatched sequence"
                    );
                    continue;
                }

                if frame.command() != command.as_u8() {
                    return Err(Error::UnexpectedCommand {
                        expected: command.as_u8(),
                        actual: frame.command(),
                    });
                }

                return Ok(frame.into_payload());
            }

            poll = next_poll(started.elapsed(), timeout, poll, self.max_poll_interval);
        }
    }
}

/// Poll interval for the next mailbox check: doubled, up to `max`, once
/// half of the receive window has passed.
fn next_poll(elapsed: Duration, timeout: Duration, poll: Duration, max: Duration) -> Duration {
    if elapsed > timeout / 2 {
        poll.saturating_mul(2).min(max)
    } else {
        poll
    }
}
