//! Single-slot inbound notification path.
//!
//! The transport callback hands every notification to a [`NotificationSink`];
//! the dispatcher consumes it from the paired [`Mailbox`]. The slot holds at
//! most one frame and is overwritten by newer ones.
//!
//! An atomic "awaiting sequence" tag gates the sink:
//!
//! - while idle, every notification is dropped
//! - while armed for sequence `k`, a well-formed frame echoing another
//!   sequence is dropped, so a late response cannot overwrite the expected one
//! - frames without a valid start marker are passed through for the consumer
//!   to reject
//!
//! Arming clears the slot, so a stale notification is never mistaken for the
//! response to a new request.

use bytes::Bytes;
use skycooker_core::constants::START_BYTE;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::Notify;

/// Tag value meaning "no request outstanding"; outside the `u8` range.
const IDLE: u16 = 0x100;

#[derive(Debug)]
struct Shared {
    slot: Mutex<Option<Bytes>>,
    notify: Notify,
    awaiting: AtomicU16,
}

impl Shared {
    fn slot(&self) -> MutexGuard<'_, Option<Bytes>> {
        self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Create a connected sink/mailbox pair.
pub fn mailbox() -> (NotificationSink, Mailbox) {
    let shared = Arc::new(Shared {
        slot: Mutex::new(None),
        notify: Notify::new(),
        awaiting: AtomicU16::new(IDLE),
    });
    (
        NotificationSink {
            shared: shared.clone(),
        },
        Mailbox { shared },
    )
}

/// Producer side, owned by the transport.
#[derive(Debug, Clone)]
pub struct NotificationSink {
    shared: Arc<Shared>,
}

impl NotificationSink {
    /// Offer one inbound notification.
    ///
    /// Returns `true` if the frame was stored for the consumer.
    pub fn deliver(&self, data: &[u8]) -> bool {
        let awaiting = self.shared.awaiting.load(Ordering::Acquire);
        if awaiting == IDLE {
            tracing::trace!(len = data.len(), "Notification dropped, nothing awaited");
            return false;
        }

        if let [START_BYTE, sequence, ..] = data
            && u16::from(*sequence) != awaiting
        {
            tracing::trace!(
                sequence = *sequence,
                awaiting,
                "Notification dropped, sequence mismatch"
            );
            return false;
        }

        *self.shared.slot() = Some(Bytes::copy_from_slice(data));
        self.shared.notify.notify_one();
        true
    }
}

/// Consumer side, owned by the dispatcher.
#[derive(Debug)]
pub struct Mailbox {
    shared: Arc<Shared>,
}

impl Mailbox {
    /// Expect a response echoing `sequence` and discard anything buffered.
    pub fn arm(&self, sequence: u8) {
        self.shared.slot().take();
        self.shared
            .awaiting
            .store(u16::from(sequence), Ordering::Release);
    }

    /// Stop accepting notifications.
    pub fn disarm(&self) {
        self.shared.awaiting.store(IDLE, Ordering::Release);
        self.shared.slot().take();
    }

    /// Sequence currently awaited, if any.
    pub fn awaiting(&self) -> Option<u8> {
        u8::try_from(self.shared.awaiting.load(Ordering::Acquire)).ok()
    }

    /// Take the buffered frame without waiting.
    pub fn take(&self) -> Option<Bytes> {
        self.shared.slot().take()
    }

    /// Wait up to `poll` for a frame.
    ///
    /// Returns `None` when the interval elapses without one; spurious
    /// wake-ups are also reported as `None`.
    pub async fn wait(&self, poll: Duration) -> Option<Bytes> {
        if let Some(frame) = self.take() {
            return Some(frame);
        }
        let _ = tokio::time::timeout(poll, self.shared.notify.notified()).await;
        self.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_mailbox_drops_everything() {
        let (sink, mailbox) = mailbox();
        assert_eq!(mailbox.awaiting(), None);
        assert!(!sink.deliver(&[0x55, 0x01, 0x06, 0xAA]));
        assert!(mailbox.take().is_none());
    }

    #[test]
    fn test_armed_mailbox_accepts_matching_sequence() {
        let (sink, mailbox) = mailbox();
        mailbox.arm(5);
        assert_eq!(mailbox.awaiting(), Some(5));
        assert!(sink.deliver(&[0x55, 0x05, 0x06, 0xAA]));
        assert_eq!(mailbox.take().as_deref(), Some(&[0x55, 0x05, 0x06, 0xAA][..]));
        assert!(mailbox.take().is_none());
    }

    #[test]
    fn test_mismatched_sequence_cannot_overwrite() {
        let (sink, mailbox) = mailbox();
        mailbox.arm(5);
        assert!(sink.deliver(&[0x55, 0x05, 0x06, 0x01, 0xAA]));
        assert!(!sink.deliver(&[0x55, 0x04, 0x06, 0x02, 0xAA]));
        assert_eq!(mailbox.take().as_deref(), Some(&[0x55, 0x05, 0x06, 0x01, 0xAA][..]));
    }

    #[test]
    fn test_malformed_frames_pass_through() {
        let (sink, mailbox) = mailbox();
        mailbox.arm(5);
        assert!(sink.deliver(&[0x00, 0x09, 0x06, 0xAA]));
        assert!(mailbox.take().is_some());
    }

    #[test]
    fn test_arm_clears_stale_frame() {
        let (sink, mailbox) = mailbox();
        mailbox.arm(1);
        sink.deliver(&[0x55, 0x01, 0x06, 0xAA]);
        mailbox.arm(2);
        assert!(mailbox.take().is_none());
    }

    #[test]
    fn test_disarm() {
        let (sink, mailbox) = mailbox();
        mailbox.arm(1);
        mailbox.disarm();
        assert_eq!(mailbox.awaiting(), None);
        assert!(!sink.deliver(&[0x55, 0x01, 0x06, 0xAA]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_times_out() {
        let (_sink, mailbox) = mailbox();
        mailbox.arm(1);
        assert!(mailbox.wait(Duration::from_millis(50)).await.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_wakes_on_delivery() {
        let (sink, mailbox) = mailbox();
        mailbox.arm(3);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            sink.deliver(&[0x55, 0x03, 0x06, 0xAA]);
        });

        let frame = mailbox.wait(Duration::from_secs(1)).await;
        assert!(frame.is_some());
    }
}
