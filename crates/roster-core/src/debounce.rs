//! Trailing debounce for rapidly changing input.
//!
//! Each [`Debouncer::schedule`] call cancels the pending timer and starts a
//! new one; only a value left alone for the full delay is ever delivered.
//! Timers run as detached Tokio tasks and report back over a channel, so the
//! owner decides when to apply the settled value.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Identifies one scheduled timer.
pub type Ticket = u64;

#[derive(Debug)]
struct Settled<V> {
    ticket: Ticket,
    value: V,
}

#[derive(Debug)]
struct PendingTimer {
    ticket: Ticket,
    cancel: CancellationToken,
}

/// Trailing debouncer delivering values of type `V`.
#[derive(Debug)]
pub struct Debouncer<V> {
    delay: Duration,
    next_ticket: Ticket,
    pending: Option<PendingTimer>,
    parent: CancellationToken,
    tx: mpsc::UnboundedSender<Settled<V>>,
    rx: mpsc::UnboundedReceiver<Settled<V>>,
}

impl<V: Send + 'static> Debouncer<V> {
    /// Creates a debouncer whose timers are children of `parent`.
    ///
    /// Cancelling `parent` stops every timer this debouncer starts.
    #[must_use]
    pub fn new(delay: Duration, parent: CancellationToken) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            delay,
            next_ticket: 0,
            pending: None,
            parent,
            tx,
            rx,
        }
    }

    /// Schedules `value` for delivery after the delay, replacing any pending value.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn schedule(&mut self, value: V) -> Ticket {
        self.cancel();

        self.next_ticket += 1;
        let ticket = self.next_ticket;
        let cancel = self.parent.child_token();
        let token = cancel.clone();
        let tx = self.tx.clone();
        let delay = self.delay;

        tokio::spawn(async move {
            tokio::select! {
                () = token.cancelled() => {}
                () = sleep(delay) => {
                    let _ = tx.send(Settled { ticket, value });
                }
            }
        });

        debug!(ticket, delay_ms = delay.as_millis() as u64, "debounce scheduled");
        self.pending = Some(PendingTimer { ticket, cancel });
        ticket
    }

    /// Cancels the pending timer. Returns true if one was pending.
    pub fn cancel(&mut self) -> bool {
        match self.pending.take() {
            Some(timer) => {
                timer.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Returns true if a value is waiting for its delay to elapse.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Waits for the pending value to settle.
    ///
    /// Never resolves when nothing is pending; check [`Self::is_pending`]
    /// first. Cancel-safe.
    pub async fn settled(&mut self) -> V {
        loop {
            let Some(settled) = self.rx.recv().await else {
                // The sender lives in `self`, so the channel never closes.
                return std::future::pending().await;
            };
            if let Some(value) = self.accept(settled) {
                return value;
            }
        }
    }

    /// Returns the settled value if its timer already fired.
    pub fn try_settled(&mut self) -> Option<V> {
        while let Ok(settled) = self.rx.try_recv() {
            if let Some(value) = self.accept(settled) {
                return Some(value);
            }
        }
        None
    }

    fn accept(&mut self, settled: Settled<V>) -> Option<V> {
        if self
            .pending
            .as_ref()
            .is_some_and(|timer| timer.ticket == settled.ticket)
        {
            self.pending = None;
            Some(settled.value)
        } else {
            debug!(ticket = settled.ticket, "discarding superseded debounce timer");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::task::yield_now;

    const DELAY: Duration = Duration::from_millis(500);

    #[tokio::test(start_paused = true)]
    async fn test_burst_commits_only_last_value() {
        // Arrange
        let mut debouncer = Debouncer::new(DELAY, CancellationToken::new());

        // Act
        for text in ["a", "an", "ana"] {
            debouncer.schedule(text.to_string());
            sleep(Duration::from_millis(100)).await;
        }
        let value = debouncer.settled().await;

        // Assert
        assert_eq!(value, "ana");
        sleep(Duration::from_secs(2)).await;
        assert!(debouncer.try_settled().is_none());
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_value_not_delivered_before_delay() {
        let mut debouncer = Debouncer::new(DELAY, CancellationToken::new());
        debouncer.schedule(1u32);

        sleep(Duration::from_millis(499)).await;
        yield_now().await;
        assert!(debouncer.try_settled().is_none());
        assert!(debouncer.is_pending());

        sleep(Duration::from_millis(2)).await;
        yield_now().await;
        assert_eq!(debouncer.try_settled(), Some(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_prevents_delivery() {
        let mut debouncer = Debouncer::new(DELAY, CancellationToken::new());
        debouncer.schedule("draft".to_string());

        assert!(debouncer.cancel());
        sleep(Duration::from_secs(1)).await;
        yield_now().await;

        assert!(debouncer.try_settled().is_none());
        assert!(!debouncer.cancel());
    }

    #[tokio::test(start_paused = true)]
    async fn test_parent_cancel_stops_timers() {
        let parent = CancellationToken::new();
        let mut debouncer = Debouncer::new(DELAY, parent.clone());
        debouncer.schedule("x".to_string());

        parent.cancel();
        sleep(Duration::from_secs(1)).await;
        yield_now().await;

        assert!(debouncer.try_settled().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_ticket_is_discarded() {
        // Arrange: a message from an old timer that slipped past cancellation
        let mut debouncer = Debouncer::new(DELAY, CancellationToken::new());
        let old = debouncer.schedule("old".to_string());
        debouncer.schedule("new".to_string());
        let _ = debouncer.tx.send(Settled {
            ticket: old,
            value: "old".to_string(),
        });

        // Act
        let value = debouncer.settled().await;

        // Assert
        assert_eq!(value, "new");
    }

    #[tokio::test(start_paused = true)]
    async fn test_spaced_values_each_commit() {
        let mut debouncer = Debouncer::new(DELAY, CancellationToken::new());

        debouncer.schedule("first".to_string());
        assert_eq!(debouncer.settled().await, "first");

        debouncer.schedule("second".to_string());
        assert_eq!(debouncer.settled().await, "second");
    }
}
