/// Synthetic download progress ticker.
///
/// While a transfer runs, the ticker emits a random increment every
/// interval. Dropping the handle aborts the timer task, so the ticker
/// lives exactly as long as the value holding it.
use std::time::Duration;

use rand::Rng;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::lifecycle::{Event, Ticket};

/// Upper bound (exclusive) of a single progress increment.
pub const MAX_INCREMENT: f64 = 15.0;

/// Running progress timer for one transfer.
pub struct ProgressTicker {
    ticket: Ticket,
    handle: JoinHandle<()>,
}

impl ProgressTicker {
    /// Start ticking for `ticket`. The first tick fires one interval after start.
    pub fn start(ticket: Ticket, interval: Duration, events: UnboundedSender<Event>) -> Self {
        let handle = tokio::spawn(async move {
            let mut timer = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
            loop {
                timer.tick().await;
                let increment = rand::thread_rng().gen_range(0.0..MAX_INCREMENT);
                if events.send(Event::ProgressTick { ticket, increment }).is_err() {
                    break;
                }
            }
        });
        debug!("Progress ticker started for ticket {}", ticket);
        Self { ticket, handle }
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.handle.abort();
        debug!("Progress ticker stopped for ticket {}", self.ticket);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn test_ticker_emits_bounded_increments() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ticker = ProgressTicker::start(7, Duration::from_millis(5), tx);

        for _ in 0..3 {
            match rx.recv().await {
                Some(Event::ProgressTick { ticket, increment }) => {
                    assert_eq!(ticket, 7);
                    assert!((0.0..MAX_INCREMENT).contains(&increment));
                }
                other => panic!("unexpected event: {:?}", other),
            }
        }
        drop(ticker);
    }

    #[tokio::test]
    async fn test_drop_stops_ticks() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let ticker = ProgressTicker::start(1, Duration::from_millis(5), tx);
        drop(ticker);

        // The aborted task drops its sender, closing the channel.
        let drained = tokio::time::timeout(Duration::from_secs(2), async {
            while rx.recv().await.is_some() {}
        })
        .await;
        assert!(drained.is_ok());
    }
}
