use std::time::Duration;

use tokio::task::JoinHandle;

/// Cancellable once-per-second countdown driver for a rest period. Each
/// tick invokes the callback; the loop stops when the callback returns
/// `false` or after `cancel`. The timer holds no session state of its own:
/// a tick that lands after the session has moved on is rejected by the
/// state machine's generation check, never double-firing a transition.
pub struct RestTimer {
    handle: JoinHandle<()>,
}

impl RestTimer {
    pub fn spawn<F>(period: Duration, mut on_tick: F) -> Self
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            loop {
                tokio::time::sleep(period).await;
                if !on_tick() {
                    break;
                }
            }
        });
        Self { handle }
    }

    /// Stops the countdown immediately. Cancellation is mandatory whenever
    /// the surrounding state moves on (`skip_rest`, `abandon`, completion);
    /// a dropped-but-uncancelled timer keeps ticking.
    pub fn cancel(&self) {
        self.handle.abort();
    }
}
