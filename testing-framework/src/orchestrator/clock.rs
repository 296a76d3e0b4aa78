// Time source shared by the executor's waiters and the in-process ledger.
//
// Receipt polling and record finality both go through `Clock`, so a spec run
// on a paused tokio runtime never waits in real time.

use std::future::Future;
use std::pin::Pin;
use tokio::time::{self, Duration, Instant};

/// Injected time source
pub trait Clock: Send + Sync {
    /// Current instant (simulated under a paused runtime)
    fn now(&self) -> Instant;

    /// Sleep for `d` on this clock
    fn sleep(&self, d: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;

    /// Time elapsed since `earlier`, saturating at zero
    fn elapsed_since(&self, earlier: Instant) -> Duration {
        self.now().saturating_duration_since(earlier)
    }
}

/// Real tokio time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, d: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(time::sleep(d))
    }
}

/// Clock for `#[tokio::test(start_paused = true)]` runtimes.
///
/// Construction does not pause time itself; the runtime must already be
/// paused. Sleeps resolve through tokio's auto-advance, so polling loops finish
/// instantly while the observed durations stay exact.
#[derive(Debug, Default, Clone, Copy)]
pub struct PausedClock;

impl PausedClock {
    pub fn new() -> Self {
        Self
    }

    /// Move simulated time forward
    pub async fn advance(&self, d: Duration) {
        time::advance(d).await
    }
}

impl Clock for PausedClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, d: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(time::sleep(d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn test_paused_clock_advance() {
        let clock = PausedClock::new();
        let start = clock.now();

        clock.advance(Duration::from_secs(1)).await;
        clock.advance(Duration::from_secs(2)).await;

        assert_eq!(clock.elapsed_since(start), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_paused_sleep_auto_advances() {
        let clock: Arc<dyn Clock> = Arc::new(PausedClock::new());
        let start = clock.now();

        clock.sleep(Duration::from_secs(30)).await;

        assert_eq!(clock.elapsed_since(start), Duration::from_secs(30));
    }

    #[tokio::test]
    async fn test_system_clock_sleeps() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let start = clock.now();
        clock.sleep(Duration::from_millis(5)).await;
        assert!(clock.elapsed_since(start) >= Duration::from_millis(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_never_negative() {
        let clock = PausedClock::new();
        let later = clock.now() + Duration::from_secs(5);
        assert_eq!(clock.elapsed_since(later), Duration::ZERO);
    }
}
