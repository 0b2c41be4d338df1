use std::time::{Duration, Instant};

use tracing::Span;

/// Span wrapping a single market's task (processor, ticker subscriber).
pub fn market_span(component: &'static str, market: &str) -> Span {
    tracing::info_span!("market", component = %component, market = %market)
}

/// Awaits `fut` and logs a `performance` warning if it took longer than `max`.
pub async fn warn_if_slow<F, T>(label: &'static str, max: Duration, fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    let start = Instant::now();
    let out = fut.await;
    let elapsed = start.elapsed();
    if elapsed > max {
        tracing::warn!(
            kind = "performance",
            label = label,
            elapsed_ms = elapsed.as_millis() as u64,
            "slow operation detected"
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    async fn slow_future_is_reported() {
        let out = warn_if_slow("sleepy", Duration::from_millis(1), async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            7
        })
        .await;

        assert_eq!(out, 7);
        assert!(logs_contain("slow operation detected"));
    }

    #[tokio::test]
    #[traced_test]
    async fn fast_future_is_silent() {
        let out = warn_if_slow("quick", Duration::from_secs(5), async { 1 }).await;

        assert_eq!(out, 1);
        assert!(!logs_contain("slow operation detected"));
    }
}
