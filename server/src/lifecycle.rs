use tokio::task::JoinError;
use tracing::{error, info};

/// Logs how a background task ended. Panics and errors are never dropped.
pub fn report_exit(task: &'static str, outcome: Result<anyhow::Result<()>, JoinError>) {
    match outcome {
        Ok(Ok(())) => info!(component = "main", task, "task exited"),
        Ok(Err(e)) => error!(component = "main", task, error = ?e, "task failed"),
        Err(e) if e.is_panic() => error!(component = "main", task, error = %e, "task panicked"),
        Err(e) => error!(component = "main", task, error = %e, "task aborted"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    async fn panicked_task_is_logged() {
        let outcome = tokio::spawn(async { panic!("boom") }).await;

        report_exit("ticker", outcome.map(Ok));

        assert!(logs_contain("task panicked"));
        assert!(logs_contain("ticker"));
    }

    #[tokio::test]
    #[traced_test]
    async fn failed_task_is_logged() {
        report_exit("feed", Ok(Err(anyhow::anyhow!("bind lost"))));

        assert!(logs_contain("task failed"));
        assert!(logs_contain("bind lost"));
    }

    #[tokio::test]
    #[traced_test]
    async fn aborted_task_is_logged() {
        let handle = tokio::spawn(std::future::pending::<anyhow::Result<()>>());
        handle.abort();

        report_exit("feed", handle.await);

        assert!(logs_contain("task aborted"));
    }
}
