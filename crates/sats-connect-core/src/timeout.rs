//! Bounded waits for wallet calls.

use std::future::Future;
use std::time::Duration;

use futures::future::{self, Either};

use crate::runtime::Runtime;

/// The operation did not settle within its budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{operation} timeout after {}ms", .after.as_millis())]
pub struct Elapsed {
    pub operation: &'static str,
    pub after: Duration,
}

/// Race `operation` against a timer of `duration`.
///
/// Whichever side loses is dropped. For Rust futures that cancels the work;
/// for a wrapped JS promise the underlying call keeps running and its late
/// result is ignored.
pub async fn with_timeout<R, F>(
    runtime: &R,
    operation: &'static str,
    duration: Duration,
    fut: F,
) -> Result<F::Output, Elapsed>
where
    R: Runtime + ?Sized,
    F: Future,
{
    let fut = std::pin::pin!(fut);
    match future::select(fut, runtime.sleep(duration)).await {
        Either::Left((output, _)) => Ok(output),
        Either::Right(((), _)) => Err(Elapsed {
            operation,
            after: duration,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TokioRuntime;

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_resolves_before_deadline() {
        let runtime = TokioRuntime;
        let result = with_timeout(&runtime, "Get network", Duration::from_secs(5), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            7
        })
        .await;
        assert_eq!(result, Ok(7));
    }

    #[tokio::test(flavor = "current_thread", start_paused = true)]
    async fn test_pending_future_times_out() {
        let runtime = TokioRuntime;
        let started = tokio::time::Instant::now();
        let result = with_timeout(
            &runtime,
            "Get network",
            Duration::from_secs(5),
            future::pending::<()>(),
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.operation, "Get network");
        assert_eq!(err.to_string(), "Get network timeout after 5000ms");
        assert!(started.elapsed() >= Duration::from_secs(5));
    }
}
