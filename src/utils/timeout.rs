//! Async timeout wrappers for report I/O.

use std::future::Future;
use std::time::Duration;

use crate::error::{ProtocolError, Result};

/// Write timeout applied to every outgoing report.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(1);

/// Run `future`, failing with [`ProtocolError::Timeout`] once `duration` elapses.
pub async fn with_timeout_error<F, T>(future: F, duration: Duration) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(ProtocolError::Timeout),
    }
}

/// Like [`with_timeout_error`], but `None` waits forever.
pub async fn with_optional_timeout<F, T>(future: F, duration: Option<Duration>) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match duration {
        Some(duration) => with_timeout_error(future, duration).await,
        None => future.await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_elapsed_is_timeout() {
        let result: Result<()> = with_timeout_error(
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(())
            },
            Duration::from_millis(10),
        )
        .await;
        assert!(matches!(result, Err(ProtocolError::Timeout)));
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let result: Result<()> =
            with_optional_timeout(async { Err(ProtocolError::ConnectionClosed) }, None).await;
        assert!(matches!(result, Err(ProtocolError::ConnectionClosed)));

        let value = with_optional_timeout(async { Ok(7) }, Some(Duration::from_secs(1)))
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}
