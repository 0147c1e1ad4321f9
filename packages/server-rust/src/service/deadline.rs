//! Deadline and cancellation enforcement for persistence calls.

use std::future::Future;

use super::operation::{CallContext, RpcError};

/// Runs one persistence call bounded by the caller's deadline and cancellation.
///
/// `what` names the call in error messages and logs. Collaborator failures,
/// an elapsed deadline, and cancellation all surface as [`RpcError::Internal`].
/// A call abandoned this way may still have taken effect in the store.
///
/// # Errors
///
/// Returns [`RpcError::Internal`] if the call fails, the deadline passes, or
/// the caller cancels first.
pub async fn bounded<T, F>(ctx: &CallContext, what: &'static str, fut: F) -> Result<T, RpcError>
where
    F: Future<Output = anyhow::Result<T>>,
{
    let call = async {
        let result = match ctx.deadline {
            Some(deadline) => {
                if let Ok(result) = tokio::time::timeout_at(deadline, fut).await {
                    result
                } else {
                    tracing::warn!(call_id = ctx.call_id, call = what, "deadline exceeded");
                    return Err(RpcError::internal(format!("{what}: deadline exceeded")));
                }
            }
            None => fut.await,
        };
        result.map_err(|e| RpcError::Internal(e.context(format!("{what} failed"))))
    };

    tokio::select! {
        biased;
        () = ctx.cancellation.cancelled() => {
            tracing::warn!(call_id = ctx.call_id, call = what, "cancelled by caller");
            Err(RpcError::internal(format!("{what}: cancelled")))
        }
        result = call => result,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::service::operation::Code;

    async fn stall() -> anyhow::Result<u32> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(1)
    }

    #[tokio::test]
    async fn passes_through_result() {
        let ctx = CallContext::new(1);
        let value = bounded(&ctx, "find", async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn collaborator_error_is_internal() {
        let ctx = CallContext::new(1);
        let err = bounded::<u32, _>(&ctx, "find", async { Err(anyhow::anyhow!("boom")) })
            .await
            .unwrap_err();
        assert_eq!(err.code(), Code::Internal);
        assert!(err.to_string().contains("find failed"));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_abandons_stalled_call() {
        let ctx = CallContext::new(1).with_timeout(Duration::from_millis(50));
        let err = bounded(&ctx, "update_one", stall()).await.unwrap_err();
        assert_eq!(err.code(), Code::Internal);
        assert!(err.to_string().contains("deadline exceeded"));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_abandons_stalled_call() {
        let ctx = CallContext::new(1);
        let token = ctx.cancellation.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            token.cancel();
        });
        let err = bounded(&ctx, "find", stall()).await.unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }

    #[tokio::test]
    async fn already_cancelled_call_never_runs() {
        let ctx = CallContext::new(1);
        ctx.cancellation.cancel();
        let err = bounded(&ctx, "insert_one", async { Ok(()) }).await.unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }
}
