//! Host-supplied job callbacks.

use std::future::Future;
use std::pin::Pin;

use async_trait::async_trait;

/// Outcome of a callback invocation: captured output on success, an error
/// message on failure.
pub type CallbackOutcome = Result<String, String>;

/// A unit of work owned by the host.
///
/// The scheduler treats callbacks as opaque: it only needs to know whether
/// one can still be invoked, and how to invoke it with the job's metadata
/// snapshot. Failures are values, never panics — but panics are contained
/// by the scheduler and recorded as failed executions anyway.
#[async_trait]
pub trait Callback: Send + Sync {
    /// Whether this callback can still be invoked. Checked at registration
    /// and again immediately before every run; callbacks can go stale.
    fn is_invocable(&self) -> bool {
        true
    }

    /// Run the work with the job's metadata, capturing textual output.
    async fn invoke(&self, metadata: serde_json::Value) -> CallbackOutcome;
}

/// Type alias for the boxed callback function.
pub type CallbackFn = Box<
    dyn Fn(serde_json::Value) -> Pin<Box<dyn Future<Output = CallbackOutcome> + Send>>
        + Send
        + Sync,
>;

/// Wraps a plain async closure as a [`Callback`].
pub struct FnCallback {
    f: CallbackFn,
}

impl FnCallback {
    /// Wrap an async closure.
    pub fn new<F, Fut>(f: F) -> Self
    where
        F: Fn(serde_json::Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = CallbackOutcome> + Send + 'static,
    {
        Self {
            f: Box::new(move |metadata| Box::pin(f(metadata))),
        }
    }
}

#[async_trait]
impl Callback for FnCallback {
    async fn invoke(&self, metadata: serde_json::Value) -> CallbackOutcome {
        (self.f)(metadata).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fn_callback_invokes_closure() {
        let callback = FnCallback::new(|metadata| async move {
            Ok(format!("got {metadata}"))
        });
        assert!(callback.is_invocable());

        let out = callback.invoke(serde_json::json!({"k": 1})).await.unwrap();
        assert_eq!(out, "got {\"k\":1}");
    }

    #[tokio::test]
    async fn fn_callback_propagates_errors_as_values() {
        let callback = FnCallback::new(|_| async { Err("boom".to_string()) });
        let err = callback.invoke(serde_json::Value::Null).await.unwrap_err();
        assert_eq!(err, "boom");
    }
}
