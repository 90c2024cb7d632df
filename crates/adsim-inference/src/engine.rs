//! Inference engine contract and the async fitting boundary.

use std::future;
use std::sync::Arc;
use std::time::Duration;

use adsim_design::ModelPayload;
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::{InferenceError, Posterior, Result, UnavailableReason};

/// Recovers transform parameters from a raw payload.
///
/// Implementations must be pure functions of the payload: fitting the same
/// payload twice gives the same posterior, so a retry after a timeout is
/// safe.
pub trait InferenceEngine: Send + Sync {
    /// Engine name, recorded on every posterior.
    fn name(&self) -> &str;

    /// Fit `payload`.
    fn fit(&self, payload: &ModelPayload) -> Result<Posterior>;
}

/// Check the payload against the data contract.
///
/// A [`ModelPayload`] is validated when built, so this only rejects
/// payloads an engine cannot fit at all: no rows, no channels, or fewer rows
/// than `min_rows`.
pub fn validate_payload(payload: &ModelPayload, min_rows: usize) -> Result<()> {
    let (n, c, l) = payload.raw_tensor().dim();
    if payload.outcome().len() != n || payload.control_matrix().nrows() != n {
        return Err(InferenceError::InvalidPayload(format!(
            "outcome has {} rows, tensor {n}, controls {}",
            payload.outcome().len(),
            payload.control_matrix().nrows()
        )));
    }
    if c == 0 || c != payload.num_channels() {
        return Err(InferenceError::InvalidPayload(format!(
            "tensor has {c} channels, payload lists {}",
            payload.num_channels()
        )));
    }
    if payload.lag_indices() != (0..l).collect::<Vec<_>>() {
        return Err(InferenceError::InvalidPayload(
            "lag indices are not 0..L-1".to_string(),
        ));
    }
    if n == 0 || n < min_rows {
        return Err(InferenceError::InvalidPayload(format!(
            "{n} rows, at least {} required",
            min_rows.max(1)
        )));
    }
    Ok(())
}

/// Run `engine` on a blocking task with a deadline and an optional
/// cancellation signal.
///
/// A timeout, a cancellation or a panicking engine all return
/// [`InferenceError::Unavailable`]. A dropped cancellation sender is not a
/// cancellation. The blocking task is detached on timeout and runs to
/// completion in the background.
pub async fn fit_with_timeout<E>(
    engine: Arc<E>,
    payload: Arc<ModelPayload>,
    timeout: Duration,
    cancel: Option<oneshot::Receiver<()>>,
) -> Result<Posterior>
where
    E: InferenceEngine + ?Sized + 'static,
{
    let name = engine.name().to_string();
    let rows = payload.n();
    let task = tokio::task::spawn_blocking(move || engine.fit(&payload));

    let cancelled = async move {
        match cancel {
            Some(rx) => {
                if rx.await.is_err() {
                    future::pending::<()>().await;
                }
            }
            None => future::pending::<()>().await,
        }
    };

    tokio::select! {
        joined = tokio::time::timeout(timeout, task) => match joined {
            Ok(Ok(result)) => {
                if let Ok(posterior) = &result {
                    info!(engine = %name, rows, rss = posterior.rss(), "fit complete");
                }
                result
            }
            Ok(Err(join)) => Err(InferenceError::engine_failed(join.to_string())),
            Err(_) => {
                warn!(engine = %name, ?timeout, "fit timed out");
                Err(InferenceError::Unavailable {
                    reason: UnavailableReason::TimedOut(timeout),
                })
            }
        },
        () = cancelled => {
            warn!(engine = %name, "fit cancelled");
            Err(InferenceError::Unavailable {
                reason: UnavailableReason::Cancelled,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChannelEstimate;
    use adsim_series::Channel;
    use ndarray::{Array1, Array2, Array3};

    fn payload(n: usize) -> ModelPayload {
        ModelPayload::new(
            vec![Channel::Tv],
            Array1::from_vec((0..n).map(|i| i as f64).collect()),
            Array3::zeros((n, 1, 3)),
            Array2::zeros((n, 1)),
        )
        .unwrap()
    }

    /// Returns the outcome as its own fit after an optional delay.
    #[derive(Debug)]
    struct EchoEngine {
        delay: Duration,
    }

    impl InferenceEngine for EchoEngine {
        fn name(&self) -> &str {
            "echo"
        }

        fn fit(&self, payload: &ModelPayload) -> Result<Posterior> {
            std::thread::sleep(self.delay);
            let estimate = ChannelEstimate {
                channel: Channel::Tv,
                rate: 0.5,
                theta: None,
                k: 0.5,
                s: 1.0,
                b: 1.0,
                slope_fixed: true,
            };
            Posterior::new(
                self.name(),
                vec![estimate],
                0.0,
                vec![0.0],
                payload.outcome().to_vec(),
                payload,
            )
        }
    }

    #[derive(Debug)]
    struct PanicEngine;

    impl InferenceEngine for PanicEngine {
        fn name(&self) -> &str {
            "panic"
        }

        fn fit(&self, _payload: &ModelPayload) -> Result<Posterior> {
            panic!("engine blew up")
        }
    }

    #[test]
    fn test_validate_payload_rows() {
        assert!(validate_payload(&payload(4), 3).is_ok());
        assert!(matches!(
            validate_payload(&payload(2), 3),
            Err(InferenceError::InvalidPayload(_))
        ));
        assert!(matches!(
            validate_payload(&payload(0), 0),
            Err(InferenceError::InvalidPayload(_))
        ));
    }

    #[tokio::test]
    async fn test_fit_within_deadline() {
        let engine = Arc::new(EchoEngine {
            delay: Duration::ZERO,
        });
        let posterior = fit_with_timeout(engine, Arc::new(payload(5)), Duration::from_secs(5), None)
            .await
            .unwrap();
        assert_eq!(posterior.engine(), "echo");
        assert_eq!(posterior.rss(), 0.0);
    }

    #[tokio::test]
    async fn test_timeout_is_unavailable() {
        let engine = Arc::new(EchoEngine {
            delay: Duration::from_millis(300),
        });
        let err = fit_with_timeout(engine, Arc::new(payload(5)), Duration::from_millis(10), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            InferenceError::Unavailable {
                reason: UnavailableReason::TimedOut(_)
            }
        ));
    }

    #[tokio::test]
    async fn test_cancel_is_unavailable() {
        let engine = Arc::new(EchoEngine {
            delay: Duration::from_millis(300),
        });
        let (tx, rx) = oneshot::channel();
        tx.send(()).unwrap();
        let err = fit_with_timeout(engine, Arc::new(payload(5)), Duration::from_secs(5), Some(rx))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            InferenceError::Unavailable {
                reason: UnavailableReason::Cancelled
            }
        );
    }

    #[tokio::test]
    async fn test_dropped_sender_is_not_cancellation() {
        let engine = Arc::new(EchoEngine {
            delay: Duration::from_millis(20),
        });
        let (tx, rx) = oneshot::channel::<()>();
        drop(tx);
        let result =
            fit_with_timeout(engine, Arc::new(payload(5)), Duration::from_secs(5), Some(rx)).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_panicking_engine_is_unavailable() {
        let err = fit_with_timeout(
            Arc::new(PanicEngine),
            Arc::new(payload(5)),
            Duration::from_secs(5),
            None,
        )
        .await
        .unwrap_err();
        assert!(err.is_unavailable());
    }

    #[tokio::test]
    async fn test_retry_with_same_payload_is_idempotent() {
        let engine: Arc<dyn InferenceEngine> = Arc::new(EchoEngine {
            delay: Duration::ZERO,
        });
        let shared = Arc::new(payload(6));
        let first = fit_with_timeout(
            Arc::clone(&engine),
            Arc::clone(&shared),
            Duration::from_secs(5),
            None,
        )
        .await
        .unwrap();
        let second = fit_with_timeout(engine, shared, Duration::from_secs(5), None)
            .await
            .unwrap();
        assert_eq!(first, second);
    }
}
