//! Matches server responses to outstanding requests by request id.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use iotdm_api::DmResponse;
use tokio::sync::oneshot;
use tokio::time::Instant;

use crate::errors::CorrelationError;

struct PendingEntry {
    topic: String,
    submitted_at: Instant,
    tx: oneshot::Sender<DmResponse>,
}

/// Pending request set. At most one entry exists per request id; an entry
/// leaves the set on resolution, timeout or cancellation, whichever is first.
#[derive(Default)]
pub struct ResponseCorrelator {
    pending: Mutex<HashMap<String, PendingEntry>>,
}

/// Handle to one registered request.
#[must_use = "a pending response does nothing unless waited on"]
pub struct PendingResponse<'a> {
    correlator: &'a ResponseCorrelator,
    req_id: String,
    timeout: Duration,
    rx: oneshot::Receiver<DmResponse>,
}

impl ResponseCorrelator {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, PendingEntry>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register interest in `req_id` before the request is published, so a
    /// fast response cannot slip past.
    pub fn register(
        &self,
        req_id: &str,
        topic: &str,
        timeout: Duration,
    ) -> Result<PendingResponse<'_>, CorrelationError> {
        let (tx, rx) = oneshot::channel();

        let mut pending = self.lock();
        if pending.contains_key(req_id) {
            return Err(CorrelationError::DuplicateRequestId(req_id.to_string()));
        }
        pending.insert(
            req_id.to_string(),
            PendingEntry {
                topic: topic.to_string(),
                submitted_at: Instant::now(),
                tx,
            },
        );

        Ok(PendingResponse {
            correlator: self,
            req_id: req_id.to_string(),
            timeout,
            rx,
        })
    }

    /// Register and wait in one step.
    pub async fn await_response(
        &self,
        req_id: &str,
        topic: &str,
        timeout: Duration,
    ) -> Result<DmResponse, CorrelationError> {
        self.register(req_id, topic, timeout)?.wait().await
    }

    /// Deliver a response. Returns `false` when nothing was waiting for it,
    /// which is expected for late or duplicate responses.
    pub fn resolve(&self, response: DmResponse) -> bool {
        let Some(entry) = self.lock().remove(&response.req_id) else {
            tracing::debug!(req_id = %response.req_id, "No pending request for response");
            return false;
        };

        tracing::debug!(
            req_id = %response.req_id,
            rc = response.rc,
            topic = %entry.topic,
            elapsed = ?entry.submitted_at.elapsed(),
            "Response resolved",
        );

        // The waiter may already have given up.
        entry.tx.send(response).is_ok()
    }

    /// Drop a pending request; its waiter sees [`CorrelationError::Cancelled`].
    pub fn cancel(&self, req_id: &str) -> bool {
        self.lock().remove(req_id).is_some()
    }

    pub fn is_pending(&self, req_id: &str) -> bool {
        self.lock().contains_key(req_id)
    }

    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }
}

impl PendingResponse<'_> {
    pub fn req_id(&self) -> &str {
        &self.req_id
    }

    pub async fn wait(mut self) -> Result<DmResponse, CorrelationError> {
        match tokio::time::timeout(self.timeout, &mut self.rx).await {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(_)) => Err(CorrelationError::Cancelled(self.req_id.clone())),
            Err(_) => {
                tracing::debug!(req_id = %self.req_id, "Request timed out");
                Err(CorrelationError::Timeout {
                    req_id: self.req_id.clone(),
                    timeout: self.timeout,
                })
            }
        }
    }
}

impl Drop for PendingResponse<'_> {
    fn drop(&mut self) {
        // No-op once resolved; otherwise a late response is discarded.
        self.correlator.cancel(&self.req_id);
    }
}

#[cfg(test)]
mod tests {
    use iotdm_api::ResponseCode;

    use super::*;

    const TIMEOUT: Duration = Duration::from_secs(10);

    #[tokio::test]
    async fn test_resolve_delivers_response() {
        let correlator = ResponseCorrelator::new();
        let pending = correlator.register("r1", "mgmt/manage", TIMEOUT).unwrap();

        assert!(correlator.resolve(DmResponse::new("r1", ResponseCode::Success)));

        let response = pending.wait().await.unwrap();
        assert_eq!(response.rc, 200);
        assert_eq!(correlator.pending_count(), 0);
    }

    #[test]
    fn test_resolve_without_match_is_noop() {
        let correlator = ResponseCorrelator::new();
        let _pending = correlator.register("r1", "t", TIMEOUT).unwrap();

        assert!(!correlator.resolve(DmResponse::new("other", ResponseCode::Success)));
        assert!(correlator.is_pending("r1"));
    }

    #[test]
    fn test_duplicate_request_id() {
        let correlator = ResponseCorrelator::new();
        let _pending = correlator.register("r1", "t", TIMEOUT).unwrap();

        assert!(matches!(
            correlator.register("r1", "t", TIMEOUT),
            Err(CorrelationError::DuplicateRequestId(id)) if id == "r1"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_removes_entry() {
        let correlator = ResponseCorrelator::new();
        let started = Instant::now();

        let result = correlator.await_response("r1", "t", TIMEOUT).await;

        assert!(matches!(result, Err(CorrelationError::Timeout { .. })));
        let elapsed = started.elapsed();
        assert!(elapsed >= TIMEOUT && elapsed < TIMEOUT + Duration::from_millis(5));
        assert!(!correlator.is_pending("r1"));
        assert!(!correlator.resolve(DmResponse::new("r1", ResponseCode::Success)));
    }

    #[tokio::test]
    async fn test_cancel_wakes_waiter() {
        let correlator = ResponseCorrelator::new();
        let pending = correlator.register("r1", "t", TIMEOUT).unwrap();

        assert!(correlator.cancel("r1"));
        assert!(matches!(pending.wait().await, Err(CorrelationError::Cancelled(_))));
    }

    #[test]
    fn test_dropped_waiter_leaves_no_entry() {
        let correlator = ResponseCorrelator::new();
        let pending = correlator.register("r1", "t", TIMEOUT).unwrap();
        assert_eq!(correlator.pending_count(), 1);

        drop(pending);

        assert_eq!(correlator.pending_count(), 0);
        assert!(!correlator.resolve(DmResponse::new("r1", ResponseCode::Success)));
    }
}
