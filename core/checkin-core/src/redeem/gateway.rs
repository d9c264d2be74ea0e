//! Guarded redemption: at most one request outstanding at a time.
//!
//! The gateway is the only place redemption failures are handled. Every
//! attempt that runs ends in exactly one [`RedemptionOutcome`]; attempts that
//! arrive while another is outstanding are dropped and return `None`.
//!
//! Callers that hand the attempt to another task take a [`Reservation`]
//! first, so the drop decision is made at arrival time rather than when the
//! task gets scheduled.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use checkin_protocol::{RedeemReply, RedeemRequest, REDEEM_PATH};
use tracing::{debug, info};

use super::outcome::{FailureKind, RedemptionOutcome, DEFAULT_SUCCESS_MESSAGE, NO_TICKET_MESSAGE};
use super::transport::{RedeemTransport, TransportResponse};
use crate::payload;
use crate::scan::{ScanControl, ScanState};
use crate::session::SessionAuth;

pub struct RedemptionGateway<T: RedeemTransport> {
    transport: T,
    endpoint: String,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when dropped.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn try_acquire(flag: &'a AtomicBool) -> Option<Self> {
        acquire(flag).then(|| InFlightGuard(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// An owned claim on the gateway's single redemption slot.
///
/// Holding one means no other redemption can start. Dropping it without
/// redeeming frees the slot.
pub struct Reservation<T: RedeemTransport> {
    gateway: Arc<RedemptionGateway<T>>,
}

impl<T: RedeemTransport> Reservation<T> {
    /// Redeems `raw` in the reserved slot. The slot is freed once the
    /// backend has answered, before the scanner is resumed.
    pub async fn redeem(
        self,
        raw: &str,
        auth: &SessionAuth,
        scanner: &dyn ScanControl,
    ) -> RedemptionOutcome {
        let gateway = Arc::clone(&self.gateway);
        gateway.run_guarded(raw, auth, scanner, self).await
    }
}

impl<T: RedeemTransport> Drop for Reservation<T> {
    fn drop(&mut self) {
        self.gateway.in_flight.store(false, Ordering::Release);
    }
}

fn acquire(flag: &AtomicBool) -> bool {
    flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
}

impl<T: RedeemTransport> RedemptionGateway<T> {
    pub fn new(transport: T, base_url: &str) -> Self {
        Self {
            transport,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), REDEEM_PATH),
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Claims the redemption slot, or `None` if a redemption is outstanding.
    pub fn try_reserve(self: &Arc<Self>) -> Option<Reservation<T>> {
        acquire(&self.in_flight).then(|| Reservation {
            gateway: Arc::clone(self),
        })
    }

    /// Redeems the ticket in `raw`, pausing `scanner` for the duration.
    ///
    /// Returns `None` without any I/O when another redemption is outstanding.
    /// The scanner is resumed afterwards only if it was running beforehand.
    pub async fn redeem(
        &self,
        raw: &str,
        auth: &SessionAuth,
        scanner: &dyn ScanControl,
    ) -> Option<RedemptionOutcome> {
        let Some(guard) = InFlightGuard::try_acquire(&self.in_flight) else {
            debug!("Redemption already in flight; dropping scan");
            return None;
        };
        Some(self.run_guarded(raw, auth, scanner, guard).await)
    }

    async fn run_guarded<G: Send>(
        &self,
        raw: &str,
        auth: &SessionAuth,
        scanner: &dyn ScanControl,
        guard: G,
    ) -> RedemptionOutcome {
        let was_running = scanner.state().await == ScanState::Running;
        if let Err(err) = scanner.pause().await {
            debug!(error = %err, "Scanner pause failed; continuing");
        }

        let outcome = self.submit(raw, auth).await;
        drop(guard);

        if was_running {
            if let Err(err) = scanner.resume().await {
                debug!(error = %err, "Scanner resume failed");
            }
        }

        match &outcome {
            RedemptionOutcome::Redeemed {
                event_id,
                student_id,
                ..
            } => info!(?event_id, ?student_id, "Ticket redeemed"),
            RedemptionOutcome::Failed { kind, message } => {
                info!(%kind, %message, "Redemption failed")
            }
        }
        outcome
    }

    async fn submit(&self, raw: &str, auth: &SessionAuth) -> RedemptionOutcome {
        let ticket = payload::resolve(raw);
        let Some(token) = ticket.token else {
            return RedemptionOutcome::failed(FailureKind::Invalid, NO_TICKET_MESSAGE);
        };

        let request = RedeemRequest::new(token, ticket.event_id);
        if let Err(info) = request.validate() {
            debug!(code = %info.code, "Rejected ticket before sending");
            return RedemptionOutcome::failed(FailureKind::Invalid, info.message);
        }
        if ticket.event_id.is_none() {
            debug!("No event id in payload; sending token only");
        }
        if auth.token.is_none() {
            debug!("No session token; sending without Authorization");
        }

        let bearer = auth.bearer();
        match self
            .transport
            .post_json(&self.endpoint, &request, bearer.as_deref())
            .await
        {
            Ok(response) => interpret(&response, ticket.event_id),
            Err(err) => {
                RedemptionOutcome::failed(FailureKind::Network, format!("Network error: {}", err))
            }
        }
    }
}

fn interpret(response: &TransportResponse, requested_event: Option<i64>) -> RedemptionOutcome {
    let reply = response
        .json()
        .map(|body| RedeemReply::from_value(&body))
        .unwrap_or_default();

    if !response.is_success() || reply.is_explicit_failure() {
        let message = reply
            .error_message
            .unwrap_or_else(|| format!("Redemption failed (HTTP {})", response.status));
        return RedemptionOutcome::failed(FailureKind::ServerRejection, message);
    }

    RedemptionOutcome::Redeemed {
        event_id: reply.event_id.or(requested_event),
        student_id: reply.student_id,
        message: reply
            .message
            .unwrap_or_else(|| DEFAULT_SUCCESS_MESSAGE.to_string()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::{CaptureError, TransportError};
    use crate::scan::DetachedScanner;
    use async_trait::async_trait;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;
    use tokio::sync::Notify;

    #[derive(Debug, Clone)]
    pub(crate) struct Call {
        pub url: String,
        pub body: serde_json::Value,
        pub authorization: Option<String>,
    }

    /// Answers every request with a canned response, optionally waiting on
    /// `release` first.
    pub(crate) struct FakeTransport {
        pub response: Result<TransportResponse, String>,
        pub calls: Mutex<Vec<Call>>,
        pub release: Option<Arc<Notify>>,
    }

    impl FakeTransport {
        pub fn answering(status: u16, body: &str) -> Self {
            Self {
                response: Ok(TransportResponse::new(status, body.as_bytes().to_vec())),
                calls: Mutex::new(Vec::new()),
                release: None,
            }
        }

        pub fn unreachable() -> Self {
            Self {
                response: Err("connection refused".to_string()),
                calls: Mutex::new(Vec::new()),
                release: None,
            }
        }

        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl RedeemTransport for FakeTransport {
        async fn post_json(
            &self,
            url: &str,
            body: &RedeemRequest,
            authorization: Option<&str>,
        ) -> Result<TransportResponse, TransportError> {
            self.calls.lock().unwrap().push(Call {
                url: url.to_string(),
                body: serde_json::to_value(body).unwrap(),
                authorization: authorization.map(str::to_string),
            });
            if let Some(release) = &self.release {
                release.notified().await;
            }
            self.response.clone().map_err(TransportError::Request)
        }
    }

    #[derive(Default)]
    struct FakeScanner {
        state: Mutex<Option<ScanState>>,
        pauses: AtomicUsize,
        resumes: AtomicUsize,
        fail_pause: bool,
    }

    impl FakeScanner {
        fn in_state(state: ScanState) -> Self {
            Self {
                state: Mutex::new(Some(state)),
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl ScanControl for FakeScanner {
        async fn state(&self) -> ScanState {
            self.state.lock().unwrap().unwrap_or_default()
        }

        async fn pause(&self) -> Result<(), CaptureError> {
            self.pauses.fetch_add(1, Ordering::SeqCst);
            if self.fail_pause {
                return Err(CaptureError::ControlFailed {
                    action: "pause",
                    details: "unsupported".to_string(),
                });
            }
            *self.state.lock().unwrap() = Some(ScanState::Paused);
            Ok(())
        }

        async fn resume(&self) -> Result<(), CaptureError> {
            self.resumes.fetch_add(1, Ordering::SeqCst);
            *self.state.lock().unwrap() = Some(ScanState::Running);
            Ok(())
        }
    }

    fn gateway(transport: FakeTransport) -> RedemptionGateway<FakeTransport> {
        RedemptionGateway::new(transport, "https://shop.test/")
    }

    #[tokio::test]
    async fn test_success_sends_token_event_and_bearer() {
        let gateway = gateway(FakeTransport::answering(
            200,
            r#"{"eventId": 9, "studentId": 42, "message": "Welcome"}"#,
        ));
        let auth = SessionAuth::with_token("session-jwt");

        let outcome = gateway
            .redeem("T:abc123|E:9|S:42", &auth, &DetachedScanner)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            RedemptionOutcome::Redeemed {
                event_id: Some(9),
                student_id: Some("42".to_string()),
                message: "Welcome".to_string(),
            }
        );
        let calls = gateway.transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].url, "https://shop.test/api/qr/redeem");
        assert_eq!(
            calls[0].body,
            serde_json::json!({"token": "abc123", "eventId": 9})
        );
        assert_eq!(calls[0].authorization.as_deref(), Some("Bearer session-jwt"));
        assert!(!gateway.is_in_flight());
    }

    #[tokio::test]
    async fn test_event_id_omitted_when_unresolved() {
        let gateway = gateway(FakeTransport::answering(200, "{}"));
        let outcome = gateway
            .redeem("just-a-raw-string", &SessionAuth::anonymous(), &DetachedScanner)
            .await
            .unwrap();

        assert!(outcome.is_success());
        let calls = gateway.transport.calls();
        assert_eq!(calls[0].body, serde_json::json!({"token": "just-a-raw-string"}));
        assert_eq!(calls[0].authorization, None);
    }

    #[tokio::test]
    async fn test_success_defaults_message_and_event() {
        let gateway = gateway(FakeTransport::answering(200, "not json"));
        let outcome = gateway
            .redeem("token=foo,eventId=3", &SessionAuth::anonymous(), &DetachedScanner)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            RedemptionOutcome::Redeemed {
                event_id: Some(3),
                student_id: None,
                message: DEFAULT_SUCCESS_MESSAGE.to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_non_2xx_uses_error_field() {
        let gateway = gateway(FakeTransport::answering(409, r#"{"error": "Ticket already used"}"#));
        let outcome = gateway
            .redeem("T:abc", &SessionAuth::anonymous(), &DetachedScanner)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            RedemptionOutcome::failed(FailureKind::ServerRejection, "Ticket already used")
        );
    }

    #[tokio::test]
    async fn test_non_2xx_without_body_embeds_status() {
        let gateway = gateway(FakeTransport::answering(503, ""));
        let outcome = gateway
            .redeem("T:abc", &SessionAuth::anonymous(), &DetachedScanner)
            .await
            .unwrap();

        assert_eq!(outcome.summary(), "Redemption failed (HTTP 503)");
    }

    #[tokio::test]
    async fn test_explicit_failure_on_200() {
        let gateway = gateway(FakeTransport::answering(
            200,
            r#"{"success": false, "detail": "Event closed"}"#,
        ));
        let outcome = gateway
            .redeem("T:abc", &SessionAuth::anonymous(), &DetachedScanner)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            RedemptionOutcome::failed(FailureKind::ServerRejection, "Event closed")
        );
    }

    #[tokio::test]
    async fn test_transport_error_is_network_failure() {
        let gateway = gateway(FakeTransport::unreachable());
        let outcome = gateway
            .redeem("T:abc", &SessionAuth::anonymous(), &DetachedScanner)
            .await
            .unwrap();

        match outcome {
            RedemptionOutcome::Failed { kind, message } => {
                assert_eq!(kind, FailureKind::Network);
                assert!(message.contains("connection refused"));
            }
            other => panic!("expected network failure, got {:?}", other),
        }
        assert!(!gateway.is_in_flight());
    }

    #[tokio::test]
    async fn test_blank_payload_fails_without_request() {
        let gateway = gateway(FakeTransport::answering(200, "{}"));
        let outcome = gateway
            .redeem("   ", &SessionAuth::anonymous(), &DetachedScanner)
            .await
            .unwrap();

        assert_eq!(
            outcome,
            RedemptionOutcome::failed(FailureKind::Invalid, NO_TICKET_MESSAGE)
        );
        assert!(gateway.transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_running_scanner_is_paused_then_resumed() {
        let gateway = gateway(FakeTransport::answering(200, "{}"));
        let scanner = FakeScanner::in_state(ScanState::Running);

        gateway
            .redeem("T:abc", &SessionAuth::anonymous(), &scanner)
            .await
            .unwrap();

        assert_eq!(scanner.pauses.load(Ordering::SeqCst), 1);
        assert_eq!(scanner.resumes.load(Ordering::SeqCst), 1);
        assert_eq!(scanner.state().await, ScanState::Running);
    }

    #[tokio::test]
    async fn test_idle_scanner_is_not_resumed() {
        let gateway = gateway(FakeTransport::answering(200, "{}"));
        let scanner = FakeScanner::in_state(ScanState::Stopped);

        gateway
            .redeem("T:abc", &SessionAuth::anonymous(), &scanner)
            .await
            .unwrap();

        assert_eq!(scanner.resumes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_pause_failure_is_ignored() {
        let gateway = gateway(FakeTransport::answering(200, "{}"));
        let scanner = FakeScanner {
            fail_pause: true,
            ..FakeScanner::in_state(ScanState::Running)
        };

        let outcome = gateway
            .redeem("T:abc", &SessionAuth::anonymous(), &scanner)
            .await
            .unwrap();
        assert!(outcome.is_success());
        assert_eq!(gateway.transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_back_to_back_redemptions_issue_one_request() {
        let release = Arc::new(Notify::new());
        let transport = FakeTransport {
            release: Some(Arc::clone(&release)),
            ..FakeTransport::answering(200, "{}")
        };
        let gateway = gateway(transport);
        let auth = SessionAuth::anonymous();

        let first = gateway.redeem("T:first", &auth, &DetachedScanner);
        let second = async {
            // Let the first call take the guard and block in the transport.
            while !gateway.is_in_flight() {
                tokio::task::yield_now().await;
            }
            let dropped = gateway.redeem("T:second", &auth, &DetachedScanner).await;
            release.notify_one();
            dropped
        };

        let (first, second) = tokio::join!(first, second);
        assert!(first.unwrap().is_success());
        assert_eq!(second, None);
        let calls = gateway.transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].body["token"], "first");
        assert!(!gateway.is_in_flight());
    }

    #[tokio::test]
    async fn test_guard_released_for_next_scan() {
        let gateway = gateway(FakeTransport::answering(500, "{}"));
        let auth = SessionAuth::anonymous();

        assert!(gateway.redeem("T:a", &auth, &DetachedScanner).await.is_some());
        assert!(gateway.redeem("T:b", &auth, &DetachedScanner).await.is_some());
        assert_eq!(gateway.transport.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_long_token_is_sent() {
        let gateway = gateway(FakeTransport::answering(200, "{}"));
        let token = "a".repeat(5000);

        let outcome = gateway
            .redeem(&format!("T:{}|E:9", token), &SessionAuth::anonymous(), &DetachedScanner)
            .await
            .unwrap();

        assert!(outcome.is_success());
        let calls = gateway.transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].body["token"], token.as_str());
    }

    #[tokio::test]
    async fn test_reservation_blocks_until_dropped() {
        let gateway = Arc::new(gateway(FakeTransport::answering(200, "{}")));

        let reservation = gateway.try_reserve().expect("slot free");
        assert!(gateway.is_in_flight());
        assert!(gateway.try_reserve().is_none());
        assert_eq!(
            gateway.redeem("T:a", &SessionAuth::anonymous(), &DetachedScanner).await,
            None
        );

        drop(reservation);
        assert!(!gateway.is_in_flight());
        assert!(gateway.try_reserve().is_some());
        assert!(gateway.transport.calls().is_empty());
    }

    #[tokio::test]
    async fn test_reservation_redeems_and_frees_slot() {
        let gateway = Arc::new(gateway(FakeTransport::answering(200, r#"{"eventId": 4}"#)));
        let scanner = FakeScanner::in_state(ScanState::Running);

        let reservation = gateway.try_reserve().expect("slot free");
        let outcome = reservation
            .redeem("T:abc|E:4", &SessionAuth::anonymous(), &scanner)
            .await;

        assert_eq!(outcome.summary(), "Check-in confirmed (event 4)");
        assert!(!gateway.is_in_flight());
        assert_eq!(scanner.resumes.load(Ordering::SeqCst), 1);
        assert_eq!(gateway.transport.calls().len(), 1);
    }
}
