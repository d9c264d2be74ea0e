//! End-to-end flow through the public API: stored session, live scanner,
//! guarded redemption.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use checkin_core::{
    CaptureDevice, CaptureError, CaptureSession, CheckinConfig, CheckinEngine, DecodeError,
    DecodeSink, DecoderHandle, FailureKind, FrameDecoder, JsonFileStore, Raster, RedeemTransport,
    RedemptionOutcome, ScanState, Selection, SnapshotDecodeSession, TransportError,
    TransportResponse,
};
use checkin_core::scan::DisplaySize;
use checkin_protocol::RedeemRequest;
use serde_json::{json, Value};

#[derive(Default)]
struct RecordingTransport {
    requests: Mutex<Vec<(Value, Option<String>)>>,
}

#[async_trait]
impl RedeemTransport for RecordingTransport {
    async fn post_json(
        &self,
        _url: &str,
        body: &RedeemRequest,
        authorization: Option<&str>,
    ) -> Result<TransportResponse, TransportError> {
        self.requests.lock().unwrap().push((
            serde_json::to_value(body).unwrap(),
            authorization.map(str::to_string),
        ));
        let reply = match body.token.as_str() {
            "used" => (409, json!({"message": "Ticket already redeemed"})),
            _ => (200, json!({"eventId": body.event_id, "studentId": "s-1"})),
        };
        Ok(TransportResponse::new(reply.0, reply.1.to_string()))
    }
}

/// Hands the sink to the test so it can play the camera.
#[derive(Clone, Default)]
struct ScriptedDevice {
    sink: Arc<Mutex<Option<DecodeSink>>>,
}

impl ScriptedDevice {
    fn scan(&self, payload: &str) {
        if let Some(sink) = self.sink.lock().unwrap().as_ref() {
            sink.send(payload.to_string()).unwrap();
        }
    }
}

struct ScriptedHandle {
    sink: Arc<Mutex<Option<DecodeSink>>>,
}

#[async_trait]
impl DecoderHandle for ScriptedHandle {
    async fn start(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    async fn pause(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    async fn resume(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    fn release(&mut self) {
        self.sink.lock().unwrap().take();
    }
}

impl CaptureDevice for ScriptedDevice {
    fn open(&mut self, sink: DecodeSink) -> Result<Box<dyn DecoderHandle>, CaptureError> {
        *self.sink.lock().unwrap() = Some(sink);
        Ok(Box::new(ScriptedHandle {
            sink: Arc::clone(&self.sink),
        }))
    }
}

fn make_token(claims: Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.signature", header, payload)
}

fn engine_with_store(contents: Value) -> (CheckinEngine<RecordingTransport>, tempfile::TempDir) {
    let temp_dir = tempfile::tempdir().expect("temp dir");
    let path = temp_dir.path().join("storage.json");
    std::fs::write(&path, contents.to_string()).unwrap();

    let config = CheckinConfig {
        base_url: "https://shop.test".to_string(),
        ..CheckinConfig::default()
    };
    let engine = CheckinEngine::with_parts(
        config,
        Arc::new(JsonFileStore::open(&path)),
        RecordingTransport::default(),
    );
    (engine, temp_dir)
}

#[tokio::test]
async fn stored_session_is_decoded_and_sent() {
    let token = make_token(json!({"sub": "1234", "roles": ["ORGANIZER"]}));
    let (engine, _dir) = engine_with_store(json!({"storefront:auth": {"accessToken": token.clone()}}));

    let auth = engine.session();
    assert_eq!(auth.role.as_deref(), Some("ORGANIZER"));
    assert_eq!(auth.user_id.map(|id| id.to_string()).as_deref(), Some("1234"));

    let outcome = engine
        .redeem_once("https://x.test/r?token=zz9&eid=5")
        .await
        .expect("not dropped");
    assert_eq!(
        outcome,
        RedemptionOutcome::Redeemed {
            event_id: Some(5),
            student_id: Some("s-1".to_string()),
            message: "Check-in confirmed".to_string(),
        }
    );

    let requests = engine.gateway().transport().requests.lock().unwrap().clone();
    assert_eq!(requests[0].0, json!({"token": "zz9", "eventId": 5}));
    assert_eq!(requests[0].1, Some(format!("Bearer {}", token)));
}

#[tokio::test]
async fn live_scans_are_redeemed_one_at_a_time() {
    let (engine, _dir) = engine_with_store(json!({}));
    let device = ScriptedDevice::default();
    let session = Arc::new(CaptureSession::new(device.clone()));
    let events = session.start().await.expect("start");
    let scan_loop = engine.scan_loop(Arc::clone(&session));

    // The same code decoded twice back to back, then a used ticket.
    device.scan("T:fresh|E:7");
    device.scan("T:fresh|E:7");

    let mut summaries = Vec::new();
    let mut sent_used = false;
    let report = scan_loop
        .run(events, |outcome| {
            summaries.push(outcome.summary());
            if !sent_used {
                sent_used = true;
                device.scan("token=used;eventId=7");
            } else {
                device.sink.lock().unwrap().take();
            }
        })
        .await;

    assert_eq!(report.redeemed, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.dropped, 1);
    assert_eq!(
        summaries,
        vec![
            "Check-in confirmed (event 7, student s-1)".to_string(),
            "Ticket already redeemed".to_string(),
        ]
    );
    assert_eq!(session.state().await, ScanState::Running);

    let requests = engine.gateway().transport().requests.lock().unwrap().clone();
    assert_eq!(requests.len(), 2);
    assert!(requests.iter().all(|(_, auth)| auth.is_none()));
}

#[tokio::test]
async fn blank_scan_is_reported_without_a_request() {
    let (engine, _dir) = engine_with_store(json!({}));
    let outcome = engine.redeem_once("").await.expect("not dropped");

    match outcome {
        RedemptionOutcome::Failed { kind, .. } => assert_eq!(kind, FailureKind::Invalid),
        other => panic!("expected invalid, got {:?}", other),
    }
    assert!(engine.gateway().transport().requests.lock().unwrap().is_empty());
}

struct FixedDecoder(&'static str);

impl FrameDecoder for FixedDecoder {
    fn decode(&self, _frame: &Raster) -> Result<String, DecodeError> {
        Ok(self.0.to_string())
    }
}

#[tokio::test]
async fn snapshot_decode_feeds_redemption() {
    let (engine, _dir) = engine_with_store(json!({"token": "legacy"}));
    let mut snapshot = SnapshotDecodeSession::new(FixedDecoder("T:photo|E:11"));
    snapshot.load(
        Raster::new(8, 8, vec![255; 8 * 8 * 4]).unwrap(),
        DisplaySize {
            width: 8.0,
            height: 8.0,
        },
    );

    let raw = snapshot
        .decode(Some(Selection::new(6.0, 6.0, -5.0, -5.0)))
        .expect("decoded");
    let outcome = engine.redeem_once(&raw).await.expect("not dropped");

    assert!(outcome.is_success());
    let requests = engine.gateway().transport().requests.lock().unwrap().clone();
    assert_eq!(requests[0].0, json!({"token": "photo", "eventId": 11}));
    assert_eq!(requests[0].1.as_deref(), Some("Bearer legacy"));
}
