//! # checkin-core
//!
//! Event check-in over QR codes: read a ticket out of whatever a scanner
//! decoded, work out who is scanning, and redeem the ticket against the
//! backend without ever having two redemptions outstanding.
//!
//! ## Design Principles
//!
//! - **Pure at the edges**: payload and session resolution are total
//!   functions. Bad input degrades to `None` fields, never to an error.
//! - **Injected capabilities**: the camera/decoder, the session store, and
//!   the HTTP transport are traits. Nothing reaches for a global.
//! - **One outcome per attempt**: redemption failures are values
//!   ([`RedemptionOutcome`]), not errors.
//! - **Async**: capture and redemption run on tokio.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use checkin_core::{resolve, CheckinEngine};
//!
//! let ticket = resolve("T:abc123|E:9|S:42");
//! assert_eq!(ticket.event_id, Some(9));
//!
//! let engine = CheckinEngine::new()?;
//! let outcome = engine.redeem_once("T:abc123|E:9").await;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod patterns;
pub mod payload;
pub mod redeem;
pub mod scan;
pub mod scan_loop;
pub mod session;
pub mod storage;

// Re-export commonly used items at crate root
pub use config::{load_config, CheckinConfig, SessionKeys};
pub use engine::CheckinEngine;
pub use error::{CaptureError, ConfigError, DecodeError, Result, TransportError};
pub use payload::{detect, resolve, Detection, PayloadFormat, RawPayload, ResolvedTicket};
pub use redeem::{
    FailureKind, HttpTransport, RedeemTransport, RedemptionGateway, RedemptionOutcome,
    Reservation, TransportResponse,
};
pub use scan::{
    CaptureDevice, CaptureSession, DecodeEvents, DecodeSink, DecoderHandle, DetachedScanner,
    FrameDecoder, Raster, ScanControl, ScanState, Selection, SnapshotDecodeSession,
};
pub use scan_loop::{ScanLoop, ScanReport};
pub use session::{decode_claims, resolve_session, resolve_session_with_keys, SessionAuth, UserId};
pub use storage::{JsonFileStore, KeyValueStore, MemoryStore};
