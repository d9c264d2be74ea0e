//! Scanning: the live capture state machine and single-shot image decoding.
//!
//! Both sit on injected capabilities. [`capture::CaptureDevice`] turns a
//! camera (or any other source) into a stream of payloads, and
//! [`snapshot::FrameDecoder`] turns one raster into a payload.

pub mod capture;
pub mod snapshot;
pub mod transition;

pub use capture::{
    CaptureDevice, CaptureSession, DecodeEvents, DecodeSink, DecoderHandle, DetachedScanner,
    ScanControl,
};
pub use snapshot::{
    decode_region, DecodeRegion, DisplaySize, FrameDecoder, PixelRect, Raster, Selection,
    SnapshotDecodeSession, MIN_SELECTION_PX,
};
pub use transition::{next_state, ScanEvent, ScanState};
