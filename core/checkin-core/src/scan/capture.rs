//! Live capture session over an injected decoder capability.
//!
//! The session owns at most one decoder handle at a time. Every path that
//! drops a handle releases it first: restart, shutdown, a failed start, a
//! cancelled start, and dropping the session itself.

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

use super::transition::{next_state, ScanEvent, ScanState};
use crate::error::CaptureError;
use crate::payload::RawPayload;

/// Where a running decoder pushes each payload it reads.
pub type DecodeSink = mpsc::UnboundedSender<RawPayload>;
/// Payloads in the order the decoder emitted them.
pub type DecodeEvents = mpsc::UnboundedReceiver<RawPayload>;

/// A source of decoder instances (camera, video element, stdin, ...).
pub trait CaptureDevice: Send {
    /// Creates a decoder that will push into `sink` once started.
    fn open(&mut self, sink: DecodeSink) -> Result<Box<dyn DecoderHandle>, CaptureError>;
}

/// One acquired decoder instance.
#[async_trait]
pub trait DecoderHandle: Send {
    async fn start(&mut self) -> Result<(), CaptureError>;

    /// Best effort; the decoder may keep emitting while paused.
    async fn pause(&mut self) -> Result<(), CaptureError>;

    async fn resume(&mut self) -> Result<(), CaptureError>;

    async fn stop(&mut self) -> Result<(), CaptureError>;

    /// Frees the underlying device and drops the sink. Must not fail and
    /// must tolerate repeated calls.
    fn release(&mut self);
}

/// Pause/resume surface the redemption gateway coordinates with.
#[async_trait]
pub trait ScanControl: Send + Sync {
    async fn state(&self) -> ScanState;
    async fn pause(&self) -> Result<(), CaptureError>;
    async fn resume(&self) -> Result<(), CaptureError>;
}

/// A scanner that is never running, for one-shot redemptions.
#[derive(Debug, Clone, Copy, Default)]
pub struct DetachedScanner;

#[async_trait]
impl ScanControl for DetachedScanner {
    async fn state(&self) -> ScanState {
        ScanState::Idle
    }

    async fn pause(&self) -> Result<(), CaptureError> {
        Ok(())
    }

    async fn resume(&self) -> Result<(), CaptureError> {
        Ok(())
    }
}

/// Releases a handle unless it was handed off with [`ReleaseOnDrop::into_inner`].
struct ReleaseOnDrop(Option<Box<dyn DecoderHandle>>);

impl ReleaseOnDrop {
    fn handle(&mut self) -> Option<&mut Box<dyn DecoderHandle>> {
        self.0.as_mut()
    }

    fn into_inner(mut self) -> Option<Box<dyn DecoderHandle>> {
        self.0.take()
    }
}

impl Drop for ReleaseOnDrop {
    fn drop(&mut self) {
        if let Some(mut handle) = self.0.take() {
            handle.release();
        }
    }
}

struct Inner<D> {
    device: D,
    handle: Option<Box<dyn DecoderHandle>>,
    state: ScanState,
}

impl<D> Inner<D> {
    fn apply(&mut self, event: ScanEvent) {
        let next = next_state(self.state, event);
        if next != self.state {
            debug!(from = %self.state, to = %next, "Capture state changed");
        }
        self.state = next;
    }

    /// Stops and releases the current handle, if any.
    async fn teardown(&mut self) {
        if let Some(handle) = self.handle.take() {
            let mut guard = ReleaseOnDrop(Some(handle));
            if let Some(handle) = guard.handle() {
                if let Err(err) = handle.stop().await {
                    debug!(error = %err, "Decoder stop failed during teardown");
                }
            }
            drop(guard);
            self.apply(ScanEvent::TornDown);
        }
    }
}

pub struct CaptureSession<D: CaptureDevice> {
    inner: Mutex<Inner<D>>,
}

impl<D: CaptureDevice> CaptureSession<D> {
    pub fn new(device: D) -> Self {
        Self {
            inner: Mutex::new(Inner {
                device,
                handle: None,
                state: ScanState::Idle,
            }),
        }
    }

    pub async fn state(&self) -> ScanState {
        self.inner.lock().await.state
    }

    /// Tears down any previous decoder, then acquires and starts a new one.
    ///
    /// Calling this repeatedly is safe: each call leaves exactly one running
    /// decoder. Returns the stream its payloads arrive on.
    pub async fn start(&self) -> Result<DecodeEvents, CaptureError> {
        let mut inner = self.inner.lock().await;
        inner.teardown().await;

        let (sink, events) = mpsc::unbounded_channel();
        let mut pending = ReleaseOnDrop(Some(inner.device.open(sink)?));
        if let Some(handle) = pending.handle() {
            handle.start().await?;
        }

        inner.handle = pending.into_inner();
        inner.apply(ScanEvent::Started);
        info!("Capture session started");
        Ok(events)
    }

    pub async fn pause(&self) -> Result<(), CaptureError> {
        let mut inner = self.inner.lock().await;
        if inner.state != ScanState::Running {
            return Ok(());
        }
        inner.apply(ScanEvent::PauseRequested);
        match inner.handle.as_mut() {
            Some(handle) => handle.pause().await,
            None => Ok(()),
        }
    }

    pub async fn resume(&self) -> Result<(), CaptureError> {
        let mut inner = self.inner.lock().await;
        if inner.state != ScanState::Paused {
            return Ok(());
        }
        inner.apply(ScanEvent::ResumeRequested);
        match inner.handle.as_mut() {
            Some(handle) => handle.resume().await,
            None => Ok(()),
        }
    }

    /// Stops decoding but keeps the device acquired until teardown.
    pub async fn stop(&self) -> Result<(), CaptureError> {
        let mut inner = self.inner.lock().await;
        if !matches!(inner.state, ScanState::Running | ScanState::Paused) {
            return Err(CaptureError::NotRunning);
        }
        inner.apply(ScanEvent::StopRequested);
        match inner.handle.as_mut() {
            Some(handle) => handle.stop().await,
            None => Ok(()),
        }
    }

    /// Stops and releases the decoder. The session can be started again.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        inner.teardown().await;
        inner.apply(ScanEvent::TornDown);
        info!("Capture session shut down");
    }
}

impl<D: CaptureDevice> Drop for CaptureSession<D> {
    fn drop(&mut self) {
        if let Some(mut handle) = self.inner.get_mut().handle.take() {
            handle.release();
        }
    }
}

#[async_trait]
impl<D: CaptureDevice> ScanControl for CaptureSession<D> {
    async fn state(&self) -> ScanState {
        CaptureSession::state(self).await
    }

    async fn pause(&self) -> Result<(), CaptureError> {
        CaptureSession::pause(self).await
    }

    async fn resume(&self) -> Result<(), CaptureError> {
        CaptureSession::resume(self).await
    }
}
