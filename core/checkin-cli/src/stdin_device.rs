//! A capture device that reads payloads from stdin, one per line.
//!
//! Stands in for a camera: pipe a hardware scanner or a file of payloads
//! into `checkin watch`. Pausing is a no-op, like most real decoders.

use async_trait::async_trait;
use checkin_core::{CaptureDevice, CaptureError, DecodeSink, DecoderHandle};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::task::JoinHandle;

type LineSource = Box<dyn AsyncBufRead + Send + Unpin>;
type SourceFactory = Box<dyn FnMut() -> LineSource + Send>;

pub struct LineDevice {
    source: SourceFactory,
}

impl LineDevice {
    pub fn stdin() -> Self {
        Self::from_source(|| -> LineSource { Box::new(BufReader::new(tokio::io::stdin())) })
    }

    pub fn from_source<F>(source: F) -> Self
    where
        F: FnMut() -> LineSource + Send + 'static,
    {
        Self {
            source: Box::new(source),
        }
    }
}

impl CaptureDevice for LineDevice {
    fn open(&mut self, sink: DecodeSink) -> Result<Box<dyn DecoderHandle>, CaptureError> {
        Ok(Box::new(LineHandle {
            pending: Some(((self.source)(), sink)),
            reader: None,
        }))
    }
}

struct LineHandle {
    pending: Option<(LineSource, DecodeSink)>,
    reader: Option<JoinHandle<()>>,
}

impl LineHandle {
    fn abort_reader(&mut self) {
        if let Some(task) = self.reader.take() {
            task.abort();
        }
    }
}

#[async_trait]
impl DecoderHandle for LineHandle {
    async fn start(&mut self) -> Result<(), CaptureError> {
        let (source, sink) = self
            .pending
            .take()
            .ok_or_else(|| CaptureError::ControlFailed {
                action: "start",
                details: "reader already started".to_string(),
            })?;

        let task = tokio::spawn(async move {
            let mut lines = source.lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        if sink.send(line).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(err) => {
                        tracing::warn!(error = %err, "Failed to read payload line");
                        break;
                    }
                }
            }
        });

        self.reader = Some(task);
        Ok(())
    }

    async fn pause(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    async fn resume(&mut self) -> Result<(), CaptureError> {
        Ok(())
    }

    async fn stop(&mut self) -> Result<(), CaptureError> {
        self.abort_reader();
        Ok(())
    }

    fn release(&mut self) {
        self.abort_reader();
        self.pending = None;
    }
}
