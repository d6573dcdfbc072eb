// SPDX-License-Identifier: GPL-3.0-only

//! Scan session: pipeline lifecycle and bus bridging
//!
//! The session owns the running pipeline and the filter state. Front-ends
//! call [`ScanSession::poll`] on a fixed interval from a single thread; it
//! drains the pipeline bus in arrival order and hands completed lookups to
//! the sink. Lookups run on the tokio runtime and report back through a
//! channel, so the filter state is never touched concurrently.

use super::filter::{ScanDecision, ScanFilter};
use super::lookup::{LookupClient, LookupOutcome, LookupResult};
use super::sink::PresentationSink;
use crate::backends::camera::{
    BusMessage, CameraDevice, CaptureBackend, CapturePipeline, Detection, DisplaySurface,
};
use crate::constants::scanning;
use crate::errors::PipelineError;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, error, info, warn};

pub struct ScanSession {
    backend: Box<dyn CaptureBackend>,
    pipeline: Option<Box<dyn CapturePipeline>>,
    device: Option<CameraDevice>,
    filter: ScanFilter,
    client: LookupClient,
    runtime: tokio::runtime::Handle,
    results_tx: UnboundedSender<LookupResult>,
    results_rx: UnboundedReceiver<LookupResult>,
}

impl ScanSession {
    pub fn new(
        backend: Box<dyn CaptureBackend>,
        client: LookupClient,
        runtime: tokio::runtime::Handle,
    ) -> Self {
        let (results_tx, results_rx) = unbounded_channel();
        Self {
            backend,
            pipeline: None,
            device: None,
            filter: ScanFilter::new(),
            client,
            runtime,
            results_tx,
            results_rx,
        }
    }

    pub fn is_running(&self) -> bool {
        self.pipeline.is_some()
    }

    /// Camera of the running session
    pub fn device(&self) -> Option<&CameraDevice> {
        self.device.as_ref()
    }

    /// Whether the running pipeline renders to the requested surface
    pub fn has_preview(&self) -> bool {
        self.pipeline.as_ref().is_some_and(|p| p.has_preview())
    }

    pub fn client(&self) -> &LookupClient {
        &self.client
    }

    /// Start capturing from `device`
    ///
    /// A construction failure means no scanning is possible at all; callers
    /// treat it as fatal.
    pub fn start(
        &mut self,
        device: &CameraDevice,
        surface: DisplaySurface,
    ) -> Result<(), PipelineError> {
        if self.is_running() {
            return Err(PipelineError::AlreadyRunning);
        }

        info!(device = %device, "Starting scan session");
        let pipeline = self.backend.start(device, surface).map_err(|e| {
            error!(device = %device, error = %e, "Failed to build capture pipeline");
            PipelineError::from(e)
        })?;

        self.pipeline = Some(pipeline);
        self.device = Some(device.clone());
        Ok(())
    }

    /// Tear the pipeline down and forget the last accepted code
    ///
    /// Lookups in flight are not cancelled, their results still arrive
    /// through [`poll`](Self::poll).
    pub fn stop(&mut self) {
        if let Some(mut pipeline) = self.pipeline.take() {
            if let Err(e) = pipeline.stop() {
                warn!(error = %e, "Pipeline did not stop cleanly");
            }
            info!("Scan session stopped");
        }
        self.device = None;
        self.filter.reset();
    }

    /// Handle pending bus messages and completed lookups
    pub fn poll(&mut self, sink: &mut dyn PresentationSink) {
        let mut messages = Vec::new();
        if let Some(pipeline) = self.pipeline.as_mut() {
            while messages.len() < scanning::MAX_MESSAGES_PER_POLL {
                match pipeline.poll() {
                    Some(msg) => messages.push(msg),
                    None => break,
                }
            }
        }

        for msg in messages {
            self.handle_message(msg, sink);
        }

        while let Ok(result) = self.results_rx.try_recv() {
            sink.on_product_result(&result.code, &result.outcome);
        }
    }

    fn handle_message(&mut self, msg: BusMessage, sink: &mut dyn PresentationSink) {
        match msg {
            BusMessage::Detection(detection) => self.handle_detection(&detection, sink),
            BusMessage::EndOfStream => {
                warn!("End of stream");
                sink.on_error("Error: End of stream");
            }
            BusMessage::ClockLost => {
                sink.on_error("Error: Lost clock, resetting");
                if let Some(pipeline) = self.pipeline.as_mut()
                    && let Err(e) = pipeline.recover_clock()
                {
                    error!(error = %e, "Failed to recover pipeline clock");
                    sink.on_error(&format!("Error: {}", e));
                }
            }
            BusMessage::ElementError { source, message } => {
                error!(source = ?source, error = %message, "Pipeline element error");
                let text = match source {
                    Some(source) => format!("Error in {}: {}", source, message),
                    None => format!("Error: {}", message),
                };
                sink.on_error(&text);
            }
        }
    }

    fn handle_detection(&mut self, detection: &Detection, sink: &mut dyn PresentationSink) {
        match self.filter.process(detection) {
            ScanDecision::Lookup { code } => {
                let request = self.client.request(&code);
                if request.credential.is_none() {
                    // Nothing to send, answer right away
                    sink.on_product_result(&code, &LookupOutcome::NoCredential);
                } else {
                    debug!(code = %code, "Issuing lookup");
                    self.client
                        .spawn(&self.runtime, request, self.results_tx.clone());
                }
            }
            ScanDecision::Duplicate => {}
            decision => {
                if let Some(message) = decision.status_message() {
                    sink.on_status(&message);
                }
            }
        }
    }
}

impl Drop for ScanSession {
    fn drop(&mut self) {
        self.stop();
    }
}
