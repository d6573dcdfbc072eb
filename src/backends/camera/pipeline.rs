// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer capture pipeline with zbar barcode detection
//!
//! The pipeline captures from `v4l2src`, scales to a fixed low resolution,
//! runs the `zbar` element and renders to the requested display surface.
//! zbar posts an element message named `barcode` for every decoded symbol;
//! those are popped from the bus by [`CapturePipeline::poll`].

use super::types::*;
use super::{CaptureBackend, CapturePipeline};
use crate::constants::{capture, timing};
use gstreamer::prelude::*;
use gstreamer_app::AppSink;
use gstreamer_video::VideoInfo;
use gstreamer_video::prelude::*;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, error, info, warn};

static FRAME_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Bus message types the scanner reacts to
const WATCHED_MESSAGES: &[gstreamer::MessageType] = &[
    gstreamer::MessageType::Element,
    gstreamer::MessageType::Error,
    gstreamer::MessageType::Eos,
    gstreamer::MessageType::ClockLost,
];

/// Backend creating [`GstCapturePipeline`]s
#[derive(Debug, Default, Clone, Copy)]
pub struct GstCaptureBackend;

impl GstCaptureBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CaptureBackend for GstCaptureBackend {
    fn start(
        &self,
        device: &CameraDevice,
        surface: DisplaySurface,
    ) -> BackendResult<Box<dyn CapturePipeline>> {
        let pipeline = GstCapturePipeline::new(device, surface)?;
        Ok(Box::new(pipeline))
    }
}

/// Build the textual pipeline description for a display surface
///
/// The capture device is not part of the description, it is set on the
/// `videosrc` element after parsing so handles never need quoting.
pub fn pipeline_description(surface: &DisplaySurface) -> String {
    let sink = match surface {
        DisplaySurface::Appsink(_) => format!(
            "video/x-raw,format={} ! appsink name={}",
            capture::PREVIEW_FORMAT,
            capture::SINK_NAME
        ),
        DisplaySurface::Window(_) => format!("xvimagesink name={}", capture::SINK_NAME),
        // Opens its own window, can't be embedded
        DisplaySurface::Autovideosink => "autovideosink".to_string(),
        DisplaySurface::Discard => "fakesink sync=false".to_string(),
    };

    format!(
        "v4l2src do-timestamp=true name={src} ! videoconvert ! \
         video/x-raw,width={w},height={h},framerate={fps}/1 ! \
         zbar name={zbar} ! videoconvert ! {sink}",
        src = capture::SOURCE_NAME,
        w = capture::WIDTH,
        h = capture::HEIGHT,
        fps = capture::FRAMERATE,
        zbar = capture::DECODER_NAME,
        sink = sink,
    )
}

/// Translate a raw bus message into a scanner message
///
/// Returns `None` for messages the scanner ignores, e.g. element messages
/// from other elements than zbar.
pub fn translate_message(msg: &gstreamer::MessageRef) -> Option<BusMessage> {
    use gstreamer::MessageView;

    match msg.view() {
        MessageView::Element(element) => element
            .structure()
            .and_then(detection_from_structure)
            .map(BusMessage::Detection),
        MessageView::Eos(_) => Some(BusMessage::EndOfStream),
        MessageView::ClockLost(_) => Some(BusMessage::ClockLost),
        MessageView::Error(err) => Some(BusMessage::ElementError {
            source: msg.src().map(|src| src.name().to_string()),
            message: err.error().to_string(),
        }),
        _ => None,
    }
}

/// Extract a detection from a zbar `barcode` structure
pub fn detection_from_structure(s: &gstreamer::StructureRef) -> Option<Detection> {
    if !s.has_name(capture::BARCODE_MESSAGE) {
        return None;
    }
    let kind = s.get::<String>("type").ok()?;
    let symbol = s.get::<String>("symbol").ok()?;
    Some(Detection::new(Symbology::from_zbar_type(&kind), symbol))
}

/// Running capture pipeline
pub struct GstCapturePipeline {
    pipeline: gstreamer::Pipeline,
    bus: gstreamer::Bus,
    appsink: Option<AppSink>,
    /// False when the display sink could not be located by name
    has_preview: bool,
}

impl GstCapturePipeline {
    /// Parse, configure and start a pipeline for `device`
    pub fn new(device: &CameraDevice, surface: DisplaySurface) -> BackendResult<Self> {
        info!(device = %device, "Creating capture pipeline");

        gstreamer::init().map_err(|e| BackendError::NotAvailable(e.to_string()))?;

        let description = pipeline_description(&surface);
        debug!(pipeline = %description, "Parsing pipeline");

        let pipeline = gstreamer::parse::launch(&description)
            .map_err(|e| BackendError::InitializationFailed(e.to_string()))?
            .downcast::<gstreamer::Pipeline>()
            .map_err(|_| {
                BackendError::InitializationFailed("Parsed element is not a pipeline".to_string())
            })?;

        let bus = pipeline
            .bus()
            .ok_or_else(|| BackendError::InitializationFailed("No bus on pipeline".to_string()))?;

        let videosrc = pipeline
            .by_name(capture::SOURCE_NAME)
            .ok_or_else(|| BackendError::MissingElement(capture::SOURCE_NAME.to_string()))?;
        if device.has_device_path() {
            videosrc.set_property("device", device.handle.as_str());
        } else {
            warn!(handle = %device.handle, "Handle is not a device node, using default device");
        }

        let mut appsink = None;
        let has_preview = match (pipeline.by_name(capture::SINK_NAME), surface) {
            (None, _) => {
                debug!("No named display sink, preview is not embedded");
                false
            }
            (Some(sink), DisplaySurface::Appsink(sender)) => {
                let sink = sink.dynamic_cast::<AppSink>().map_err(|_| {
                    BackendError::InitializationFailed("Failed to cast appsink".to_string())
                })?;
                configure_appsink(&sink, sender);
                appsink = Some(sink);
                true
            }
            (Some(sink), DisplaySurface::Window(handle)) => {
                embed_into_window(&sink, handle)?;
                true
            }
            (Some(_), _) => true,
        };

        pipeline.set_state(gstreamer::State::Playing).map_err(|e| {
            BackendError::StateChange(format!("Failed to start pipeline: {}", e))
        })?;

        let (result, state, pending) = pipeline.state(start_state_wait());
        debug!(result = ?result, state = ?state, pending = ?pending, "Pipeline state");
        if state != gstreamer::State::Playing {
            debug!("Pipeline is still prerolling, errors arrive on the bus");
        }

        info!(has_preview, "Capture pipeline running");

        Ok(Self {
            pipeline,
            bus,
            appsink,
            has_preview,
        })
    }

    fn clear_callbacks(&self) {
        if let Some(appsink) = &self.appsink {
            appsink.set_callbacks(gstreamer_app::AppSinkCallbacks::builder().build());
        }
    }
}

impl CapturePipeline for GstCapturePipeline {
    fn poll(&mut self) -> Option<BusMessage> {
        while let Some(msg) = self.bus.pop_filtered(WATCHED_MESSAGES) {
            if let Some(translated) = translate_message(&msg) {
                return Some(translated);
            }
        }
        None
    }

    fn recover_clock(&mut self) -> BackendResult<()> {
        info!("Clock lost, cycling pipeline through PAUSED");
        self.pipeline
            .set_state(gstreamer::State::Paused)
            .map_err(|e| BackendError::StateChange(e.to_string()))?;
        self.pipeline
            .set_state(gstreamer::State::Playing)
            .map_err(|e| BackendError::StateChange(e.to_string()))?;
        Ok(())
    }

    fn stop(&mut self) -> BackendResult<()> {
        info!("Stopping capture pipeline");
        self.clear_callbacks();

        self.pipeline
            .set_state(gstreamer::State::Null)
            .map_err(|e| BackendError::StateChange(format!("Failed to stop pipeline: {}", e)))?;

        let (result, state, _) = self.pipeline.state(gstreamer::ClockTime::from_seconds(
            timing::STOP_TIMEOUT_SECS,
        ));
        match result {
            Ok(_) => info!(state = ?state, "Capture pipeline stopped"),
            Err(e) => debug!(error = ?e, state = ?state, "Pipeline state change had issues"),
        }
        Ok(())
    }

    fn has_preview(&self) -> bool {
        self.has_preview
    }
}

impl Drop for GstCapturePipeline {
    fn drop(&mut self) {
        self.clear_callbacks();
        // Release the camera even when stop() was never called
        let _ = self.pipeline.set_state(gstreamer::State::Null);
    }
}

/// Timeout for the state query right after starting playback
fn start_state_wait() -> gstreamer::ClockTime {
    gstreamer::ClockTime::from_nseconds(timing::START_STATE_WAIT.as_nanos() as u64)
}

/// Hand the video overlay of `sink` a native window
fn embed_into_window(sink: &gstreamer::Element, handle: usize) -> BackendResult<()> {
    sink.set_state(gstreamer::State::Ready)
        .map_err(|e| BackendError::StateChange(e.to_string()))?;
    let overlay = sink
        .clone()
        .dynamic_cast::<gstreamer_video::VideoOverlay>()
        .map_err(|_| BackendError::Other("Display sink has no video overlay".to_string()))?;
    // SAFETY: `handle` names a native window that outlives the pipeline; the
    // embedder or the user passing `--window` is responsible for that.
    unsafe {
        overlay.set_window_handle(handle);
    }
    debug!(handle, "Video overlay embedded");
    Ok(())
}

/// Forward RGBA samples from the appsink into the preview channel
fn configure_appsink(appsink: &AppSink, mut sender: FrameSender) {
    appsink.set_property("sync", false);
    appsink.set_property("max-buffers", capture::MAX_BUFFERS);
    appsink.set_property("drop", true);
    appsink.set_property("enable-last-sample", false);

    appsink.set_callbacks(
        gstreamer_app::AppSinkCallbacks::builder()
            .new_sample(move |appsink| {
                let frame_num = FRAME_COUNTER.fetch_add(1, Ordering::Relaxed);

                let sample = appsink.pull_sample().map_err(|e| {
                    error!(frame = frame_num, error = ?e, "Failed to pull sample");
                    gstreamer::FlowError::Eos
                })?;
                let buffer = sample.buffer().ok_or(gstreamer::FlowError::Error)?;
                let caps = sample.caps().ok_or(gstreamer::FlowError::Error)?;
                let info = VideoInfo::from_caps(caps).map_err(|_| gstreamer::FlowError::Error)?;
                let map = buffer
                    .map_readable()
                    .map_err(|_| gstreamer::FlowError::Error)?;

                let frame = PreviewFrame {
                    width: info.width(),
                    height: info.height(),
                    stride: info.stride()[0] as u32,
                    data: Arc::from(map.as_slice()),
                };

                // Drop frames when the UI is behind
                if let Err(e) = sender.try_send(frame)
                    && frame_num % 30 == 0
                {
                    debug!(frame = frame_num, error = ?e, "Preview frame dropped");
                }

                Ok(gstreamer::FlowSuccess::Ok)
            })
            .build(),
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_description_contains_decoder_and_caps() {
        let desc = pipeline_description(&DisplaySurface::Discard);
        assert!(desc.starts_with("v4l2src do-timestamp=true name=videosrc"));
        assert!(desc.contains("video/x-raw,width=640,height=480,framerate=10/1"));
        assert!(desc.contains("zbar name=zbar"));
        assert!(desc.ends_with("fakesink sync=false"));
    }

    #[test]
    fn test_start_state_query_does_not_wait() {
        assert_eq!(start_state_wait(), gstreamer::ClockTime::ZERO);
    }

    #[test]
    fn test_description_sink_per_surface() {
        let (sender, _receiver) = futures::channel::mpsc::channel(1);
        assert!(pipeline_description(&DisplaySurface::Appsink(sender))
            .ends_with("video/x-raw,format=RGBA ! appsink name=imagesink"));
        assert!(pipeline_description(&DisplaySurface::Window(42))
            .ends_with("xvimagesink name=imagesink"));
        // autovideosink is left unnamed so it is never embedded
        let auto = pipeline_description(&DisplaySurface::Autovideosink);
        assert!(auto.ends_with("autovideosink"));
        assert!(!auto.contains("name=imagesink"));
    }

    fn barcode(kind: &str, symbol: &str) -> gstreamer::Structure {
        gstreamer::Structure::builder("barcode")
            .field("type", kind)
            .field("symbol", symbol)
            .field("quality", 1i32)
            .build()
    }

    #[test]
    fn test_detection_from_barcode_structure() {
        gstreamer::init().unwrap();
        let s = barcode("EAN-13", "4006381333931");
        assert_eq!(
            detection_from_structure(&s),
            Some(Detection::new(Symbology::Ean13, "4006381333931"))
        );
    }

    #[test]
    fn test_other_structures_are_ignored() {
        gstreamer::init().unwrap();
        let s = gstreamer::Structure::builder("level")
            .field("type", "EAN-13")
            .field("symbol", "1")
            .build();
        assert_eq!(detection_from_structure(&s), None);

        let incomplete = gstreamer::Structure::builder("barcode")
            .field("type", "EAN-13")
            .build();
        assert_eq!(detection_from_structure(&incomplete), None);
    }

    #[test]
    fn test_translate_element_and_eos_messages() {
        gstreamer::init().unwrap();

        let msg = gstreamer::message::Element::new(barcode("QR-Code", "hello"));
        assert_eq!(
            translate_message(&msg),
            Some(BusMessage::Detection(Detection::new(
                Symbology::Other("QR-Code".into()),
                "hello"
            )))
        );

        let eos = gstreamer::message::Eos::new();
        assert_eq!(translate_message(&eos), Some(BusMessage::EndOfStream));
    }

    #[test]
    fn test_translate_error_message() {
        gstreamer::init().unwrap();
        let msg = gstreamer::message::Error::new(
            gstreamer::ResourceError::NotFound,
            "Cannot identify device '/dev/video9'.",
        );
        match translate_message(&msg) {
            Some(BusMessage::ElementError { source, message }) => {
                assert_eq!(source, None);
                assert_eq!(message, "Cannot identify device '/dev/video9'.");
            }
            other => panic!("unexpected translation: {:?}", other),
        }
    }
}
