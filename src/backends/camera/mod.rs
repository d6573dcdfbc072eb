// SPDX-License-Identifier: GPL-3.0-only

//! Camera backend abstraction
//!
//! The scanner only talks to cameras through the traits in this module, so
//! the scan session can be driven by a fake pipeline in tests.
//!
//! ```text
//! ┌─────────────────────┐
//! │    ScanSession      │  ← bus polling, filter, lookups
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CaptureBackend trait│  ← start(device, surface)
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │CapturePipeline trait│  ← poll / recover_clock / stop
//! └──────────┬──────────┘
//!            │
//!            ▼
//!       ┌─────────┐
//!       │GStreamer│
//!       └─────────┘
//! ```

pub mod enumeration;
pub mod pipeline;
pub mod types;

pub use enumeration::{GstDeviceCatalog, select_camera};
pub use pipeline::{GstCaptureBackend, GstCapturePipeline};
pub use types::*;

/// Source of available camera devices
pub trait DeviceCatalog {
    /// Enumerate the cameras currently present
    ///
    /// An empty list is not an error; it disables scanning.
    fn list_devices(&self) -> BackendResult<Vec<CameraDevice>>;
}

/// Factory for running capture pipelines
pub trait CaptureBackend {
    /// Build a pipeline for `device` rendering to `surface` and start playback
    ///
    /// # Returns
    /// * `Ok(pipeline)` - Pipeline is playing, detections arrive via `poll`
    /// * `Err(BackendError)` - The pipeline could not be built; scanning is impossible
    fn start(
        &self,
        device: &CameraDevice,
        surface: DisplaySurface,
    ) -> BackendResult<Box<dyn CapturePipeline>>;
}

/// A running capture pipeline
pub trait CapturePipeline {
    /// Pop the next relevant bus message without blocking
    fn poll(&mut self) -> Option<BusMessage>;

    /// Select a new clock after [`BusMessage::ClockLost`] by pausing and resuming
    fn recover_clock(&mut self) -> BackendResult<()>;

    /// Stop playback and release the camera
    fn stop(&mut self) -> BackendResult<()>;

    /// Whether video is rendered to the requested surface
    fn has_preview(&self) -> bool {
        true
    }
}
