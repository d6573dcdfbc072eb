// SPDX-License-Identifier: GPL-3.0-only

//! Camera enumeration through the GStreamer device monitor

use super::DeviceCatalog;
use super::types::{BackendError, BackendResult, CameraDevice};
use crate::constants::capture;
use gstreamer::prelude::*;
use tracing::{debug, info, warn};

/// Device catalog backed by `gstreamer::DeviceMonitor`
#[derive(Debug, Default, Clone, Copy)]
pub struct GstDeviceCatalog;

impl GstDeviceCatalog {
    pub fn new() -> Self {
        Self
    }
}

impl DeviceCatalog for GstDeviceCatalog {
    fn list_devices(&self) -> BackendResult<Vec<CameraDevice>> {
        gstreamer::init().map_err(|e| BackendError::NotAvailable(e.to_string()))?;

        let monitor = gstreamer::DeviceMonitor::new();
        if monitor
            .add_filter(Some(capture::DEVICE_CLASS), None)
            .is_none()
        {
            warn!("Device monitor rejected the video source filter");
        }

        if let Err(e) = monitor.start() {
            // No device providers at all behaves like an empty system
            warn!(error = %e, "Device monitor failed to start");
            return Ok(Vec::new());
        }

        let cameras: Vec<CameraDevice> = monitor
            .devices()
            .into_iter()
            .map(|device| {
                let name = device.display_name().to_string();
                let properties = device.properties();
                let api = properties
                    .as_ref()
                    .and_then(|p| p.get::<String>("device.api").ok());
                let path = properties
                    .as_ref()
                    .and_then(|p| p.get::<String>("device.path").ok());
                let handle = device_handle(&name, api.as_deref(), path.as_deref());
                debug!(name = %name, api = ?api, handle = %handle, "Found video source");
                CameraDevice { name, handle }
            })
            .collect();

        monitor.stop();

        info!(count = cameras.len(), "Cameras enumerated");
        Ok(cameras)
    }
}

/// Pick the handle for a device
///
/// V4L2 devices are addressed by their device node, everything else by the
/// display name.
pub fn device_handle(name: &str, api: Option<&str>, path: Option<&str>) -> String {
    match (api, path) {
        (Some("v4l2"), Some(path)) if !path.is_empty() => path.to_string(),
        _ => name.to_string(),
    }
}

/// Select a camera by index, preferring `preferred_handle` when no index is given
pub fn select_camera<'a>(
    cameras: &'a [CameraDevice],
    index: Option<usize>,
    preferred_handle: Option<&str>,
) -> Option<&'a CameraDevice> {
    match index {
        Some(i) => cameras.get(i),
        None => preferred_handle
            .and_then(|handle| cameras.iter().find(|c| c.handle == handle))
            .or_else(|| cameras.first()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cam(name: &str, handle: &str) -> CameraDevice {
        CameraDevice {
            name: name.into(),
            handle: handle.into(),
        }
    }

    #[test]
    fn test_v4l2_device_uses_path() {
        assert_eq!(
            device_handle("Webcam", Some("v4l2"), Some("/dev/video2")),
            "/dev/video2"
        );
    }

    #[test]
    fn test_other_api_uses_display_name() {
        assert_eq!(device_handle("Webcam", Some("libcamera"), Some("/x")), "Webcam");
        assert_eq!(device_handle("Webcam", None, None), "Webcam");
        assert_eq!(device_handle("Webcam", Some("v4l2"), Some("")), "Webcam");
    }

    #[test]
    fn test_select_camera() {
        let cameras = vec![cam("A", "/dev/video0"), cam("B", "/dev/video2")];

        assert_eq!(select_camera(&cameras, Some(1), None), Some(&cameras[1]));
        assert_eq!(select_camera(&cameras, Some(2), None), None);
        assert_eq!(
            select_camera(&cameras, None, Some("/dev/video2")),
            Some(&cameras[1])
        );
        // Unknown preferred handle falls back to the first camera
        assert_eq!(
            select_camera(&cameras, None, Some("/dev/video9")),
            Some(&cameras[0])
        );
        assert_eq!(select_camera(&[], None, None), None);
    }
}
