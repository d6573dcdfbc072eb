// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for the camera backend

use std::fmt;
use std::sync::Arc;

/// A camera as reported by the device catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CameraDevice {
    /// Human readable name shown in the camera selector
    pub name: String,
    /// Stable handle passed to the capture pipeline
    ///
    /// The V4L2 device path (e.g. `/dev/video0`) when the device is backed by
    /// V4L2, otherwise the display name.
    pub handle: String,
}

impl CameraDevice {
    /// Whether the handle is a device node that `v4l2src` can open directly
    pub fn has_device_path(&self) -> bool {
        self.handle.starts_with('/')
    }
}

impl fmt::Display for CameraDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.handle)
    }
}

/// Barcode encoding standard reported by the decoder
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Symbology {
    Ean13,
    UpcA,
    Ean8,
    UpcE,
    /// Any other symbology, with the decoder's type name
    Other(String),
}

impl Symbology {
    /// Map a zbar type name (`EAN-13`, `UPC-A`, ...) to a symbology
    pub fn from_zbar_type(name: &str) -> Self {
        match name {
            "EAN-13" => Symbology::Ean13,
            "UPC-A" => Symbology::UpcA,
            "EAN-8" => Symbology::Ean8,
            "UPC-E" => Symbology::UpcE,
            other => Symbology::Other(other.to_string()),
        }
    }

    /// Display name, matching the decoder's spelling
    pub fn name(&self) -> &str {
        match self {
            Symbology::Ean13 => "EAN-13",
            Symbology::UpcA => "UPC-A",
            Symbology::Ean8 => "EAN-8",
            Symbology::UpcE => "UPC-E",
            Symbology::Other(name) => name,
        }
    }
}

impl fmt::Display for Symbology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One decode result emitted by the capture pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Detection {
    pub symbology: Symbology,
    pub symbol_text: String,
}

impl Detection {
    pub fn new(symbology: Symbology, symbol_text: impl Into<String>) -> Self {
        Self {
            symbology,
            symbol_text: symbol_text.into(),
        }
    }
}

/// Message popped from the pipeline bus, translated to the scanner's terms
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusMessage {
    /// The decoder found a barcode
    Detection(Detection),
    /// The stream ended (camera unplugged, source stopped)
    EndOfStream,
    /// The pipeline clock went away and has to be re-selected
    ClockLost,
    /// An element reported a fatal error
    ElementError {
        /// Name of the element that posted the error
        source: Option<String>,
        message: String,
    },
}

/// RGBA frame delivered to a preview surface
#[derive(Debug, Clone)]
pub struct PreviewFrame {
    pub width: u32,
    pub height: u32,
    /// Bytes per row including padding
    pub stride: u32,
    pub data: Arc<[u8]>,
}

impl PreviewFrame {
    /// RGB value at a pixel, clamped to the frame bounds
    pub fn rgb_at(&self, x: u32, y: u32) -> (u8, u8, u8) {
        if self.width == 0 || self.height == 0 {
            return (0, 0, 0);
        }
        let x = x.min(self.width - 1);
        let y = y.min(self.height - 1);
        let idx = (y * self.stride + x * 4) as usize;
        match self.data.get(idx..idx + 3) {
            Some(px) => (px[0], px[1], px[2]),
            None => (0, 0, 0),
        }
    }
}

/// Sender side of the preview frame channel
pub type FrameSender = futures::channel::mpsc::Sender<PreviewFrame>;

/// Receiver side of the preview frame channel
pub type FrameReceiver = futures::channel::mpsc::Receiver<PreviewFrame>;

/// Where the capture pipeline renders the live video
#[derive(Debug, Clone)]
pub enum DisplaySurface {
    /// RGBA frames pushed into a channel (terminal preview)
    Appsink(FrameSender),
    /// Native window the video overlay is embedded into
    Window(usize),
    /// Let GStreamer open its own window
    Autovideosink,
    /// No preview at all
    Discard,
}

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Error types for backend operations
#[derive(Debug, Clone)]
pub enum BackendError {
    /// GStreamer is not usable on this system
    NotAvailable(String),
    /// Failed to parse or assemble the pipeline
    InitializationFailed(String),
    /// A required element is missing from the pipeline (plugin not installed)
    MissingElement(String),
    /// The pipeline refused a state change
    StateChange(String),
    /// Other errors
    Other(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::NotAvailable(msg) => write!(f, "Backend not available: {}", msg),
            BackendError::InitializationFailed(msg) => write!(f, "Initialization failed: {}", msg),
            BackendError::MissingElement(name) => write!(f, "Can't get {}!", name),
            BackendError::StateChange(msg) => write!(f, "State change failed: {}", msg),
            BackendError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BackendError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbology_from_zbar_type() {
        assert_eq!(Symbology::from_zbar_type("EAN-13"), Symbology::Ean13);
        assert_eq!(Symbology::from_zbar_type("UPC-A"), Symbology::UpcA);
        assert_eq!(Symbology::from_zbar_type("EAN-8"), Symbology::Ean8);
        assert_eq!(Symbology::from_zbar_type("UPC-E"), Symbology::UpcE);
        assert_eq!(
            Symbology::from_zbar_type("QR-Code"),
            Symbology::Other("QR-Code".to_string())
        );
    }

    #[test]
    fn test_symbology_name_roundtrips_decoder_spelling() {
        for name in ["EAN-13", "UPC-A", "EAN-8", "UPC-E", "CODE-128"] {
            assert_eq!(Symbology::from_zbar_type(name).name(), name);
        }
    }

    #[test]
    fn test_device_path_detection() {
        let v4l2 = CameraDevice {
            name: "Integrated Camera".into(),
            handle: "/dev/video0".into(),
        };
        let other = CameraDevice {
            name: "Integrated Camera".into(),
            handle: "Integrated Camera".into(),
        };
        assert!(v4l2.has_device_path());
        assert!(!other.has_device_path());
    }

    #[test]
    fn test_rgb_at_respects_stride_and_bounds() {
        // 2x2 RGBA with 2 bytes of row padding
        let data: Vec<u8> = vec![
            255, 0, 0, 255, 0, 255, 0, 255, 0, 0, //
            0, 0, 255, 255, 9, 9, 9, 255, 0, 0,
        ];
        let frame = PreviewFrame {
            width: 2,
            height: 2,
            stride: 10,
            data: Arc::from(data.as_slice()),
        };
        assert_eq!(frame.rgb_at(0, 0), (255, 0, 0));
        assert_eq!(frame.rgb_at(1, 0), (0, 255, 0));
        assert_eq!(frame.rgb_at(0, 1), (0, 0, 255));
        // Out of range coordinates clamp to the last pixel
        assert_eq!(frame.rgb_at(5, 5), (9, 9, 9));
    }
}
