// SPDX-License-Identifier: GPL-3.0-only

//! Barcode Scanner - scan EAN/UPC barcodes with a webcam
//!
//! Barcodes are decoded by the GStreamer `zbar` element while the live video
//! is shown on a preview surface. New EAN-13/UPC-A codes are looked up on
//! ean-search.org when an API token is configured.
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`backends`]: Camera enumeration and the capture pipeline
//! - [`scanner`]: Scan filtering, product lookup and session control
//! - [`config`]: Persistent settings and the shared API token
//! - [`terminal`]: Interactive terminal front-end
//!
//! # Example
//!
//! ```ignore
//! // Interactive scanner in the terminal:
//! // barcode-scanner
//! // Print results line by line:
//! // barcode-scanner scan
//! ```

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod scanner;
pub mod terminal;

// Re-export commonly used types
pub use backends::camera::{CameraDevice, Detection, Symbology};
pub use config::{Config, ConfigStore, Credential};
pub use errors::{AppError, AppResult};
pub use scanner::{LookupClient, LookupOutcome, PresentationSink, ScanSession};
