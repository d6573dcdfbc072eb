// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the barcode scanner
//!
//! Lookup failures are not errors: they resolve to a
//! [`LookupOutcome`](crate::scanner::LookupOutcome) and are shown inline.

use crate::backends::camera::BackendError;
use std::fmt;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Camera selection errors
    Camera(CameraError),
    /// Capture pipeline errors
    Pipeline(PipelineError),
    /// Configuration errors
    Config(String),
    /// Storage/filesystem errors
    Storage(String),
    /// Generic error with message
    Other(String),
}

/// Camera selection errors
///
/// These disable scanning but are never fatal to the process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    /// No camera devices found
    NoCameraFound,
    /// Camera index out of range
    IndexOutOfRange { index: usize, count: usize },
}

/// Capture pipeline errors
#[derive(Debug, Clone)]
pub enum PipelineError {
    /// Pipeline could not be built or started, scanning is impossible
    Construction(String),
    /// A scan session is already running
    AlreadyRunning,
}

impl PipelineError {
    /// Construction errors terminate the process
    pub fn is_fatal(&self) -> bool {
        matches!(self, PipelineError::Construction(_))
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Camera(e) => write!(f, "Camera error: {}", e),
            AppError::Pipeline(e) => write!(f, "{}", e),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::Storage(msg) => write!(f, "Storage error: {}", msg),
            AppError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for CameraError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CameraError::NoCameraFound => write!(f, "No cameras found"),
            CameraError::IndexOutOfRange { index, count } => write!(
                f,
                "Camera index {} out of range (0-{})",
                index,
                count.saturating_sub(1)
            ),
        }
    }
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::Construction(msg) => write!(
                f,
                "Pipeline error: {}\nIs GStreamer installed correctly?",
                msg
            ),
            PipelineError::AlreadyRunning => write!(f, "Scanning is already running"),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for CameraError {}
impl std::error::Error for PipelineError {}

impl From<CameraError> for AppError {
    fn from(err: CameraError) -> Self {
        AppError::Camera(err)
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        AppError::Pipeline(err)
    }
}

// Every backend failure surfaces while building or starting a pipeline
impl From<BackendError> for PipelineError {
    fn from(err: BackendError) -> Self {
        PipelineError::Construction(err.to_string())
    }
}

impl From<BackendError> for AppError {
    fn from(err: BackendError) -> Self {
        AppError::Pipeline(err.into())
    }
}

impl From<String> for AppError {
    fn from(msg: String) -> Self {
        AppError::Other(msg)
    }
}

impl From<&str> for AppError {
    fn from(msg: &str) -> Self {
        AppError::Other(msg.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Config(err.to_string())
    }
}
