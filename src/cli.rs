// SPDX-License-Identifier: GPL-3.0-only

//! CLI commands
//!
//! This module provides command-line functionality for:
//! - Listing available cameras
//! - Scanning without the interactive front-end
//! - One-off lookups and token management

use barcode_scanner::backends::camera::{
    DeviceCatalog, DisplaySurface, GstCaptureBackend, GstDeviceCatalog, select_camera,
};
use barcode_scanner::config::{Settings, mask_token};
use barcode_scanner::constants::{api, scanning};
use barcode_scanner::errors::CameraError;
use barcode_scanner::scanner::{LineSink, LookupClient, ScanSession};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// List all available cameras
pub fn list_cameras(settings: &Settings) -> Result<(), Box<dyn std::error::Error>> {
    let cameras = GstDeviceCatalog::new().list_devices()?;

    if cameras.is_empty() {
        println!("No cameras found.");
        return Ok(());
    }

    println!("Available cameras:");
    println!();
    for (index, camera) in cameras.iter().enumerate() {
        let marker = if settings.config.last_camera.as_deref() == Some(camera.handle.as_str()) {
            " (last used)"
        } else {
            ""
        };
        println!("  [{}] {}{}", index, camera.name, marker);
        println!("      Device: {}", camera.handle);
    }

    Ok(())
}

/// Scan until Ctrl+C, printing statuses and lookup results
pub fn scan(
    settings: &mut Settings,
    camera_index: Option<usize>,
    surface: DisplaySurface,
) -> Result<(), Box<dyn std::error::Error>> {
    let cameras = GstDeviceCatalog::new().list_devices()?;
    if cameras.is_empty() {
        return Err(CameraError::NoCameraFound.into());
    }

    let camera = select_camera(
        &cameras,
        camera_index,
        settings.config.last_camera.as_deref(),
    )
    .ok_or(CameraError::IndexOutOfRange {
        index: camera_index.unwrap_or_default(),
        count: cameras.len(),
    })?
    .clone();
    println!("Using camera: {}", camera);

    let client = LookupClient::from_config(&settings.config, settings.credential().clone())?;
    if client.credential().is_empty() {
        println!(
            "No API token configured, get one at {}",
            api::TOKEN_SIGNUP_URL
        );
    }

    let runtime = tokio::runtime::Runtime::new()?;
    let mut session = ScanSession::new(
        Box::new(GstCaptureBackend::new()),
        client,
        runtime.handle().clone(),
    );

    let embedded = matches!(surface, DisplaySurface::Window(_));
    session.start(&camera, surface)?;
    if embedded && !session.has_preview() {
        println!("Window embedding not available, scanning without preview");
    }
    settings.set_last_camera(&camera.handle);

    // Set up Ctrl+C handler
    let stop_flag = Arc::new(AtomicBool::new(false));
    let stop_flag_clone = stop_flag.clone();
    ctrlc::set_handler(move || {
        stop_flag_clone.store(true, Ordering::SeqCst);
    })?;

    println!("Scanning... (press Ctrl+C to stop)");
    let mut sink = LineSink::new(std::io::stdout());
    while !stop_flag.load(Ordering::SeqCst) {
        session.poll(&mut sink);
        std::thread::sleep(scanning::POLL_INTERVAL);
    }

    println!();
    println!("Stopping...");
    session.stop();
    // Results of lookups that already completed
    session.poll(&mut sink);

    Ok(())
}

/// Display surface for the `scan` command
pub fn scan_surface(preview: bool, window: Option<usize>) -> DisplaySurface {
    match (window, preview) {
        (Some(handle), _) => DisplaySurface::Window(handle),
        (None, true) => DisplaySurface::Autovideosink,
        (None, false) => DisplaySurface::Discard,
    }
}

/// Parse a native window id, decimal or `0x`-prefixed hex as printed by `xwininfo`
pub fn parse_window_handle(value: &str) -> Result<usize, String> {
    let value = value.trim();
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => usize::from_str_radix(hex, 16),
        None => value.parse::<usize>(),
    };
    match parsed {
        Ok(0) => Err("window id must not be 0".to_string()),
        Ok(handle) => Ok(handle),
        Err(e) => Err(format!("invalid window id '{}': {}", value, e)),
    }
}

/// Look up one product code with the configured token
pub fn lookup(settings: &Settings, code: &str) -> Result<(), Box<dyn std::error::Error>> {
    let code = code.trim();
    if code.is_empty() || !code.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("Not a product code: '{}'", code).into());
    }

    let client = LookupClient::from_config(&settings.config, settings.credential().clone())?;
    let runtime = tokio::runtime::Runtime::new()?;
    let request = client.request(code);
    let outcome = runtime.block_on(client.lookup(&request));

    println!("{}", outcome.describe(code));
    Ok(())
}

/// Show, set or clear the API token
pub fn token(
    settings: &mut Settings,
    value: Option<String>,
    clear: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if clear {
        settings.set_token("");
        println!("API token cleared");
    } else if let Some(value) = value {
        let value = value.trim();
        if value.is_empty() {
            return Err("Token must not be empty, use --clear to remove it".into());
        }
        settings.set_token(value);
        println!("API token set: {}", mask_token(value));
    } else {
        println!("API token: {}", mask_token(settings.credential().get().trim()));
        println!("Settings:  {}", settings.store().path().display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_window_handle() {
        assert_eq!(parse_window_handle("0x3a00007"), Ok(0x3a00007));
        assert_eq!(parse_window_handle("60817415"), Ok(60817415));
        assert!(parse_window_handle("0").is_err());
        assert!(parse_window_handle("window").is_err());
    }

    #[test]
    fn test_scan_surface() {
        assert!(matches!(
            scan_surface(false, Some(42)),
            DisplaySurface::Window(42)
        ));
        assert!(matches!(
            scan_surface(true, None),
            DisplaySurface::Autovideosink
        ));
        assert!(matches!(scan_surface(false, None), DisplaySurface::Discard));
    }
}
