// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use barcode_scanner::constants::{api, app_info, capture, scanning, timing};

#[test]
fn test_poll_interval() {
    assert_eq!(scanning::POLL_INTERVAL.as_millis(), 100);
    assert!(scanning::MAX_MESSAGES_PER_POLL > 0);
}

#[test]
fn test_start_does_not_block_the_poll_loop() {
    assert!(timing::START_STATE_WAIT < scanning::POLL_INTERVAL);
}

#[test]
fn test_capture_format() {
    // Low resolution and framerate keep zbar responsive
    assert_eq!((capture::WIDTH, capture::HEIGHT), (640, 480));
    assert_eq!(capture::FRAMERATE, 10);
}

#[test]
fn test_product_page_url() {
    assert_eq!(
        api::product_page_url("036000291452"),
        "https://www.ean-search.org/ean/036000291452"
    );
}

#[test]
fn test_about_text() {
    let about = app_info::about_text();
    assert!(about.contains(app_info::version()));
    assert!(about.contains(app_info::COPYRIGHT));
    assert!(about.contains(api::TOKEN_SIGNUP_URL));
}

#[test]
fn test_user_agent() {
    assert!(app_info::user_agent().starts_with("BarcodeScanner/"));
}
