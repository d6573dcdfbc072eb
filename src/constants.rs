// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Scanning loop constants
pub mod scanning {
    use super::Duration;

    /// Interval between two polls of the pipeline bus
    pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

    /// Upper bound of bus messages handled in a single poll
    ///
    /// zbar posts one message per decoded frame, so at 10 fps this is never
    /// reached in practice. It keeps a flood of messages from starving the UI.
    pub const MAX_MESSAGES_PER_POLL: usize = 32;

    /// Number of entries kept in the scan history
    pub const HISTORY_LEN: usize = 8;
}

/// Capture pipeline constants
pub mod capture {
    /// Width requested from the camera
    pub const WIDTH: u32 = 640;

    /// Height requested from the camera
    pub const HEIGHT: u32 = 480;

    /// Framerate requested from the camera
    ///
    /// Barcode decoding does not profit from more frames and zbar is CPU bound.
    pub const FRAMERATE: u32 = 10;

    /// Name of the source element in the pipeline description
    pub const SOURCE_NAME: &str = "videosrc";

    /// Name of the display sink element in the pipeline description
    pub const SINK_NAME: &str = "imagesink";

    /// Name of the zbar element in the pipeline description
    pub const DECODER_NAME: &str = "zbar";

    /// Maximum frames queued in the preview appsink
    pub const MAX_BUFFERS: u32 = 2;

    /// Pixel format delivered to the preview appsink
    pub const PREVIEW_FORMAT: &str = "RGBA";

    /// Structure name of zbar's element messages
    pub const BARCODE_MESSAGE: &str = "barcode";

    /// Device class watched by the device monitor
    pub const DEVICE_CLASS: &str = "Video/Source";
}

/// Timing constants
pub mod timing {
    use super::Duration;

    /// Pipeline state change timeout on stop
    pub const STOP_TIMEOUT_SECS: u64 = 2;

    /// How long starting a pipeline waits for PLAYING
    ///
    /// Live sources change state asynchronously and failures are posted on the
    /// bus, so starting never blocks the caller's loop.
    pub const START_STATE_WAIT: Duration = Duration::ZERO;

    /// Default timeout of a product lookup request
    pub const LOOKUP_TIMEOUT_SECS: u64 = 10;
}

/// ean-search.org endpoints
pub mod api {
    /// Base URL of the lookup API
    pub const DEFAULT_BASE_URL: &str = "https://api.ean-search.org";

    /// Path of the lookup endpoint below the base URL
    pub const LOOKUP_PATH: &str = "/api";

    /// Operation requested from the API
    pub const LOOKUP_OP: &str = "barcode-lookup";

    /// Base of the canonical product page, the code is appended
    pub const PRODUCT_PAGE_BASE: &str = "https://www.ean-search.org/ean/";

    /// Where users get an API token
    pub const TOKEN_SIGNUP_URL: &str = "https://www.ean-search.org/ean-database-api.html";

    /// Home page shown in the about text
    pub const HOMEPAGE_URL: &str = "https://www.ean-search.org/";

    /// Canonical product page for a code
    pub fn product_page_url(code: &str) -> String {
        format!("{}{}", PRODUCT_PAGE_BASE, code)
    }
}

/// Application information utilities
pub mod app_info {
    /// Name used for the settings directory and in the user agent
    pub const APP_NAME: &str = "BarcodeScanner";

    /// Organization used for the settings directory
    pub const ORGANIZATION: &str = "ean-search.org";

    /// Copyright line shown in the about text
    pub const COPYRIGHT: &str = "© 2022 Relaxed Communications GmbH";

    /// Get the application version from build-time environment
    pub fn version() -> &'static str {
        env!("GIT_VERSION")
    }

    /// User agent sent with lookup requests
    pub fn user_agent() -> String {
        format!("{}/{}", APP_NAME, version())
    }

    /// Multi-line about text
    pub fn about_text() -> String {
        format!(
            "Barcode Scanner {}\n\
             Get your API token from {} to automatically look up the scanned barcodes.\n\
             {}\n\
             {}",
            version(),
            super::api::TOKEN_SIGNUP_URL,
            COPYRIGHT,
            super::api::HOMEPAGE_URL,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_product_page_url() {
        assert_eq!(
            api::product_page_url("4006381333931"),
            "https://www.ean-search.org/ean/4006381333931"
        );
    }

    #[test]
    fn test_user_agent_contains_version() {
        let agent = app_info::user_agent();
        assert!(agent.starts_with("BarcodeScanner/"));
        assert!(agent.ends_with(app_info::version()));
    }
}
