// SPDX-License-Identifier: GPL-3.0-only

//! Backend abstraction layer for video capture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │          Scan session / front-ends          │
//! └────────────────────┬────────────────────────┘
//!                      │
//! ┌────────────────────┴────────────────────────┐
//! │              Backend Layer                  │
//! │  ┌──────────────────┐  ┌─────────────────┐  │
//! │  │  Device catalog  │  │ Capture pipeline│  │
//! │  │ (DeviceMonitor)  │  │  (v4l2 + zbar)  │  │
//! │  └──────────────────┘  └─────────────────┘  │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! - [`camera`]: device enumeration and the barcode capture pipeline

pub mod camera;
