// SPDX-License-Identifier: GPL-3.0-only

//! Barcode scanning core
//!
//! - [`filter`]: decides which detections are worth a lookup
//! - [`lookup`]: ean-search.org client
//! - [`session`]: pipeline lifecycle and result routing
//! - [`sink`]: how results reach the user

pub mod filter;
pub mod lookup;
pub mod session;
pub mod sink;

pub use filter::{ScanDecision, ScanFilter};
pub use lookup::{LookupClient, LookupOutcome, LookupRequest, LookupResult, classify_body};
pub use session::ScanSession;
pub use sink::{LineSink, PresentationSink};
