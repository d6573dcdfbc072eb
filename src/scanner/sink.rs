// SPDX-License-Identifier: GPL-3.0-only

//! Presentation sinks
//!
//! The scan session reports everything the user should see through
//! [`PresentationSink`]; front-ends decide how to render it.

use super::lookup::LookupOutcome;
use chrono::Local;
use std::io::Write;
use tracing::warn;

/// Receiver of user-visible scanner output
pub trait PresentationSink {
    /// Informational status, e.g. an unsupported symbology
    fn on_status(&mut self, message: &str);

    /// Pipeline problem (end of stream, element error, lost clock)
    fn on_error(&mut self, message: &str) {
        self.on_status(message);
    }

    /// Completed lookup for `code`
    fn on_product_result(&mut self, code: &str, outcome: &LookupOutcome);
}

/// Writes one timestamped line per event
pub struct LineSink<W: Write> {
    out: W,
}

impl<W: Write> LineSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, text: &str) {
        let stamp = Local::now().format("%H:%M:%S");
        if let Err(e) = writeln!(self.out, "[{}] {}", stamp, text).and_then(|_| self.out.flush())
        {
            warn!(error = %e, "Failed to write scanner output");
        }
    }
}

impl<W: Write> PresentationSink for LineSink<W> {
    fn on_status(&mut self, message: &str) {
        self.line(message);
    }

    fn on_product_result(&mut self, code: &str, outcome: &LookupOutcome) {
        self.line(&outcome.describe(code));
    }
}
