// SPDX-License-Identifier: GPL-3.0-only

//! Scan event filter
//!
//! Turns the raw detection stream into product codes worth looking up. zbar
//! reports the same physical barcode on every frame it stays in view, so only
//! a change against the last accepted symbol triggers a lookup.

use crate::backends::camera::{Detection, Symbology};
use tracing::{debug, trace};

/// What to do with one detection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanDecision {
    /// New EAN-13/UPC-A code, look it up
    Lookup { code: String },
    /// Same code as the last accepted one, ignore silently
    Duplicate,
    /// EAN-8 or UPC-E, only unique within a company prefix
    NotGloballyUnique(Symbology),
    /// Not an EAN/UPC barcode at all (QR code, Code 128, ...)
    NotProductBarcode(Symbology),
}

impl ScanDecision {
    /// Status line for decisions the user should see
    pub fn status_message(&self) -> Option<String> {
        match self {
            ScanDecision::NotGloballyUnique(symbology) => {
                Some(format!("Barcode {} is not globally unique", symbology))
            }
            ScanDecision::NotProductBarcode(symbology) => {
                Some(format!("{} is not an EAN/UPC product barcode", symbology))
            }
            ScanDecision::Lookup { .. } | ScanDecision::Duplicate => None,
        }
    }
}

/// Stateful de-duplicating filter
///
/// Only the immediately previous accepted symbol is remembered: scanning
/// A, B, A yields three lookups.
#[derive(Debug, Default)]
pub struct ScanFilter {
    last_accepted_symbol: Option<String>,
}

impl ScanFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify one detection and update the session state
    pub fn process(&mut self, detection: &Detection) -> ScanDecision {
        match &detection.symbology {
            Symbology::Ean13 | Symbology::UpcA => {
                if self.last_accepted_symbol.as_deref() == Some(detection.symbol_text.as_str()) {
                    trace!(code = %detection.symbol_text, "Duplicate scan ignored");
                    return ScanDecision::Duplicate;
                }
                debug!(
                    code = %detection.symbol_text,
                    symbology = %detection.symbology,
                    "New product code accepted"
                );
                self.last_accepted_symbol = Some(detection.symbol_text.clone());
                ScanDecision::Lookup {
                    code: detection.symbol_text.clone(),
                }
            }
            Symbology::Ean8 | Symbology::UpcE => {
                ScanDecision::NotGloballyUnique(detection.symbology.clone())
            }
            Symbology::Other(_) => ScanDecision::NotProductBarcode(detection.symbology.clone()),
        }
    }

    /// Forget the last accepted symbol so it can trigger again
    pub fn reset(&mut self) {
        self.last_accepted_symbol = None;
    }

    pub fn last_accepted_symbol(&self) -> Option<&str> {
        self.last_accepted_symbol.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ean13(code: &str) -> Detection {
        Detection::new(Symbology::Ean13, code)
    }

    fn lookups(filter: &mut ScanFilter, detections: &[Detection]) -> Vec<String> {
        detections
            .iter()
            .filter_map(|d| match filter.process(d) {
                ScanDecision::Lookup { code } => Some(code),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_repeated_code_triggers_one_lookup() {
        let mut filter = ScanFilter::new();
        let stream = vec![ean13("4006381333931"); 25];
        assert_eq!(lookups(&mut filter, &stream), vec!["4006381333931"]);
    }

    #[test]
    fn test_new_code_after_repeats_triggers_exactly_one_more() {
        let mut filter = ScanFilter::new();
        let mut stream = vec![ean13("4006381333931"); 5];
        stream.extend(vec![
            Detection::new(Symbology::UpcA, "036000291452");
            5
        ]);
        assert_eq!(
            lookups(&mut filter, &stream),
            vec!["4006381333931", "036000291452"]
        );
    }

    #[test]
    fn test_only_previous_symbol_is_remembered() {
        let mut filter = ScanFilter::new();
        let stream = vec![ean13("1111111111116"), ean13("2222222222222"), ean13("1111111111116")];
        assert_eq!(lookups(&mut filter, &stream).len(), 3);
    }

    #[test]
    fn test_short_codes_are_never_looked_up() {
        let mut filter = ScanFilter::new();
        for symbology in [Symbology::Ean8, Symbology::UpcE] {
            let decision = filter.process(&Detection::new(symbology.clone(), "96385074"));
            assert_eq!(decision, ScanDecision::NotGloballyUnique(symbology.clone()));
            assert_eq!(
                decision.status_message().unwrap(),
                format!("Barcode {} is not globally unique", symbology)
            );
        }
        assert_eq!(filter.last_accepted_symbol(), None);
    }

    #[test]
    fn test_other_symbologies_are_not_product_barcodes() {
        let mut filter = ScanFilter::new();
        let decision = filter.process(&Detection::new(
            Symbology::Other("QR-Code".into()),
            "https://example.org",
        ));
        assert_eq!(
            decision.status_message().as_deref(),
            Some("QR-Code is not an EAN/UPC product barcode")
        );
    }

    #[test]
    fn test_non_candidates_do_not_break_deduplication() {
        let mut filter = ScanFilter::new();
        let stream = vec![
            ean13("4006381333931"),
            Detection::new(Symbology::Ean8, "96385074"),
            ean13("4006381333931"),
        ];
        assert_eq!(lookups(&mut filter, &stream), vec!["4006381333931"]);
    }

    #[test]
    fn test_reset_allows_same_code_again() {
        let mut filter = ScanFilter::new();
        assert!(matches!(
            filter.process(&ean13("4006381333931")),
            ScanDecision::Lookup { .. }
        ));
        assert_eq!(
            filter.process(&ean13("4006381333931")),
            ScanDecision::Duplicate
        );

        filter.reset();
        assert_eq!(
            filter.process(&ean13("4006381333931")),
            ScanDecision::Lookup {
                code: "4006381333931".into()
            }
        );
    }
}
