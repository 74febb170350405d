//! Splitting of the combined SIGMET/AIRMET text blob
//!
//! The advisory provider returns every active SIGMET followed by every active
//! AIRMET in one plain-text document. Items are delimited only by their
//! leading marker, so splitting is a matter of cutting on the markers and
//! putting them back.

use serde::{Deserialize, Serialize};

pub const SIGMET_MARKER: &str = "SIGMET for";
pub const AIRMET_MARKER: &str = "AIRMET for";

/// SIGMET and AIRMET items separated out of one advisory document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisories {
    pub sigmets: Vec<String>,
    pub airmets: Vec<String>,
}

/// Split a combined advisory document into its SIGMET and AIRMET items.
///
/// Everything before the first [`AIRMET_MARKER`] is the SIGMET region and the
/// rest is the AIRMET region. Item text is kept byte for byte, including
/// trailing newlines. Text preceding the first marker of a region is dropped.
#[must_use]
pub fn split(text: &str) -> Advisories {
    let (sigmet_region, airmet_region) = match text.find(AIRMET_MARKER) {
        Some(index) => text.split_at(index),
        None => (text, ""),
    };

    Advisories {
        sigmets: split_region(sigmet_region, SIGMET_MARKER),
        airmets: split_region(airmet_region, AIRMET_MARKER),
    }
}

fn split_region(region: &str, marker: &str) -> Vec<String> {
    if region.is_empty() {
        return Vec::new();
    }

    region
        .split(marker)
        .skip(1)
        .map(|item| format!("{marker}{item}"))
        .collect()
}
